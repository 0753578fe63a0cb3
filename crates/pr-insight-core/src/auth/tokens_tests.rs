//! Tests for the installation token exchange.

use super::*;
use chrono::Duration as ChronoDuration;
use std::sync::Mutex;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Mock JwtGenerator for Testing
// ============================================================================

struct MockJwtGenerator {
    token: String,
    calls: Arc<Mutex<u32>>,
}

impl MockJwtGenerator {
    fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            calls: Arc::new(Mutex::new(0)),
        }
    }
}

#[async_trait]
impl JwtGenerator for MockJwtGenerator {
    async fn generate_jwt(&self, app_id: GitHubAppId) -> Result<JsonWebToken, AuthError> {
        *self.calls.lock().unwrap() += 1;
        let now = Utc::now();
        Ok(JsonWebToken::new(
            self.token.clone(),
            app_id,
            now,
            now + ChronoDuration::seconds(60),
        ))
    }

    fn expiration_duration(&self) -> ChronoDuration {
        ChronoDuration::seconds(60)
    }
}

fn auth_for(server: &MockServer, generator: MockJwtGenerator) -> GitHubAppAuth {
    let config = AuthConfig {
        github_api_url: server.uri(),
        ..AuthConfig::default()
    };
    GitHubAppAuth::new(GitHubAppId::new(123), Arc::new(generator), config).unwrap()
}

// ============================================================================
// Token Exchange Tests
// ============================================================================

mod exchange_tests {
    use super::*;

    #[tokio::test]
    async fn test_exchange_posts_jwt_and_returns_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/app/installations/4242/access_tokens"))
            .and(header("Authorization", "Bearer signed-assertion"))
            .and(header("Accept", "application/vnd.github+json"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "token": "ghs_installation",
                "expires_at": "2030-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = auth_for(&server, MockJwtGenerator::new("signed-assertion"));
        let token = auth
            .installation_token(InstallationId::new(4242))
            .await
            .unwrap();

        assert_eq!(token.token(), "ghs_installation");
        assert_eq!(token.installation_id(), InstallationId::new(4242));
        assert!(token.expires_at().is_some());
    }

    #[tokio::test]
    async fn test_each_exchange_signs_a_fresh_assertion() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/app/installations/1/access_tokens"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({ "token": "ghs_a" })),
            )
            .expect(2)
            .mount(&server)
            .await;

        let generator = MockJwtGenerator::new("jwt");
        let calls = generator.calls.clone();
        let auth = auth_for(&server, generator);

        auth.installation_token(InstallationId::new(1)).await.unwrap();
        auth.installation_token(InstallationId::new(1)).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rejected_exchange_reports_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/app/installations/7/access_tokens"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let auth = auth_for(&server, MockJwtGenerator::new("jwt"));
        let result = auth.installation_token(InstallationId::new(7)).await;

        match result {
            Err(AuthError::TokenExchangeFailed {
                installation_id,
                status,
                message,
            }) => {
                assert_eq!(installation_id, InstallationId::new(7));
                assert_eq!(status, 401);
                assert_eq!(message, "Bad credentials");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_token_field_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/app/installations/7/access_tokens"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({ "message": "ok" })),
            )
            .mount(&server)
            .await;

        let auth = auth_for(&server, MockJwtGenerator::new("jwt"));
        let result = auth.installation_token(InstallationId::new(7)).await;

        assert!(matches!(result, Err(AuthError::InvalidTokenResponse { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let config = AuthConfig {
            github_api_url: "http://127.0.0.1:1".to_string(),
            ..AuthConfig::default()
        };
        let auth = GitHubAppAuth::new(
            GitHubAppId::new(1),
            Arc::new(MockJwtGenerator::new("jwt")),
            config,
        )
        .unwrap();

        let result = auth.installation_token(InstallationId::new(1)).await;

        assert!(matches!(result, Err(AuthError::NetworkError(_))));
    }
}

#[test]
fn test_default_config_targets_public_github() {
    let config = AuthConfig::default();
    assert_eq!(config.github_api_url, "https://api.github.com");
    assert!(config.timeout.is_none());
}
