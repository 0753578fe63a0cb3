//! Tests for routing, webhook response mapping and dispatcher wiring.

use super::*;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use pr_insight_core::auth::{
    AuthenticationProvider, InstallationId, InstallationToken, JsonWebToken,
};
use pr_insight_core::client::{PullRequestRef, PullRequestSnapshot, PullRequestSource};
use pr_insight_core::inference::InsightModel;
use pr_insight_core::prompt::AnalysisPrompt;
use pr_insight_core::{ApiError, AuthError, DispatcherConfig, InferenceError};
use std::sync::Mutex;
use tower::ServiceExt;

const SECRET: &str = "router-secret";

const TEST_PRIVATE_KEY: &str = include_str!("../../pr-insight-core/test-data/app-private-key.pem");

// ============================================================================
// Mock Collaborators
// ============================================================================

struct MockAuth;

#[async_trait]
impl AuthenticationProvider for MockAuth {
    async fn app_token(&self) -> Result<JsonWebToken, AuthError> {
        Err(AuthError::JwtGenerationFailed {
            message: "Not used by the router".to_string(),
        })
    }

    async fn installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        Ok(InstallationToken::new("ghs_test".to_string(), installation_id, None))
    }
}

#[derive(Default)]
struct MockSource {
    calls: Arc<Mutex<usize>>,
    fail_status: Option<u16>,
}

#[async_trait]
impl PullRequestSource for MockSource {
    async fn fetch_pull_request(
        &self,
        _token: &InstallationToken,
        target: &PullRequestRef,
    ) -> Result<PullRequestSnapshot, ApiError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(status) = self.fail_status {
            return Err(ApiError::HttpError {
                status,
                message: "Not Found".to_string(),
            });
        }
        Ok(PullRequestSnapshot {
            number: target.number,
            title: "Add widget".to_string(),
            description: String::new(),
            author: "octocat".to_string(),
            base_branch: "main".to_string(),
            head_branch: "widget".to_string(),
            additions: 1,
            deletions: 0,
            changed_files: 1,
            diff: "diff --git a/src/lib.rs b/src/lib.rs\n+pub struct Widget;\n".to_string(),
        })
    }
}

struct MockModel;

#[async_trait]
impl InsightModel for MockModel {
    async fn complete(&self, _prompt: &AnalysisPrompt) -> Result<String, InferenceError> {
        Ok("## Summary\nAdds a widget.".to_string())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn router_with(config: ServiceConfig, source: MockSource) -> Router {
    let dispatcher = WebhookDispatcher::new(
        SignatureVerifier::new(SECRET),
        Arc::new(MockAuth),
        Arc::new(source),
        Arc::new(MockModel),
        DispatcherConfig::default(),
    );
    create_router(AppState::new(config, Arc::new(dispatcher)))
}

fn pull_request_body(action: &str) -> String {
    serde_json::json!({
        "action": action,
        "pull_request": {
            "url": "https://api.github.com/repos/octo/widgets/pulls/7",
            "number": 7,
            "merged": false
        },
        "repository": { "name": "widgets", "owner": { "login": "octo" } },
        "installation": { "id": 42 }
    })
    .to_string()
}

fn signed_request(path: &str, event: &str, body: String) -> Request<Body> {
    let signature = SignatureVerifier::new(SECRET).sign(body.as_bytes()).unwrap();
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .header(EVENT_HEADER, event)
        .header(DELIVERY_HEADER, "72d3162e-cc78-11e3-81ab-4c9367dc0958")
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ============================================================================
// Built-in Routes
// ============================================================================

mod builtin_route_tests {
    use super::*;

    #[tokio::test]
    async fn test_root_reports_liveness() {
        let app = router_with(ServiceConfig::default(), MockSource::default());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("running"));
    }

    #[tokio::test]
    async fn test_health_returns_status_and_version() {
        let app = router_with(ServiceConfig::default(), MockSource::default());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }
}

// ============================================================================
// Webhook Endpoint
// ============================================================================

mod webhook_route_tests {
    use super::*;

    #[tokio::test]
    async fn test_opened_pull_request_is_processed() {
        let source = MockSource::default();
        let calls = source.calls.clone();
        let app = router_with(ServiceConfig::default(), source);

        let response = app
            .oneshot(signed_request(
                "/github-webhook",
                "pull_request",
                pull_request_body("opened"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, PROCESSED_MESSAGE);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_signature_is_unauthorized() {
        let source = MockSource::default();
        let calls = source.calls.clone();
        let app = router_with(ServiceConfig::default(), source);

        let request = Request::builder()
            .method("POST")
            .uri("/github-webhook")
            .header(SIGNATURE_HEADER, format!("sha256={}", "0".repeat(64)))
            .header(EVENT_HEADER, "pull_request")
            .body(Body::from(pull_request_body("opened")))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_text(response).await, "Invalid signature");
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_signature_is_unauthorized() {
        let app = router_with(ServiceConfig::default(), MockSource::default());

        let request = Request::builder()
            .method("POST")
            .uri("/github-webhook")
            .body(Body::from(pull_request_body("opened")))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_ping_event_is_ignored() {
        let app = router_with(ServiceConfig::default(), MockSource::default());

        let response = app
            .oneshot(signed_request(
                "/github-webhook",
                "ping",
                r#"{"zen":"Keep it logically awesome."}"#.to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, IGNORED_MESSAGE);
    }

    #[tokio::test]
    async fn test_untriggered_action_is_ignored() {
        let source = MockSource::default();
        let calls = source.calls.clone();
        let app = router_with(ServiceConfig::default(), source);

        let response = app
            .oneshot(signed_request(
                "/github-webhook",
                "pull_request",
                pull_request_body("labeled"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, IGNORED_MESSAGE);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let app = router_with(ServiceConfig::default(), MockSource::default());

        let response = app
            .oneshot(signed_request(
                "/github-webhook",
                "pull_request",
                r#"{"action":"opened"}"#.to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_internal_error_with_reason() {
        let source = MockSource {
            fail_status: Some(404),
            ..MockSource::default()
        };
        let app = router_with(ServiceConfig::default(), source);

        let response = app
            .oneshot(signed_request(
                "/github-webhook",
                "pull_request",
                pull_request_body("synchronize"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = body_text(response).await;
        assert!(text.starts_with("Failed to process webhook:"), "{}", text);
        assert!(text.contains("404"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut config = ServiceConfig::default();
        config.server.max_body_size = 64;
        let source = MockSource::default();
        let calls = source.calls.clone();
        let app = router_with(config, source);

        let response = app
            .oneshot(signed_request(
                "/github-webhook",
                "pull_request",
                pull_request_body("opened"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_endpoint_path_is_configurable() {
        let mut config = ServiceConfig::default();
        config.webhooks.endpoint_path = "/hooks/pr".to_string();

        let app = router_with(config.clone(), MockSource::default());
        let response = app
            .oneshot(signed_request(
                "/hooks/pr",
                "pull_request",
                pull_request_body("opened"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let app = router_with(config, MockSource::default());
        let response = app
            .oneshot(signed_request(
                "/github-webhook",
                "pull_request",
                pull_request_body("opened"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

// ============================================================================
// Wiring
// ============================================================================

mod build_dispatcher_tests {
    use super::*;

    fn secrets() -> AppSecrets {
        AppSecrets::from_lookup(|key| match key {
            "GITHUB_WEBHOOK_SECRET" => Some(SECRET.to_string()),
            "GITHUB_APP_ID" => Some("12345".to_string()),
            "GITHUB_APP_PRIVATE_KEY" => Some(TEST_PRIVATE_KEY.to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_default_configuration_builds() {
        let dispatcher = build_dispatcher(&ServiceConfig::default(), &secrets()).unwrap();

        assert_eq!(dispatcher.config().trigger, pr_insight_core::TriggerMode::default());
    }

    #[test]
    fn test_analysis_settings_reach_the_dispatcher() {
        let mut config = ServiceConfig::default();
        config.analysis.trigger = pr_insight_core::TriggerMode::Merged;
        config.analysis.kind = pr_insight_core::prompt::AnalysisKind::ReviewScore;
        config.analysis.extra_excluded_patterns = vec![r"^vendor/".to_string()];

        let dispatcher = build_dispatcher(&config, &secrets()).unwrap();

        assert_eq!(dispatcher.config().trigger, pr_insight_core::TriggerMode::Merged);
        assert_eq!(
            dispatcher.config().prompt_builder.kind(),
            pr_insight_core::prompt::AnalysisKind::ReviewScore
        );
        assert!(dispatcher
            .config()
            .diff_filter
            .patterns()
            .is_generated("vendor/lib.js"));
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let mut config = ServiceConfig::default();
        config.analysis.extra_excluded_patterns = vec!["(unclosed".to_string()];

        let result = build_dispatcher(&config, &secrets());

        assert!(matches!(result, Err(ServiceError::Configuration(_))));
    }
}
