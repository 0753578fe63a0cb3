//! Common test utilities for PR Insight integration tests
//!
//! This module provides:
//! - A service configuration pointing GitHub and the model at one wiremock
//!   server
//! - Canned GitHub and chat-completions responses
//! - Signed webhook request builders

#![allow(dead_code)]

use axum::{body::Body, http::Request, Router};
use pr_insight_api::{build_dispatcher, create_router, AppSecrets, AppState, ServiceConfig};
use pr_insight_core::webhook::{
    SignatureVerifier, DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER,
};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request as ReceivedRequest, ResponseTemplate};

pub const WEBHOOK_SECRET: &str = "integration-secret";
pub const INSTALLATION_TOKEN: &str = "ghs_integration";
pub const INSTALLATION_ID: u64 = 42;
pub const OWNER: &str = "octo";
pub const REPO: &str = "widgets";
pub const NUMBER: u64 = 7;

pub const TEST_PRIVATE_KEY: &str = include_str!("../../test-data/app-private-key.pem");

pub const SOURCE_DIFF: &str = "diff --git a/src/widget.rs b/src/widget.rs\n\
index 0000000..1111111 100644\n\
--- a/src/widget.rs\n\
+++ b/src/widget.rs\n\
@@ -0,0 +1,3 @@\n\
+pub struct Widget {\n\
+    pub size: u32,\n\
+}\n";

pub const LOCKFILE_DIFF: &str = "diff --git a/package-lock.json b/package-lock.json\n\
index 2222222..3333333 100644\n\
--- a/package-lock.json\n\
+++ b/package-lock.json\n\
@@ -1 +1 @@\n\
-\"lockfileVersion\": 2\n\
+\"lockfileVersion\": 3\n";

// ============================================================================
// Service Setup
// ============================================================================

pub fn secrets() -> AppSecrets {
    AppSecrets::from_lookup(|key| match key {
        "GITHUB_WEBHOOK_SECRET" => Some(WEBHOOK_SECRET.to_string()),
        "GITHUB_APP_ID" => Some("123456".to_string()),
        "GITHUB_APP_PRIVATE_KEY" => Some(TEST_PRIVATE_KEY.to_string()),
        "AI_API_KEY" => Some("sk-integration".to_string()),
        _ => None,
    })
    .expect("test secrets should load")
}

/// Configuration with GitHub and the inference endpoint on `server`.
pub fn config_for(server: &MockServer) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.github.api_url = server.uri();
    config.github.request_timeout_seconds = Some(5);
    config.inference.endpoint_url = format!("{}/v1/chat/completions", server.uri());
    config.inference.model = "integration-model".to_string();
    config.inference.request_timeout_seconds = Some(5);
    config
}

pub fn router(config: ServiceConfig) -> Router {
    let dispatcher = build_dispatcher(&config, &secrets()).expect("dispatcher should build");
    create_router(AppState::new(config, Arc::new(dispatcher)))
}

// ============================================================================
// Upstream Doubles
// ============================================================================

pub async fn mount_token_exchange(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!(
            "/app/installations/{}/access_tokens",
            INSTALLATION_ID
        )))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "token": INSTALLATION_TOKEN,
            "expires_at": "2030-01-01T00:00:00Z"
        })))
        .mount(server)
        .await;
}

pub async fn mount_pull_request(server: &MockServer, diff: &str) {
    let pr_path = format!("/repos/{}/{}/pulls/{}", OWNER, REPO, NUMBER);

    Mock::given(method("GET"))
        .and(path(pr_path.clone()))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "number": NUMBER,
            "title": "Add widget type",
            "body": "Introduces the Widget struct.",
            "state": "open",
            "user": { "login": "octocat" },
            "head": { "ref": "feature/widget", "sha": "abc123" },
            "base": { "ref": "main", "sha": "def456" },
            "merged": false,
            "additions": 4,
            "deletions": 1,
            "changed_files": 2
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(pr_path))
        .and(header("accept", "application/vnd.github.v3.diff"))
        .respond_with(ResponseTemplate::new(200).set_body_string(diff))
        .mount(server)
        .await;
}

pub async fn mount_model(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-integration",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": answer },
                "finish_reason": "stop"
            }]
        })))
        .mount(server)
        .await;
}

/// Every request the doubles received whose path starts with `prefix`.
pub async fn requests_to(server: &MockServer, prefix: &str) -> Vec<ReceivedRequest> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().starts_with(prefix))
        .collect()
}

/// The user message of the single chat-completions request.
pub async fn sent_user_prompt(server: &MockServer) -> String {
    let requests = requests_to(server, "/v1/chat/completions").await;
    assert_eq!(requests.len(), 1, "expected exactly one model call");
    let body: serde_json::Value = requests[0].body_json().expect("model request is JSON");
    body["messages"][1]["content"]
        .as_str()
        .expect("user message content")
        .to_string()
}

// ============================================================================
// Webhook Requests
// ============================================================================

pub fn pull_request_payload(action: &str, merged: bool) -> String {
    serde_json::json!({
        "action": action,
        "number": NUMBER,
        "pull_request": {
            "url": format!("https://api.github.com/repos/{}/{}/pulls/{}", OWNER, REPO, NUMBER),
            "number": NUMBER,
            "merged": merged
        },
        "repository": {
            "name": REPO,
            "full_name": format!("{}/{}", OWNER, REPO),
            "owner": { "login": OWNER }
        },
        "installation": { "id": INSTALLATION_ID },
        "sender": { "login": "octocat" }
    })
    .to_string()
}

pub fn webhook_request(path: &str, event: &str, body: String, signature: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .header(EVENT_HEADER, event)
        .header(DELIVERY_HEADER, "f1d2d2f9-24c0-4a4d-8d8e-6d1c2f0e1a11")
        .body(Body::from(body))
        .expect("valid request")
}

pub fn signed_webhook(event: &str, body: String) -> Request<Body> {
    let signature = SignatureVerifier::new(WEBHOOK_SECRET)
        .sign(body.as_bytes())
        .expect("HMAC accepts any key length");
    webhook_request("/github-webhook", event, body, signature)
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    String::from_utf8(bytes.to_vec()).expect("UTF-8 body")
}
