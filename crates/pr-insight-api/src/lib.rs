//! # PR Insight API
//!
//! HTTP surface for the PR Insight webhook service.
//!
//! Exposes the webhook endpoint, liveness and health routes, and the wiring
//! that turns [`ServiceConfig`] plus [`AppSecrets`] into a ready
//! [`WebhookDispatcher`].

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use pr_insight_core::auth::{GitHubAppAuth, RS256JwtGenerator};
use pr_insight_core::client::GitHubClient;
use pr_insight_core::inference::ChatCompletionClient;
use pr_insight_core::webhook::{
    SignatureVerifier, WebhookEnvelope, DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER,
};
use pr_insight_core::{DispatchOutcome, WebhookDispatcher};
use serde::{Deserialize, Serialize};
use std::future::IntoFuture;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, instrument, warn};

pub mod config;
pub mod errors;
pub mod secrets;

pub use config::{
    load_service_config, AnalysisConfig, GitHubConfig, InferenceServiceConfig, ServerConfig,
    ServiceConfig, WebhookConfig,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use secrets::AppSecrets;

/// Body of `200` responses for analysed deliveries.
pub const PROCESSED_MESSAGE: &str = "Pull request analysis completed";

/// Body of `200` responses for deliveries that were acknowledged only.
pub const IGNORED_MESSAGE: &str = "Event ignored";

// ============================================================================
// Application State
// ============================================================================

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub dispatcher: Arc<WebhookDispatcher>,
}

impl AppState {
    pub fn new(config: ServiceConfig, dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ============================================================================
// Wiring
// ============================================================================

/// Build the production dispatcher: GitHub App auth, the GitHub REST client
/// and the chat-completions client, all configured from `config`.
///
/// # Errors
///
/// Returns `ServiceError::Configuration` if the analysis settings are invalid
/// or an HTTP client cannot be constructed.
pub fn build_dispatcher(
    config: &ServiceConfig,
    secrets: &AppSecrets,
) -> Result<WebhookDispatcher, ServiceError> {
    let dispatcher_config = config.analysis.dispatcher_config()?;

    let jwt_generator = Arc::new(RS256JwtGenerator::new(secrets.private_key().clone()));
    let auth = GitHubAppAuth::new(secrets.app_id(), jwt_generator, config.github.auth_config())
        .map_err(|e| client_setup_error("GitHub App authentication", e))?;

    let source = GitHubClient::new(config.github.client_config())
        .map_err(|e| client_setup_error("GitHub API client", e))?;

    let model = ChatCompletionClient::new(
        config.inference.inference_config(&config.github.user_agent),
        secrets.ai_api_key().cloned(),
    )
    .map_err(|e| client_setup_error("inference client", e))?;

    Ok(WebhookDispatcher::new(
        SignatureVerifier::new(secrets.webhook_secret().as_bytes()),
        Arc::new(auth),
        Arc::new(source),
        Arc::new(model),
        dispatcher_config,
    ))
}

fn client_setup_error(component: &str, error: impl std::fmt::Display) -> ServiceError {
    ServiceError::Configuration(ConfigError::Invalid {
        message: format!("Failed to build {}: {}", component, error),
    })
}

// ============================================================================
// Router
// ============================================================================

/// Create the HTTP router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_body_size;
    let endpoint_path = state.config.webhooks.endpoint_path.clone();

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health_check))
        .route(&endpoint_path, post(handle_webhook))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body_size)),
        )
        .with_state(state)
}

/// Start the HTTP server and serve until SIGINT or SIGTERM.
///
/// After the signal, in-flight deliveries get
/// `server.shutdown_timeout_seconds` to finish before the server returns.
///
/// # Errors
///
/// - `ServiceError::BindFailed` if the listener cannot be bound
/// - `ServiceError::ServerFailed` if serving fails
pub async fn start_server(
    config: ServiceConfig,
    dispatcher: Arc<WebhookDispatcher>,
) -> Result<(), ServiceError> {
    let addr = config.server.bind_address();
    let shutdown_timeout = config.server.shutdown_timeout();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.clone(),
            message: e.to_string(),
        })?;

    info!(
        address = %addr,
        endpoint = %config.webhooks.endpoint_path,
        "Starting HTTP server"
    );

    let app = create_router(AppState::new(config, dispatcher));

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Initiating graceful shutdown"
            );
            let _ = shutdown_tx.send(true);
        })
        .into_future();
    tokio::pin!(server);

    let drain_deadline = async {
        if shutdown_rx.wait_for(|requested| *requested).await.is_ok() {
            tokio::time::sleep(shutdown_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = &mut server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out; abandoning in-flight requests"
            );
        }
    }

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle a GitHub webhook delivery
#[instrument(skip(state, headers, body), fields(body_size = body.len()))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookHandlerError> {
    let envelope = WebhookEnvelope::new(
        body,
        header_value(&headers, SIGNATURE_HEADER),
        header_value(&headers, EVENT_HEADER),
        header_value(&headers, DELIVERY_HEADER),
    );

    match state.dispatcher.dispatch(&envelope).await? {
        DispatchOutcome::Ignored { .. } => Ok((StatusCode::OK, IGNORED_MESSAGE)),
        DispatchOutcome::Processed(_) => Ok((StatusCode::OK, PROCESSED_MESSAGE)),
    }
}

/// Header value as text; non-ASCII values are treated as absent.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn handle_root() -> &'static str {
    "PR Insight webhook service is running"
}

async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
