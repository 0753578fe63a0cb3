//! # PR Insight Service
//!
//! Binary entry point for the PR Insight webhook service.
//!
//! This executable:
//! - Parses command line flags
//! - Initializes logging
//! - Loads configuration from files and environment, and secrets from the
//!   environment
//! - Wires the webhook dispatcher and starts the HTTP server
//!
//! Exit codes: `1` bind failure, `2` server failure, `3` configuration or
//! secret error.

use anyhow::Context;
use clap::Parser;
use pr_insight_api::{
    build_dispatcher, load_service_config, start_server, AppSecrets, ServiceConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_EXIT_CODE: i32 = 3;

const DEFAULT_LOG_FILTER: &str =
    "pr_insight_service=info,pr_insight_api=info,pr_insight_core=info,tower_http=info";

/// PR Insight - AI summaries and review scores for GitHub pull requests
#[derive(Debug, Parser)]
#[command(name = "pr-insight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turns GitHub pull request webhooks into AI-generated insights")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "PR_INSIGHT_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "PR_INSIGHT_JSON_LOGS")]
    json_logs: bool,

    /// Validate configuration and secrets, then exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting PR Insight Service");

    let (service_config, secrets) = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            std::process::exit(CONFIG_EXIT_CODE);
        }
    };

    let dispatcher = match build_dispatcher(&service_config, &secrets) {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(e) => {
            error!(error = %e, "Failed to wire webhook dispatcher");
            std::process::exit(e.exit_code());
        }
    };

    if args.check_config {
        info!(
            app_id = %secrets.app_id(),
            endpoint = %service_config.webhooks.endpoint_path,
            "Configuration and secrets are valid"
        );
        return Ok(());
    }
    drop(secrets);

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        trigger = %service_config.analysis.trigger,
        kind = %service_config.analysis.kind,
        model = %service_config.inference.model,
        "Configuration loaded"
    );

    if let Err(e) = start_server(service_config, dispatcher).await {
        error!(error = %e, "Server terminated with an error");
        std::process::exit(e.exit_code());
    }

    Ok(())
}

fn init_tracing(json_logs: bool) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to initialize JSON logging")?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}

fn load_settings(args: &Args) -> anyhow::Result<(ServiceConfig, AppSecrets)> {
    let service_config = load_service_config(args.config.as_deref())
        .context("Failed to load service configuration")?;
    service_config
        .validate()
        .context("Service configuration is invalid")?;

    let secrets =
        AppSecrets::from_env().context("Failed to load secrets from the environment")?;

    Ok((service_config, secrets))
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
