//! Relay application binary - composition root.
//!
//! Ties together the Relay crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Build the dispatch engine (registry, approvals, coordinator, router)
//! 3. Register the built-in action set and webhook configuration
//! 4. Start the approval expiration sweeper
//! 5. Start the axum REST API server

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use relay_actions::handler::register_defaults;
use relay_actions::{
    ActionRegistry, ApprovalCoordinator, ExpirationSweeper, RequestCoordinator, WebhookRouter,
};
use relay_api::{auth, routes, AppState};
use relay_core::config::RelayConfig;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();

    // Config first: the log level may come from it.
    let config_file = args.resolve_config_path();
    let mut config = RelayConfig::load_or_default(&config_file);
    config.general.port = args.resolve_port(config.general.port);
    let log_level = args.resolve_log_level(&config.general.log_level);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting Relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // === Dispatch engine ===

    let registry = Arc::new(ActionRegistry::new());
    let approvals = Arc::new(ApprovalCoordinator::new(Duration::from_secs(
        config.approval.timeout_secs,
    )));
    let coordinator = Arc::new(RequestCoordinator::new(
        Arc::clone(&registry),
        Arc::clone(&approvals),
    ));
    register_defaults(&coordinator);

    let webhooks = Arc::new(WebhookRouter::new(
        Arc::clone(&coordinator),
        config.webhook.default_action.clone(),
    ));
    for (webhook_type, secret) in &config.webhook.secrets {
        webhooks.register_secret(webhook_type, secret);
    }
    for (webhook_type, action) in &config.webhook.routes {
        webhooks.register_route(webhook_type, action);
    }

    // === Background tasks ===

    let sweeper = Arc::new(ExpirationSweeper::new(
        Arc::clone(&approvals),
        Duration::from_secs(config.approval.sweep_interval_secs),
    ));
    let sweeper_task = Arc::clone(&sweeper);
    tokio::spawn(async move {
        sweeper_task.run().await;
    });

    // === API server ===

    let token_path = cli::expand_home(&config.general.token_path);
    let mut state = AppState::new(config, coordinator, webhooks);
    state.api_token = auth::load_or_generate_token(&token_path);

    tokio::select! {
        result = routes::start_server(state) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
            sweeper.shutdown();
        }
    }

    Ok(())
}
