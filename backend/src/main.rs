//! Duet Backend - Web Push relay
//!
//! A small relay that:
//! - Stores browser push subscriptions in RAM
//! - Encrypts each notification separately for every target device
//! - Signs every push request with the deployment's VAPID key
//! - Prunes subscriptions the push service reports gone
//!
//! Startup refuses to bind without usable VAPID key material.

use duet_backend::auth::ApiToken;
use duet_backend::{build_router, AppState, Config, Deliverer, MemoryStore, SubscriptionStore};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Initialize structured logging
    init_tracing();

    // Load and validate configuration
    let config = Config::from_env();
    let identity = match config.vapid_identity() {
        Ok(identity) => Arc::new(identity),
        Err(e) => {
            error!(error = %e, "Invalid VAPID configuration");
            return ExitCode::FAILURE;
        }
    };
    log_startup_info(&config);

    // Initialize core components
    let store: Arc<dyn SubscriptionStore> = Arc::new(MemoryStore::new());
    let deliverer = match Deliverer::new(store.clone(), identity.clone(), config.delivery_options())
    {
        Ok(deliverer) => Arc::new(deliverer),
        Err(e) => {
            error!(error = %e, "Failed to initialise push delivery");
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(
        store,
        deliverer,
        identity,
        ApiToken::new(config.api_token.as_deref()),
        config.payload_defaults(),
    );

    // Build and serve the application
    let app = build_router(state);
    match serve(app, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with environment-based log levels.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("duet_backend=debug,tower_http=info")),
        )
        .init();
}

/// Log startup configuration (no secrets).
fn log_startup_info(config: &Config) {
    info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        storage = "memory",
        vapid_subject = %config.vapid_subject,
        push_ttl_secs = config.push_ttl.as_secs(),
        push_urgency = %config.push_urgency,
        push_timeout_secs = config.push_timeout.as_secs(),
        push_max_concurrency = config.push_max_concurrency,
        api_token = config.api_token.is_some(),
        "Starting duet backend"
    );
}

/// Bind to address and serve the application.
async fn serve(app: axum::Router, config: &Config) -> std::io::Result<()> {
    let bind_addr = format!("{}:{}", config.bind_addr, config.port);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!(addr = %bind_addr, "Server listening");

    axum::serve(listener, app).await
}
