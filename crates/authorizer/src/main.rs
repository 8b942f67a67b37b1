//! Cookie Token Authorizer
//!
//! Entry point for the authorizer service. Serves authorization decisions
//! for API requests carrying identity provider tokens in cookies.

use authorizer::config::{Config, LogFormat};
use authorizer::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration decides the log format, so it is loaded first
    let config = Config::from_env();

    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or_default(),
    );

    info!("Starting authorizer");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        region = %config.cognito_region,
        bind_address = %config.bind_address,
        issuer_base_url = %config.issuer_base_url,
        mapped_apis = config.api_user_pools.len(),
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        jwks_fetch_timeout_seconds = config.jwks_fetch_timeout_seconds,
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder before anything records
    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Parse bind address before moving config
    let bind_address = config.bind_address.clone();
    let drain_seconds = config.drain_seconds;

    // Composition root: the key set cache lives as long as this state
    let state = Arc::new(AppState::new(config));

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Authorizer listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(drain_seconds))
        .await?;

    info!("Authorizer shutdown complete");

    Ok(())
}

/// Install the global tracing subscriber.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "authorizer=debug,tower_http=debug".into());

    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(drain_seconds: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_seconds > 0 {
        warn!("Draining connections for {} seconds...", drain_seconds);
        tokio::time::sleep(Duration::from_secs(drain_seconds)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (AUTHORIZER_DRAIN_SECONDS=0)");
    }
}
