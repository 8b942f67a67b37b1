//! HTTP routes for the authorizer service.
//!
//! Defines the Axum router and application state.

use crate::auth::{Authenticator, HttpKeySetFetcher, KeySetCache, KeySetFetcher, TokenVerifier};
use crate::config::Config;
use crate::decision::{AccessPolicy, Authorizer};
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Decision entry point.
    pub authorizer: Arc<Authorizer>,

    /// Key sets per issuer, shared with the authorizer's verifier.
    pub key_cache: Arc<KeySetCache>,
}

impl AppState {
    /// Wire the authorizer for `config`, fetching keys over HTTP.
    pub fn new(config: Config) -> Self {
        let fetcher = Arc::new(HttpKeySetFetcher::with_timeout(config.jwks_fetch_timeout()));
        Self::with_fetcher(config, fetcher)
    }

    /// Wire the authorizer for `config` with a custom key set source.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn KeySetFetcher>) -> Self {
        let key_cache = Arc::new(KeySetCache::new());
        let verifier = TokenVerifier::new(Arc::clone(&key_cache), fetcher, config.jwt_clock_skew());
        let authorizer = Arc::new(Authorizer::new(
            AccessPolicy::from_config(&config),
            Authenticator::new(verifier),
        ));

        Self {
            config,
            authorizer,
            key_cache,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/v1/authorize` - Authorization decision for a request descriptor
/// - `/health` - Liveness probe - public, unversioned
/// - `/metrics` - Prometheus metrics endpoint - public, unversioned
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let app_routes = Router::new()
        .route("/v1/authorize", post(handlers::authorize))
        .route("/health", get(handlers::health_check))
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    app_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
