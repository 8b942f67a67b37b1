//! Health check handler.

use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Liveness response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests.
    pub status: String,

    /// Configured user pool region.
    pub region: String,

    /// Issuers with a cached key set.
    pub cached_issuers: usize,
}

/// Liveness probe.
///
/// The authorizer has no hard dependencies at rest (key sets are fetched on
/// demand), so this never reports unhealthy.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "region": "us-east-1",
///   "cached_issuers": 2
/// }
/// ```
#[instrument(skip_all, name = "authorizer.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        region: state.config.cognito_region.clone(),
        cached_issuers: state.key_cache.len().await,
    })
}
