//! Authorization endpoint handler.

use crate::decision::AuthorizationDecision;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/authorize
///
/// Takes a request descriptor and always answers 200 with a decision. Any
/// JSON value is accepted here; one that is not a usable descriptor is
/// denied. A body that is not JSON at all is rejected by the extractor before
/// this runs.
///
/// ## Example
///
/// ```json
/// // request
/// {
///   "headers": { "cookie": "id_token=...; access_token=..." },
///   "requestContext": { "accountId": "123456789012", "apiId": "a1b2c3" }
/// }
/// // response
/// { "isAuthorized": true, "context": { "sub": "...", "email": "..." } }
/// ```
#[instrument(skip_all, name = "authorizer.authorize")]
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Json<AuthorizationDecision> {
    Json(state.authorizer.authorize_json(body).await)
}
