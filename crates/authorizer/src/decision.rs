//! Authorization decisions.
//!
//! [`Authorizer::authorize`] is the entry point: it takes a request descriptor,
//! applies the account and API policy, authenticates the cookie tokens against
//! the API's user pool, and returns an allow/deny decision. It never fails;
//! every problem ends in a deny with an empty context.

use crate::auth::claims::IdentityClaims;
use crate::auth::Authenticator;
use crate::config::Config;
use crate::errors::AuthorizerError;
use crate::observability::metrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tracing::instrument;

/// Inbound request descriptor.
///
/// Leaf values are kept as raw JSON so that a null, numeric or array value
/// reads as absent instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    /// Request headers. Names are matched case-insensitively.
    #[serde(default)]
    pub headers: Option<HashMap<String, Value>>,

    /// Where the request came from.
    #[serde(default)]
    pub request_context: Option<RequestContext>,
}

/// Origin of a request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Account the API belongs to.
    #[serde(default)]
    pub account_id: Option<Value>,

    /// API the request targets.
    #[serde(default)]
    pub api_id: Option<Value>,
}

impl RequestContext {
    /// Account ID, if it is a string.
    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_ref().and_then(Value::as_str)
    }

    /// API ID, if it is a string.
    pub fn api_id(&self) -> Option<&str> {
        self.api_id.as_ref().and_then(Value::as_str)
    }
}

impl AuthorizerRequest {
    /// Raw `Cookie` header, looked up case-insensitively. A non-string value
    /// counts as absent.
    pub fn cookie_header(&self) -> Option<&str> {
        self.headers.as_ref()?.iter().find_map(|(name, value)| {
            if name.eq_ignore_ascii_case("cookie") {
                value.as_str()
            } else {
                None
            }
        })
    }
}

/// Outcome of an authorization request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDecision {
    /// Whether the request may proceed.
    pub is_authorized: bool,

    /// Identity token claims when allowed, empty otherwise.
    pub context: IdentityClaims,
}

impl AuthorizationDecision {
    /// Allow, exposing `claims` to the downstream handler.
    pub fn allow(claims: IdentityClaims) -> Self {
        Self {
            is_authorized: true,
            context: claims,
        }
    }

    /// Deny with an empty context.
    pub fn deny() -> Self {
        Self {
            is_authorized: false,
            context: IdentityClaims::new(),
        }
    }
}

/// Account and API policy applied before authentication.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    /// Account requests must come from.
    pub account_id: String,

    /// API ID to user pool ID.
    pub api_user_pools: HashMap<String, String>,

    /// Issuer base URL; the issuer is `{base}/{pool}`.
    pub issuer_base_url: String,
}

impl AccessPolicy {
    /// Policy for the configured account and APIs.
    pub fn from_config(config: &Config) -> Self {
        Self {
            account_id: config.aws_account_id.clone(),
            api_user_pools: config
                .api_user_pools
                .iter()
                .map(|(api, pool)| (api.clone(), pool.clone()))
                .collect(),
            issuer_base_url: config.issuer_base_url.clone(),
        }
    }

    /// Expected issuer for a request, or the reason it is not acceptable.
    fn issuer_for(&self, context: &RequestContext) -> Result<String, AuthorizerError> {
        if context.account_id() != Some(self.account_id.as_str()) {
            return Err(AuthorizerError::AccountMismatch);
        }

        let pool = context
            .api_id()
            .and_then(|api_id| self.api_user_pools.get(api_id))
            .ok_or(AuthorizerError::UnmappedApi)?;

        Ok(format!("{}/{}", self.issuer_base_url, pool))
    }
}

/// Decides whether a request may proceed.
pub struct Authorizer {
    policy: AccessPolicy,
    authenticator: Authenticator,
}

impl Authorizer {
    /// Create an authorizer.
    pub fn new(policy: AccessPolicy, authenticator: Authenticator) -> Self {
        Self {
            policy,
            authenticator,
        }
    }

    /// Decide on a request. Never fails; every error becomes a deny.
    #[instrument(skip_all)]
    pub async fn authorize(&self, request: &AuthorizerRequest) -> AuthorizationDecision {
        let start = Instant::now();
        let result = self.evaluate(request).await;
        Self::conclude(result, start)
    }

    /// Decide on a raw JSON request body. A body that does not have the
    /// descriptor's shape is denied like any other failure.
    #[instrument(skip_all)]
    pub async fn authorize_json(&self, body: Value) -> AuthorizationDecision {
        let start = Instant::now();
        match serde_json::from_value::<AuthorizerRequest>(body) {
            Ok(request) => {
                let result = self.evaluate(&request).await;
                Self::conclude(result, start)
            }
            Err(e) => {
                tracing::debug!(target: "authorizer.decision", error = %e, "Request descriptor rejected");
                Self::conclude(Err(AuthorizerError::MalformedRequest), start)
            }
        }
    }

    fn conclude(
        result: Result<IdentityClaims, AuthorizerError>,
        start: Instant,
    ) -> AuthorizationDecision {
        let elapsed = start.elapsed();

        match result {
            Ok(claims) => {
                tracing::debug!(target: "authorizer.decision", "Request authorized");
                metrics::record_decision(true, "ok", elapsed);
                AuthorizationDecision::allow(claims)
            }
            Err(e) => {
                // Denials are routine; key resolution problems point at the provider
                if matches!(e, AuthorizerError::KeyFetch(_) | AuthorizerError::InvalidKey(_)) {
                    tracing::warn!(
                        target: "authorizer.decision",
                        reason = e.reason(),
                        category = e.category().as_str(),
                        error = %e,
                        "Request denied"
                    );
                } else {
                    tracing::debug!(
                        target: "authorizer.decision",
                        reason = e.reason(),
                        category = e.category().as_str(),
                        "Request denied"
                    );
                }
                metrics::record_decision(false, e.reason(), elapsed);
                AuthorizationDecision::deny()
            }
        }
    }

    async fn evaluate(&self, request: &AuthorizerRequest) -> Result<IdentityClaims, AuthorizerError> {
        let cookie = request
            .cookie_header()
            .ok_or(AuthorizerError::MissingCredentials)?;
        let context = request
            .request_context
            .as_ref()
            .ok_or(AuthorizerError::MissingRequestContext)?;

        let issuer = self.policy.issuer_for(context)?;

        self.authenticator.authenticate(cookie, &issuer).await
    }
}
