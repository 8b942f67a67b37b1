//! Token claims structures.
//!
//! The access token is deserialized into [`AccessTokenClaims`] after its
//! signature has been verified. The identity token is kept as an opaque JSON
//! object ([`IdentityClaims`]) because its whole payload becomes the decision
//! context.
//!
//! Subject fields are redacted in Debug output to prevent exposure in logs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identity token payload, passed through verbatim as the decision context.
pub type IdentityClaims = Map<String, Value>;

/// Required value of the access token's `token_use` claim.
pub const ACCESS_TOKEN_USE: &str = "access";

/// Claims of a verified access token.
///
/// Every field is optional at the type level; presence requirements are
/// enforced by the verifier so a missing claim turns into a specific error
/// instead of a generic deserialization failure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer (user pool URI).
    #[serde(default)]
    pub iss: Option<String>,

    /// Token use, `"access"` for access tokens.
    #[serde(default)]
    pub token_use: Option<String>,

    /// Username - redacted in Debug output.
    #[serde(default)]
    pub username: Option<String>,

    /// Subject (user id) - redacted in Debug output.
    #[serde(default)]
    pub sub: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(default)]
    pub exp: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default)]
    pub iat: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default)]
    pub nbf: Option<i64>,
}

/// Custom Debug implementation that redacts the subject fields.
impl fmt::Debug for AccessTokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenClaims")
            .field("iss", &self.iss)
            .field("token_use", &self.token_use)
            .field("username", &self.username.as_ref().map(|_| "[REDACTED]"))
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .finish()
    }
}

impl AccessTokenClaims {
    /// The token's subject: a non-empty `username`.
    ///
    /// `sub` alone does not count. Machine-to-machine tokens carry the app
    /// client id in `sub` and have no `username`.
    pub fn subject(&self) -> Option<&str> {
        self.username.as_deref().filter(|v| !v.is_empty())
    }
}
