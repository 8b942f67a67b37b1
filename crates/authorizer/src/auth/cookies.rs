//! Cookie header parsing.
//!
//! Parsing is best-effort: segments that are not `name=value` are dropped
//! silently and never turn into an error. A request with a garbled cookie
//! header simply ends up without the credentials it needs.

use common::secret::SecretString;
use std::collections::HashMap;

/// Cookie carrying the identity token.
pub const ID_TOKEN_COOKIE: &str = "id_token";

/// Cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Parse a raw `Cookie` header into a name → value map.
///
/// Splits on `;`, then each segment on the first `=`. Names and values are
/// trimmed. Segments without `=` are discarded. A later duplicate name
/// overwrites an earlier one.
pub fn parse_cookies(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|segment| segment.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// The identity/access token pair carried by a request.
///
/// Both tokens are wrapped in [`SecretString`] so they never show up in
/// `Debug` output or logs.
#[derive(Debug)]
pub struct RequestCredentials {
    /// Identity token (profile claims; becomes the decision context).
    pub id_token: SecretString,

    /// Access token (cryptographically verified).
    pub access_token: SecretString,
}

impl RequestCredentials {
    /// Extract both tokens from a raw cookie header.
    ///
    /// Returns `None` unless both `id_token` and `access_token` are present
    /// with non-empty values.
    pub fn from_cookie_header(raw: &str) -> Option<Self> {
        let mut cookies = parse_cookies(raw);

        let id_token = cookies
            .remove(ID_TOKEN_COOKIE)
            .filter(|value| !value.is_empty())?;
        let access_token = cookies
            .remove(ACCESS_TOKEN_COOKIE)
            .filter(|value| !value.is_empty())?;

        Some(Self {
            id_token: SecretString::from(id_token),
            access_token: SecretString::from(access_token),
        })
    }
}
