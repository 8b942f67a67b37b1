//! JWT utilities shared across the authorizer crates.
//!
//! This module provides the parts of token handling that do not need a
//! verification key:
//! - Size limits for DoS prevention
//! - Clock skew constants for `exp`/`nbf`/`iat` validation
//! - Structural (unverified) decoding of header and payload
//! - iat validation logic
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing in this module verifies a signature. Callers that need trust in
//!   the payload must verify the token with a resolved key afterwards.
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_unverified, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! // Structural decode (size check included)
//! let decoded = decode_unverified(token)?;
//! let issuer = decoded.claim_str("iss");
//!
//! // After signature verification, validate iat
//! validate_iat(iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any base64 decoding or
/// cryptographic operations.
///
/// - Cognito access tokens are ~1KB, identity tokens 1-2KB with custom attributes
/// - 8KB leaves room for large custom attribute sets while bounding allocations
///
/// Per OWASP API Security Top 10 - API4:2023 (Unrestricted Resource Consumption)
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (60 seconds).
///
/// Applied as leeway to `exp` and `nbf`, and as the future tolerance for `iat`.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration that would let expired tokens through for long.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while structurally decoding a JWT.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWS compact serialization).
    #[error("The token is invalid or expired")]
    MalformedToken,

    /// Token `iat` claim is too far in the future.
    #[error("The token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Decoded Token Types
// =============================================================================

/// JOSE header fields the authorizer looks at.
///
/// Unknown header fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm declared by the token (e.g., "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key ID used to select the verification key.
    ///
    /// Kept as raw JSON so a non-string `kid` is reported as missing rather
    /// than as a malformed header.
    #[serde(default)]
    kid: Option<Value>,

    /// Token type (usually "JWT").
    #[serde(default)]
    pub typ: Option<String>,
}

impl TokenHeader {
    /// The key ID, if present as a non-empty string.
    pub fn kid(&self) -> Option<&str> {
        self.kid
            .as_ref()
            .and_then(Value::as_str)
            .filter(|kid| !kid.is_empty())
    }
}

/// A JWT split into its header and payload, signature NOT checked.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    /// Decoded JOSE header.
    pub header: TokenHeader,

    /// Decoded claims object.
    pub payload: Map<String, Value>,
}

impl DecodedToken {
    /// Get a string claim from the payload.
    ///
    /// Returns `None` when the claim is absent or not a string.
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }

    /// Consume the token, returning the claims object.
    #[must_use]
    pub fn into_payload(self) -> Map<String, Value> {
        self.payload
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Split a compact JWS into its three segments after the size check.
fn split_segments(token: &str) -> Result<(&str, &str, &str), JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok((header, payload, signature)),
        _ => {
            tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
            Err(JwtValidationError::MalformedToken)
        }
    }
}

/// Decode one base64url segment as JSON.
fn decode_segment<T: for<'de> Deserialize<'de>>(
    segment: &str,
    name: &'static str,
) -> Result<T, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to parse JWT segment JSON");
        JwtValidationError::MalformedToken
    })
}

/// Decode a JWT's header and payload without verifying the signature.
///
/// The token must be a well-formed compact JWS: three non-empty base64url
/// segments, a JSON object header, a JSON object payload and a decodable
/// signature segment.
///
/// # Security
///
/// The returned claims are untrusted. Use them for routing decisions (issuer,
/// key lookup) only, or after the token has been verified by other means.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, invalid JSON, or a
///   payload that is not a JSON object
pub fn decode_unverified(token: &str) -> Result<DecodedToken, JwtValidationError> {
    let (header_part, payload_part, signature_part) = split_segments(token)?;

    if header_part.is_empty() || payload_part.is_empty() || signature_part.is_empty() {
        tracing::debug!(target: "common.jwt", "Token rejected: empty JWT segment");
        return Err(JwtValidationError::MalformedToken);
    }

    let header: TokenHeader = decode_segment(header_part, "header")?;
    let payload: Map<String, Value> = decode_segment(payload_part, "payload")?;

    URL_SAFE_NO_PAD.decode(signature_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT signature base64");
        JwtValidationError::MalformedToken
    })?;

    Ok(DecodedToken { header, payload })
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` too far in the future, which indicates either
/// pre-generated tokens or badly synchronized clocks.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
///
/// Prefer [`validate_iat`] in production code. This variant exists so that
/// boundary conditions can be unit-tested without wall-clock dependence.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    fn b64(value: &str) -> String {
        URL_SAFE_NO_PAD.encode(value)
    }

    fn token(header: &str, payload: &str) -> String {
        format!("{}.{}.{}", b64(header), b64(payload), b64("signature"))
    }

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_default_clock_skew_within_max() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(60));
        assert!(DEFAULT_CLOCK_SKEW <= MAX_CLOCK_SKEW);
    }

    // -------------------------------------------------------------------------
    // decode_unverified Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_unverified_valid_token() {
        let token = token(
            r#"{"alg":"RS256","kid":"key-1"}"#,
            r#"{"iss":"https://issuer","token_use":"access","username":"alice"}"#,
        );

        let decoded = decode_unverified(&token).unwrap();

        assert_eq!(decoded.header.alg.as_deref(), Some("RS256"));
        assert_eq!(decoded.header.kid(), Some("key-1"));
        assert_eq!(decoded.claim_str("iss"), Some("https://issuer"));
        assert_eq!(decoded.claim_str("token_use"), Some("access"));
        assert_eq!(decoded.claim_str("missing"), None);
    }

    #[test]
    fn test_decode_unverified_keeps_full_payload() {
        let token = token(
            r#"{"alg":"RS256"}"#,
            r#"{"sub":"u1","email":"a@b.com","custom:tier":3}"#,
        );

        let payload = decode_unverified(&token).unwrap().into_payload();

        assert_eq!(payload.len(), 3);
        assert_eq!(payload.get("custom:tier"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_decode_unverified_rejects_wrong_segment_count() {
        for candidate in ["", "single", "only.two", "a.b.c.d"] {
            assert_eq!(
                decode_unverified(candidate).unwrap_err(),
                JwtValidationError::MalformedToken,
                "{candidate:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_decode_unverified_rejects_empty_signature() {
        let token = format!("{}.{}.", b64(r#"{"alg":"RS256"}"#), b64(r#"{"iss":"x"}"#));
        assert_eq!(
            decode_unverified(&token).unwrap_err(),
            JwtValidationError::MalformedToken
        );
    }

    #[test]
    fn test_decode_unverified_rejects_non_object_payload() {
        let token = token(r#"{"alg":"RS256"}"#, r#"["not","an","object"]"#);
        assert_eq!(
            decode_unverified(&token).unwrap_err(),
            JwtValidationError::MalformedToken
        );
    }

    #[test]
    fn test_decode_unverified_rejects_invalid_base64() {
        let token = format!("!!!.{}.{}", b64("{}"), b64("sig"));
        assert_eq!(
            decode_unverified(&token).unwrap_err(),
            JwtValidationError::MalformedToken
        );
    }

    #[test]
    fn test_decode_unverified_rejects_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            decode_unverified(&oversized).unwrap_err(),
            JwtValidationError::TokenTooLarge
        );
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_current_and_past_time() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(validate_iat(now - 3600, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        assert!(matches!(
            validate_iat(far_future, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::IatTooFarInFuture)
        ));
    }

    #[test]
    fn test_validate_iat_at_boundary_exact() {
        let now = 1_700_000_000_i64;

        // iat == now + skew is the last accepted value
        assert!(validate_iat_at(now + 60, DEFAULT_CLOCK_SKEW, now).is_ok());

        // iat == now + skew + 1 is the first rejected value
        assert!(matches!(
            validate_iat_at(now + 61, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        ));
    }
}
