//! Access token verification.
//!
//! Validates access tokens against the signing keys published by the
//! token's user pool.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Issuer and token use are checked before any network traffic, so a
//!   forged token cannot make the authorizer fetch keys from arbitrary hosts
//! - Only RS256 is accepted; the token's own `alg` header is not trusted
//! - `exp`/`nbf` are validated with clock skew leeway, `iat` with the same
//!   future tolerance
//! - Failure details are logged at debug level only

use crate::auth::claims::AccessTokenClaims;
use crate::auth::jwks::{KeySetFetcher, VerificationKey};
use crate::auth::key_cache::KeySetCache;
use crate::errors::AuthorizerError;
use common::jwt::{decode_unverified, validate_iat, DEFAULT_CLOCK_SKEW};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Access token verifier backed by a shared key set cache.
pub struct TokenVerifier {
    /// Cache of key sets per issuer, shared with the rest of the process.
    key_cache: Arc<KeySetCache>,

    /// Source of key sets on a cache miss.
    fetcher: Arc<dyn KeySetFetcher>,

    /// Leeway for `exp`/`nbf` and future tolerance for `iat`.
    clock_skew: Duration,
}

impl TokenVerifier {
    /// Create a new verifier.
    ///
    /// # Arguments
    ///
    /// * `key_cache` - Shared per-issuer key set cache
    /// * `fetcher` - Used to populate the cache on a miss
    /// * `clock_skew` - Clock skew tolerance for time-based claims
    pub fn new(
        key_cache: Arc<KeySetCache>,
        fetcher: Arc<dyn KeySetFetcher>,
        clock_skew: Duration,
    ) -> Self {
        Self {
            key_cache,
            fetcher,
            clock_skew,
        }
    }

    /// Create a verifier with the default clock skew.
    pub fn with_default_skew(key_cache: Arc<KeySetCache>, fetcher: Arc<dyn KeySetFetcher>) -> Self {
        Self::new(key_cache, fetcher, DEFAULT_CLOCK_SKEW)
    }

    /// Verify an access token issued by `expected_issuer` and return its claims.
    ///
    /// # Checks
    ///
    /// 1. Structural decode (size limit, three segments, JSON header/payload)
    /// 2. `iss` equals `expected_issuer`
    /// 3. `token_use` is `"access"`
    /// 4. Header `kid` resolves to a key in the issuer's key set
    /// 5. RS256 signature, `exp`, `nbf`, `iat`
    /// 6. Non-empty `username`
    ///
    /// # Errors
    ///
    /// One `AuthorizerError` per failed check, see the list above.
    #[instrument(skip_all)]
    pub async fn verify_access_token(
        &self,
        token: &str,
        expected_issuer: &str,
    ) -> Result<AccessTokenClaims, AuthorizerError> {
        // 1. Structural decode (includes size check via common::jwt)
        let decoded = decode_unverified(token).map_err(|e| {
            tracing::debug!(target: "authorizer.auth.jwt", error = ?e, "Access token decode failed");
            AuthorizerError::from(e)
        })?;

        // 2. Issuer, before anything touches the network
        if decoded.claim_str("iss") != Some(expected_issuer) {
            tracing::debug!(target: "authorizer.auth.jwt", "Access token issuer mismatch");
            return Err(AuthorizerError::IssuerMismatch);
        }

        // 3. Token use
        if decoded.claim_str("token_use") != Some(crate::auth::claims::ACCESS_TOKEN_USE) {
            tracing::debug!(
                target: "authorizer.auth.jwt",
                token_use = ?decoded.claim_str("token_use"),
                "Token is not an access token"
            );
            return Err(AuthorizerError::WrongTokenUse);
        }

        // 4. Key resolution
        let kid = decoded.header.kid().ok_or_else(|| {
            tracing::debug!(target: "authorizer.auth.jwt", "Access token has no usable kid");
            AuthorizerError::UnknownSigningKey
        })?;

        let key_set = self
            .key_cache
            .get_or_fetch(expected_issuer, self.fetcher.as_ref())
            .await?;

        let key = key_set.get(kid).ok_or_else(|| {
            tracing::debug!(target: "authorizer.auth.jwt", kid = %kid, "Signing key not in issuer key set");
            AuthorizerError::UnknownSigningKey
        })?;

        // 5. Signature and time claims
        let claims = verify_signature(token, key, expected_issuer, self.clock_skew)?;

        if let Some(iat) = claims.iat {
            validate_iat(iat, self.clock_skew).map_err(|e| {
                tracing::debug!(target: "authorizer.auth.jwt", error = ?e, "Token iat validation failed");
                AuthorizerError::SignatureInvalid
            })?;
        }

        // 6. Subject
        if claims.subject().is_none() {
            tracing::debug!(target: "authorizer.auth.jwt", "Access token has no subject");
            return Err(AuthorizerError::MissingSubject);
        }

        tracing::debug!(target: "authorizer.auth.jwt", kid = %kid, "Access token verified");
        Ok(claims)
    }
}

/// Verify the token's RS256 signature with `key` and deserialize its claims.
///
/// `exp` and `nbf` are checked only when present.
fn verify_signature(
    token: &str,
    key: &VerificationKey,
    expected_issuer: &str,
    clock_skew: Duration,
) -> Result<AccessTokenClaims, AuthorizerError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[expected_issuer]);
    validation.leeway = clock_skew.as_secs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    // Access tokens carry client_id rather than aud
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let token_data =
        decode::<AccessTokenClaims>(token, key.decoding_key(), &validation).map_err(|e| {
            tracing::debug!(target: "authorizer.auth.jwt", error = %e, "Token verification failed");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthorizerError::TokenExpired,
                _ => AuthorizerError::SignatureInvalid,
            }
        })?;

    Ok(token_data.claims)
}
