//! Cookie-based request authentication.
//!
//! # Trust model
//!
//! Only the access token's signature is verified. The identity token is
//! decoded without verification and trusted because it arrives alongside a
//! fully verified access token from the same issuer. Its payload is returned
//! verbatim and becomes the decision context, so downstream consumers must
//! treat context claims as informational, never as proof of identity.

use crate::auth::claims::IdentityClaims;
use crate::auth::cookies::RequestCredentials;
use crate::auth::jwt::TokenVerifier;
use crate::errors::AuthorizerError;
use common::jwt::decode_unverified;
use common::secret::ExposeSecret;
use tracing::instrument;

/// Authenticates a request from its raw cookie header.
pub struct Authenticator {
    verifier: TokenVerifier,
}

impl Authenticator {
    /// Create an authenticator around an access token verifier.
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier }
    }

    /// Authenticate the `id_token`/`access_token` cookie pair.
    ///
    /// Returns the identity token's claims on success.
    ///
    /// # Errors
    ///
    /// - `MissingCredentials` if either cookie is absent or empty
    /// - Any access token verification error
    /// - `MalformedToken` if the identity token cannot be decoded
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        raw_cookie_header: &str,
        expected_issuer: &str,
    ) -> Result<IdentityClaims, AuthorizerError> {
        let credentials = RequestCredentials::from_cookie_header(raw_cookie_header).ok_or_else(|| {
            tracing::debug!(target: "authorizer.auth.authenticator", "Token cookies missing");
            AuthorizerError::MissingCredentials
        })?;

        self.verifier
            .verify_access_token(credentials.access_token.expose_secret(), expected_issuer)
            .await?;

        // Identity token: structural decode only, see module docs
        let id_token = decode_unverified(credentials.id_token.expose_secret()).map_err(|e| {
            tracing::debug!(target: "authorizer.auth.authenticator", error = ?e, "Identity token decode failed");
            AuthorizerError::from(e)
        })?;

        Ok(id_token.into_payload())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::{Jwk, KeySet, KeySetFetcher, VerificationKey};
    use crate::auth::key_cache::KeySetCache;
    use async_trait::async_trait;
    use authorizer_test_utils::crypto_fixtures::{PRIMARY_KEY, SECONDARY_KEY};
    use authorizer_test_utils::token_builders::{cookie_header, TestTokenBuilder};
    use serde_json::json;
    use std::sync::Arc;

    const ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_test";

    struct PrimaryKeyFetcher;

    #[async_trait]
    impl KeySetFetcher for PrimaryKeyFetcher {
        async fn fetch(&self, _issuer: &str) -> Result<KeySet, AuthorizerError> {
            let jwk = Jwk {
                kty: Some("RSA".to_string()),
                kid: Some(PRIMARY_KEY.kid.to_string()),
                n: Some(PRIMARY_KEY.n.to_string()),
                e: Some(PRIMARY_KEY.e.to_string()),
                ..Default::default()
            };
            Ok(std::iter::once(VerificationKey::from_jwk(&jwk)?).collect())
        }
    }

    fn authenticator() -> Authenticator {
        Authenticator::new(TokenVerifier::with_default_skew(
            Arc::new(KeySetCache::new()),
            Arc::new(PrimaryKeyFetcher),
        ))
    }

    fn access_token() -> String {
        TestTokenBuilder::access_token(ISSUER)
            .with_username("alice")
            .sign(&PRIMARY_KEY)
    }

    fn id_token() -> String {
        TestTokenBuilder::identity_token(ISSUER)
            .with_sub("u1")
            .with_claim("email", json!("a@b.com"))
            .sign(&PRIMARY_KEY)
    }

    #[tokio::test]
    async fn test_returns_identity_claims() {
        let claims = authenticator()
            .authenticate(&cookie_header(&id_token(), &access_token()), ISSUER)
            .await
            .unwrap();

        assert_eq!(claims.get("sub"), Some(&json!("u1")));
        assert_eq!(claims.get("email"), Some(&json!("a@b.com")));
        assert_eq!(claims.get("token_use"), Some(&json!("id")));
    }

    #[tokio::test]
    async fn test_missing_cookies() {
        let auth = authenticator();

        for header in [
            String::new(),
            format!("id_token={}", id_token()),
            format!("access_token={}", access_token()),
            "session=abc".to_string(),
        ] {
            let err = auth.authenticate(&header, ISSUER).await.unwrap_err();
            assert!(matches!(err, AuthorizerError::MissingCredentials));
        }
    }

    #[tokio::test]
    async fn test_access_token_failure_propagates() {
        let auth = authenticator();
        let foreign = TestTokenBuilder::access_token("https://other.example/pool")
            .with_username("alice")
            .sign(&PRIMARY_KEY);

        let err = auth
            .authenticate(&cookie_header(&id_token(), &foreign), ISSUER)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizerError::IssuerMismatch));
    }

    #[tokio::test]
    async fn test_malformed_identity_token() {
        let err = authenticator()
            .authenticate(&cookie_header("not-a-jwt", &access_token()), ISSUER)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizerError::MalformedToken));
    }

    #[tokio::test]
    async fn test_identity_token_signature_is_not_checked() {
        // Signed by a key the issuer never published
        let unverified_id = TestTokenBuilder::identity_token(ISSUER)
            .with_sub("u1")
            .sign(&SECONDARY_KEY);

        let claims = authenticator()
            .authenticate(&cookie_header(&unverified_id, &access_token()), ISSUER)
            .await
            .unwrap();

        assert_eq!(claims.get("sub"), Some(&json!("u1")));
    }
}
