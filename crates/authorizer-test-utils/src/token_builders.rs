//! Builder patterns for test token construction
//!
//! Provides a fluent API for creating signed access and identity tokens that
//! look like the ones a Cognito user pool issues.

use crate::crypto_fixtures::RsaKeyFixture;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// App client id placed in test tokens.
pub const TEST_CLIENT_ID: &str = "test-client-id";

/// Which `kid` to put in the token header.
#[derive(Debug, Clone)]
enum KidChoice {
    /// The signing key's own kid.
    FromSigningKey,
    /// A fixed kid, regardless of the signing key.
    Explicit(String),
    /// No kid header at all.
    Omitted,
}

/// Builder for creating signed test tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::access_token(&issuer)
///     .with_username("alice")
///     .expires_in(600)
///     .sign(&PRIMARY_KEY);
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    kid: KidChoice,
}

impl TestTokenBuilder {
    fn with_base_claims(issuer: &str, token_use: &str) -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(issuer));
        claims.insert("token_use".to_string(), json!(token_use));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );

        Self {
            claims,
            kid: KidChoice::FromSigningKey,
        }
    }

    /// Access token for `issuer`, valid for one hour, with no subject.
    pub fn access_token(issuer: &str) -> Self {
        Self::with_base_claims(issuer, "access")
            .with_claim("client_id", json!(TEST_CLIENT_ID))
            .with_claim("scope", json!("aws.cognito.signin.user.admin"))
    }

    /// Identity token for `issuer`, valid for one hour, with no subject.
    pub fn identity_token(issuer: &str) -> Self {
        Self::with_base_claims(issuer, "id").with_claim("aud", json!(TEST_CLIENT_ID))
    }

    /// Token with exactly these claims and nothing else.
    pub fn from_claims(claims: Map<String, Value>) -> Self {
        Self {
            claims,
            kid: KidChoice::FromSigningKey,
        }
    }

    /// Set the `username` claim
    pub fn with_username(self, username: &str) -> Self {
        self.with_claim("username", json!(username))
    }

    /// Set the `sub` claim
    pub fn with_sub(self, sub: &str) -> Self {
        self.with_claim("sub", json!(sub))
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Set expiration in seconds from now
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Expired an hour ago (well outside any clock skew)
    pub fn expired(self) -> Self {
        let now = Utc::now();
        self.with_claim("iat", json!((now - Duration::seconds(7200)).timestamp()))
            .with_claim("exp", json!((now - Duration::seconds(3600)).timestamp()))
    }

    /// Set `nbf` in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("nbf", json!(nbf))
    }

    /// Set `iat` in seconds from now
    pub fn issued_in(self, seconds: i64) -> Self {
        let iat = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("iat", json!(iat))
    }

    /// Put a specific `kid` in the header instead of the signing key's
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = KidChoice::Explicit(kid.to_string());
        self
    }

    /// Leave `kid` out of the header
    pub fn without_kid(mut self) -> Self {
        self.kid = KidChoice::Omitted;
        self
    }

    /// The claims as a JSON object
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Sign with RS256 and return the compact token.
    ///
    /// Panics if the fixture key cannot be loaded.
    pub fn sign(&self, key: &RsaKeyFixture) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = match &self.kid {
            KidChoice::FromSigningKey => Some(key.kid.to_string()),
            KidChoice::Explicit(kid) => Some(kid.clone()),
            KidChoice::Omitted => None,
        };

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key_pem.as_bytes())
            .expect("fixture key must be a valid RSA PEM");

        encode(&header, &self.claims, &encoding_key).expect("signing a test token must succeed")
    }
}

/// Raw cookie header carrying both tokens.
pub fn cookie_header(id_token: &str, access_token: &str) -> String {
    format!("id_token={id_token}; access_token={access_token}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_fixtures::PRIMARY_KEY;

    #[test]
    fn test_access_token_defaults() {
        let builder = TestTokenBuilder::access_token("https://issuer.example/pool");
        let claims = builder.claims();

        assert_eq!(claims["iss"], "https://issuer.example/pool");
        assert_eq!(claims["token_use"], "access");
        assert_eq!(claims["client_id"], TEST_CLIENT_ID);
        assert!(claims.get("username").is_none());
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn test_identity_token_defaults() {
        let builder = TestTokenBuilder::identity_token("https://issuer.example/pool")
            .with_sub("u1")
            .with_claim("email", json!("a@b.com"));
        let claims = builder.claims();

        assert_eq!(claims["token_use"], "id");
        assert_eq!(claims["sub"], "u1");
        assert_eq!(claims["email"], "a@b.com");
    }

    #[test]
    fn test_sign_produces_three_segments() {
        let token = TestTokenBuilder::access_token("iss")
            .with_username("alice")
            .sign(&PRIMARY_KEY);

        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_kid_choices() {
        let default_kid = jsonwebtoken::decode_header(
            &TestTokenBuilder::access_token("iss").sign(&PRIMARY_KEY),
        )
        .unwrap()
        .kid;
        assert_eq!(default_kid.as_deref(), Some(PRIMARY_KEY.kid));

        let explicit = jsonwebtoken::decode_header(
            &TestTokenBuilder::access_token("iss")
                .with_kid("other")
                .sign(&PRIMARY_KEY),
        )
        .unwrap()
        .kid;
        assert_eq!(explicit.as_deref(), Some("other"));

        let omitted = jsonwebtoken::decode_header(
            &TestTokenBuilder::access_token("iss")
                .without_kid()
                .sign(&PRIMARY_KEY),
        )
        .unwrap()
        .kid;
        assert!(omitted.is_none());
    }

    #[test]
    fn test_cookie_header() {
        assert_eq!(cookie_header("a.b.c", "d.e.f"), "id_token=a.b.c; access_token=d.e.f");
    }
}
