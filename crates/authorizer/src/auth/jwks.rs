//! JWKS client for fetching an issuer's public signing keys.
//!
//! A user pool publishes its signing keys at `{issuer}/.well-known/jwks.json`.
//! [`HttpKeySetFetcher`] downloads that document and turns every entry into a
//! [`VerificationKey`]. The result is an immutable [`KeySet`] that the
//! [`KeySetCache`](crate::auth::key_cache::KeySetCache) keeps for the lifetime
//! of the process.
//!
//! # Security
//!
//! - Only RSA keys are accepted; one malformed descriptor rejects the whole set
//! - Fetches are bounded by a timeout so a slow provider cannot stall requests
//! - HTTPS should be used in production (the issuer template enforces it)

use crate::config::DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS;
use crate::errors::AuthorizerError;
use crate::observability::metrics;
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Path appended to the issuer to locate its key set.
pub const JWKS_DISCOVERY_PATH: &str = "/.well-known/jwks.json";

/// The only key type the provider publishes for token signing.
const RSA_KEY_TYPE: &str = "RSA";

/// JSON Web Key as published by the provider.
///
/// Fields are optional here so that a missing member is reported by
/// [`VerificationKey::from_jwk`] rather than as an opaque parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Jwk {
    /// Key type (always "RSA" for Cognito).
    #[serde(default)]
    pub kty: Option<String>,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm (expected "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (expected "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys. An absent list is a valid, empty key set.
    #[serde(default)]
    pub keys: Option<Vec<Jwk>>,
}

/// An RSA public key reconstructed from a JWK, ready for signature checks.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    decoding_key: DecodingKey,
}

impl VerificationKey {
    /// Build a verification key from a published descriptor.
    ///
    /// # Errors
    ///
    /// Returns `AuthorizerError::InvalidKey` if the descriptor is not an RSA
    /// key, lacks `kid`/`n`/`e`, or carries components that are not valid
    /// base64url.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, AuthorizerError> {
        let kid = required_member(jwk.kid.as_deref(), "kid")?;

        match jwk.kty.as_deref() {
            Some(RSA_KEY_TYPE) => {}
            other => {
                tracing::warn!(target: "authorizer.auth.jwks", kid = %kid, kty = ?other, "Unexpected JWK key type");
                return Err(AuthorizerError::InvalidKey(format!(
                    "unsupported key type {other:?}"
                )));
            }
        }

        let n = required_member(jwk.n.as_deref(), "n")?;
        let e = required_member(jwk.e.as_deref(), "e")?;

        let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|err| {
            tracing::warn!(target: "authorizer.auth.jwks", kid = %kid, error = %err, "Invalid RSA key components");
            AuthorizerError::InvalidKey(format!("invalid RSA components: {err}"))
        })?;

        Ok(Self {
            kid: kid.to_string(),
            decoding_key,
        })
    }

    /// The key ID this key is published under.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The key in the form `jsonwebtoken` verifies with.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

fn required_member<'a>(value: Option<&'a str>, member: &'static str) -> Result<&'a str, AuthorizerError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => {
            tracing::warn!(target: "authorizer.auth.jwks", member = member, "JWK missing required member");
            Err(AuthorizerError::InvalidKey(format!("missing {member}")))
        }
    }
}

/// Immutable set of verification keys for one issuer, indexed by key ID.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, VerificationKey>,
}

impl KeySet {
    /// Convert a JWKS document into a key set.
    ///
    /// A missing `keys` member yields an empty set. A key ID published twice
    /// keeps the later entry.
    ///
    /// # Errors
    ///
    /// Returns `AuthorizerError::InvalidKey` if any descriptor is malformed.
    pub fn from_jwks(jwks: &JwksResponse) -> Result<Self, AuthorizerError> {
        jwks.keys
            .iter()
            .flatten()
            .map(VerificationKey::from_jwk)
            .collect()
    }

    /// Look up a key by ID.
    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<VerificationKey> for KeySet {
    fn from_iter<I: IntoIterator<Item = VerificationKey>>(iter: I) -> Self {
        Self {
            keys: iter
                .into_iter()
                .map(|key| (key.kid.clone(), key))
                .collect(),
        }
    }
}

/// Source of an issuer's key set.
///
/// The HTTP implementation is used in production; tests substitute counting
/// or failing fetchers.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    /// Fetch and parse the key set published by `issuer`.
    ///
    /// # Errors
    ///
    /// `AuthorizerError::KeyFetch` for transport, status or parse failures,
    /// `AuthorizerError::InvalidKey` for an unusable key descriptor.
    async fn fetch(&self, issuer: &str) -> Result<KeySet, AuthorizerError>;
}

/// Fetches key sets over HTTP from `{issuer}/.well-known/jwks.json`.
pub struct HttpKeySetFetcher {
    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,
}

impl HttpKeySetFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS))
    }

    /// Create a fetcher whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "authorizer.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { http_client }
    }

    /// Location of the key set for an issuer.
    pub fn jwks_url(issuer: &str) -> String {
        format!("{}{}", issuer.trim_end_matches('/'), JWKS_DISCOVERY_PATH)
    }

    async fn fetch_jwks(&self, url: &str) -> Result<JwksResponse, AuthorizerError> {
        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(target: "authorizer.auth.jwks", error = %e, "Failed to fetch JWKS");
            AuthorizerError::KeyFetch(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "authorizer.auth.jwks",
                status = %status,
                "JWKS endpoint returned error"
            );
            return Err(AuthorizerError::KeyFetch(format!(
                "unexpected status {status}"
            )));
        }

        response.json::<JwksResponse>().await.map_err(|e| {
            tracing::error!(target: "authorizer.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthorizerError::KeyFetch(format!("invalid JWKS document: {e}"))
        })
    }
}

impl Default for HttpKeySetFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    #[instrument(skip_all, fields(issuer = %issuer))]
    async fn fetch(&self, issuer: &str) -> Result<KeySet, AuthorizerError> {
        let url = Self::jwks_url(issuer);
        tracing::debug!(target: "authorizer.auth.jwks", url = %url, "Fetching JWKS");

        let start = Instant::now();
        let result = self
            .fetch_jwks(&url)
            .await
            .and_then(|jwks| KeySet::from_jwks(&jwks));

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_jwks_fetch(status, start.elapsed());

        if let Ok(key_set) = &result {
            tracing::info!(
                target: "authorizer.auth.jwks",
                key_count = key_set.len(),
                "JWKS fetched"
            );
        }

        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use authorizer_test_utils::crypto_fixtures::{PRIMARY_KEY, SECONDARY_KEY};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rsa_jwk(kid: &str, n: &str, e: &str) -> Jwk {
        Jwk {
            kty: Some("RSA".to_string()),
            kid: Some(kid.to_string()),
            n: Some(n.to_string()),
            e: Some(e.to_string()),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
        }
    }

    // =========================================================================
    // Deserialization
    // =========================================================================

    #[test]
    fn test_jwk_deserialization() {
        let json = r#"{
            "alg": "RS256",
            "e": "AQAB",
            "kid": "abcdefg",
            "kty": "RSA",
            "n": "modulus",
            "use": "sig"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty.as_deref(), Some("RSA"));
        assert_eq!(jwk.kid.as_deref(), Some("abcdefg"));
        assert_eq!(jwk.n.as_deref(), Some("modulus"));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
    }

    #[test]
    fn test_jwks_response_without_keys() {
        let jwks: JwksResponse = serde_json::from_str("{}").unwrap();
        assert!(jwks.keys.is_none());

        let key_set = KeySet::from_jwks(&jwks).unwrap();
        assert!(key_set.is_empty());
    }

    // =========================================================================
    // VerificationKey / KeySet
    // =========================================================================

    #[test]
    fn test_verification_key_from_rsa_jwk() {
        let jwk = rsa_jwk(PRIMARY_KEY.kid, PRIMARY_KEY.n, PRIMARY_KEY.e);
        let key = VerificationKey::from_jwk(&jwk).unwrap();
        assert_eq!(key.kid(), PRIMARY_KEY.kid);
    }

    #[test]
    fn test_verification_key_rejects_non_rsa_key_type() {
        let mut jwk = rsa_jwk("k1", PRIMARY_KEY.n, PRIMARY_KEY.e);
        jwk.kty = Some("OKP".to_string());

        let err = VerificationKey::from_jwk(&jwk).unwrap_err();
        assert!(matches!(err, AuthorizerError::InvalidKey(_)));

        jwk.kty = None;
        let err = VerificationKey::from_jwk(&jwk).unwrap_err();
        assert!(matches!(err, AuthorizerError::InvalidKey(_)));
    }

    #[test]
    fn test_verification_key_rejects_missing_members() {
        let mut missing_kid = rsa_jwk("k1", PRIMARY_KEY.n, PRIMARY_KEY.e);
        missing_kid.kid = None;

        let mut missing_n = rsa_jwk("k1", PRIMARY_KEY.n, PRIMARY_KEY.e);
        missing_n.n = None;

        let mut empty_e = rsa_jwk("k1", PRIMARY_KEY.n, PRIMARY_KEY.e);
        empty_e.e = Some(String::new());

        for jwk in [missing_kid, missing_n, empty_e] {
            let err = VerificationKey::from_jwk(&jwk).unwrap_err();
            assert!(
                matches!(err, AuthorizerError::InvalidKey(_)),
                "expected InvalidKey for {jwk:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_verification_key_rejects_invalid_base64() {
        let jwk = rsa_jwk("k1", "!!!not-base64!!!", "AQAB");
        let err = VerificationKey::from_jwk(&jwk).unwrap_err();
        assert!(matches!(err, AuthorizerError::InvalidKey(_)));
    }

    #[test]
    fn test_verification_key_debug_omits_key_material() {
        let key =
            VerificationKey::from_jwk(&rsa_jwk("k1", PRIMARY_KEY.n, PRIMARY_KEY.e)).unwrap();
        let debug_str = format!("{key:?}");

        assert!(debug_str.contains("k1"));
        assert!(!debug_str.contains(PRIMARY_KEY.n));
    }

    #[test]
    fn test_key_set_indexes_by_kid() {
        let jwks = JwksResponse {
            keys: Some(vec![
                rsa_jwk("key-1", PRIMARY_KEY.n, PRIMARY_KEY.e),
                rsa_jwk("key-2", SECONDARY_KEY.n, SECONDARY_KEY.e),
            ]),
        };

        let key_set = KeySet::from_jwks(&jwks).unwrap();

        assert_eq!(key_set.len(), 2);
        assert_eq!(key_set.get("key-1").unwrap().kid(), "key-1");
        assert_eq!(key_set.get("key-2").unwrap().kid(), "key-2");
        assert!(key_set.get("key-3").is_none());
    }

    #[test]
    fn test_key_set_rejects_whole_document_on_one_bad_key() {
        let mut bad = rsa_jwk("key-2", SECONDARY_KEY.n, SECONDARY_KEY.e);
        bad.kty = Some("EC".to_string());

        let jwks = JwksResponse {
            keys: Some(vec![rsa_jwk("key-1", PRIMARY_KEY.n, PRIMARY_KEY.e), bad]),
        };

        assert!(matches!(
            KeySet::from_jwks(&jwks),
            Err(AuthorizerError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_jwks_url() {
        assert_eq!(
            HttpKeySetFetcher::jwks_url("https://cognito-idp.us-east-1.amazonaws.com/us-east-1_pool"),
            "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_pool/.well-known/jwks.json"
        );
        assert_eq!(
            HttpKeySetFetcher::jwks_url("http://localhost:9229/pool/"),
            "http://localhost:9229/pool/.well-known/jwks.json"
        );
    }

    // =========================================================================
    // HttpKeySetFetcher against a mock endpoint
    // =========================================================================

    #[tokio::test]
    async fn test_http_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pool-a/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{
                    "kty": "RSA",
                    "kid": PRIMARY_KEY.kid,
                    "n": PRIMARY_KEY.n,
                    "e": PRIMARY_KEY.e,
                    "alg": "RS256",
                    "use": "sig"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpKeySetFetcher::new();
        let issuer = format!("{}/pool-a", server.uri());

        let key_set = fetcher.fetch(&issuer).await.unwrap();

        assert_eq!(key_set.len(), 1);
        assert!(key_set.get(PRIMARY_KEY.kid).is_some());
    }

    #[tokio::test]
    async fn test_http_fetch_missing_keys_is_empty_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pool-a/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let fetcher = HttpKeySetFetcher::new();
        let key_set = fetcher
            .fetch(&format!("{}/pool-a", server.uri()))
            .await
            .unwrap();

        assert!(key_set.is_empty());
    }

    #[tokio::test]
    async fn test_http_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpKeySetFetcher::new();
        let err = fetcher
            .fetch(&format!("{}/pool-a", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthorizerError::KeyFetch(_)));
    }

    #[tokio::test]
    async fn test_http_fetch_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpKeySetFetcher::new();
        let err = fetcher
            .fetch(&format!("{}/pool-a", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthorizerError::KeyFetch(_)));
    }

    #[tokio::test]
    async fn test_http_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "keys": [] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpKeySetFetcher::with_timeout(Duration::from_millis(100));
        let err = fetcher
            .fetch(&format!("{}/pool-a", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthorizerError::KeyFetch(_)));
    }

    #[tokio::test]
    async fn test_http_fetch_unreachable_endpoint() {
        // Port 9 (discard) is not expected to have an HTTP server
        let fetcher = HttpKeySetFetcher::with_timeout(Duration::from_millis(500));
        let err = fetcher.fetch("http://127.0.0.1:9/pool").await.unwrap_err();

        assert!(matches!(err, AuthorizerError::KeyFetch(_)));
    }
}
