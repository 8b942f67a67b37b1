//! Mock identity provider for JWKS tests
//!
//! Wraps a `wiremock::MockServer` that answers key set requests the way a
//! user pool does: `GET {base}/{pool}/.well-known/jwks.json`.

use crate::crypto_fixtures::{jwks_document, RsaKeyFixture};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock JWKS endpoint hosting any number of user pools.
///
/// # Example
/// ```rust,ignore
/// let idp = MockJwksServer::start().await;
/// idp.publish("pool-a", &[PRIMARY_KEY], Some(1)).await;
///
/// let issuer = idp.issuer("pool-a");
/// // ... verify tokens against `issuer`
/// // Call-count expectations are checked when `idp` is dropped.
/// ```
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a mock server on a random local port.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL, usable as the issuer base (`COGNITO_ISSUER_BASE_URL`).
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Issuer URI of `pool` on this server.
    pub fn issuer(&self, pool: &str) -> String {
        format!("{}/{pool}", self.server.uri())
    }

    fn jwks_path(pool: &str) -> String {
        format!("/{pool}/.well-known/jwks.json")
    }

    /// Serve `keys` for `pool`, optionally asserting the exact number of
    /// requests it receives.
    pub async fn publish(&self, pool: &str, keys: &[RsaKeyFixture], expected_calls: Option<u64>) {
        self.respond_json(pool, jwks_document(keys), expected_calls)
            .await;
    }

    /// Serve an arbitrary JSON document for `pool`.
    pub async fn respond_json(&self, pool: &str, body: Value, expected_calls: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(Self::jwks_path(pool)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body));

        let mock = match expected_calls {
            Some(n) => mock.expect(n),
            None => mock,
        };

        mock.mount(&self.server).await;
    }

    /// Fail the next `times` requests for `pool` with `status`.
    ///
    /// Mount this before [`publish`](Self::publish) so the failure takes
    /// precedence until it is used up.
    pub async fn fail_times(&self, pool: &str, status: u16, times: u64) {
        Mock::given(method("GET"))
            .and(path(Self::jwks_path(pool)))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(times)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Assert that no key set was requested at all, for any pool.
    pub async fn expect_no_requests(&self) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    /// Requests received so far.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}
