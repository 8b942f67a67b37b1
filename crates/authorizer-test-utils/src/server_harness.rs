//! Test server harness for E2E testing
//!
//! Provides `TestAuthorizerServer` for spawning real authorizer instances in tests.

use authorizer::config::Config;
use authorizer::routes::{self, AppState};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Account ID the test server accepts requests from.
pub const TEST_ACCOUNT_ID: &str = "123456789012";

/// Region reported by the test server.
pub const TEST_REGION: &str = "test-region-1";

/// Global metrics handle; the Prometheus recorder can only be installed once
/// per process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            routes::init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Test harness for spawning the authorizer service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<()> {
///     let idp = MockJwksServer::start().await;
///     let server = TestAuthorizerServer::spawn(&idp.base_url(), &[("api1", "pool-a")]).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestAuthorizerServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    _handle: JoinHandle<()>,
}

impl TestAuthorizerServer {
    /// Spawn a server whose issuers live under `issuer_base_url`.
    ///
    /// The server will:
    /// - Accept requests from [`TEST_ACCOUNT_ID`]
    /// - Map each `(api_id, pool_id)` pair
    /// - Bind to a random available port (127.0.0.1:0)
    ///
    /// # Errors
    ///
    /// Fails if the configuration is rejected or the port cannot be bound.
    pub async fn spawn(
        issuer_base_url: &str,
        api_pools: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let pools: HashMap<&str, &str> = api_pools.iter().copied().collect();

        let vars = HashMap::from([
            ("AWS_ACCOUNT_ID".to_string(), TEST_ACCOUNT_ID.to_string()),
            ("APIS_USERPOOL".to_string(), serde_json::to_string(&pools)?),
            ("COGNITO_REGION".to_string(), TEST_REGION.to_string()),
            (
                "COGNITO_ISSUER_BASE_URL".to_string(),
                issuer_base_url.to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState::new(config));
        let app = routes::build_routes(Arc::clone(&state), test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state (config, key cache).
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// POST a request descriptor to `/v1/authorize` and return the decision.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-200 responses or a non-JSON body.
    pub async fn authorize(&self, request: &Value) -> Result<Value, anyhow::Error> {
        let response = reqwest::Client::new()
            .post(format!("{}/v1/authorize", self.url()))
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

impl Drop for TestAuthorizerServer {
    fn drop(&mut self) {
        // Abort the server task so it stops when the test completes
        self._handle.abort();
    }
}

/// Request descriptor for `api_id` from [`TEST_ACCOUNT_ID`] carrying `cookie`.
pub fn authorizer_request(cookie: &str, api_id: &str) -> Value {
    authorizer_request_from(cookie, TEST_ACCOUNT_ID, api_id)
}

/// Request descriptor with an explicit account ID.
pub fn authorizer_request_from(cookie: &str, account_id: &str, api_id: &str) -> Value {
    json!({
        "headers": { "cookie": cookie },
        "requestContext": { "accountId": account_id, "apiId": api_id }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestAuthorizerServer::spawn("http://127.0.0.1:9", &[("api1", "pool-a")]).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert!(server.addr().ip().is_loopback());

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await?;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["region"], TEST_REGION);
        assert_eq!(body["cached_issuers"], 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_server_config() -> Result<(), anyhow::Error> {
        let server =
            TestAuthorizerServer::spawn("http://127.0.0.1:9/", &[("api1", "pool-a")]).await?;
        let config = &server.state().config;

        assert_eq!(config.aws_account_id, TEST_ACCOUNT_ID);
        assert_eq!(config.issuer_base_url, "http://127.0.0.1:9");
        assert_eq!(
            config.api_user_pools.get("api1").map(String::as_str),
            Some("pool-a")
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_servers_different_ports() -> Result<(), anyhow::Error> {
        let server1 = TestAuthorizerServer::spawn("http://127.0.0.1:9", &[("a", "p")]).await?;
        let server2 = TestAuthorizerServer::spawn("http://127.0.0.1:9", &[("a", "p")]).await?;

        assert_ne!(server1.addr(), server2.addr());

        Ok(())
    }

    #[test]
    fn test_authorizer_request_shape() {
        let request = authorizer_request("a=b", "api1");

        assert_eq!(request["headers"]["cookie"], "a=b");
        assert_eq!(request["requestContext"]["accountId"], TEST_ACCOUNT_ID);
        assert_eq!(request["requestContext"]["apiId"], "api1");
    }
}
