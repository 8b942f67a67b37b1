//! # Authorizer Test Utilities
//!
//! Shared test utilities for the authorizer.
//!
//! This crate provides:
//! - Fixed RSA signing keys with their JWK form
//! - Test data builders (`TestTokenBuilder`)
//! - A mock identity provider serving JWKS (`MockJwksServer`)
//! - Server test harness (`TestAuthorizerServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use authorizer_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let idp = MockJwksServer::start().await;
//!     idp.publish("pool-a", &[PRIMARY_KEY], Some(1)).await;
//!
//!     let server = TestAuthorizerServer::spawn(&idp.base_url(), &[("api1", "pool-a")]).await?;
//!
//!     let access = TestTokenBuilder::access_token(&idp.issuer("pool-a"))
//!         .with_username("alice")
//!         .sign(&PRIMARY_KEY);
//!     // ... POST to server.url() + "/v1/authorize"
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_jwks;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_jwks::*;
pub use server_harness::*;
pub use token_builders::*;
