//! Cookie Token Authorizer Library
//!
//! Decides whether a request may reach a protected API, based on the
//! identity provider tokens carried in its cookies:
//!
//! - The access token is verified against the user pool's published keys
//! - Key sets are fetched per issuer on first use and cached for the process
//! - The identity token's claims become the decision context
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> decision.rs -> auth/authenticator.rs
//!                                                  -> auth/jwt.rs -> auth/key_cache.rs -> auth/jwks.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Cookie parsing, key sets, token verification
//! - `config` - Service configuration from environment
//! - `decision` - Request descriptor in, allow/deny decision out
//! - `errors` - Failure reasons behind a deny
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `observability` - Metrics definitions
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod decision;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
