//! Authentication for cookie-borne bearer tokens.
//!
//! Components, leaf first:
//! - [`cookies`]: cookie header parsing
//! - [`jwks`]: key set fetching from the issuer's JWKS endpoint
//! - [`key_cache`]: per-issuer key set cache
//! - [`jwt`]: access token verification
//! - [`authenticator`]: the id/access token pair, end to end

pub mod authenticator;
pub mod claims;
pub mod cookies;
pub mod jwks;
pub mod jwt;
pub mod key_cache;

pub use authenticator::Authenticator;
pub use claims::{AccessTokenClaims, IdentityClaims};
pub use jwks::{HttpKeySetFetcher, KeySet, KeySetFetcher, VerificationKey};
pub use jwt::TokenVerifier;
pub use key_cache::KeySetCache;
