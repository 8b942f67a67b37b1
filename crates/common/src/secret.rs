//! Secret types for protecting bearer tokens from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Raw identity and
//! access tokens lifted out of a cookie header are wrapped in
//! [`SecretString`] as soon as they are parsed, so any struct deriving `Debug`
//! over them gets redacted output for free.
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct Credentials {
//!     access_token: SecretString,
//! }
//!
//! let creds = Credentials {
//!     access_token: SecretString::from("eyJhbGciOi..."),
//! };
//!
//! // Safe: the token is redacted
//! println!("{:?}", creds);
//!
//! // Explicit access is required to read the value
//! let token: &str = creds.access_token.expose_secret();
//! ```
//!
//! Use `SecretString` for:
//! - Bearer tokens (identity and access tokens)
//! - Anything else that grants access when replayed

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("eyJhbGciOiJSUzI1NiJ9.payload.sig");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("eyJhbGciOiJSUzI1NiJ9"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("token-value");
        assert_eq!(secret.expose_secret(), "token-value");
    }

    #[test]
    fn test_struct_with_secret_is_safe() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct CookiePair {
            name: String,
            value: SecretString,
        }

        let pair = CookiePair {
            name: "access_token".to_string(),
            value: SecretString::from("super-secret"),
        };

        let debug_str = format!("{pair:?}");

        assert!(debug_str.contains("access_token"));
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("super-secret"));
    }
}
