//! Authorizer error types.
//!
//! Every variant ends in the same place: a deny decision with an empty
//! context. The variants exist so the failure reason can be logged and
//! counted (see `observability::metrics`), never so it can be returned to the
//! caller. Display strings are generic for the same reason.

use common::jwt::JwtValidationError;
use thiserror::Error;

/// Coarse failure category, used for log fields and as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing cookies, malformed token structure.
    MalformedInput,
    /// Wrong issuer, wrong token use, unmapped tenant, account mismatch.
    PolicyMismatch,
    /// JWKS fetch failure, unknown key id, unusable key descriptor.
    KeyResolution,
    /// Bad signature, expired or not-yet-valid token.
    Cryptographic,
}

impl ErrorCategory {
    /// Label value for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::MalformedInput => "malformed_input",
            ErrorCategory::PolicyMismatch => "policy_mismatch",
            ErrorCategory::KeyResolution => "key_resolution",
            ErrorCategory::Cryptographic => "cryptographic",
        }
    }
}

/// Authorizer error type.
///
/// Categories:
/// - MalformedRequest, MissingCredentials, MalformedToken: malformed input
/// - MissingRequestContext, AccountMismatch, UnmappedApi, IssuerMismatch,
///   WrongTokenUse, MissingSubject: policy mismatch
/// - KeyFetch, InvalidKey, UnknownSigningKey: key resolution
/// - SignatureInvalid, TokenExpired: cryptographic
#[derive(Debug, Error)]
pub enum AuthorizerError {
    /// Request descriptor is JSON but not shaped like one.
    #[error("Malformed request")]
    MalformedRequest,

    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Missing request context")]
    MissingRequestContext,

    #[error("Account mismatch")]
    AccountMismatch,

    #[error("Unmapped API")]
    UnmappedApi,

    #[error("Issuer mismatch")]
    IssuerMismatch,

    #[error("Wrong token type")]
    WrongTokenUse,

    #[error("Missing subject")]
    MissingSubject,

    /// JWKS could not be fetched or parsed. Never cached; retried on the next call.
    #[error("Key set fetch failed: {0}")]
    KeyFetch(String),

    /// A published key descriptor could not be turned into a verification key.
    #[error("Invalid key descriptor: {0}")]
    InvalidKey(String),

    #[error("Unknown signing key")]
    UnknownSigningKey,

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Token expired")]
    TokenExpired,
}

impl AuthorizerError {
    /// Failure category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthorizerError::MalformedRequest
            | AuthorizerError::MissingCredentials
            | AuthorizerError::MalformedToken => ErrorCategory::MalformedInput,
            AuthorizerError::MissingRequestContext
            | AuthorizerError::AccountMismatch
            | AuthorizerError::UnmappedApi
            | AuthorizerError::IssuerMismatch
            | AuthorizerError::WrongTokenUse
            | AuthorizerError::MissingSubject => ErrorCategory::PolicyMismatch,
            AuthorizerError::KeyFetch(_)
            | AuthorizerError::InvalidKey(_)
            | AuthorizerError::UnknownSigningKey => ErrorCategory::KeyResolution,
            AuthorizerError::SignatureInvalid | AuthorizerError::TokenExpired => {
                ErrorCategory::Cryptographic
            }
        }
    }

    /// Bounded-cardinality reason label (for metrics).
    pub fn reason(&self) -> &'static str {
        match self {
            AuthorizerError::MalformedRequest => "malformed_request",
            AuthorizerError::MissingCredentials => "missing_credentials",
            AuthorizerError::MalformedToken => "malformed_token",
            AuthorizerError::MissingRequestContext => "missing_request_context",
            AuthorizerError::AccountMismatch => "account_mismatch",
            AuthorizerError::UnmappedApi => "unmapped_api",
            AuthorizerError::IssuerMismatch => "issuer_mismatch",
            AuthorizerError::WrongTokenUse => "wrong_token_use",
            AuthorizerError::MissingSubject => "missing_subject",
            AuthorizerError::KeyFetch(_) => "key_fetch",
            AuthorizerError::InvalidKey(_) => "invalid_key",
            AuthorizerError::UnknownSigningKey => "unknown_signing_key",
            AuthorizerError::SignatureInvalid => "signature_invalid",
            AuthorizerError::TokenExpired => "token_expired",
        }
    }
}

/// Structural decode failures collapse into a malformed token. Claim checks
/// on verified tokens (`iat`) map their errors explicitly.
impl From<JwtValidationError> for AuthorizerError {
    fn from(_: JwtValidationError) -> Self {
        AuthorizerError::MalformedToken
    }
}
