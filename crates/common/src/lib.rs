//! Common utilities shared across the authorizer crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (structural decoding, size limits, clock skew)
pub mod jwt;
