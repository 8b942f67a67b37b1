//! Observability module for the authorizer.
//!
//! Provides metrics definitions and recording helpers. Logging is plain
//! `tracing` with per-module targets and is initialized in `main`.

pub mod metrics;
