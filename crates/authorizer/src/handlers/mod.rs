//! HTTP request handlers for the authorizer service.

pub mod authorize;
pub mod health;
pub mod metrics;

pub use authorize::authorize;
pub use health::health_check;
pub use metrics::metrics_handler;
