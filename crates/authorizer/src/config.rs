//! Authorizer configuration.
//!
//! Configuration is loaded from environment variables once at startup and
//! validated eagerly: a bad value stops the process instead of surfacing as
//! denied requests later. The account ID is redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Upper bound for the JWKS fetch timeout in seconds.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidLogFormat(format!(
                "LOG_FORMAT must be 'text' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Authorizer configuration.
#[derive(Clone)]
pub struct Config {
    /// Account ID requests must originate from.
    pub aws_account_id: String,

    /// API ID to user pool ID mapping.
    pub api_user_pools: BTreeMap<String, String>,

    /// Region of the user pools (e.g., "us-east-1").
    pub cognito_region: String,

    /// Issuer base URL, without trailing slash. Issuers are `{base}/{pool}`.
    pub issuer_base_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Clock skew tolerance in seconds for `exp`/`nbf`/`iat`.
    pub jwt_clock_skew_seconds: u64,

    /// JWKS fetch timeout in seconds.
    pub jwks_fetch_timeout_seconds: u64,

    /// Seconds to keep serving after a shutdown signal.
    pub drain_seconds: u64,

    /// Log output format.
    pub log_format: LogFormat,
}

/// Custom Debug implementation that redacts the account ID.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("aws_account_id", &"[REDACTED]")
            .field("api_user_pools", &self.api_user_pools)
            .field("cognito_region", &self.cognito_region)
            .field("issuer_base_url", &self.issuer_base_url)
            .field("bind_address", &self.bind_address)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("jwks_fetch_timeout_seconds", &self.jwks_fetch_timeout_seconds)
            .field("drain_seconds", &self.drain_seconds)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid API to user pool mapping: {0}")]
    InvalidApiUserPools(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidJwksFetchTimeout(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainPeriod(String),

    #[error("Invalid log format configuration: {0}")]
    InvalidLogFormat(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let aws_account_id = required(vars, "AWS_ACCOUNT_ID")?;
        let api_user_pools = parse_api_user_pools(&required(vars, "APIS_USERPOOL")?)?;
        let cognito_region = required(vars, "COGNITO_REGION")?;

        let issuer_base_url = vars
            .get("COGNITO_ISSUER_BASE_URL")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("https://cognito-idp.{cognito_region}.amazonaws.com"))
            .trim_end_matches('/')
            .to_string();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{value_str}': {e}"
                ))
            })?;

            let value = u64::try_from(value).ok().filter(|v| *v > 0).ok_or_else(|| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {value}"
                ))
            })?;

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        // Parse JWKS fetch timeout with validation
        let jwks_fetch_timeout_seconds =
            if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidJwksFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                    ))
                })?;

                if value == 0 || value > MAX_JWKS_FETCH_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidJwksFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be between 1 and {MAX_JWKS_FETCH_TIMEOUT_SECONDS}, got {value}"
                    )));
                }

                value
            } else {
                DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
            };

        let drain_seconds = if let Some(value_str) = vars.get("AUTHORIZER_DRAIN_SECONDS") {
            value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainPeriod(format!(
                    "AUTHORIZER_DRAIN_SECONDS must be a non-negative integer, got '{value_str}': {e}"
                ))
            })?
        } else {
            0
        };

        let log_format = match vars.get("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::default(),
        };

        Ok(Config {
            aws_account_id,
            api_user_pools,
            cognito_region,
            issuer_base_url,
            bind_address,
            jwt_clock_skew_seconds,
            jwks_fetch_timeout_seconds,
            drain_seconds,
            log_format,
        })
    }

    /// Clock skew tolerance as a Duration.
    pub fn jwt_clock_skew(&self) -> Duration {
        Duration::from_secs(self.jwt_clock_skew_seconds)
    }

    /// JWKS fetch timeout as a Duration.
    pub fn jwks_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_fetch_timeout_seconds)
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// Parse the `APIS_USERPOOL` JSON object.
fn parse_api_user_pools(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let pools: BTreeMap<String, String> = serde_json::from_str(raw).map_err(|e| {
        ConfigError::InvalidApiUserPools(format!(
            "APIS_USERPOOL must be a JSON object of string values: {e}"
        ))
    })?;

    if pools.is_empty() {
        return Err(ConfigError::InvalidApiUserPools(
            "APIS_USERPOOL must map at least one API".to_string(),
        ));
    }

    if let Some((api_id, _)) = pools
        .iter()
        .find(|(api_id, pool)| api_id.is_empty() || pool.is_empty())
    {
        return Err(ConfigError::InvalidApiUserPools(format!(
            "APIS_USERPOOL contains an empty API or user pool ID (api '{api_id}')"
        )));
    }

    Ok(pools)
}
