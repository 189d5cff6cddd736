//! Typed configuration from environment variables.
//!
//! Loads once at startup. Unlike most services, a missing API token is not
//! a startup failure: the client simply reports nothing. The token is
//! wrapped in secrecy::SecretString to prevent log leaks.

pub mod secrets;

use crate::error::{Error, Result};
use secrecy::SecretString;
use std::time::Duration;

/// Collector used when no host override is configured.
pub const DEFAULT_HOST: &str = "https://robodash.app";

/// Default TCP/TLS connect timeout for a delivery.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default response read timeout for a delivery.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct Config {
    /// Dashboard token. `None` turns every reporting call into a no-op.
    pub api_token: Option<SecretString>,
    /// Collector base URL, without the `/api/...` suffix.
    pub host: String,
    /// Master switch. When false every reporting call is a no-op.
    pub enabled: bool,
    /// Limit on establishing the connection to the collector.
    pub connect_timeout: Duration,
    /// Limit on each read while waiting for the response.
    ///
    /// Deliveries are also capped as a whole at `connect_timeout +
    /// read_timeout`, so a response that keeps trickling in is still cut
    /// off at that total (7s with the defaults).
    pub read_timeout: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: None,
            host: DEFAULT_HOST.to_string(),
            enabled: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Configuration with the given token and every other field defaulted.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            api_token: non_empty(token.into()).map(SecretString::from),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            api_token: optional_var("ROBODASH_API_TOKEN").map(SecretString::from),
            host: optional_var("ROBODASH_HOST").unwrap_or(defaults.host),
            enabled: match optional_var("ROBODASH_ENABLED") {
                Some(raw) => parse_flag("ROBODASH_ENABLED", &raw)?,
                None => defaults.enabled,
            },
            connect_timeout: millis_var("ROBODASH_CONNECT_TIMEOUT_MS")?
                .unwrap_or(defaults.connect_timeout),
            read_timeout: millis_var("ROBODASH_READ_TIMEOUT_MS")?
                .unwrap_or(defaults.read_timeout),
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    /// Whether a non-empty token is configured.
    pub fn has_token(&self) -> bool {
        self.api_token.is_some()
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(non_empty)
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{name} must be a boolean, got {other:?}"
        ))),
    }
}

fn millis_var(name: &str) -> Result<Option<Duration>> {
    optional_var(name)
        .map(|raw| {
            raw.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| Error::Config(format!("{name} must be milliseconds: {e}")))
        })
        .transpose()
}
