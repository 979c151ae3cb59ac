//! Configuration module for the realtime channel.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::errors::{RealtimeError, Result};
use crate::realtime::ReconnectPolicy;

/// Deployment environment, selects the socket scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn scheme(self) -> &'static str {
        match self {
            Environment::Development => "ws",
            Environment::Production => "wss",
        }
    }
}

impl FromStr for Environment {
    type Err = RealtimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(RealtimeError::Config(format!(
                "Unknown AGRI_ENV value: {}",
                other
            ))),
        }
    }
}

/// Channel configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Selects `ws://` (development) or `wss://` (production)
    pub environment: Environment,
    /// Host and optional port of the realtime endpoint
    pub ws_host: String,
    /// Full endpoint override, takes precedence over host/environment
    pub ws_url: Option<String>,
    /// Reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Base backoff interval, doubled per attempt
    pub reconnect_interval: Duration,
    /// Upper bound on the TCP + WebSocket handshake
    pub connect_timeout: Duration,
    /// How long `disconnect()` waits for the close handshake
    pub close_timeout: Duration,
    /// Session token used by the listener binary
    pub auth_token: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            ws_host: "localhost:8000".to_string(),
            ws_url: None,
            max_reconnect_attempts: 5,
            reconnect_interval: Duration::from_millis(5000),
            connect_timeout: Duration::from_millis(10000),
            close_timeout: Duration::from_millis(2000),
            auth_token: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let environment = match lookup("AGRI_ENV") {
            Some(value) => value.parse()?,
            None => defaults.environment,
        };

        let ws_host = lookup("AGRI_WS_HOST").unwrap_or(defaults.ws_host);
        let ws_url = lookup("AGRI_WS_URL").filter(|s| !s.trim().is_empty());

        let max_reconnect_attempts = parse_var(
            &lookup,
            "AGRI_WS_MAX_RECONNECT_ATTEMPTS",
            defaults.max_reconnect_attempts,
        )?;

        let reconnect_interval = Duration::from_millis(parse_var(
            &lookup,
            "AGRI_WS_RECONNECT_INTERVAL_MS",
            defaults.reconnect_interval.as_millis() as u64,
        )?);

        let connect_timeout = Duration::from_millis(parse_var(
            &lookup,
            "AGRI_WS_CONNECT_TIMEOUT_MS",
            defaults.connect_timeout.as_millis() as u64,
        )?);

        let close_timeout = Duration::from_millis(parse_var(
            &lookup,
            "AGRI_WS_CLOSE_TIMEOUT_MS",
            defaults.close_timeout.as_millis() as u64,
        )?);

        let auth_token = lookup("AGRI_AUTH_TOKEN").filter(|s| !s.trim().is_empty());
        let log_level = lookup("AGRI_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            environment,
            ws_host,
            ws_url,
            max_reconnect_attempts,
            reconnect_interval,
            connect_timeout,
            close_timeout,
            auth_token,
            log_level,
        })
    }

    /// Resolve the socket endpoint, without the token.
    pub fn endpoint(&self) -> Result<Url> {
        let url = match &self.ws_url {
            Some(raw) => Url::parse(raw)?,
            None => Url::parse(&format!(
                "{}://{}/ws",
                self.environment.scheme(),
                self.ws_host
            ))?,
        };

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(RealtimeError::InvalidEndpoint(format!(
                "Unsupported scheme '{}', expected ws or wss",
                other
            ))),
        }
    }

    /// Backoff policy derived from the reconnect settings.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.max_reconnect_attempts, self.reconnect_interval)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RealtimeError::Config(format!("Invalid {} value: {}", key, raw))),
        None => Ok(default),
    }
}
