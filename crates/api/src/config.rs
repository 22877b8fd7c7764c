//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::{OrderConfig, StateTimeouts};
use thiserror::Error;

/// Errors raised while reading the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than 0")]
    NonPositive(&'static str),
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres connection string; orders stay in memory when unset
/// - `SCHEDULER_INTERVAL_MS`: scheduler tick period (default: `500`)
/// - `SCHEDULER_MAX_CONCURRENT`: orders advanced in parallel per tick (default: `8`)
/// - `ORDER_OPEN_TIMEOUT_SECS`, `ORDER_LOCK_TIMEOUT_SECS`,
///   `ORDER_ORDERED_TIMEOUT_SECS`, `ORDER_DELIVERED_TIMEOUT_SECS`,
///   `ORDER_REVOKED_TIMEOUT_SECS`, `ORDER_CLOSED_LINGERING_SECS`: required
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub scheduler_interval: Duration,
    pub scheduler_max_concurrent: usize,
    pub orders: OrderConfig,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let timeouts = StateTimeouts {
            open: env.seconds("ORDER_OPEN_TIMEOUT_SECS")?,
            locked: env.seconds("ORDER_LOCK_TIMEOUT_SECS")?,
            ordered: env.seconds("ORDER_ORDERED_TIMEOUT_SECS")?,
            delivered: env.seconds("ORDER_DELIVERED_TIMEOUT_SECS")?,
            revoked: env.seconds("ORDER_REVOKED_TIMEOUT_SECS")?,
        };
        let lingering = env.seconds("ORDER_CLOSED_LINGERING_SECS")?;

        let interval_ms: u64 = env.parse_or("SCHEDULER_INTERVAL_MS", 500)?;
        if interval_ms == 0 {
            return Err(ConfigError::NonPositive("SCHEDULER_INTERVAL_MS"));
        }
        let max_concurrent: usize = env.parse_or("SCHEDULER_MAX_CONCURRENT", 8)?;
        if max_concurrent == 0 {
            return Err(ConfigError::NonPositive("SCHEDULER_MAX_CONCURRENT"));
        }

        Ok(Self {
            host: env.get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env.parse_or("PORT", 3000)?,
            log_level: env.get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            database_url: env.get("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            scheduler_interval: Duration::from_millis(interval_ms),
            scheduler_max_concurrent: max_concurrent,
            orders: OrderConfig::new(timeouts, lingering),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn seconds(&self, name: &'static str) -> Result<Duration, ConfigError> {
        let value = self.get(name).ok_or(ConfigError::Missing(name))?;
        let secs: i64 = value.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value: value.clone(),
            }
        })?;
        if secs <= 0 {
            return Err(ConfigError::NonPositive(name));
        }
        Ok(Duration::from_secs(secs as u64))
    }
}
