//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use stockroom_infra::ServiceConfig;
use stockroom_infra::cache::DEFAULT_KEY_PREFIX;
use stockroom_inventory::{DEFAULT_BEST_SELLER_LIMIT, DEFAULT_INSIGHT_WINDOW};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be set: {reason}")]
    Missing {
        key: &'static str,
        reason: &'static str,
    },

    #[error("invalid {key}='{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres + Redis when true, in-memory stores otherwise.
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub redis_url: String,
    pub cache_key_prefix: String,
    /// Longest a mutation waits for the guard; `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
    pub insight_window: Duration,
    pub best_seller_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            use_persistent_stores: false,
            database_url: None,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            cache_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            lock_timeout: None,
            insight_window: DEFAULT_INSIGHT_WINDOW,
            best_seller_limit: DEFAULT_BEST_SELLER_LIMIT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Unset and blank values
    /// take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let bind_addr = parse_or("BIND_ADDR", get("BIND_ADDR"), DEFAULT_BIND_ADDR, |v| {
            v.parse::<SocketAddr>().map_err(|e| e.to_string())
        })?;

        let use_persistent_stores = match get("USE_PERSISTENT_STORES") {
            Some(v) => parse_bool("USE_PERSISTENT_STORES", &v)?,
            None => defaults.use_persistent_stores,
        };

        let database_url = get("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing {
                key: "DATABASE_URL",
                reason: "required when USE_PERSISTENT_STORES=true",
            });
        }

        let lock_timeout = get("MUTATION_LOCK_TIMEOUT_MS")
            .map(|v| parse_u64("MUTATION_LOCK_TIMEOUT_MS", &v).map(Duration::from_millis))
            .transpose()?;

        let insight_window = match get("INSIGHT_WINDOW_SECS") {
            Some(v) => Duration::from_secs(parse_u64("INSIGHT_WINDOW_SECS", &v)?),
            None => defaults.insight_window,
        };

        let best_seller_limit = match get("INSIGHT_LIMIT") {
            Some(v) => match parse_u64("INSIGHT_LIMIT", &v)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        key: "INSIGHT_LIMIT",
                        value: v,
                        reason: "must be at least 1".to_string(),
                    });
                }
                n => usize::try_from(n).unwrap_or(usize::MAX),
            },
            None => defaults.best_seller_limit,
        };

        Ok(Self {
            bind_addr,
            use_persistent_stores,
            database_url,
            redis_url: get("REDIS_URL").unwrap_or(defaults.redis_url),
            cache_key_prefix: get("CACHE_KEY_PREFIX").unwrap_or(defaults.cache_key_prefix),
            lock_timeout,
            insight_window,
            best_seller_limit,
        })
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            lock_timeout: self.lock_timeout,
            insight_window: self.insight_window,
            best_seller_limit: self.best_seller_limit,
        }
    }
}

fn parse_or<T>(
    key: &'static str,
    value: Option<String>,
    default: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
    let raw = value.unwrap_or_else(|| default.to_string());
    parse(raw.trim()).map_err(|reason| ConfigError::Invalid {
        key,
        value: raw,
        reason,
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
