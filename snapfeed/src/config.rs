//! Runtime configuration, loaded from TOML with environment overrides.

use std::{env, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use crate::validators::is_valid_url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Top-level configuration.
///
/// ```toml
/// [store]
/// redis_url = "redis://127.0.0.1:6379"
/// key_prefix = "snapfeed"
///
/// [retry]
/// max_attempts = 5
///
/// [fanout]
/// concurrency = 16
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    pub store: StoreConfig,
    pub retry: RetryPolicy,
    pub fanout: FanoutConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub redis_url: String,
    pub key_prefix: String,
    pub service: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "snapfeed".to_string(),
            service: "social".to_string(),
        }
    }
}

/// Backoff schedule for queued side effects.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 50,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let millis = self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FanoutConfig {
    /// Feed index writes in flight per fanout task.
    pub concurrency: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self { concurrency: 16 }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Base URL media references are resolved against.
    pub base_url: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://media.snapfeed.local/".to_string(),
        }
    }
}

impl FeedConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Applies `REDIS_URL` and `SNAPFEED_PREFIX` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("REDIS_URL") {
            log::info!("using REDIS_URL from environment");
            self.store.redis_url = url;
        }
        if let Ok(prefix) = env::var("SNAPFEED_PREFIX") {
            self.store.key_prefix = prefix;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if self.fanout.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "fanout.concurrency",
                message: "must be at least 1".to_string(),
            });
        }
        if !is_valid_url(&self.media.base_url) {
            return Err(ConfigError::Invalid {
                field: "media.base_url",
                message: format!("'{}' is not a URL", self.media.base_url),
            });
        }
        if self.store.key_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "store.key_prefix",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
