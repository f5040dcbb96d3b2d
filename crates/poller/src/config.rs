use std::str::FromStr;
use std::time::Duration;

use linewatch_collector::SourceConfig;

/// Default delay between polling ticks.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FETCH_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 2;
pub const DEFAULT_OUTLIER_SIGMA: f64 = linewatch_core::outlier::DEFAULT_SIGMA_MULTIPLIER;

/// A malformed environment value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected} (got '{value}')")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Read `key` through `lookup`, falling back to `default` when unset.
pub fn env_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw,
            expected,
        }),
    }
}

/// Polling, fetching and analysis settings.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub cache_ttl: Duration,
    /// Per-request timeout for equipment log reads.
    pub fetch_timeout: Duration,
    pub fetch_retries: u32,
    pub retry_backoff: Duration,
    /// Sigma multiplier `k` for outlier detection.
    pub outlier_sigma: f64,
    /// Start polling as soon as the server is up.
    pub auto_start: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            fetch_retries: DEFAULT_FETCH_RETRIES,
            retry_backoff: Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS),
            outlier_sigma: DEFAULT_OUTLIER_SIGMA,
            auto_start: true,
        }
    }
}

impl PollerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default |
    /// |----------------------|---------|
    /// | `POLL_INTERVAL_SECS` | `30`    |
    /// | `CACHE_TTL_SECS`     | `30`    |
    /// | `FETCH_TIMEOUT_SECS` | `10`    |
    /// | `FETCH_RETRIES`      | `3`     |
    /// | `RETRY_BACKOFF_SECS` | `2`     |
    /// | `OUTLIER_SIGMA`      | `2.0`   |
    /// | `AUTO_START_POLLING` | `true`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let poll_interval_secs: u64 = env_or(
            &lookup,
            "POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
            "positive integer",
        )?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "POLL_INTERVAL_SECS",
                value: "0".into(),
                expected: "positive integer",
            });
        }

        let outlier_sigma: f64 =
            env_or(&lookup, "OUTLIER_SIGMA", DEFAULT_OUTLIER_SIGMA, "positive number")?;
        if !(outlier_sigma.is_finite() && outlier_sigma > 0.0) {
            return Err(ConfigError::Invalid {
                key: "OUTLIER_SIGMA",
                value: outlier_sigma.to_string(),
                expected: "positive number",
            });
        }

        Ok(Self {
            poll_interval: Duration::from_secs(poll_interval_secs),
            cache_ttl: Duration::from_secs(env_or(
                &lookup,
                "CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
                "integer",
            )?),
            fetch_timeout: Duration::from_secs(env_or(
                &lookup,
                "FETCH_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT_SECS,
                "integer",
            )?),
            fetch_retries: env_or(&lookup, "FETCH_RETRIES", DEFAULT_FETCH_RETRIES, "integer")?,
            retry_backoff: Duration::from_secs(env_or(
                &lookup,
                "RETRY_BACKOFF_SECS",
                DEFAULT_RETRY_BACKOFF_SECS,
                "integer",
            )?),
            outlier_sigma,
            auto_start: env_or(&lookup, "AUTO_START_POLLING", true, "boolean")?,
        })
    }

    /// Cache and retry policy handed to every equipment source.
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            cache_ttl: self.cache_ttl,
            retries: self.fetch_retries,
            retry_backoff: self.retry_backoff,
            ..SourceConfig::default()
        }
    }
}
