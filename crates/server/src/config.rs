//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use outbox::{PollerConfig, RetryPolicy};
use thiserror::Error;

/// Log output format selected with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Connection strings the relay needs before it may start polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayEndpoints<'a> {
    pub database_url: &'a str,
    pub nats_url: &'a str,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: PostgreSQL holding the outbox (required by the relay)
/// - `NATS_URL`: broker the outbox is drained to (required by the relay)
/// - `OUTBOX_POLL_INTERVAL_MS` (5000), `OUTBOX_MAX_ATTEMPTS` (3),
///   `OUTBOX_INITIAL_BACKOFF_MS` (1000), `OUTBOX_BACKOFF_FACTOR` (2.0),
///   `OUTBOX_MAX_BACKOFF_MS` (30000), `OUTBOX_PUBLISH_TIMEOUT_MS` (5000)
/// - `OUTBOX_BATCH_SIZE`: records per cycle, `0` or unset for no limit
/// - `OUTBOX_MAX_FAILED_CYCLES`: quarantine ceiling, `0` or unset to disable
/// - `SHUTDOWN_TIMEOUT_MS` (10000): wait for the poller before aborting it
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_factor: f64,
    pub max_backoff: Duration,
    pub publish_timeout: Duration,
    pub batch_size: Option<usize>,
    pub max_failed_cycles: Option<u32>,
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let defaults = Self::default();

        Ok(Self {
            host: env.string("HOST").unwrap_or(defaults.host),
            port: env.parse("PORT")?.unwrap_or(defaults.port),
            log_level: env.string("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: env.parse("LOG_FORMAT")?.unwrap_or(defaults.log_format),
            database_url: env.string("DATABASE_URL"),
            nats_url: env.string("NATS_URL"),
            poll_interval: env
                .millis("OUTBOX_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.poll_interval),
            max_attempts: env
                .parse("OUTBOX_MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
            initial_backoff: env
                .millis("OUTBOX_INITIAL_BACKOFF_MS")?
                .unwrap_or(defaults.initial_backoff),
            backoff_factor: env
                .parse("OUTBOX_BACKOFF_FACTOR")?
                .unwrap_or(defaults.backoff_factor),
            max_backoff: env
                .millis("OUTBOX_MAX_BACKOFF_MS")?
                .unwrap_or(defaults.max_backoff),
            publish_timeout: env
                .millis("OUTBOX_PUBLISH_TIMEOUT_MS")?
                .unwrap_or(defaults.publish_timeout),
            batch_size: env
                .parse::<usize>("OUTBOX_BATCH_SIZE")?
                .filter(|size| *size > 0),
            max_failed_cycles: env
                .parse::<u32>("OUTBOX_MAX_FAILED_CYCLES")?
                .filter(|cycles| *cycles > 0),
            shutdown_timeout: env
                .millis("SHUTDOWN_TIMEOUT_MS")?
                .unwrap_or(defaults.shutdown_timeout),
        })
    }

    /// Both connection strings, or the first one that is missing.
    ///
    /// A record is only marked processed after the broker accepted it, so the
    /// relay never runs without a real journal and a real broker.
    pub fn relay_endpoints(&self) -> Result<RelayEndpoints<'_>, ConfigError> {
        let database_url = self
            .database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let nats_url = self
            .nats_url
            .as_deref()
            .ok_or(ConfigError::Missing("NATS_URL"))?;
        Ok(RelayEndpoints {
            database_url,
            nats_url,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.initial_backoff)
            .with_factor(self.backoff_factor)
            .with_max_backoff(self.max_backoff)
    }

    pub fn poller_config(&self) -> PollerConfig {
        let mut config = PollerConfig::default()
            .with_poll_interval(self.poll_interval)
            .with_retry(self.retry_policy())
            .with_publish_timeout(self.publish_timeout)
            .with_shutdown_timeout(self.shutdown_timeout);
        if let Some(size) = self.batch_size {
            config = config.with_batch_size(size);
        }
        if let Some(cycles) = self.max_failed_cycles {
            config = config.with_max_failed_cycles(cycles);
        }
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        let poller = PollerConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            nats_url: None,
            poll_interval: poller.poll_interval,
            max_attempts: poller.retry.max_attempts,
            initial_backoff: poller.retry.initial_backoff,
            backoff_factor: poller.retry.factor,
            max_backoff: poller.retry.max_backoff,
            publish_timeout: poller.publish_timeout,
            batch_size: poller.batch_size,
            max_failed_cycles: poller.max_failed_cycles,
            shutdown_timeout: poller.shutdown_timeout,
        }
    }
}

struct Lookup<F>(F);

impl<F: Fn(&str) -> Option<String>> Lookup<F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        self.string(key)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| ConfigError::Invalid { key, value })
            })
            .transpose()
    }

    fn millis(&self, key: &'static str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.parse::<u64>(key)?.map(Duration::from_millis))
    }
}
