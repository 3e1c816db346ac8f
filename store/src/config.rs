//! Facade configuration.
//!
//! [`StoreConfig`] carries everything the facade needs to decide how to talk
//! to the durable store: the connection string, the master `enabled` switch,
//! read paging, retry and timeout bounds, and the capacity of the in-memory
//! fallback buffer. Build one with [`StoreConfig::builder`] or load it from
//! the environment with [`StoreConfig::from_env`].

use std::time::Duration;

/// Default read page size.
const DEFAULT_BATCH_SIZE: usize = 100;
/// Default connect-probe retry attempts.
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Default per-operation timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default fallback buffer capacity.
const DEFAULT_FALLBACK_CAPACITY: usize = 10_000;

/// Configuration for the dual-mode event store facade.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Address of the durable backing store.
    pub connection_string: String,
    /// Master switch. When `false` the facade runs in fallback-only mode and
    /// never attempts a durable connection.
    pub enabled: bool,
    /// Default page size for reads that do not specify `max_count`.
    pub batch_size: usize,
    /// How many times `connect()` retries its liveness probe.
    pub retry_attempts: u32,
    /// Upper bound on any single durable-store operation.
    pub timeout: Duration,
    /// Capacity of the in-memory fallback buffer. Oldest events are evicted
    /// once the buffer is full.
    pub fallback_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection_string: "postgres://localhost:5432/eventline".to_string(),
            enabled: true,
            batch_size: DEFAULT_BATCH_SIZE,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
            fallback_capacity: DEFAULT_FALLBACK_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Recognized variables (all optional, defaults apply):
    ///
    /// - `EVENT_STORE_URL` — durable store address
    /// - `EVENT_STORE_ENABLED` — `true`/`false` master switch
    /// - `EVENT_STORE_BATCH_SIZE` — default read page size
    /// - `EVENT_STORE_RETRY_ATTEMPTS` — connect-probe retries
    /// - `EVENT_STORE_TIMEOUT_MS` — per-operation timeout in milliseconds
    /// - `EVENT_STORE_FALLBACK_CAPACITY` — fallback buffer bound
    ///
    /// Unparseable values are logged and replaced by defaults; this function
    /// never fails.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connection_string: std::env::var("EVENT_STORE_URL")
                .unwrap_or(defaults.connection_string),
            enabled: env_parse("EVENT_STORE_ENABLED", defaults.enabled),
            batch_size: env_parse("EVENT_STORE_BATCH_SIZE", defaults.batch_size),
            retry_attempts: env_parse("EVENT_STORE_RETRY_ATTEMPTS", defaults.retry_attempts),
            timeout: Duration::from_millis(env_parse(
                "EVENT_STORE_TIMEOUT_MS",
                u64::try_from(defaults.timeout.as_millis()).unwrap_or(5000),
            )),
            fallback_capacity: env_parse(
                "EVENT_STORE_FALLBACK_CAPACITY",
                defaults.fallback_capacity,
            ),
        }
    }
}

/// Parse an environment variable, falling back to a default on absence or
/// parse failure.
fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "Unparseable environment value, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug, Clone, Default)]
pub struct StoreConfigBuilder {
    connection_string: Option<String>,
    enabled: Option<bool>,
    batch_size: Option<usize>,
    retry_attempts: Option<u32>,
    timeout: Option<Duration>,
    fallback_capacity: Option<usize>,
}

impl StoreConfigBuilder {
    /// Set the durable store address.
    #[must_use]
    pub fn connection_string(mut self, url: impl Into<String>) -> Self {
        self.connection_string = Some(url.into());
        self
    }

    /// Set the master switch.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Set the default read page size.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Set how many times `connect()` retries its probe.
    #[must_use]
    pub const fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    /// Set the per-operation timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the fallback buffer capacity.
    #[must_use]
    pub const fn fallback_capacity(mut self, capacity: usize) -> Self {
        self.fallback_capacity = Some(capacity);
        self
    }

    /// Build the configuration, applying defaults for unset fields.
    #[must_use]
    pub fn build(self) -> StoreConfig {
        let defaults = StoreConfig::default();
        StoreConfig {
            connection_string: self.connection_string.unwrap_or(defaults.connection_string),
            enabled: self.enabled.unwrap_or(defaults.enabled),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            retry_attempts: self.retry_attempts.unwrap_or(defaults.retry_attempts),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            fallback_capacity: self.fallback_capacity.unwrap_or(defaults.fallback_capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert!(config.enabled);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.fallback_capacity, 10_000);
    }

    #[test]
    fn builder_overrides() {
        let config = StoreConfig::builder()
            .connection_string("postgres://db:5432/events")
            .enabled(false)
            .batch_size(25)
            .retry_attempts(1)
            .timeout(Duration::from_millis(250))
            .fallback_capacity(64)
            .build();

        assert_eq!(config.connection_string, "postgres://db:5432/events");
        assert!(!config.enabled);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.retry_attempts, 1);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.fallback_capacity, 64);
    }

    #[test]
    fn builder_applies_defaults_for_unset_fields() {
        let config = StoreConfig::builder().batch_size(10).build();
        assert_eq!(config.batch_size, 10);
        assert!(config.enabled);
        assert_eq!(config.retry_attempts, 3);
    }
}
