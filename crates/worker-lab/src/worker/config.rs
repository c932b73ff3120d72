//! Worker pool configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::queue::QueueCapacity;
use super::strategy::LifecycleStrategy;

/// Invalid configuration value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Pool name used in logs (generated if not provided)
    pub name: String,

    /// Lifecycle strategy
    pub strategy: LifecycleStrategy,

    /// Workers spawned by the binary; `start` takes the count explicitly
    pub worker_count: usize,

    /// Task queue sizing; `None` picks the strategy default
    /// (see [`WorkerPoolConfig::effective_queue_capacity`])
    #[serde(default)]
    pub queue_capacity: Option<QueueCapacity>,

    /// Expected number of results, used to pre-size the result buffer
    pub expected_tasks: usize,

    /// Tick of the per-task helper activity
    #[serde(with = "duration_millis")]
    pub helper_interval: Duration,

    /// Tick of the pool monitor
    #[serde(with = "duration_millis")]
    pub monitor_interval: Duration,

    /// Tick of the metrics sampler
    #[serde(with = "duration_millis")]
    pub metrics_interval: Duration,

    /// Submit ignores `stop()` and `stop()` waits for pending submits.
    /// Reproduces the full-queue deadlock; never enable outside tests.
    #[serde(default)]
    pub blocking_submit: bool,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            name: format!("pool-{}", Uuid::now_v7()),
            strategy: LifecycleStrategy::default(),
            worker_count: 4,
            queue_capacity: None,
            expected_tasks: 1000,
            helper_interval: Duration::from_secs(1),
            monitor_interval: Duration::from_millis(100),
            metrics_interval: Duration::from_secs(5),
            blocking_submit: false,
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration for the given strategy
    pub fn new(strategy: LifecycleStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables (all optional):
    /// - `WORKER_VARIANT`: `optimized` | `bad`
    /// - `WORKER_COUNT`
    /// - `WORKER_QUEUE_CAPACITY`: size, `0` for unbuffered or `unbounded`;
    ///   unset keeps the strategy default
    /// - `WORKER_EXPECTED_TASKS`
    /// - `WORKER_HELPER_INTERVAL_MS`, `WORKER_MONITOR_INTERVAL_MS`,
    ///   `WORKER_METRICS_INTERVAL_MS`
    /// - `WORKER_BLOCKING_SUBMIT`: `true` | `1`
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            name: env::var("WORKER_POOL_NAME").unwrap_or(defaults.name),
            strategy: parse_env("WORKER_VARIANT")?.unwrap_or(defaults.strategy),
            worker_count: parse_env("WORKER_COUNT")?.unwrap_or(defaults.worker_count),
            queue_capacity: parse_env("WORKER_QUEUE_CAPACITY")?.or(defaults.queue_capacity),
            expected_tasks: parse_env("WORKER_EXPECTED_TASKS")?.unwrap_or(defaults.expected_tasks),
            helper_interval: parse_env("WORKER_HELPER_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.helper_interval),
            monitor_interval: parse_env("WORKER_MONITOR_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.monitor_interval),
            metrics_interval: parse_env("WORKER_METRICS_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.metrics_interval),
            blocking_submit: env::var("WORKER_BLOCKING_SUBMIT")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject zero worker counts and zero intervals
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Zero("worker_count"));
        }
        if self.helper_interval.is_zero() {
            return Err(ConfigError::Zero("helper_interval"));
        }
        if self.monitor_interval.is_zero() {
            return Err(ConfigError::Zero("monitor_interval"));
        }
        if self.metrics_interval.is_zero() {
            return Err(ConfigError::Zero("metrics_interval"));
        }
        Ok(())
    }

    /// Queue sizing the pool actually uses
    ///
    /// Without an explicit capacity a fire-and-forget pool hands tasks over
    /// unbuffered, and a cooperative pool buffers the whole expected batch.
    pub fn effective_queue_capacity(&self) -> QueueCapacity {
        match self.queue_capacity {
            Some(capacity) => capacity,
            None if self.strategy.reuses_buffers() => {
                QueueCapacity::Bounded(self.expected_tasks.max(1))
            }
            None => QueueCapacity::Unbuffered,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_strategy(mut self, strategy: LifecycleStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: QueueCapacity) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_expected_tasks(mut self, expected: usize) -> Self {
        self.expected_tasks = expected;
        self
    }

    pub fn with_helper_interval(mut self, interval: Duration) -> Self {
        self.helper_interval = interval;
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    /// Enable the deadlocking submit path
    pub fn with_blocking_submit(mut self, enabled: bool) -> Self {
        self.blocking_submit = enabled;
        self
    }
}

fn parse_env<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerPoolConfig::default();
        assert!(config.name.starts_with("pool-"));
        assert_eq!(config.strategy, LifecycleStrategy::Cooperative);
        assert_eq!(config.helper_interval, Duration::from_secs(1));
        assert_eq!(config.monitor_interval, Duration::from_millis(100));
        assert_eq!(config.metrics_interval, Duration::from_secs(5));
        assert!(!config.blocking_submit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = WorkerPoolConfig::new(LifecycleStrategy::FireAndForget)
            .with_name("lab")
            .with_worker_count(0)
            .with_queue_capacity(QueueCapacity::Unbuffered)
            .with_helper_interval(Duration::from_millis(20));

        assert_eq!(config.name, "lab");
        assert_eq!(config.strategy.label(), "bad");
        assert_eq!(config.worker_count, 0);
        assert_eq!(config.queue_capacity, Some(QueueCapacity::Unbuffered));
        assert_eq!(config.helper_interval, Duration::from_millis(20));
    }

    #[test]
    fn test_validate_rejects_zero_worker_count() {
        let config = WorkerPoolConfig::default().with_worker_count(0);
        assert_eq!(config.validate(), Err(ConfigError::Zero("worker_count")));
        assert!(config.with_worker_count(3).validate().is_ok());
    }

    #[test]
    fn test_queue_capacity_follows_strategy() {
        let optimized = WorkerPoolConfig::new(LifecycleStrategy::Cooperative).with_expected_tasks(500);
        assert_eq!(optimized.queue_capacity, None);
        assert_eq!(optimized.effective_queue_capacity(), QueueCapacity::Bounded(500));
        assert_eq!(
            optimized.with_expected_tasks(0).effective_queue_capacity(),
            QueueCapacity::Bounded(1)
        );

        let bad = WorkerPoolConfig::new(LifecycleStrategy::FireAndForget).with_expected_tasks(500);
        assert_eq!(bad.effective_queue_capacity(), QueueCapacity::Unbuffered);

        let explicit = bad.with_queue_capacity(QueueCapacity::Bounded(8));
        assert_eq!(explicit.effective_queue_capacity(), QueueCapacity::Bounded(8));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = WorkerPoolConfig::default().with_monitor_interval(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero("monitor_interval"))
        );
    }

    #[test]
    fn test_config_serializes_durations_as_millis() {
        let config = WorkerPoolConfig::default().with_name("p");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["helper_interval"], 1000);
        assert_eq!(json["strategy"], "cooperative");

        let back: WorkerPoolConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_parse_env_reports_variable() {
        // Unique variable name; no other test touches it
        std::env::set_var("WORKER_LAB_TEST_BAD_COUNT", "many");
        let err = parse_env::<usize>("WORKER_LAB_TEST_BAD_COUNT").unwrap_err();
        assert!(err.to_string().contains("WORKER_LAB_TEST_BAD_COUNT"));
        assert_eq!(parse_env::<usize>("WORKER_LAB_TEST_UNSET").unwrap(), None);
    }
}
