use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hard cap on the number of worker threads.
pub const MAX_WORKERS: usize = 4;

/// Worker count used when none is configured.
pub const DEFAULT_WORKERS: usize = 2;

/// Worker pool settings, loadable from the `[pool]` table of a TOML config.
///
/// All durations are in milliseconds so the TOML stays flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Live worker threads. Clamped into `1..=MAX_WORKERS`.
    pub worker_count: usize,
    /// Jobs allowed to wait for a worker before submissions are rejected.
    pub max_queue_size: usize,
    /// Timeout of a running job when the submitter does not set one.
    pub default_timeout_ms: u64,
    pub health_check_interval_ms: u64,
    /// A worker busy longer than this with no result is recreated.
    pub stuck_threshold_ms: u64,
    /// Number of recent jobs in the rolling average execution time.
    pub stats_window: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKERS,
            max_queue_size: 64,
            default_timeout_ms: 30_000,
            health_check_interval_ms: 5_000,
            stuck_threshold_ms: 60_000,
            stats_window: 100,
        }
    }
}

impl PoolConfig {
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_stuck_threshold(mut self, threshold: Duration) -> Self {
        self.stuck_threshold_ms = threshold.as_millis() as u64;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn stuck_threshold(&self) -> Duration {
        Duration::from_millis(self.stuck_threshold_ms)
    }

    /// Copy with every field forced into its usable range.
    pub fn validated(mut self) -> Self {
        let workers = self.worker_count.clamp(1, MAX_WORKERS);
        if workers != self.worker_count {
            log::warn!(
                "Worker count {} out of range, using {}",
                self.worker_count,
                workers
            );
            self.worker_count = workers;
        }
        self.health_check_interval_ms = self.health_check_interval_ms.max(1);
        self.default_timeout_ms = self.default_timeout_ms.max(1);
        self.stats_window = self.stats_window.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.default_timeout(), Duration::from_secs(30));
        assert_eq!(config.health_check_interval(), Duration::from_secs(5));
        assert_eq!(config.stuck_threshold(), Duration::from_secs(60));
        assert_eq!(config.stats_window, 100);
    }

    #[test]
    fn validated_clamps_worker_count() {
        assert_eq!(PoolConfig::default().with_worker_count(0).validated().worker_count, 1);
        assert_eq!(
            PoolConfig::default().with_worker_count(16).validated().worker_count,
            MAX_WORKERS
        );
        assert_eq!(PoolConfig::default().with_worker_count(3).validated().worker_count, 3);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: PoolConfig = toml::from_str("worker_count = 3\nmax_queue_size = 8").unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.max_queue_size, 8);
        assert_eq!(config.default_timeout_ms, 30_000);
    }
}
