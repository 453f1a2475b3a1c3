//! Threaded runtime settings.

use std::time::Duration;

/// How the threaded runtime lays out and supervises its workers.
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// One worker, and one OS thread, per rank.
    pub num_workers: usize,
    /// Wall-clock limit; the run is reported as aborted when it expires.
    pub timeout: Option<Duration>,
    /// How often the coordinator checks for finished workers and the
    /// deadline.
    pub poll_interval: Duration,
    /// Longest an idle worker blocks on its inbox before stepping again.
    /// Bounds how quickly it notices the stop flag and advances the
    /// termination debounce.
    pub idle_wait: Duration,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            timeout: None,
            poll_interval: Duration::from_millis(5),
            idle_wait: Duration::from_millis(1),
        }
    }
}

impl ParallelConfig {
    /// World size. At least one worker always runs.
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_timeout_option(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_micros(100));
        self
    }

    pub fn with_idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait.max(Duration::from_micros(10));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_every_core() {
        let config = ParallelConfig::default();
        assert_eq!(config.num_workers, num_cpus::get());
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_world_size_is_at_least_one() {
        assert_eq!(ParallelConfig::default().with_workers(0).num_workers, 1);
        assert_eq!(ParallelConfig::default().with_workers(6).num_workers, 6);
    }

    #[test]
    fn test_timeout_and_poll_interval() {
        let config = ParallelConfig::default()
            .with_timeout(Duration::from_secs(60))
            .with_poll_interval(Duration::ZERO);
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.poll_interval, Duration::from_micros(100));
        assert!(config.with_timeout_option(None).timeout.is_none());
    }

    #[test]
    fn test_idle_wait_has_a_floor() {
        assert_eq!(ParallelConfig::default().idle_wait, Duration::from_millis(1));
        let config = ParallelConfig::default().with_idle_wait(Duration::ZERO);
        assert_eq!(config.idle_wait, Duration::from_micros(10));
    }
}
