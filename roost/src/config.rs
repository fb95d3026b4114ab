use std::time::Duration;

use crate::error::PoolError;

/// Default cap on abandoned attempt threads that may still be running.
pub const DEFAULT_MAX_ABANDONED: usize = 64;

pub const DEFAULT_THREAD_NAME_PREFIX: &str = "roost";

/// Configuration for a [`Pool`](crate::Pool).
///
/// The values are fixed once the pool is built.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of worker threads. Fixed for the lifetime of the pool.
    pub workers: usize,

    /// Extra attempts after the first one fails. `0` means a single attempt.
    pub retry_count: usize,

    /// Deadline for a single attempt. `Duration::ZERO` disables enforcement and
    /// runs tasks directly on the worker thread.
    pub timeout: Duration,

    /// Maximum number of timed-out attempt threads allowed to keep running in
    /// the background. Workers wait before starting a new timed attempt while
    /// the cap is reached. `None` leaves it unbounded.
    pub max_abandoned: Option<usize>,

    /// Prefix for worker and attempt thread names.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            retry_count: 0,
            timeout: Duration::ZERO,
            max_abandoned: Some(DEFAULT_MAX_ABANDONED),
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl PoolConfig {
    /// Creates a configuration with `workers` threads and defaults elsewhere.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    pub fn with_retry_count(mut self, retry_count: usize) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_abandoned(mut self, max_abandoned: Option<usize>) -> Self {
        self.max_abandoned = max_abandoned;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Whether attempts run against a deadline.
    pub fn timeout_enabled(&self) -> bool {
        !self.timeout.is_zero()
    }

    /// Checks the configuration before any thread is spawned.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.workers == 0 {
            return Err(PoolError::Config("worker count must be at least 1".to_string()));
        }
        if self.max_abandoned == Some(0) {
            return Err(PoolError::Config(
                "max_abandoned must be at least 1 or None".to_string(),
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(PoolError::Config("thread name prefix must not be empty".to_string()));
        }
        Ok(())
    }
}
