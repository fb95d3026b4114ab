use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the pool and its workers.
#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    pub submitted: AtomicU64,
    pub attempts: AtomicU64,
    pub retries: AtomicU64,
    pub timeouts: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub lost_workers: AtomicU64,
}

impl PoolStats {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Number of workers in the pool
    pub pool_size: usize,

    /// Workers currently waiting for work
    pub idle_workers: usize,

    /// Timed-out attempt threads that have not returned yet
    pub abandoned_attempts: usize,

    /// Tasks handed to a worker
    pub submitted: u64,

    /// Individual executions, retries included
    pub attempts: u64,

    /// Attempts beyond the first one
    pub retries: u64,

    /// Attempts that hit the deadline
    pub timeouts: u64,

    /// Tasks whose final outcome was a value
    pub succeeded: u64,

    /// Tasks whose final outcome was an error
    pub failed: u64,

    /// Worker indices taken for a dispatch that failed, never returned
    pub lost_workers: u64,
}

impl PoolMetrics {
    pub(crate) fn collect(
        stats: &PoolStats,
        pool_size: usize,
        idle_workers: usize,
        abandoned_attempts: usize,
    ) -> Self {
        Self {
            pool_size,
            idle_workers,
            abandoned_attempts,
            submitted: PoolStats::get(&stats.submitted),
            attempts: PoolStats::get(&stats.attempts),
            retries: PoolStats::get(&stats.retries),
            timeouts: PoolStats::get(&stats.timeouts),
            succeeded: PoolStats::get(&stats.succeeded),
            failed: PoolStats::get(&stats.failed),
            lost_workers: PoolStats::get(&stats.lost_workers),
        }
    }

    /// Tasks that reached a final outcome.
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }
}
