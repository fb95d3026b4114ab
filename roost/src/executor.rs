//! # Task Execution
//!
//! Runs a single task to its final outcome on behalf of a worker.
//!
//! ## Retry
//! A task gets `retry_count + 1` attempts. Execution stops at the first success
//! or after the last attempt, whose outcome (success or failure) is final.
//! Retries are immediate.
//!
//! ## Timeout
//! With a zero timeout the callable runs directly on the worker thread. Otherwise
//! every attempt runs on its own thread and hands its combined outcome back over a
//! single bounded(1) channel that the worker reads once with a deadline. When the
//! deadline wins the attempt thread is abandoned: it keeps running, and whatever
//! it eventually produces is discarded.
//!
//! Abandoned threads are counted by an [`AbandonTracker`]. With a cap configured,
//! a worker waits for the count to drop below it before starting another timed
//! attempt.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use flume::RecvTimeoutError;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::error::TaskError;
use crate::metrics::PoolStats;
use crate::task::{Task, TaskId};

const RUNNING: u8 = 0;
const FINISHED: u8 = 1;
const ABANDONED: u8 = 2;

/// Counts attempt threads that outlived their deadline.
#[derive(Debug)]
pub(crate) struct AbandonTracker {
    running: Mutex<usize>,
    released: Condvar,
    limit: Option<usize>,
}

impl AbandonTracker {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            running: Mutex::new(0),
            released: Condvar::new(),
            limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks while the number of abandoned threads is at the cap.
    pub fn wait_for_capacity(&self) {
        let Some(limit) = self.limit else {
            return;
        };
        let mut running = self.lock();
        if *running >= limit {
            warn!(abandoned = *running, limit, "Abandoned attempt limit reached, waiting");
        }
        while *running >= limit {
            running = self
                .released
                .wait(running)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn abandon(&self) {
        *self.lock() += 1;
    }

    pub fn release(&self) {
        {
            let mut running = self.lock();
            *running = running.saturating_sub(1);
        }
        self.released.notify_all();
    }

    pub fn current(&self) -> usize {
        *self.lock()
    }
}

/// Retry and timeout policy shared by every worker of a pool.
#[derive(Debug)]
pub(crate) struct Executor {
    retry_count: usize,
    timeout: Duration,
    thread_name_prefix: String,
    abandoned: Arc<AbandonTracker>,
    stats: Arc<PoolStats>,
    dispatch: tracing::Dispatch,
}

impl Executor {
    pub fn new(config: &PoolConfig, stats: Arc<PoolStats>, dispatch: tracing::Dispatch) -> Self {
        Self {
            retry_count: config.retry_count,
            timeout: config.timeout,
            thread_name_prefix: config.thread_name_prefix.clone(),
            abandoned: Arc::new(AbandonTracker::new(config.max_abandoned)),
            stats,
            dispatch,
        }
    }

    pub fn abandoned(&self) -> usize {
        self.abandoned.current()
    }

    /// Drives `task` through every allowed attempt and returns the final outcome.
    pub fn run<T: Send + 'static>(
        &self,
        worker: usize,
        id: TaskId,
        task: &Task<T>,
    ) -> Result<T, TaskError> {
        let mut attempt = 0;
        loop {
            PoolStats::incr(&self.stats.attempts);
            let outcome = if self.timeout.is_zero() {
                task.invoke()
            } else {
                self.attempt_with_timeout(worker, task)
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if err.is_timeout() {
                PoolStats::incr(&self.stats.timeouts);
            }
            if attempt >= self.retry_count {
                crate::log_task!(id, "retries_exhausted", worker, attempts = attempt + 1, error = %err);
                return Err(err);
            }
            crate::log_task!(id, "retrying", worker, attempt, error = %err);

            attempt += 1;
            PoolStats::incr(&self.stats.retries);
        }
    }

    fn attempt_with_timeout<T: Send + 'static>(
        &self,
        worker: usize,
        task: &Task<T>,
    ) -> Result<T, TaskError> {
        self.abandoned.wait_for_capacity();

        let (tx, rx) = flume::bounded(1);
        let state = Arc::new(AtomicU8::new(RUNNING));

        let job = task.clone();
        let thread_state = Arc::clone(&state);
        let tracker = Arc::clone(&self.abandoned);
        let dispatch = self.dispatch.clone();

        thread::Builder::new()
            .name(format!("{}-attempt-{}", self.thread_name_prefix, worker))
            .spawn(move || {
                let _guard = tracing::dispatcher::set_default(&dispatch);
                let outcome = job.invoke();
                if thread_state
                    .compare_exchange(RUNNING, FINISHED, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    debug!(worker, "Abandoned attempt returned, outcome discarded");
                    tracker.release();
                    return;
                }
                // Capacity 1 and a single send: never blocks.
                let _ = tx.try_send(outcome);
            })
            .map_err(|e| TaskError::Spawn(e.to_string()))?;

        let received = match Instant::now().checked_add(self.timeout) {
            Some(deadline) => rx.recv_deadline(deadline),
            // No representable deadline, so the attempt can never time out.
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                // Count first so the attempt thread never releases an unrecorded abandon.
                self.abandoned.abandon();
                if state
                    .compare_exchange(RUNNING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    self.abandoned.release();
                }
                Err(TaskError::TimedOut(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Panicked(
                "attempt thread exited without an outcome".to_string(),
            )),
        }
    }
}
