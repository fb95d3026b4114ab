use std::time::Duration;
use thiserror::Error;

/// Errors describing why a task ended without a result.
///
/// Every variant counts as a failed attempt for retry purposes. The error of the
/// final attempt is what reaches the pool's error callback.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task failed: {0}")]
    Failed(#[source] anyhow::Error),
    #[error("Task timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Task panicked: {0}")]
    Panicked(String),
    #[error("Failed to spawn attempt thread: {0}")]
    Spawn(String),
}

impl TaskError {
    /// Returns true if the attempt was abandoned because its deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::TimedOut(_))
    }
}

/// Errors returned by the pool's own API.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    Config(String),
    #[error("Failed to spawn worker {index}: {reason}")]
    Spawn { index: usize, reason: String },
    #[error("Pool is closed")]
    Closed,
    #[error("No worker is free")]
    Busy,
    #[error("Worker {index} rejected dispatch: {reason}")]
    Dispatch { index: usize, reason: String },
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
    #[error("Internal pool error: {0}")]
    Other(#[from] anyhow::Error),
}
