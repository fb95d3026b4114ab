//! Task and callback types.
//!
//! A [`Task`] is a zero-argument callable that returns `anyhow::Result<T>`. It is
//! reference counted so a worker can invoke it again for a retry, or move a
//! handle onto an attempt thread when a timeout is configured.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::TaskError;

/// Identifier assigned to every submitted task, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type TaskFn<T> = dyn Fn() -> anyhow::Result<T> + Send + Sync;

/// A unit of work executed by a worker.
///
/// Retried tasks are invoked again from scratch, so callables should be safe
/// to run more than once.
pub struct Task<T> {
    run: Arc<TaskFn<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

impl<T> Task<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self { run: Arc::new(f) }
    }

    /// Runs the callable once. A panic is caught and reported as a failed attempt.
    pub(crate) fn invoke(&self) -> Result<T, TaskError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.run)())) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(TaskError::Failed(err)),
            Err(payload) => Err(TaskError::Panicked(panic_message(payload))),
        }
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}

pub type ResultCallback<T> = Arc<dyn Fn(Option<T>) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(TaskError) + Send + Sync>;

/// Which callback, if any, received a task's final outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Result,
    Error,
    Dropped,
}

/// Pool-wide outcome callbacks.
///
/// Captured once when the pool is built and shared read-only by every worker,
/// so both callbacks may run concurrently on different worker threads.
pub struct Callbacks<T> {
    on_result: Option<ResultCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self {
            on_result: None,
            on_error: None,
        }
    }
}

impl<T> fmt::Debug for Callbacks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_result", &self.on_result.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl<T> Callbacks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receives the value of every task that finished without an error.
    ///
    /// Without an error callback it also receives failed tasks, as `None`.
    pub fn on_result<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<T>) + Send + Sync + 'static,
    {
        self.on_result = Some(Arc::new(f));
        self
    }

    /// Receives the final error of every task whose last attempt failed.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(TaskError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Routes a final outcome to at most one callback.
    ///
    /// Errors go to the error callback when one is registered. Everything else
    /// goes to the result callback, a failure arriving there as `None`. With
    /// neither callback the outcome is dropped.
    pub(crate) fn deliver(&self, outcome: Result<T, TaskError>) -> Delivery {
        let value = match outcome {
            Ok(value) => Some(value),
            Err(err) => match &self.on_error {
                Some(callback) => {
                    callback(err);
                    return Delivery::Error;
                }
                None => {
                    tracing::warn!(error = %err, "Task failed with no error callback registered");
                    None
                }
            },
        };

        match &self.on_result {
            Some(callback) => {
                callback(value);
                Delivery::Result
            }
            None => {
                tracing::trace!("Task outcome dropped, no result callback registered");
                Delivery::Dropped
            }
        }
    }
}
