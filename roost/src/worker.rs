//! # Worker Thread Implementation
//!
//! Each worker runs a dispatch loop on a dedicated OS thread and pulls envelopes
//! from its single-slot inbox.
//!
//! ## Core Algorithm
//! 1. Block until an envelope arrives or the inbox is closed
//! 2. Run the task through the [`Executor`] (retry and timeout)
//! 3. Hand the final outcome to the pool callbacks
//! 4. Report the worker index back to the idle queue
//! 5. Repeat until the inbox is closed and drained
//!
//! Step 4 happens for every envelope, including wake-ups, failed tasks and
//! panicking callbacks. A worker only stops being reusable when its thread exits.

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{error, trace};

use crate::executor::Executor;
use crate::idle::IdleReporter;
use crate::inbox::{Envelope, InboxReceiver};
use crate::metrics::PoolStats;
use crate::task::{Callbacks, Task, TaskId, panic_message};

/// Status codes for worker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Waiting for an envelope
    Idle = 0,

    /// Executing a task or delivering its outcome
    Processing = 1,

    /// Inbox closed, thread exited
    Stopped = 2,
}

impl WorkerStatus {
    pub(crate) fn from_usize(value: usize) -> Self {
        match value {
            0 => WorkerStatus::Idle,
            1 => WorkerStatus::Processing,
            _ => WorkerStatus::Stopped,
        }
    }
}

pub(crate) struct Worker<T> {
    index: usize,
    inbox: InboxReceiver<T>,
    idle: IdleReporter,
    executor: Arc<Executor>,
    callbacks: Arc<Callbacks<T>>,
    stats: Arc<PoolStats>,
    status: Arc<AtomicUsize>,
    dispatch: tracing::Dispatch,
}

impl<T> fmt::Debug for Worker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("index", &self.index)
            .field(
                "status",
                &WorkerStatus::from_usize(self.status.load(Ordering::Relaxed)),
            )
            .finish()
    }
}

impl<T: Send + 'static> Worker<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        inbox: InboxReceiver<T>,
        idle: IdleReporter,
        executor: Arc<Executor>,
        callbacks: Arc<Callbacks<T>>,
        stats: Arc<PoolStats>,
        status: Arc<AtomicUsize>,
        dispatch: tracing::Dispatch,
    ) -> Self {
        Self {
            index,
            inbox,
            idle,
            executor,
            callbacks,
            stats,
            status,
            dispatch,
        }
    }

    /// Starts the dispatch loop on a new thread.
    pub fn spawn(self, thread_name: String) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(thread_name)
            .spawn(move || self.run())
    }

    fn run(self) {
        let _dispatch = tracing::dispatcher::set_default(&self.dispatch);
        let span = crate::worker_span!(self.index);
        let _entered = span.enter();
        crate::log_worker!(self.index, "started");

        while let Some(envelope) = self.inbox.next() {
            self.set_status(WorkerStatus::Processing);
            match envelope {
                Envelope::Run { id, task } => self.process(id, &task),
                Envelope::Wake => trace!(worker = self.index, "Woken without work"),
            }
            self.set_status(WorkerStatus::Idle);
            self.idle.report(self.index);
        }

        self.set_status(WorkerStatus::Stopped);
        crate::log_worker!(self.index, "stopped");
    }

    fn process(&self, id: TaskId, task: &Task<T>) {
        let worker = self.index;
        crate::log_task!(id, "started", worker);

        let outcome = self.executor.run(worker, id, task);
        match &outcome {
            Ok(_) => PoolStats::incr(&self.stats.succeeded),
            Err(_) => PoolStats::incr(&self.stats.failed),
        }

        let callbacks = &self.callbacks;
        match panic::catch_unwind(AssertUnwindSafe(|| callbacks.deliver(outcome))) {
            Ok(delivery) => crate::log_task!(id, "delivered", worker, delivery = ?delivery),
            Err(payload) => error!(
                task_id = %id,
                worker,
                panic = %panic_message(payload),
                "Outcome callback panicked"
            ),
        }
    }

    fn set_status(&self, status: WorkerStatus) {
        self.status.store(status as usize, Ordering::Release);
    }
}
