use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use anyhow::anyhow;
use tracing::{debug, error, info};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::executor::Executor;
use crate::idle::{IdleQueue, idle_queue};
use crate::inbox::{Envelope, InboxSender, inbox};
use crate::logging;
use crate::metrics::{PoolMetrics, PoolStats};
use crate::task::{Callbacks, Task, TaskId};
use crate::worker::{Worker, WorkerStatus};

struct WorkerHandle<T> {
    index: usize,
    inbox: Option<InboxSender<T>>,
    status: Arc<AtomicUsize>,
    thread: Option<JoinHandle<()>>,
}

/// A fixed set of worker threads fed through single-slot inboxes.
///
/// `Pool` hands each submitted task to whichever worker reported itself free
/// next. The worker runs the task with the configured retry and timeout policy,
/// passes the final outcome to the [`Callbacks`] and becomes free again.
///
/// # Backpressure
/// Every worker holds at most one task. `submit` blocks and `submit_async`
/// suspends while all workers are busy; `try_submit` returns
/// [`PoolError::Busy`] instead.
///
/// # Shutdown
/// [`Pool::shutdown`] closes every inbox and joins the worker threads after
/// their current task is done. Dropping the pool closes the inboxes too but
/// does not wait.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use roost::{Callbacks, Pool, PoolConfig};
///
/// let (tx, rx) = std::sync::mpsc::channel();
/// let callbacks = Callbacks::new().on_result(move |n: Option<u64>| {
///     let _ = tx.send(n);
/// });
/// let config = PoolConfig::new(2)
///     .with_retry_count(1)
///     .with_timeout(Duration::from_secs(1));
///
/// let pool = Pool::new(config, callbacks).unwrap();
/// pool.submit(|| Ok(6 * 7)).unwrap();
/// assert_eq!(rx.recv().unwrap(), Some(42));
/// pool.shutdown().unwrap();
/// ```
pub struct Pool<T> {
    config: PoolConfig,
    workers: Vec<WorkerHandle<T>>,
    idle: IdleQueue,
    executor: Arc<Executor>,
    stats: Arc<PoolStats>,
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("workers", &self.workers.len())
            .field("idle", &self.idle.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Validates `config` and spawns every worker thread.
    pub fn new(config: PoolConfig, callbacks: Callbacks<T>) -> Result<Self, PoolError> {
        config.validate()?;

        let span = crate::pool_span!(config.thread_name_prefix.as_str(), workers = config.workers);
        let _entered = span.enter();

        let dispatch = logging::current_subscriber();
        let stats = Arc::new(PoolStats::default());
        let executor = Arc::new(Executor::new(&config, Arc::clone(&stats), dispatch.clone()));
        let callbacks = Arc::new(callbacks);
        let (reporter, idle) = idle_queue(config.workers);

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let (sender, receiver) = inbox();
            let status = Arc::new(AtomicUsize::new(WorkerStatus::Idle as usize));
            let worker = Worker::new(
                index,
                receiver,
                reporter.clone(),
                Arc::clone(&executor),
                Arc::clone(&callbacks),
                Arc::clone(&stats),
                Arc::clone(&status),
                dispatch.clone(),
            );
            let thread = worker
                .spawn(format!("{}-worker-{}", config.thread_name_prefix, index))
                .map_err(|e| PoolError::Spawn {
                    index,
                    reason: e.to_string(),
                })?;

            workers.push(WorkerHandle {
                index,
                inbox: Some(sender),
                status,
                thread: Some(thread),
            });
        }
        // Only workers may report from here on; if they all exit, acquiring fails
        // instead of blocking forever.
        drop(reporter);

        info!(
            workers = config.workers,
            retry_count = config.retry_count,
            timeout = ?config.timeout,
            max_abandoned = ?config.max_abandoned,
            "Pool started"
        );

        Ok(Self {
            config,
            workers,
            idle,
            executor,
            stats,
        })
    }

    /// Hands `f` to the next free worker, blocking while every worker is busy.
    pub fn submit<F>(&self, f: F) -> Result<TaskId, PoolError>
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.submit_task(Task::new(f))
    }

    pub fn submit_task(&self, task: Task<T>) -> Result<TaskId, PoolError> {
        let index = self.idle.acquire()?;
        self.dispatch(index, task)
    }

    /// Like [`Pool::submit`], but waits for a free worker without blocking the
    /// calling thread. Dropping the future before it completes leaves the pool
    /// untouched.
    pub async fn submit_async<F>(&self, f: F) -> Result<TaskId, PoolError>
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let index = self.idle.acquire_async().await?;
        self.dispatch(index, Task::new(f))
    }

    /// Hands `f` to a free worker or fails with [`PoolError::Busy`].
    pub fn try_submit<F>(&self, f: F) -> Result<TaskId, PoolError>
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let index = self.idle.try_acquire()?;
        self.dispatch(index, Task::new(f))
    }

    /// Takes the next free worker and wakes it without work. The worker reports
    /// itself free again right away. Returns the index of the woken worker.
    pub fn wake(&self) -> Result<usize, PoolError> {
        let index = self.idle.acquire()?;
        self.deliver(index, Envelope::Wake)?;
        Ok(index)
    }

    fn dispatch(&self, index: usize, task: Task<T>) -> Result<TaskId, PoolError> {
        let id = TaskId::new();
        self.deliver(index, Envelope::Run { id, task })?;
        PoolStats::incr(&self.stats.submitted);
        crate::log_task!(id, "assigned", worker = index);
        Ok(id)
    }

    /// Places `envelope` in the inbox of the worker that owns `index`.
    ///
    /// On failure the index is not returned to the idle queue, so the pool has
    /// one worker less from then on.
    fn deliver(&self, index: usize, envelope: Envelope<T>) -> Result<(), PoolError> {
        let delivered = match self.workers.get(index) {
            None => Err(PoolError::Dispatch {
                index,
                reason: "unknown worker".to_string(),
            }),
            Some(WorkerHandle { inbox: None, .. }) => Err(PoolError::Closed),
            Some(WorkerHandle {
                inbox: Some(inbox), ..
            }) => inbox.deliver(envelope).map_err(|e| PoolError::Dispatch {
                index,
                reason: e.to_string(),
            }),
        };

        if let Err(err) = &delivered {
            PoolStats::incr(&self.stats.lost_workers);
            let lost = PoolStats::get(&self.stats.lost_workers);
            error!(
                worker = index,
                error = %err,
                remaining = (self.workers.len() as u64).saturating_sub(lost),
                "Dispatch failed, worker lost"
            );
        }
        delivered
    }

    /// Closes every inbox and waits for the workers to finish their current and
    /// queued tasks.
    ///
    /// Timed-out attempt threads that are still running are not waited for.
    pub fn shutdown(mut self) -> Result<(), PoolError> {
        let mut workers = std::mem::take(&mut self.workers);
        for handle in &mut workers {
            handle.inbox.take();
        }

        let mut result = Ok(());
        for handle in workers {
            let Some(thread) = handle.thread else {
                continue;
            };
            if thread.join().is_err() {
                error!(worker = handle.index, "Worker thread panicked");
                if result.is_ok() {
                    result = Err(PoolError::WorkerPanicked(handle.index));
                }
            }
        }

        info!(
            abandoned = self.executor.abandoned(),
            "Pool shut down"
        );
        result
    }

    /// [`Pool::shutdown`] on tokio's blocking thread pool.
    pub async fn shutdown_async(self) -> Result<(), PoolError> {
        tokio::task::spawn_blocking(move || self.shutdown())
            .await
            .map_err(|e| PoolError::Other(anyhow!("shutdown task failed: {}", e)))?
    }
}

impl<T> Pool<T> {
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    /// Workers currently free to take a task.
    pub fn idle_workers(&self) -> usize {
        self.idle.len()
    }

    pub fn worker_statuses(&self) -> Vec<WorkerStatus> {
        self.workers
            .iter()
            .map(|w| WorkerStatus::from_usize(w.status.load(Ordering::Acquire)))
            .collect()
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics::collect(
            &self.stats,
            self.workers.len(),
            self.idle.len(),
            self.executor.abandoned(),
        )
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            debug!(
                workers = self.workers.len(),
                "Pool dropped without shutdown, closing inboxes"
            );
        }
    }
}
