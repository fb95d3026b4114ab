//! Free-worker index queue.
//!
//! A flume channel whose capacity equals the worker count. Every index is in the
//! queue at most once, so reporting never finds the queue full and never blocks.

use flume::{Receiver, Sender, TryRecvError, TrySendError};

use crate::error::PoolError;

/// Creates the queue pre-filled with `0..workers`.
///
/// The returned reporter is the only sender; clones go to the workers and the
/// original should be dropped once they are spawned, so that acquisition fails
/// with [`PoolError::Closed`] if every worker is gone.
pub(crate) fn idle_queue(workers: usize) -> (IdleReporter, IdleQueue) {
    let (sender, receiver) = flume::bounded(workers);
    for index in 0..workers {
        // Capacity equals the number of indices pushed here.
        let _ = sender.try_send(index);
    }
    (IdleReporter { sender }, IdleQueue { receiver })
}

/// Worker-side handle used to mark a worker free again.
#[derive(Debug, Clone)]
pub(crate) struct IdleReporter {
    sender: Sender<usize>,
}

impl IdleReporter {
    /// Returns `index` to the queue. Never blocks.
    pub(crate) fn report(&self, index: usize) {
        match self.sender.try_send(index) {
            Ok(()) => {}
            Err(TrySendError::Disconnected(_)) => {
                tracing::trace!(worker = index, "Idle queue closed, pool is gone");
            }
            Err(TrySendError::Full(_)) => {
                tracing::error!(worker = index, "Idle queue full, worker index reported twice");
            }
        }
    }
}

/// Pool-side handle used to pick the next free worker.
#[derive(Debug)]
pub(crate) struct IdleQueue {
    receiver: Receiver<usize>,
}

impl IdleQueue {
    /// Blocks until a worker is free.
    pub(crate) fn acquire(&self) -> Result<usize, PoolError> {
        self.receiver.recv().map_err(|_| PoolError::Closed)
    }

    /// Waits for a free worker without blocking the thread. Cancel-safe: an index
    /// is only taken out of the queue when the future completes.
    pub(crate) async fn acquire_async(&self) -> Result<usize, PoolError> {
        self.receiver
            .recv_async()
            .await
            .map_err(|_| PoolError::Closed)
    }

    pub(crate) fn try_acquire(&self) -> Result<usize, PoolError> {
        self.receiver.try_recv().map_err(|e| match e {
            TryRecvError::Empty => PoolError::Busy,
            TryRecvError::Disconnected => PoolError::Closed,
        })
    }

    /// Number of workers currently free.
    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }

}
