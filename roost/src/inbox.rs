//! Single-slot worker inbox.
//!
//! Each worker owns one inbox backed by a flume channel of capacity 1. The pool is
//! the only producer and the worker the only consumer. The pool writes into an
//! inbox only after taking that worker's index from the idle queue, and the worker
//! reports its index only after draining the inbox, so a delivery never finds the
//! slot occupied.

use flume::{Receiver, Sender, TrySendError};

use crate::task::{Task, TaskId};

/// A message travelling through an inbox.
#[derive(Debug)]
pub(crate) enum Envelope<T> {
    /// Execute `task`.
    Run { id: TaskId, task: Task<T> },
    /// Wake the worker without work. It reports itself idle immediately.
    Wake,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InboxError {
    /// The slot still holds an undelivered envelope.
    Occupied,
    /// The worker is gone.
    Closed,
}

impl std::fmt::Display for InboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InboxError::Occupied => write!(f, "inbox slot is occupied"),
            InboxError::Closed => write!(f, "inbox is closed"),
        }
    }
}

/// Creates a connected inbox pair.
pub(crate) fn inbox<T>() -> (InboxSender<T>, InboxReceiver<T>) {
    let (sender, receiver) = flume::bounded(1);
    (InboxSender { sender }, InboxReceiver { receiver })
}

/// Producer half, held by the pool. Dropping it closes the inbox.
#[derive(Debug)]
pub(crate) struct InboxSender<T> {
    sender: Sender<Envelope<T>>,
}

impl<T> InboxSender<T> {
    /// Places an envelope in the slot without blocking.
    pub(crate) fn deliver(&self, envelope: Envelope<T>) -> Result<(), InboxError> {
        self.sender.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => InboxError::Occupied,
            TrySendError::Disconnected(_) => InboxError::Closed,
        })
    }
}

/// Consumer half, owned by the worker thread.
#[derive(Debug)]
pub(crate) struct InboxReceiver<T> {
    receiver: Receiver<Envelope<T>>,
}

impl<T> InboxReceiver<T> {
    /// Blocks until an envelope arrives. Returns `None` once the inbox is closed
    /// and empty.
    pub(crate) fn next(&self) -> Option<Envelope<T>> {
        self.receiver.recv().ok()
    }
}
