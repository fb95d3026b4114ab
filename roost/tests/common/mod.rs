// Shared helpers for pool integration tests

#![allow(dead_code)]

use std::time::Duration;

use roost::{Callbacks, TaskError};

/// Upper bound for waiting on a callback in tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Receives everything the pool callbacks were handed.
pub struct Recorder<T> {
    pub results: flume::Receiver<T>,
    pub errors: flume::Receiver<TaskError>,
}

impl<T> Recorder<T> {
    pub fn next_result(&self) -> T {
        self.results
            .recv_timeout(WAIT)
            .expect("no result delivered in time")
    }

    pub fn next_error(&self) -> TaskError {
        self.errors
            .recv_timeout(WAIT)
            .expect("no error delivered in time")
    }

    /// True when nothing else was delivered to either callback.
    pub fn is_drained(&self) -> bool {
        self.results.is_empty() && self.errors.is_empty()
    }
}

pub fn recording_callbacks<T: Send + 'static>() -> (Callbacks<T>, Recorder<T>) {
    let (result_tx, results) = flume::unbounded();
    let (error_tx, errors) = flume::unbounded();
    let callbacks = Callbacks::new()
        .on_result(move |value: Option<T>| {
            // Failures go to the error callback, so a value is always present.
            if let Some(value) = value {
                let _ = result_tx.send(value);
            }
        })
        .on_error(move |err: TaskError| {
            let _ = error_tx.send(err);
        });
    (callbacks, Recorder { results, errors })
}

/// Polls `condition` until it holds or `WAIT` elapses.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + WAIT;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
