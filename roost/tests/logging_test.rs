// Integration tests for log propagation into pool threads

use std::io;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use roost::{Pool, PoolConfig};
use tracing::Level;

mod common;
use common::recording_callbacks;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[test]
fn worker_threads_inherit_subscriber() {
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let (callbacks, recorder) = recording_callbacks::<()>();
    let pool = tracing::subscriber::with_default(subscriber, || {
        Pool::new(PoolConfig::new(1).with_retry_count(1), callbacks).unwrap()
    });

    // Submitted outside the scoped subscriber: only the worker thread can log it.
    let id = pool.submit(|| Err(anyhow!("flaky"))).unwrap();
    recorder.next_error();
    pool.shutdown().unwrap();

    let logs = buffer.contents();
    assert!(logs.contains("Pool started"));
    assert!(logs.contains("retrying"));
    assert!(logs.contains("retries_exhausted"));
    assert!(logs.contains(&id.to_string()));
    assert!(logs.contains("stopped"));
}
