// Integration tests for per-attempt timeouts

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use roost::{Pool, PoolConfig, TaskError};

mod common;
use common::{recording_callbacks, wait_for};

fn current_thread_name() -> String {
    thread::current().name().unwrap_or_default().to_string()
}

#[test]
fn disabled_timeout_never_times_out() {
    let (callbacks, recorder) = recording_callbacks::<String>();
    let pool = Pool::new(PoolConfig::new(1), callbacks).unwrap();

    pool.submit(|| {
        thread::sleep(Duration::from_millis(150));
        Ok(current_thread_name())
    })
    .unwrap();

    // Runs inline on the worker thread, no attempt thread involved.
    assert_eq!(recorder.next_result(), "roost-worker-0");
    let metrics = pool.metrics();
    pool.shutdown().unwrap();

    assert_eq!(metrics.timeouts, 0);
    assert!(recorder.is_drained());
}

#[test]
fn slow_attempt_yields_timeout_error() {
    let (callbacks, recorder) = recording_callbacks::<()>();
    let timeout = Duration::from_millis(30);
    let pool = Pool::new(PoolConfig::new(1).with_timeout(timeout), callbacks).unwrap();

    pool.submit(|| {
        thread::sleep(Duration::from_millis(300));
        Ok(())
    })
    .unwrap();

    match recorder.next_error() {
        TaskError::TimedOut(d) => assert_eq!(d, timeout),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(pool.metrics().timeouts, 1);
    pool.shutdown().unwrap();
}

#[test]
fn fast_attempt_keeps_its_own_outcome() {
    let (callbacks, recorder) = recording_callbacks::<String>();
    let pool = Pool::new(
        PoolConfig::new(1).with_timeout(Duration::from_secs(2)),
        callbacks,
    )
    .unwrap();

    pool.submit(|| Ok(current_thread_name())).unwrap();
    assert_eq!(recorder.next_result(), "roost-attempt-0");

    pool.submit(|| Err(anyhow!("real failure"))).unwrap();
    match recorder.next_error() {
        TaskError::Failed(err) => assert_eq!(err.to_string(), "real failure"),
        other => panic!("unexpected error: {}", other),
    }

    let metrics = pool.metrics();
    pool.shutdown().unwrap();
    assert_eq!(metrics.timeouts, 0);
}

#[test]
fn timed_out_attempt_is_retried() {
    let (callbacks, recorder) = recording_callbacks::<usize>();
    let pool = Pool::new(
        PoolConfig::new(1)
            .with_retry_count(2)
            .with_timeout(Duration::from_millis(30)),
        callbacks,
    )
    .unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    pool.submit(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if n == 1 {
            thread::sleep(Duration::from_millis(300));
        }
        Ok(n)
    })
    .unwrap();

    assert_eq!(recorder.next_result(), 2);
    let metrics = pool.metrics();
    pool.shutdown().unwrap();

    assert_eq!(metrics.timeouts, 1);
    assert_eq!(metrics.attempts, 2);
    assert!(recorder.errors.is_empty());
}

#[test]
fn late_result_of_abandoned_attempt_is_discarded() {
    let (callbacks, recorder) = recording_callbacks::<&'static str>();
    let pool = Pool::new(
        PoolConfig::new(1).with_timeout(Duration::from_millis(20)),
        callbacks,
    )
    .unwrap();

    pool.submit(|| {
        thread::sleep(Duration::from_millis(100));
        Ok("too late")
    })
    .unwrap();

    assert!(recorder.next_error().is_timeout());
    assert_eq!(pool.metrics().abandoned_attempts, 1);

    assert!(wait_for(|| pool.metrics().abandoned_attempts == 0));
    thread::sleep(Duration::from_millis(50));
    assert!(recorder.results.is_empty());
    pool.shutdown().unwrap();
}

#[test]
fn two_workers_deliver_both_results_within_timeout() {
    let (callbacks, recorder) = recording_callbacks::<&'static str>();
    let pool = Pool::new(
        PoolConfig::new(2).with_timeout(Duration::from_secs(2)),
        callbacks,
    )
    .unwrap();

    pool.submit(|| {
        thread::sleep(Duration::from_millis(50));
        Ok("R1")
    })
    .unwrap();
    pool.submit(|| {
        thread::sleep(Duration::from_millis(50));
        Ok("R2")
    })
    .unwrap();

    let seen: HashSet<_> = [recorder.next_result(), recorder.next_result()]
        .into_iter()
        .collect();
    pool.shutdown().unwrap();

    assert_eq!(seen, HashSet::from(["R1", "R2"]));
    assert!(recorder.errors.is_empty());
}

#[test]
fn abandoned_limit_delays_next_timed_attempt() {
    let (callbacks, recorder) = recording_callbacks::<&'static str>();
    let pool = Pool::new(
        PoolConfig::new(1)
            .with_timeout(Duration::from_millis(20))
            .with_max_abandoned(Some(1)),
        callbacks,
    )
    .unwrap();

    let started = Instant::now();
    pool.submit(|| {
        thread::sleep(Duration::from_millis(300));
        Ok("slow")
    })
    .unwrap();
    assert!(recorder.next_error().is_timeout());

    pool.submit(|| Ok("fast")).unwrap();
    assert_eq!(recorder.next_result(), "fast");

    // The second attempt could only start once the abandoned one returned.
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(pool.metrics().abandoned_attempts, 0);
    pool.shutdown().unwrap();
}

#[test]
fn unbounded_abandoned_attempts_do_not_delay() {
    let (callbacks, recorder) = recording_callbacks::<&'static str>();
    let pool = Pool::new(
        PoolConfig::new(1)
            .with_timeout(Duration::from_millis(20))
            .with_max_abandoned(None),
        callbacks,
    )
    .unwrap();

    let started = Instant::now();
    pool.submit(|| {
        thread::sleep(Duration::from_millis(1000));
        Ok("slow")
    })
    .unwrap();
    assert!(recorder.next_error().is_timeout());

    pool.submit(|| Ok("fast")).unwrap();
    assert_eq!(recorder.next_result(), "fast");
    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(pool.metrics().abandoned_attempts, 1);
    pool.shutdown().unwrap();
}

#[test]
fn huge_timeout_behaves_like_no_deadline() {
    let (callbacks, recorder) = recording_callbacks::<u32>();
    let pool = Pool::new(PoolConfig::new(1).with_timeout(Duration::MAX), callbacks).unwrap();

    pool.submit(|| Ok(7)).unwrap();
    assert_eq!(recorder.next_result(), 7);

    // The worker survived and is still available.
    pool.submit(|| Ok(8)).unwrap();
    assert_eq!(recorder.next_result(), 8);

    let metrics = pool.metrics();
    pool.shutdown().unwrap();
    assert_eq!(metrics.timeouts, 0);
    assert!(recorder.is_drained());
}
