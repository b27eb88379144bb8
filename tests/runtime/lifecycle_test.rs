/*!
 * Runtime Lifecycle Tests
 * Initialization, configuration and calls made from the wrong place
 */

use crate::common::{drain, TIMEOUT};
use pretty_assertions::assert_eq;
use std::sync::mpsc;
use uthread_runtime::{Runtime, RuntimeConfig, RuntimeError};

#[test]
fn test_initialize_once() {
    let runtime = Runtime::new();
    assert!(!runtime.is_initialized());

    runtime.initialize(2).unwrap();
    assert!(runtime.is_initialized());
    assert_eq!(
        runtime.initialize(2).unwrap_err(),
        RuntimeError::DoubleInitialization
    );
    assert_eq!(
        runtime
            .initialize_with(RuntimeConfig::with_max_vehicles(4))
            .unwrap_err(),
        RuntimeError::DoubleInitialization
    );

    // The first configuration sticks
    assert_eq!(runtime.config().unwrap().max_vehicles, 2);
}

#[test]
fn test_uninitialized_runtime_rejects_work() {
    let runtime = Runtime::new();
    assert_eq!(
        runtime.create_thread(|| {}).unwrap_err(),
        RuntimeError::NotInitialized
    );
    assert_eq!(runtime.yield_now().unwrap_err(), RuntimeError::NotInitialized);
    assert_eq!(runtime.config().unwrap_err(), RuntimeError::NotInitialized);
}

#[test]
fn test_fresh_runtime_stats() {
    let runtime = Runtime::builder()
        .max_vehicles(3)
        .max_user_threads(16)
        .build()
        .unwrap();

    let stats = runtime.stats().unwrap();
    assert_eq!(stats.max_vehicles, 3);
    assert_eq!(stats.max_user_threads, 16);
    assert_eq!(stats.active_vehicles, 0);
    assert_eq!(stats.active_user_threads, 0);
    assert_eq!(stats.waiting_user_threads, 0);
    assert!(!stats.saturated());
    assert!(runtime.vehicle_stats().unwrap().is_empty());

    // Nothing to wait for
    runtime.wait_idle().unwrap();
}

#[test]
fn test_calls_from_outside_user_threads() {
    let runtime = Runtime::new();
    runtime.initialize(1).unwrap();

    assert_eq!(runtime.current(), None);
    assert_eq!(runtime.yield_now().unwrap_err(), RuntimeError::NotInUserThread);
}

#[test]
fn test_wait_idle_from_user_thread_is_refused() {
    let runtime = Runtime::new();
    runtime.initialize(1).unwrap();

    let (tx, rx) = mpsc::channel();
    let rt = runtime.clone();
    runtime
        .create_thread(move || {
            tx.send(rt.wait_idle()).unwrap();
        })
        .unwrap();

    assert_eq!(
        rx.recv_timeout(TIMEOUT).unwrap().unwrap_err(),
        RuntimeError::WouldDeadlock
    );
    drain(&runtime);
}

#[test]
fn test_runtimes_are_independent() {
    let first = Runtime::new();
    let second = Runtime::new();
    first.initialize(1).unwrap();
    second.initialize(1).unwrap();

    let (tx, rx) = mpsc::channel();
    let other = second.clone();
    first
        .create_thread(move || {
            tx.send((other.current(), other.yield_now())).unwrap();
        })
        .unwrap();

    let (current, yielded) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(current, None);
    assert_eq!(yielded.unwrap_err(), RuntimeError::NotInUserThread);
    drain(&first);
}
