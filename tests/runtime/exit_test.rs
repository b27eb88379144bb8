/*!
 * Exit Tests
 * Explicit exit, stack unwinding of exited threads and panicking threads
 */

use crate::common::{drain, Gate, TIMEOUT};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use uthread_runtime::Runtime;

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_explicit_exit_stops_thread() {
    let runtime = Runtime::new();
    runtime.initialize(1).unwrap();
    let after_exit = Arc::new(AtomicBool::new(false));

    let (rt, flag) = (runtime.clone(), Arc::clone(&after_exit));
    runtime
        .create_thread(move || {
            rt.exit();
            #[allow(unreachable_code)]
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    drain(&runtime);
    assert!(!after_exit.load(Ordering::SeqCst));
    assert_eq!(runtime.stats().unwrap().threads_exited, 1);
}

#[test]
fn test_exit_unwinds_thread_stack() {
    let runtime = Runtime::new();
    runtime.initialize(1).unwrap();
    let dropped = Arc::new(AtomicBool::new(false));

    let (rt, flag) = (runtime.clone(), Arc::clone(&dropped));
    runtime
        .create_thread(move || {
            let _guard = DropFlag(flag);
            rt.exit();
        })
        .unwrap();

    drain(&runtime);
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn test_exit_hands_vehicle_to_waiting_thread() {
    let runtime = Runtime::new();
    runtime.initialize(1).unwrap();
    let gate = Gate::new();
    let (tx, rx) = mpsc::channel();

    let (rt, g, first_tx) = (runtime.clone(), gate.clone(), tx.clone());
    runtime
        .create_thread(move || {
            g.wait();
            first_tx.send(thread::current().id()).unwrap();
            rt.exit();
        })
        .unwrap();
    runtime
        .create_thread(move || {
            tx.send(thread::current().id()).unwrap();
        })
        .unwrap();

    gate.open();
    let first = rx.recv_timeout(TIMEOUT).unwrap();
    let second = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(first, second);

    drain(&runtime);
    assert_eq!(runtime.stats().unwrap().vehicles_spawned, 1);
}

#[test]
fn test_panicking_thread_counts_as_exit() {
    let runtime = Runtime::new();
    runtime.initialize(1).unwrap();

    runtime
        .create_thread(|| panic!("user thread failure"))
        .unwrap();
    drain(&runtime);

    let stats = runtime.stats().unwrap();
    assert_eq!(stats.threads_exited, 1);
    assert_eq!(stats.threads_panicked, 1);
    assert_eq!(stats.active_vehicles, 0);

    // The runtime keeps working afterwards
    let ran = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&ran);
    runtime
        .create_thread(move || {
            r.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    drain(&runtime);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}
