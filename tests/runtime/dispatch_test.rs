/*!
 * Dispatch Tests
 * Spawn-or-enqueue on create, vehicle reuse and least-served ordering on yield
 */

use crate::common::{drain, spin_for, Gate, TIMEOUT};
use pretty_assertions::assert_eq;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use uthread_runtime::{Resource, Runtime, RuntimeError, ThreadState};

#[test]
fn test_each_thread_runs_once() {
    let runtime = Runtime::new();
    runtime.initialize(2).unwrap();

    let (tx, rx) = mpsc::channel();
    for i in 0..3 {
        let tx = tx.clone();
        runtime
            .create_thread(move || {
                tx.send(i).unwrap();
            })
            .unwrap();
    }
    drop(tx);

    let mut seen: Vec<i32> = (0..3).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2]);

    drain(&runtime);
    let stats = runtime.stats().unwrap();
    assert_eq!(stats.threads_created, 3);
    assert_eq!(stats.threads_exited, 3);
    // Every thread got its vehicle from a fresh spawn or from an exiting thread
    assert_eq!(stats.vehicles_spawned + stats.vehicle_reuses, 3);
    assert_eq!(stats.active_vehicles, 0);
}

#[test]
fn test_saturated_create_enqueues() {
    let runtime = Runtime::new();
    runtime.initialize(2).unwrap();
    let gate = Gate::new();

    for _ in 0..2 {
        let gate = gate.clone();
        runtime.create_thread(move || gate.wait()).unwrap();
    }
    let stats = runtime.stats().unwrap();
    assert_eq!(stats.active_vehicles, 2);
    assert_eq!(stats.waiting_user_threads, 0);

    let gate3 = gate.clone();
    let third = runtime.create_thread(move || gate3.wait()).unwrap();
    let stats = runtime.stats().unwrap();
    assert!(stats.saturated());
    assert_eq!(stats.active_vehicles, 2);
    assert_eq!(stats.waiting_user_threads, 1);
    assert_eq!(stats.active_user_threads, 3);
    assert_eq!(
        runtime.thread_stats(third).unwrap().state,
        ThreadState::Waiting
    );

    gate.open();
    drain(&runtime);
    assert_eq!(runtime.stats().unwrap().threads_exited, 3);
}

#[test]
fn test_exit_reuses_vehicle_for_waiting_thread() {
    let runtime = Runtime::new();
    runtime.initialize(1).unwrap();
    let gate = Gate::new();
    let (tx, rx) = mpsc::channel();

    let (g, first_tx) = (gate.clone(), tx.clone());
    runtime
        .create_thread(move || {
            g.wait();
            first_tx.send(("first", thread::current().id())).unwrap();
        })
        .unwrap();
    runtime
        .create_thread(move || {
            tx.send(("second", thread::current().id())).unwrap();
        })
        .unwrap();

    gate.open();
    let (first, first_vehicle) = rx.recv_timeout(TIMEOUT).unwrap();
    let (second, second_vehicle) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!((first, second), ("first", "second"));
    assert_eq!(first_vehicle, second_vehicle);

    drain(&runtime);
    let stats = runtime.stats().unwrap();
    assert_eq!(stats.vehicles_spawned, 1);
    assert_eq!(stats.vehicle_reuses, 1);
    assert_eq!(stats.vehicles_retired, 1);
}

#[test]
fn test_queued_thread_takes_over_first_free_vehicle() {
    let runtime = Runtime::new();
    runtime.initialize(2).unwrap();
    let (first_gate, second_gate) = (Gate::new(), Gate::new());
    let (tx, rx) = mpsc::channel();

    let (g, first_tx) = (first_gate.clone(), tx.clone());
    runtime
        .create_thread(move || {
            g.wait();
            first_tx.send((1, thread::current().id())).unwrap();
        })
        .unwrap();
    let (g, second_tx) = (second_gate.clone(), tx.clone());
    runtime
        .create_thread(move || {
            g.wait();
            second_tx.send((2, thread::current().id())).unwrap();
        })
        .unwrap();
    let stats = runtime.stats().unwrap();
    assert_eq!(stats.active_vehicles, 2);
    assert_eq!(stats.waiting_user_threads, 0);

    runtime
        .create_thread(move || {
            tx.send((3, thread::current().id())).unwrap();
        })
        .unwrap();
    let stats = runtime.stats().unwrap();
    assert_eq!(stats.active_vehicles, 2);
    assert_eq!(stats.waiting_user_threads, 1);

    // Only the first thread exits; the queued one must inherit its vehicle
    first_gate.open();
    let (first, first_vehicle) = rx.recv_timeout(TIMEOUT).unwrap();
    let (third, third_vehicle) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!((first, third), (1, 3));
    assert_eq!(third_vehicle, first_vehicle);

    second_gate.open();
    let (second, second_vehicle) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(second, 2);
    assert_ne!(second_vehicle, first_vehicle);

    drain(&runtime);
    let stats = runtime.stats().unwrap();
    assert_eq!(stats.vehicles_spawned, 2);
    assert_eq!(stats.vehicle_reuses, 1);
    assert_eq!(stats.vehicles_retired, 2);
    assert_eq!(stats.active_vehicles, 0);
    assert_eq!(stats.threads_exited, 3);
}

#[test]
fn test_yield_alone_resumes_immediately() {
    let runtime = Runtime::new();
    runtime.initialize(1).unwrap();

    let (tx, rx) = mpsc::channel();
    let rt = runtime.clone();
    runtime
        .create_thread(move || {
            let before = thread::current().id();
            spin_for(Duration::from_millis(20));
            rt.yield_now().unwrap();
            let id = rt.current().unwrap();
            let charged = rt.thread_stats(id).unwrap().running_time();
            tx.send((before == thread::current().id(), charged)).unwrap();
        })
        .unwrap();

    let (same_vehicle, charged) = rx.recv_timeout(TIMEOUT).unwrap();
    assert!(same_vehicle);
    assert!(charged > Duration::ZERO);

    drain(&runtime);
    let stats = runtime.stats().unwrap();
    assert_eq!(stats.yields, 1);
    assert_eq!(stats.vehicle_reuses, 0);
    assert!(stats.exited_running_time_micros > 0);
}

#[test]
fn test_yield_prefers_least_served_thread() {
    let runtime = Runtime::new();
    runtime.initialize(1).unwrap();
    let gate = Gate::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let (rt, g, l) = (runtime.clone(), gate.clone(), Arc::clone(&log));
    runtime
        .create_thread(move || {
            g.wait();
            spin_for(Duration::from_millis(30));
            l.lock().unwrap().push("busy yields");
            rt.yield_now().unwrap();
            l.lock().unwrap().push("busy resumed");
        })
        .unwrap();

    let l = Arc::clone(&log);
    runtime
        .create_thread(move || {
            l.lock().unwrap().push("fresh ran");
        })
        .unwrap();

    gate.open();
    drain(&runtime);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["busy yields", "fresh ran", "busy resumed"]
    );
}

#[test]
fn test_thread_stats_while_running() {
    let runtime = Runtime::new();
    runtime.initialize(1).unwrap();
    let (tx, rx) = mpsc::channel();

    let rt = runtime.clone();
    let id = runtime
        .create_thread(move || {
            let me = rt.current().unwrap();
            tx.send(rt.thread_stats(me).unwrap().state).unwrap();
        })
        .unwrap();

    let state = rx.recv_timeout(TIMEOUT).unwrap();
    assert!(matches!(state, ThreadState::Running { .. }));

    drain(&runtime);
    assert_eq!(
        runtime.thread_stats(id).unwrap_err(),
        RuntimeError::ThreadNotFound(id)
    );
}

#[test]
fn test_user_thread_table_exhaustion() {
    let runtime = Runtime::builder()
        .max_vehicles(1)
        .max_user_threads(4)
        .build()
        .unwrap();
    let gate = Gate::new();

    for _ in 0..4 {
        let gate = gate.clone();
        runtime.create_thread(move || gate.wait()).unwrap();
    }

    let err = runtime.create_thread(|| {}).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::ResourceExhausted {
            resource: Resource::UserThreadSlots,
            limit: 4,
        }
    );
    // The failed create left nothing behind
    assert_eq!(runtime.stats().unwrap().active_user_threads, 4);

    gate.open();
    drain(&runtime);

    // Slots are reusable once threads exit
    runtime.create_thread(|| {}).unwrap();
    drain(&runtime);
}

#[test]
fn test_full_thread_capacity_is_usable() {
    let runtime = Runtime::new();
    runtime.initialize(1).unwrap();
    let gate = Gate::new();

    let g = gate.clone();
    runtime.create_thread(move || g.wait()).unwrap();
    for _ in 1..uthread_runtime::core::limits::MAX_USER_THREADS {
        runtime.create_thread(|| {}).unwrap();
    }

    let stats = runtime.stats().unwrap();
    assert_eq!(stats.active_user_threads, stats.max_user_threads);
    assert!(matches!(
        runtime.create_thread(|| {}),
        Err(RuntimeError::ResourceExhausted {
            resource: Resource::UserThreadSlots,
            ..
        })
    ));

    gate.open();
    drain(&runtime);
    assert_eq!(
        runtime.stats().unwrap().threads_exited,
        uthread_runtime::core::limits::MAX_USER_THREADS as u64
    );
}
