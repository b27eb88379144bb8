/*!
 * Lock-Free Runtime Counters
 * Atomic counters bumped on create, exit, yield and vehicle lifecycle events
 */

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic event counters
///
/// # Performance
/// - Cache-line aligned to prevent false sharing between vehicles
/// - All operations use relaxed ordering; each counter is exact on its own
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub(crate) struct AtomicRuntimeStats {
    threads_created: AtomicU64,
    threads_exited: AtomicU64,
    threads_panicked: AtomicU64,
    yields: AtomicU64,
    vehicle_reuses: AtomicU64,
    vehicles_spawned: AtomicU64,
    vehicles_retired: AtomicU64,
    spawn_failures: AtomicU64,
}

/// Point-in-time copy of [`AtomicRuntimeStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counters {
    pub threads_created: u64,
    pub threads_exited: u64,
    pub threads_panicked: u64,
    pub yields: u64,
    pub vehicle_reuses: u64,
    pub vehicles_spawned: u64,
    pub vehicles_retired: u64,
    pub spawn_failures: u64,
}

impl AtomicRuntimeStats {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn inc_created(&self) {
        self.threads_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Take back a create whose vehicle could not be spawned
    #[inline(always)]
    pub fn withdraw_created(&self) {
        self.threads_created.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_exited(&self, panicked: bool) {
        self.threads_exited.fetch_add(1, Ordering::Relaxed);
        if panicked {
            self.threads_panicked.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    pub fn inc_yields(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }

    /// Vehicle handed straight to another user thread instead of retiring
    #[inline(always)]
    pub fn inc_reuses(&self) {
        self.vehicle_reuses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_spawned(&self) {
        self.vehicles_spawned.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_retired(&self) {
        self.vehicles_retired.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_spawn_failures(&self) {
        self.spawn_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of all counters
    ///
    /// # Note
    /// Counters may be slightly out of step with each other under concurrent
    /// updates, but each individual value is accurate.
    #[inline]
    pub fn snapshot(&self) -> Counters {
        Counters {
            threads_created: self.threads_created.load(Ordering::Relaxed),
            threads_exited: self.threads_exited.load(Ordering::Relaxed),
            threads_panicked: self.threads_panicked.load(Ordering::Relaxed),
            yields: self.yields.load(Ordering::Relaxed),
            vehicle_reuses: self.vehicle_reuses.load(Ordering::Relaxed),
            vehicles_spawned: self.vehicles_spawned.load(Ordering::Relaxed),
            vehicles_retired: self.vehicles_retired.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
        }
    }
}
