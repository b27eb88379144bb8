/*!
 * Runtime State
 * User thread table, vehicle table and waiting queue behind the runtime lock
 */

use super::config::RuntimeConfig;
use super::queue::WaitingQueue;
use super::user_thread::UserThreadTable;
use super::vehicle::KernelVehicleTable;
use std::time::Duration;

/// All mutable scheduling state; only ever touched under the runtime lock
#[derive(Debug)]
pub(crate) struct RuntimeState {
    pub threads: UserThreadTable,
    pub vehicles: KernelVehicleTable,
    pub waiting: WaitingQueue,
    pub max_vehicles: usize,
    /// Running time folded in from threads that have exited
    pub exited_running_time: Duration,
    /// Set after the OS refused a vehicle; work may then wait below capacity
    pub backlog_below_capacity: bool,
}

impl RuntimeState {
    /// Empty tables sized from `config`, every slot inactive
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            threads: UserThreadTable::new(config.max_user_threads),
            vehicles: KernelVehicleTable::new(config.max_vehicles, &config.vehicle_name_prefix),
            waiting: WaitingQueue::with_capacity(config.max_user_threads),
            max_vehicles: config.max_vehicles,
            exited_running_time: Duration::ZERO,
            backlog_below_capacity: false,
        }
    }

    /// All vehicles busy; the only state in which new work waits
    #[inline]
    pub fn saturated(&self) -> bool {
        self.vehicles.active_count() == self.max_vehicles
    }

    /// No user thread alive and no vehicle left running
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.threads.active_count() == 0 && self.vehicles.active_count() == 0
    }

    /// Work waits below capacity because the OS refused its vehicle
    ///
    /// Nothing but a fresh spawn attempt will move it once every running
    /// vehicle has exited.
    #[inline]
    pub fn needs_vehicle(&self) -> bool {
        self.backlog_below_capacity && !self.waiting.is_empty() && !self.saturated()
    }

    /// Refresh the backlog flag and assert the scheduling invariants
    ///
    /// Assertions only fire in debug builds.
    pub fn check_invariants(&mut self) {
        if self.waiting.is_empty() || self.saturated() {
            self.backlog_below_capacity = false;
        }

        debug_assert_eq!(
            self.threads.running_count() + self.waiting.len(),
            self.threads.active_count(),
            "every active user thread is either hosted or waiting"
        );
        debug_assert_eq!(
            self.threads.running_count(),
            self.vehicles.active_count(),
            "each active vehicle hosts exactly one user thread"
        );
        debug_assert!(self.vehicles.active_count() <= self.max_vehicles);
        debug_assert!(
            self.backlog_below_capacity || self.waiting.is_empty() || self.saturated(),
            "no idle vehicle capacity while work waits"
        );
    }
}
