/*!
 * Dispatcher
 * Create, exit and yield transitions over the runtime state
 *
 * Every function here runs under the runtime lock and only does
 * bookkeeping. The decisions it returns (spawn a vehicle, resume a context,
 * retire) are carried out by the caller once the lock is released.
 */

use super::queue::WaitEntry;
use super::state::RuntimeState;
use super::vehicle::VehicleTask;
use crate::context::ExecutionContext;
use crate::core::errors::{Result, RuntimeError};
use crate::core::types::{CpuTimes, UserThreadId, VehicleId};
use std::time::Duration;
use tracing::{debug, warn};

/// Placement decided for a newly created user thread
#[derive(Debug)]
pub(crate) enum Admission {
    /// Capacity remains: a vehicle was reserved and must now be spawned
    Spawn(VehicleTask),
    /// All vehicles busy: the thread waits
    Enqueued(UserThreadId),
}

/// What a vehicle does after its user thread yielded or exited
#[derive(Debug)]
pub(crate) enum Handoff {
    Resume {
        thread: UserThreadId,
        context: ExecutionContext,
    },
    Retire,
}

impl RuntimeState {
    /// Creation path: allocate a slot, then spawn-or-enqueue
    ///
    /// On error nothing stays allocated.
    pub fn admit(&mut self, context: ExecutionContext) -> Result<Admission> {
        let thread = self.threads.allocate(context)?;

        if self.saturated() {
            self.waiting.insert(WaitEntry::new(thread, Duration::ZERO));
            debug!(%thread, waiting = self.waiting.len(), "Vehicles saturated, user thread enqueued");
            self.check_invariants();
            return Ok(Admission::Enqueued(thread));
        }

        let vehicle = match self.vehicles.reserve(thread) {
            Ok(vehicle) => vehicle,
            Err(err) => {
                self.threads.release(thread);
                return Err(err);
            }
        };

        match self.threads.start_running(thread, vehicle) {
            Some(context) => {
                debug!(%thread, vehicle, "Vehicle reserved for new user thread");
                self.check_invariants();
                Ok(Admission::Spawn(VehicleTask {
                    vehicle,
                    thread,
                    context,
                }))
            }
            None => {
                self.vehicles.retire(vehicle);
                Err(RuntimeError::ThreadNotFound(thread))
            }
        }
    }

    /// Undo a reservation whose native spawn failed
    ///
    /// Frees both the user thread slot and the vehicle slot. Returns the
    /// context if the slot still held it.
    pub fn abandon_spawn(&mut self, vehicle: VehicleId, thread: UserThreadId) -> Option<ExecutionContext> {
        let context = self.threads.release(thread);
        self.vehicles.retire(vehicle);
        self.backlog_below_capacity = true;
        self.check_invariants();
        context
    }

    /// Reserve a vehicle for the best waiting thread if capacity is free
    pub fn fill_vacancy(&mut self) -> Option<VehicleTask> {
        if self.saturated() || self.waiting.is_empty() {
            return None;
        }

        while let Some(entry) = self.waiting.pop_highest_priority() {
            let vehicle = match self.vehicles.reserve(entry.thread) {
                Ok(vehicle) => vehicle,
                Err(_) => {
                    self.waiting.insert(entry);
                    return None;
                }
            };

            match self.threads.start_running(entry.thread, vehicle) {
                Some(context) => {
                    return Some(VehicleTask {
                        vehicle,
                        thread: entry.thread,
                        context,
                    })
                }
                None => {
                    warn!(thread = %entry.thread, "Stale waiting queue entry skipped");
                    self.vehicles.retire(vehicle);
                }
            }
        }

        None
    }

    /// Put a thread whose vehicle could not be spawned back in line
    pub fn requeue_unlaunched(&mut self, task: VehicleTask) {
        let VehicleTask {
            vehicle,
            thread,
            context,
        } = task;

        self.vehicles.retire(vehicle);
        if self.threads.park(thread, context) {
            let running_time = self
                .threads
                .get(thread)
                .map(|t| t.running_time())
                .unwrap_or_default();
            self.waiting.insert(WaitEntry::new(thread, running_time));
        }
        self.backlog_below_capacity = true;
        self.check_invariants();
    }

    /// Exit path: account, free the slot, then reuse or retire the vehicle
    ///
    /// Returns the final running time of the exited thread with the handoff.
    pub fn exit(
        &mut self,
        vehicle: VehicleId,
        thread: UserThreadId,
        quantum: Duration,
        now: CpuTimes,
    ) -> (Duration, Handoff) {
        let final_running_time = self.threads.charge(thread, quantum).unwrap_or(quantum);
        self.exited_running_time = self.exited_running_time.saturating_add(final_running_time);
        self.threads.release(thread);

        let handoff = match self.take_next(vehicle, now) {
            Some((next, context)) => {
                debug!(%thread, %next, vehicle, "Vehicle reused after exit");
                Handoff::Resume {
                    thread: next,
                    context,
                }
            }
            None => {
                self.vehicles.retire(vehicle);
                debug!(%thread, vehicle, "No waiting work, vehicle retired");
                Handoff::Retire
            }
        };

        self.check_invariants();
        (final_running_time, handoff)
    }

    /// Yield path: account, enqueue the yielder, resume whoever is best now
    ///
    /// With nobody else waiting the yielder itself comes straight back out.
    pub fn yield_thread(
        &mut self,
        vehicle: VehicleId,
        thread: UserThreadId,
        context: ExecutionContext,
        quantum: Duration,
        now: CpuTimes,
    ) -> Handoff {
        let running_time = self.threads.charge(thread, quantum).unwrap_or(quantum);
        if self.threads.park(thread, context) {
            self.waiting.insert(WaitEntry::new(thread, running_time));
        }

        match self.take_next(vehicle, now) {
            Some((next, context)) => {
                debug!(%thread, %next, vehicle, ?running_time, "User thread yielded");
                self.check_invariants();
                Handoff::Resume {
                    thread: next,
                    context,
                }
            }
            None => {
                // Only reachable if the yielder's slot vanished underneath it
                self.vehicles.retire(vehicle);
                self.check_invariants();
                Handoff::Retire
            }
        }
    }

    /// Pop the best waiting thread and move it onto `vehicle`
    fn take_next(&mut self, vehicle: VehicleId, now: CpuTimes) -> Option<(UserThreadId, ExecutionContext)> {
        while let Some(entry) = self.waiting.pop_highest_priority() {
            match self.threads.start_running(entry.thread, vehicle) {
                Some(context) => {
                    self.vehicles.host(vehicle, entry.thread, now);
                    return Some((entry.thread, context));
                }
                None => warn!(thread = %entry.thread, "Stale waiting queue entry skipped"),
            }
        }
        None
    }
}
