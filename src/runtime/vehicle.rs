/*!
 * Kernel Vehicles
 *
 * Fixed-capacity table of native threads that host user threads, the seam
 * through which native threads get created, and the dispatch loop each
 * vehicle runs for its whole life.
 */

use super::dispatcher::Handoff;
use super::Core;
use crate::context::{clock, ExecutionContext, Outcome};
use crate::core::errors::{Resource, Result, RuntimeError};
use crate::core::types::{CpuTimes, Slot, UserThreadId, VehicleId};
use crate::monitoring::span_vehicle;
use std::io;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{error, trace, warn};

/// Native thread body handed to a [`VehicleSpawner`]
pub type VehicleBody = Box<dyn FnOnce() + Send + 'static>;

/// Creates the native threads that back kernel vehicles
///
/// The body must be run exactly once on a fresh OS thread. On error the body
/// must not have been started.
pub trait VehicleSpawner: Send + Sync {
    fn spawn(&self, name: String, stack_size: usize, body: VehicleBody) -> io::Result<()>;
}

/// Spawns vehicles as detached `std::thread`s
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeSpawner;

impl VehicleSpawner for NativeSpawner {
    fn spawn(&self, name: String, stack_size: usize, body: VehicleBody) -> io::Result<()> {
        thread::Builder::new()
            .name(name)
            .stack_size(stack_size)
            .spawn(body)
            .map(drop)
    }
}

/// Everything a new vehicle needs to start hosting its first user thread
#[derive(Debug)]
pub(crate) struct VehicleTask {
    pub vehicle: VehicleId,
    pub thread: UserThreadId,
    pub context: ExecutionContext,
}

/// One kernel vehicle slot
#[derive(Debug, Default)]
pub(crate) struct KernelVehicle {
    name: String,
    native: Option<ThreadId>,
    /// CPU counters sampled when the native thread started
    baseline: CpuTimes,
    /// CPU counters at the last accounting point
    checkpoint: CpuTimes,
    hosted: Option<UserThreadId>,
    active: bool,
}

impl KernelVehicle {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn native(&self) -> Option<ThreadId> {
        self.native
    }

    #[inline]
    pub fn hosted(&self) -> Option<UserThreadId> {
        self.hosted
    }

    /// CPU time this vehicle consumed between starting and its last checkpoint
    #[inline]
    pub fn cpu_time(&self) -> CpuTimes {
        self.checkpoint - self.baseline
    }
}

/// Slot table of vehicles, sized to `max_vehicles`
#[derive(Debug)]
pub(crate) struct KernelVehicleTable {
    slots: Vec<KernelVehicle>,
    name_prefix: String,
    active: usize,
}

impl KernelVehicleTable {
    pub fn new(capacity: usize, name_prefix: &str) -> Self {
        Self {
            slots: (0..capacity).map(|_| KernelVehicle::default()).collect(),
            name_prefix: name_prefix.to_string(),
            active: 0,
        }
    }

    /// Claim a free vehicle slot that will host `thread`
    ///
    /// Only reserves the identity; the native thread is spawned afterwards,
    /// outside the runtime lock.
    pub fn reserve(&mut self, thread: UserThreadId) -> Result<VehicleId> {
        let vehicle = self
            .find_inactive()
            .ok_or(RuntimeError::ResourceExhausted {
                resource: Resource::VehicleSlots,
                limit: self.slots.len(),
            })?;

        let name = format!("{}-{}", self.name_prefix, vehicle);
        let slot = &mut self.slots[vehicle];
        *slot = KernelVehicle {
            name,
            hosted: Some(thread),
            active: true,
            ..KernelVehicle::default()
        };
        self.active += 1;

        Ok(vehicle)
    }

    /// Record native identity and baseline counters of a started vehicle
    pub fn started(&mut self, vehicle: VehicleId, native: ThreadId, baseline: CpuTimes) {
        if let Some(slot) = self.get_mut(vehicle) {
            slot.native = Some(native);
            slot.baseline = baseline;
            slot.checkpoint = baseline;
        }
    }

    /// Hand the vehicle to `thread`, restarting accounting at `now`
    pub fn host(&mut self, vehicle: VehicleId, thread: UserThreadId, now: CpuTimes) {
        if let Some(slot) = self.get_mut(vehicle) {
            slot.hosted = Some(thread);
            slot.checkpoint = now;
        }
    }

    /// Last accounting point of the vehicle
    #[cfg(test)]
    pub fn checkpoint(&self, vehicle: VehicleId) -> Option<CpuTimes> {
        self.get(vehicle).map(|slot| slot.checkpoint)
    }

    /// Mark the vehicle inactive; its dispatch loop ends right after
    pub fn retire(&mut self, vehicle: VehicleId) -> bool {
        match self.get_mut(vehicle) {
            Some(slot) => {
                slot.active = false;
                slot.hosted = None;
                self.active -= 1;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, vehicle: VehicleId) -> Option<&KernelVehicle> {
        self.slots.get(vehicle).filter(|slot| slot.active)
    }

    fn get_mut(&mut self, vehicle: VehicleId) -> Option<&mut KernelVehicle> {
        self.slots.get_mut(vehicle).filter(|slot| slot.active)
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (VehicleId, &KernelVehicle)> {
        self.slots.iter().enumerate().filter(|(_, slot)| slot.active)
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn find_inactive(&self) -> Option<Slot> {
        self.slots.iter().position(|slot| !slot.active)
    }
}

/// Vehicle bootstrap and dispatch loop
///
/// Becomes the task's user thread, and after every yield or exit lets the
/// dispatcher decide which thread this vehicle hosts next. Returns when the
/// vehicle is retired.
pub(crate) fn run(core: Arc<Core>, task: VehicleTask) {
    let VehicleTask {
        vehicle,
        mut thread,
        mut context,
    } = task;
    let _span = span_vehicle(vehicle).entered();

    let baseline = sample_cpu(vehicle, CpuTimes::ZERO);
    core.vehicle_started(vehicle, thread::current().id(), baseline);
    let mut checkpoint = baseline;

    loop {
        let outcome = core.enter(thread, || context.resume());
        let now = sample_cpu(vehicle, checkpoint);
        let quantum = now.since(checkpoint);
        trace!(vehicle, %thread, ?quantum, ?outcome, "User thread left its vehicle");

        let handoff = match outcome {
            Outcome::Yielded => core.thread_yielded(vehicle, thread, context, quantum, now),
            Outcome::Exited => core.thread_exited(vehicle, thread, context, quantum, now, false),
            Outcome::Panicked(message) => {
                error!(vehicle, %thread, %message, "User thread panicked");
                core.thread_exited(vehicle, thread, context, quantum, now, true)
            }
        };

        match handoff {
            Handoff::Resume {
                thread: next,
                context: next_context,
            } => {
                thread = next;
                context = next_context;
                checkpoint = now;
            }
            Handoff::Retire => break,
        }
    }
}

fn sample_cpu(vehicle: VehicleId, fallback: CpuTimes) -> CpuTimes {
    clock::thread_cpu_time().unwrap_or_else(|err| {
        warn!(vehicle, error = %err, "CPU clock sample failed, charging no time");
        fallback
    })
}
