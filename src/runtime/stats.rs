/*!
 * Runtime Statistics
 * Serializable snapshots of runtime, user thread and vehicle state
 */

use super::user_thread::Location;
use super::Runtime;
use crate::core::errors::{Result, RuntimeError};
use crate::core::types::{UserThreadId, VehicleId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime-wide counts and event counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeStats {
    pub max_vehicles: usize,
    pub active_vehicles: usize,
    pub max_user_threads: usize,
    pub active_user_threads: usize,
    pub running_user_threads: usize,
    pub waiting_user_threads: usize,
    pub threads_created: u64,
    pub threads_exited: u64,
    pub threads_panicked: u64,
    pub yields: u64,
    pub vehicle_reuses: u64,
    pub vehicles_spawned: u64,
    pub vehicles_retired: u64,
    pub spawn_failures: u64,
    /// Total running time of all user threads that have exited
    pub exited_running_time_micros: u64,
}

impl RuntimeStats {
    /// Every vehicle is busy
    #[inline]
    pub fn saturated(&self) -> bool {
        self.active_vehicles == self.max_vehicles
    }
}

/// Where a user thread is right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ThreadState {
    Running { vehicle: VehicleId },
    Waiting,
}

/// Per user thread accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UserThreadStats {
    pub id: UserThreadId,
    pub state: ThreadState,
    /// CPU time charged at the thread's last yield
    pub running_time_micros: u64,
}

impl UserThreadStats {
    /// Get running time as Duration
    #[inline]
    pub fn running_time(&self) -> Duration {
        Duration::from_micros(self.running_time_micros)
    }
}

/// Per vehicle accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VehicleStats {
    pub vehicle: VehicleId,
    pub name: String,
    pub hosted: Option<UserThreadId>,
    /// Native thread has started and sampled its baseline
    pub started: bool,
    /// CPU time consumed between start and the last accounting point
    pub cpu_time_micros: u64,
}

impl Runtime {
    /// Get runtime statistics
    pub fn stats(&self) -> Result<RuntimeStats> {
        let core = self.core()?;
        let counters = core.stats.snapshot();
        let state = core.state.lock();

        Ok(RuntimeStats {
            max_vehicles: state.max_vehicles,
            active_vehicles: state.vehicles.active_count(),
            max_user_threads: state.threads.capacity(),
            active_user_threads: state.threads.active_count(),
            running_user_threads: state.threads.running_count(),
            waiting_user_threads: state.waiting.len(),
            threads_created: counters.threads_created,
            threads_exited: counters.threads_exited,
            threads_panicked: counters.threads_panicked,
            yields: counters.yields,
            vehicle_reuses: counters.vehicle_reuses,
            vehicles_spawned: counters.vehicles_spawned,
            vehicles_retired: counters.vehicles_retired,
            spawn_failures: counters.spawn_failures,
            exited_running_time_micros: micros(state.exited_running_time),
        })
    }

    /// Get accounting for one live user thread
    pub fn thread_stats(&self, id: UserThreadId) -> Result<UserThreadStats> {
        let core = self.core()?;
        let state = core.state.lock();
        let thread = state
            .threads
            .get(id)
            .ok_or(RuntimeError::ThreadNotFound(id))?;

        Ok(UserThreadStats {
            id,
            state: match thread.location() {
                Location::Running(vehicle) => ThreadState::Running { vehicle },
                Location::Waiting => ThreadState::Waiting,
            },
            running_time_micros: micros(thread.running_time()),
        })
    }

    /// Get accounting for every active vehicle
    pub fn vehicle_stats(&self) -> Result<Vec<VehicleStats>> {
        let core = self.core()?;
        let state = core.state.lock();

        Ok(state
            .vehicles
            .iter_active()
            .map(|(vehicle, slot)| VehicleStats {
                vehicle,
                name: slot.name().to_string(),
                hosted: slot.hosted(),
                started: slot.native().is_some(),
                cpu_time_micros: micros(slot.cpu_time().total()),
            })
            .collect())
    }
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}
