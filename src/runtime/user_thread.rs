/*!
 * User Thread Table
 * Fixed-capacity slot array of logical threads
 */

use crate::context::ExecutionContext;
use crate::core::errors::{Resource, Result, RuntimeError};
use crate::core::types::{Slot, UserThreadId, VehicleId};
use std::time::Duration;

/// Where an active user thread currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Location {
    Running(VehicleId),
    Waiting,
}

/// One user thread slot
#[derive(Debug)]
pub(crate) struct UserThread {
    generation: u32,
    /// Present while the thread waits; moved out to the hosting vehicle while it runs
    context: Option<ExecutionContext>,
    running_time: Duration,
    location: Location,
    active: bool,
}

impl UserThread {
    fn vacant() -> Self {
        Self {
            generation: 0,
            context: None,
            running_time: Duration::ZERO,
            location: Location::Waiting,
            active: false,
        }
    }

    #[inline]
    pub fn running_time(&self) -> Duration {
        self.running_time
    }

    #[inline]
    pub fn location(&self) -> Location {
        self.location
    }
}

/// Slot table of user threads, bounded by `max_user_threads`
#[derive(Debug)]
pub(crate) struct UserThreadTable {
    slots: Vec<UserThread>,
    active: usize,
}

impl UserThreadTable {
    /// Create a table with every slot inactive
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| UserThread::vacant()).collect(),
            active: 0,
        }
    }

    /// Claim a free slot for a new thread bound to `context`
    ///
    /// The thread starts out with zero running time. Placement is left to the
    /// dispatcher.
    pub fn allocate(&mut self, context: ExecutionContext) -> Result<UserThreadId> {
        let slot = self
            .find_inactive()
            .ok_or(RuntimeError::ResourceExhausted {
                resource: Resource::UserThreadSlots,
                limit: self.slots.len(),
            })?;

        let thread = &mut self.slots[slot];
        thread.generation = thread.generation.wrapping_add(1);
        thread.context = Some(context);
        thread.running_time = Duration::ZERO;
        thread.location = Location::Waiting;
        thread.active = true;
        self.active += 1;

        Ok(UserThreadId::new(slot, thread.generation))
    }

    /// Free the slot of `id`, returning the context if the slot still held it
    pub fn release(&mut self, id: UserThreadId) -> Option<ExecutionContext> {
        let thread = self.get_mut(id)?;
        thread.active = false;
        thread.location = Location::Waiting;
        let context = thread.context.take();
        self.active -= 1;
        context
    }

    pub fn get(&self, id: UserThreadId) -> Option<&UserThread> {
        self.slots
            .get(id.slot())
            .filter(|t| t.active && t.generation == id.generation())
    }

    fn get_mut(&mut self, id: UserThreadId) -> Option<&mut UserThread> {
        self.slots
            .get_mut(id.slot())
            .filter(|t| t.active && t.generation == id.generation())
    }

    /// Move the context out of the slot and mark the thread running on `vehicle`
    pub fn start_running(&mut self, id: UserThreadId, vehicle: VehicleId) -> Option<ExecutionContext> {
        let thread = self.get_mut(id)?;
        thread.location = Location::Running(vehicle);
        thread.context.take()
    }

    /// Park the context back in the slot of a thread that stopped running
    pub fn park(&mut self, id: UserThreadId, context: ExecutionContext) -> bool {
        match self.get_mut(id) {
            Some(thread) => {
                thread.location = Location::Waiting;
                thread.context = Some(context);
                true
            }
            None => false,
        }
    }

    /// Add a consumed quantum to the thread's running time
    ///
    /// Only valid while the thread is not waiting.
    pub fn charge(&mut self, id: UserThreadId, quantum: Duration) -> Option<Duration> {
        let thread = self.get_mut(id)?;
        debug_assert!(matches!(thread.location, Location::Running(_)));
        thread.running_time = thread.running_time.saturating_add(quantum);
        Some(thread.running_time)
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn running_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|t| t.active && matches!(t.location, Location::Running(_)))
            .count()
    }

    fn find_inactive(&self) -> Option<Slot> {
        self.slots.iter().position(|t| !t.active)
    }
}
