/*!
 * Core Types
 * Identifiers and time values shared across the runtime
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;
use std::time::Duration;

/// Slot index into one of the runtime tables
pub type Slot = usize;

/// Handle to a user thread
///
/// Slots are reused once a thread exits; the generation tells a stale handle
/// apart from the thread currently occupying the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserThreadId {
    slot: u32,
    generation: u32,
}

impl UserThreadId {
    #[inline]
    pub(crate) const fn new(slot: Slot, generation: u32) -> Self {
        Self {
            slot: slot as u32,
            generation,
        }
    }

    /// Slot index of this thread in the user thread table
    #[inline]
    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.slot as Slot
    }

    /// Number of times the slot had been handed out when this thread was created
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for UserThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ut{}.{}", self.slot, self.generation)
    }
}

/// Kernel vehicle slot index
pub type VehicleId = Slot;

/// CPU time consumed by one OS thread, split like `getrusage` reports it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CpuTimes {
    pub user: Duration,
    pub system: Duration,
}

impl CpuTimes {
    pub const ZERO: CpuTimes = CpuTimes {
        user: Duration::ZERO,
        system: Duration::ZERO,
    };

    #[inline]
    #[must_use]
    pub const fn new(user: Duration, system: Duration) -> Self {
        Self { user, system }
    }

    /// User plus system time
    #[inline]
    #[must_use]
    pub fn total(&self) -> Duration {
        self.user.saturating_add(self.system)
    }

    /// Time consumed since `earlier`, clamped at zero per component
    #[inline]
    #[must_use]
    pub fn since(&self, earlier: CpuTimes) -> Duration {
        (*self - earlier).total()
    }
}

impl Sub for CpuTimes {
    type Output = CpuTimes;

    fn sub(self, rhs: CpuTimes) -> CpuTimes {
        CpuTimes {
            user: self.user.saturating_sub(rhs.user),
            system: self.system.saturating_sub(rhs.system),
        }
    }
}
