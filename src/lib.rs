/*!
 * User Thread Runtime Library
 * M:N cooperative threading: many user threads on a bounded pool of kernel vehicles
 */

pub mod context;
pub mod core;
pub mod monitoring;
pub mod runtime;

// Re-exports
pub use crate::context::ExecutionContext;
pub use crate::core::errors::{Resource, Result, RuntimeError};
pub use crate::core::types::{CpuTimes, UserThreadId, VehicleId};
pub use crate::monitoring::init_tracing;
pub use crate::runtime::{
    NativeSpawner, Runtime, RuntimeBuilder, RuntimeConfig, RuntimeStats, ThreadState,
    UserThreadStats, VehicleBody, VehicleSpawner, VehicleStats,
};
