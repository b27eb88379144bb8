/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::UserThreadId;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Bounded resource named by [`RuntimeError::ResourceExhausted`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    UserThreadSlots,
    VehicleSlots,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::UserThreadSlots => write!(f, "user thread slots"),
            Resource::VehicleSlots => write!(f, "kernel vehicle slots"),
        }
    }
}

/// Runtime errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum RuntimeError {
    #[error("Resource exhausted: all {limit} {resource} are in use")]
    #[diagnostic(
        code(runtime::resource_exhausted),
        help("Wait for user threads to exit before creating more.")
    )]
    ResourceExhausted { resource: Resource, limit: usize },

    #[error("Failed to spawn kernel vehicle: {0}")]
    #[diagnostic(
        code(runtime::vehicle_spawn_failed),
        help("The OS refused to create a thread. Check process thread limits (ulimit -u).")
    )]
    VehicleSpawnFailed(String),

    #[error("Runtime already initialized")]
    #[diagnostic(
        code(runtime::double_initialization),
        help("initialize() must be called exactly once per runtime.")
    )]
    DoubleInitialization,

    #[error("Runtime not initialized")]
    #[diagnostic(
        code(runtime::not_initialized),
        help("Call initialize() before any other runtime operation.")
    )]
    NotInitialized,

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(runtime::invalid_configuration),
        help("Review the runtime configuration against core::limits.")
    )]
    InvalidConfiguration(String),

    #[error("Not running on a user thread of this runtime")]
    #[diagnostic(
        code(runtime::not_in_user_thread),
        help("yield_now() is only meaningful from inside a thread created by create_thread().")
    )]
    NotInUserThread,

    #[error("Operation would block the vehicle hosting the calling user thread")]
    #[diagnostic(
        code(runtime::would_deadlock),
        help("Wait for idleness from a thread that is not managed by the runtime.")
    )]
    WouldDeadlock,

    #[error("User thread {0} not found")]
    #[diagnostic(
        code(runtime::thread_not_found),
        help("The thread may have exited and its slot been reused.")
    )]
    ThreadNotFound(UserThreadId),

    #[error("Not implemented: {0}")]
    #[diagnostic(
        code(runtime::unimplemented),
        help("This operation is not available on this platform.")
    )]
    Unimplemented(String),
}

/// Common result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::VehicleSpawnFailed(err.to_string())
    }
}
