/*!
 * Runtime Configuration
 * Capacity limits and sizing, validated against core::limits
 */

use crate::core::errors::{Result, RuntimeError};
use crate::core::limits::{
    DEFAULT_STACK_SIZE, DEFAULT_VEHICLE_NAME_PREFIX, DEFAULT_VEHICLE_STACK_SIZE,
    MAX_USER_THREADS, MAX_VEHICLES, MIN_STACK_SIZE, MIN_VEHICLES,
};
use serde::{Deserialize, Serialize};
use std::thread;

/// Runtime configuration, fixed for the lifetime of a runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Upper bound on concurrently running kernel vehicles
    pub max_vehicles: usize,
    /// Upper bound on concurrently active user threads
    pub max_user_threads: usize,
    /// Dedicated stack size of every user thread, in bytes
    pub stack_size: usize,
    /// Native stack size of every vehicle thread, in bytes
    pub vehicle_stack_size: usize,
    /// Vehicle thread names are `<prefix>-<slot>`
    pub vehicle_name_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let parallelism = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            max_vehicles: parallelism.clamp(MIN_VEHICLES, MAX_VEHICLES),
            max_user_threads: MAX_USER_THREADS,
            stack_size: DEFAULT_STACK_SIZE,
            vehicle_stack_size: DEFAULT_VEHICLE_STACK_SIZE,
            vehicle_name_prefix: DEFAULT_VEHICLE_NAME_PREFIX.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Default configuration with an explicit vehicle bound
    pub fn with_max_vehicles(max_vehicles: usize) -> Self {
        Self {
            max_vehicles,
            ..Self::default()
        }
    }

    /// Check every field against the hard limits
    pub fn validate(&self) -> Result<()> {
        if !(MIN_VEHICLES..=MAX_VEHICLES).contains(&self.max_vehicles) {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "max_vehicles must be between {} and {}, got {}",
                MIN_VEHICLES, MAX_VEHICLES, self.max_vehicles
            )));
        }

        if !(1..=MAX_USER_THREADS).contains(&self.max_user_threads) {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "max_user_threads must be between 1 and {}, got {}",
                MAX_USER_THREADS, self.max_user_threads
            )));
        }

        if self.stack_size < MIN_STACK_SIZE {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "stack_size must be at least {} bytes, got {}",
                MIN_STACK_SIZE, self.stack_size
            )));
        }

        if self.vehicle_stack_size < MIN_STACK_SIZE {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "vehicle_stack_size must be at least {} bytes, got {}",
                MIN_STACK_SIZE, self.vehicle_stack_size
            )));
        }

        if self.vehicle_name_prefix.is_empty() {
            return Err(RuntimeError::InvalidConfiguration(
                "vehicle_name_prefix must not be empty".into(),
            ));
        }

        Ok(())
    }
}
