/*!
 * Runtime Builder
 * Builder pattern for Runtime construction and initialization
 */

use super::config::RuntimeConfig;
use super::vehicle::{NativeSpawner, VehicleSpawner};
use super::Runtime;
use crate::core::errors::Result;
use std::sync::Arc;

/// Builder for an initialized [`Runtime`]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    spawner: Option<Arc<dyn VehicleSpawner>>,
}

impl RuntimeBuilder {
    /// Create a new builder with the default configuration
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            spawner: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound the number of kernel vehicles
    pub fn max_vehicles(mut self, max_vehicles: usize) -> Self {
        self.config.max_vehicles = max_vehicles;
        self
    }

    /// Bound the number of concurrently active user threads
    pub fn max_user_threads(mut self, max_user_threads: usize) -> Self {
        self.config.max_user_threads = max_user_threads;
        self
    }

    /// Stack size of every user thread, in bytes
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = bytes;
        self
    }

    /// Native stack size of every vehicle thread, in bytes
    pub fn vehicle_stack_size(mut self, bytes: usize) -> Self {
        self.config.vehicle_stack_size = bytes;
        self
    }

    /// Name prefix of vehicle threads
    pub fn vehicle_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.vehicle_name_prefix = prefix.into();
        self
    }

    /// Use a custom vehicle spawner instead of `std::thread`
    pub fn spawner(mut self, spawner: Arc<dyn VehicleSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Build and initialize the runtime
    pub fn build(self) -> Result<Runtime> {
        let spawner = self.spawner.unwrap_or_else(|| Arc::new(NativeSpawner));
        let runtime = Runtime::with_spawner(spawner);
        runtime.initialize_with(self.config)?;
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
