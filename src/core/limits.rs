/*!
 * Runtime Limits and Constants
 *
 * Centralized location for capacity limits and sizing defaults.
 * Organized by domain for maintainability and discoverability.
 *
 * - Hard capacities are marked with [HARD]
 * - Performance-sensitive defaults are marked with [PERF]
 */

use std::time::Duration;

// =============================================================================
// USER THREAD LIMITS
// =============================================================================

/// Maximum number of concurrently active user threads [HARD]
/// Size of the user thread slot table; no configuration may exceed it
pub const MAX_USER_THREADS: usize = 1000;

/// Default user thread stack size (64KB)
/// Every user thread gets a dedicated stack of exactly this many bytes
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Minimum user thread stack size (16KB)
/// Below this, formatting or logging inside a user thread overflows
pub const MIN_STACK_SIZE: usize = 16 * 1024;

// =============================================================================
// KERNEL VEHICLE LIMITS
// =============================================================================

/// Minimum number of kernel vehicles
pub const MIN_VEHICLES: usize = 1;

/// Maximum number of kernel vehicles [HARD]
/// More vehicles than user threads can never be busy at once
pub const MAX_VEHICLES: usize = MAX_USER_THREADS;

/// Native stack size for vehicle threads (256KB)
/// Vehicles only run the dispatch loop, user code runs on its own stack
/// [PERF] Keeps per-vehicle memory small
pub const DEFAULT_VEHICLE_STACK_SIZE: usize = 256 * 1024;

/// Thread name prefix for vehicles, suffixed with the vehicle slot
pub const DEFAULT_VEHICLE_NAME_PREFIX: &str = "uthread-vehicle";

/// Retry period for vehicle spawns the OS refused (10ms)
/// Applies while waiting work has no vehicle that could pick it up
pub const SPAWN_RETRY_INTERVAL: Duration = Duration::from_millis(10);
