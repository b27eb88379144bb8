/*!
 * M:N Runtime
 *
 * Multiplexes user threads onto a bounded pool of kernel vehicles. New work
 * runs immediately while vehicle capacity remains and waits otherwise; a
 * vehicle whose user thread yields or exits is handed straight to the
 * waiting thread with the least accumulated running time, and retires when
 * nothing waits.
 */

mod atomic_stats;
mod builder;
mod config;
mod dispatcher;
mod queue;
mod state;
mod stats;
mod user_thread;
mod vehicle;

pub use builder::RuntimeBuilder;
pub use config::RuntimeConfig;
pub use stats::{RuntimeStats, ThreadState, UserThreadStats, VehicleStats};
pub use vehicle::{NativeSpawner, VehicleBody, VehicleSpawner};

use crate::context::{self, clock, ExecutionContext, Transition};
use crate::core::errors::{Result, RuntimeError};
use crate::core::limits::SPAWN_RETRY_INTERVAL;
use crate::core::types::{CpuTimes, UserThreadId, VehicleId};
use atomic_stats::AtomicRuntimeStats;
use dispatcher::{Admission, Handoff};
use parking_lot::{Condvar, Mutex, MutexGuard};
use state::RuntimeState;
use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vehicle::VehicleTask;

thread_local! {
    /// User thread hosted by the calling vehicle, tagged with its runtime
    static CURRENT: Cell<Option<(usize, UserThreadId)>> = const { Cell::new(None) };
}

/// Handle to an M:N runtime
///
/// Cheap to clone; every clone refers to the same runtime. A runtime is
/// initialized exactly once and lives as long as any handle or vehicle
/// refers to it.
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
}

struct Shared {
    core: OnceLock<Arc<Core>>,
    spawner: Arc<dyn VehicleSpawner>,
}

/// Initialized runtime internals shared with every vehicle
pub(crate) struct Core {
    config: RuntimeConfig,
    state: Mutex<RuntimeState>,
    idle: Condvar,
    stats: AtomicRuntimeStats,
    spawner: Arc<dyn VehicleSpawner>,
}

/// Vehicle spawn that did not happen
struct LaunchFailure {
    /// Handed back unless the spawner already consumed it
    task: Option<VehicleTask>,
    error: RuntimeError,
}

impl Runtime {
    /// Create an uninitialized runtime that spawns vehicles with `std::thread`
    pub fn new() -> Self {
        Self::with_spawner(Arc::new(NativeSpawner))
    }

    /// Create an uninitialized runtime with a custom vehicle spawner
    pub fn with_spawner(spawner: Arc<dyn VehicleSpawner>) -> Self {
        Self {
            shared: Arc::new(Shared {
                core: OnceLock::new(),
                spawner,
            }),
        }
    }

    /// Builder for an initialized runtime
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Initialize with default configuration and `max_vehicles` vehicles
    ///
    /// Must be called exactly once, before any other operation.
    pub fn initialize(&self, max_vehicles: usize) -> Result<()> {
        self.initialize_with(RuntimeConfig::with_max_vehicles(max_vehicles))
    }

    /// Initialize with a full configuration
    ///
    /// # Errors
    /// - `DoubleInitialization` if the runtime was already initialized
    /// - `InvalidConfiguration` if `config` breaks a limit
    /// - `Unimplemented` if the platform has no per-thread CPU clock
    pub fn initialize_with(&self, config: RuntimeConfig) -> Result<()> {
        if self.shared.core.get().is_some() {
            return Err(RuntimeError::DoubleInitialization);
        }
        config.validate()?;
        clock::thread_cpu_time()?;

        let core = Arc::new(Core {
            state: Mutex::new(RuntimeState::new(&config)),
            idle: Condvar::new(),
            stats: AtomicRuntimeStats::new(),
            spawner: Arc::clone(&self.shared.spawner),
            config,
        });

        let (max_vehicles, max_user_threads, stack_size) = (
            core.config.max_vehicles,
            core.config.max_user_threads,
            core.config.stack_size,
        );
        self.shared
            .core
            .set(core)
            .map_err(|_| RuntimeError::DoubleInitialization)?;

        info!(
            max_vehicles,
            max_user_threads, stack_size, "User thread runtime initialized"
        );
        Ok(())
    }

    /// Whether `initialize` has completed
    pub fn is_initialized(&self) -> bool {
        self.shared.core.get().is_some()
    }

    /// Configuration the runtime was initialized with
    pub fn config(&self) -> Result<RuntimeConfig> {
        Ok(self.core()?.config.clone())
    }

    /// Create a user thread running `entry`
    ///
    /// Starts on a new vehicle right away while fewer than `max_vehicles`
    /// are active; otherwise waits for a vehicle to come free.
    ///
    /// # Errors
    /// - `ResourceExhausted` when every user thread slot is taken
    /// - `VehicleSpawnFailed` when the OS refuses a new vehicle; the thread
    ///   is not created
    pub fn create_thread<F>(&self, entry: F) -> Result<UserThreadId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.core()?.create(entry)
    }

    /// Give up the vehicle to the least served waiting user thread
    ///
    /// Returns once this thread is scheduled again. With nobody waiting the
    /// thread continues immediately, its running time updated.
    ///
    /// The thread may come back on a different vehicle. Thread-local values
    /// of the vehicle read before the call must not be relied on after it.
    ///
    /// # Errors
    /// `NotInUserThread` when not called from a user thread of this runtime.
    pub fn yield_now(&self) -> Result<()> {
        let core = self.core()?;
        if core.current().is_none() {
            return Err(RuntimeError::NotInUserThread);
        }

        context::suspend(Transition::Yield);
        Ok(())
    }

    /// Terminate the calling user thread
    ///
    /// The thread's stack is unwound and its slot freed; its vehicle moves
    /// on to the next waiting thread or retires.
    ///
    /// # Panics
    /// When not called from a user thread of this runtime.
    pub fn exit(&self) -> ! {
        let in_user_thread = self
            .shared
            .core
            .get()
            .and_then(|core| core.current())
            .is_some();
        if !in_user_thread {
            panic!("Runtime::exit() called outside a user thread of this runtime");
        }

        loop {
            context::suspend(Transition::Exit);
        }
    }

    /// User thread running on the calling vehicle, if any
    pub fn current(&self) -> Option<UserThreadId> {
        self.shared.core.get().and_then(|core| core.current())
    }

    /// Block until no user thread and no vehicle is active
    ///
    /// # Errors
    /// `WouldDeadlock` when called from a user thread of this runtime.
    pub fn wait_idle(&self) -> Result<()> {
        let core = self.core()?;
        if core.current().is_some() {
            return Err(RuntimeError::WouldDeadlock);
        }

        core.wait_until_idle(None);
        Ok(())
    }

    /// Like [`wait_idle`](Self::wait_idle), giving up after `timeout`
    ///
    /// Returns whether the runtime became idle.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> Result<bool> {
        let core = self.core()?;
        if core.current().is_some() {
            return Err(RuntimeError::WouldDeadlock);
        }

        Ok(core.wait_until_idle(Some(Instant::now() + timeout)))
    }

    fn core(&self) -> Result<&Arc<Core>> {
        self.shared.core.get().ok_or(RuntimeError::NotInitialized)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("initialized", &self.is_initialized())
            .field("config", &self.shared.core.get().map(|core| &core.config))
            .finish()
    }
}

impl Core {
    /// Identity used to tell runtimes apart in the vehicle thread-local
    #[inline]
    fn key(&self) -> usize {
        self as *const Core as usize
    }

    /// Never inlined: a user thread may resume on another OS thread, and a
    /// thread-local address cached across a yield would name the old vehicle
    #[inline(never)]
    fn current(&self) -> Option<UserThreadId> {
        CURRENT
            .with(Cell::get)
            .filter(|(key, _)| *key == self.key())
            .map(|(_, thread)| thread)
    }

    /// Run `f` with `thread` registered as the calling vehicle's user thread
    pub(crate) fn enter<R>(&self, thread: UserThreadId, f: impl FnOnce() -> R) -> R {
        CURRENT.with(|current| current.set(Some((self.key(), thread))));
        let result = f();
        CURRENT.with(|current| current.set(None));
        result
    }

    fn create<F>(self: &Arc<Self>, entry: F) -> Result<UserThreadId>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.state.lock().needs_vehicle() {
            self.fill_vacancies();
        }

        let context = ExecutionContext::new(entry, self.config.stack_size);
        let admission = {
            let mut state = self.state.lock();
            let admission = state.admit(context)?;
            self.stats.inc_created();
            admission
        };

        let task = match admission {
            Admission::Enqueued(thread) => return Ok(thread),
            Admission::Spawn(task) => task,
        };

        let (vehicle, thread) = (task.vehicle, task.thread);
        match self.launch(task) {
            Ok(()) => {
                self.stats.inc_spawned();
                Ok(thread)
            }
            Err(failure) => {
                self.stats.inc_spawn_failures();
                warn!(%thread, vehicle, error = %failure.error, "Vehicle spawn failed, rolling back");

                let idle = {
                    let mut state = self.state.lock();
                    state.abandon_spawn(vehicle, thread);
                    self.stats.withdraw_created();
                    state.is_idle()
                };
                drop(failure.task);
                if idle {
                    self.idle.notify_all();
                }

                self.fill_vacancies();
                Err(failure.error)
            }
        }
    }

    /// Block until idle or `deadline`, returning whether the runtime is idle
    ///
    /// Waiting work that no vehicle will ever pick up, left behind when the
    /// OS refused every vehicle, gets a spawn retry every
    /// `SPAWN_RETRY_INTERVAL`.
    fn wait_until_idle(self: &Arc<Self>, deadline: Option<Instant>) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.is_idle() {
                return true;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return false;
            }

            let wake = if state.needs_vehicle() {
                MutexGuard::unlocked(&mut state, || self.fill_vacancies());
                if !state.needs_vehicle() {
                    continue;
                }
                let retry = Instant::now() + SPAWN_RETRY_INTERVAL;
                Some(deadline.map_or(retry, |deadline| deadline.min(retry)))
            } else {
                deadline
            };

            match wake {
                Some(wake) => {
                    self.idle.wait_until(&mut state, wake);
                }
                None => self.idle.wait(&mut state),
            }
        }
    }

    /// Spawn the native thread for a reserved vehicle
    ///
    /// Runs outside the runtime lock. The task travels to the new thread
    /// through a shared cell so that a refused spawn can hand it back.
    fn launch(self: &Arc<Self>, task: VehicleTask) -> std::result::Result<(), LaunchFailure> {
        let name = self
            .state
            .lock()
            .vehicles
            .get(task.vehicle)
            .map(|slot| slot.name().to_string())
            .unwrap_or_else(|| format!("{}-{}", self.config.vehicle_name_prefix, task.vehicle));

        let cell = Arc::new(Mutex::new(Some(task)));
        let body_cell = Arc::clone(&cell);
        let core = Arc::clone(self);

        let spawned = self.spawner.spawn(
            name,
            self.config.vehicle_stack_size,
            Box::new(move || {
                let task = body_cell.lock().take();
                if let Some(task) = task {
                    vehicle::run(core, task);
                }
            }),
        );

        match spawned {
            Ok(()) => Ok(()),
            Err(err) => Err(LaunchFailure {
                task: cell.lock().take(),
                error: RuntimeError::VehicleSpawnFailed(err.to_string()),
            }),
        }
    }

    /// Spawn vehicles for waiting work while capacity is free
    ///
    /// Stops at the first refused spawn, leaving that thread waiting.
    fn fill_vacancies(self: &Arc<Self>) {
        loop {
            let task = match self.state.lock().fill_vacancy() {
                Some(task) => task,
                None => return,
            };
            let (vehicle, thread) = (task.vehicle, task.thread);

            match self.launch(task) {
                Ok(()) => {
                    self.stats.inc_spawned();
                    debug!(%thread, vehicle, "Vehicle spawned for waiting user thread");
                }
                Err(failure) => {
                    self.stats.inc_spawn_failures();
                    warn!(%thread, vehicle, error = %failure.error, "Vehicle spawn failed, thread keeps waiting");
                    if let Some(task) = failure.task {
                        self.state.lock().requeue_unlaunched(task);
                    }
                    // Idle waiters retry stranded work
                    self.idle.notify_all();
                    return;
                }
            }
        }
    }

    fn vehicle_started(&self, vehicle: VehicleId, native: ThreadId, baseline: CpuTimes) {
        self.state.lock().vehicles.started(vehicle, native, baseline);
        info!(vehicle, ?native, "Kernel vehicle started");
    }

    fn thread_yielded(
        &self,
        vehicle: VehicleId,
        thread: UserThreadId,
        context: ExecutionContext,
        quantum: Duration,
        now: CpuTimes,
    ) -> Handoff {
        let mut state = self.state.lock();
        let handoff = state.yield_thread(vehicle, thread, context, quantum, now);

        self.stats.inc_yields();
        match &handoff {
            Handoff::Resume { thread: next, .. } if *next != thread => self.stats.inc_reuses(),
            Handoff::Resume { .. } => {}
            Handoff::Retire => self.stats.inc_retired(),
        }
        handoff
    }

    fn thread_exited(
        self: &Arc<Self>,
        vehicle: VehicleId,
        thread: UserThreadId,
        context: ExecutionContext,
        quantum: Duration,
        now: CpuTimes,
        panicked: bool,
    ) -> Handoff {
        // Counters move under the lock so an idle waiter never sees them lag
        let (running_time, handoff, idle, backlog) = {
            let mut state = self.state.lock();
            let (running_time, handoff) = state.exit(vehicle, thread, quantum, now);
            self.stats.inc_exited(panicked);
            match &handoff {
                Handoff::Resume { .. } => self.stats.inc_reuses(),
                Handoff::Retire => self.stats.inc_retired(),
            }
            (running_time, handoff, state.is_idle(), state.backlog_below_capacity)
        };

        // Unwinds the stack of a thread that left through `exit()`
        drop(context);

        debug!(%thread, vehicle, ?running_time, "User thread exited");
        if matches!(handoff, Handoff::Retire) {
            info!(vehicle, "Kernel vehicle retired");
        }

        if idle {
            self.idle.notify_all();
        }
        if backlog {
            self.fill_vacancies();
        }
        handoff
    }
}
