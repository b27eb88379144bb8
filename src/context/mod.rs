/*!
 * Execution Contexts
 *
 * The only place in the runtime that deals with raw stacks and register
 * state. A user thread's context is a stackful coroutine: vehicles `resume`
 * it, and code running on it `suspend`s back into the vehicle's dispatch
 * loop with a [`Transition`].
 */

pub mod clock;

use generator::{Generator, Gn, Scope};
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

/// Why a running context handed control back to its vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Yield,
    Exit,
}

/// Result of resuming a context until it next hands control back
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Yielded,
    Exited,
    Panicked(String),
}

/// Yield handle living at the bottom of a context's own stack
type Yielder = Scope<'static, 'static, (), Transition>;

thread_local! {
    /// Yield handle of the context currently resumed on this OS thread
    static ACTIVE: Cell<*mut Yielder> = const { Cell::new(ptr::null_mut()) };
}

/// Saved execution state of one user thread
///
/// Owns a dedicated stack of fixed size and the entry closure bound to it.
/// A context is live on at most one vehicle at a time: it is moved into the
/// vehicle that resumes it and moved back into its slot when it waits.
pub struct ExecutionContext {
    coroutine: Generator<'static, (), Transition>,
    /// Published by the coroutine on its first run
    yielder: Arc<AtomicPtr<Yielder>>,
    stack_size: usize,
}

impl ExecutionContext {
    /// Bind `entry` to a fresh context with a stack of `stack_size` bytes
    ///
    /// Nothing runs until the first [`resume`](Self::resume).
    pub fn new<F>(entry: F, stack_size: usize) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        // generator sizes stacks in words; an odd count turns on usage tracking
        let words = (stack_size / std::mem::size_of::<usize>()) & !1;
        let yielder = Arc::new(AtomicPtr::new(ptr::null_mut()));
        let published = Arc::clone(&yielder);

        let coroutine = Gn::<()>::new_scoped_opt(words, move |mut scope| {
            let handle = ptr::addr_of_mut!(scope).cast::<Yielder>();
            published.store(handle, Ordering::Release);
            ACTIVE.with(|active| active.set(handle));
            drop(published);

            entry();
            Transition::Exit
        });

        Self {
            coroutine,
            yielder,
            stack_size,
        }
    }

    /// Run the context on the calling OS thread until it yields, exits or panics
    pub(crate) fn resume(&mut self) -> Outcome {
        let handle = self.yielder.load(Ordering::Acquire);
        let previous = ACTIVE.with(|active| active.replace(handle));

        let coroutine = &mut self.coroutine;
        let result = panic::catch_unwind(AssertUnwindSafe(|| coroutine.resume()));
        ACTIVE.with(|active| active.set(previous));

        match result {
            Ok(Some(Transition::Yield)) if !self.coroutine.is_done() => Outcome::Yielded,
            Ok(_) => Outcome::Exited,
            Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
        }
    }

    /// Whether the entry closure has run to completion
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.coroutine.is_done()
    }

    /// Size in bytes of the dedicated stack
    #[inline]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("stack_size", &self.stack_size)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Hand control from the running context back to the vehicle that resumed it
///
/// Returns once some vehicle resumes the context again, possibly on another
/// OS thread.
///
/// # Panics
/// When no context is running on the calling OS thread.
#[inline(never)]
pub(crate) fn suspend(transition: Transition) {
    let handle = ACTIVE.with(Cell::get);
    assert!(
        !handle.is_null(),
        "suspend called outside a running execution context"
    );

    // SAFETY: `handle` points at the scope on the running coroutine's own
    // stack. That frame lives until the coroutine finishes, and ACTIVE only
    // holds it while the coroutine is being resumed on this thread.
    unsafe { (*handle).yield_with(transition) }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
