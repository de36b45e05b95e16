//! Coroutine Records
//!
//! The per-coroutine state owned by a scheduler slot: the registered
//! callback set, the saved execution context, the private stack snapshot,
//! and lifecycle bookkeeping.
//!
//! ## Lifecycle
//!
//! A record is created `Ready`, becomes `Running` on first resume, then
//! oscillates `Running` ↔ `Suspended` until its body returns, at which
//! point the record is destroyed and its slot freed. A record is never left
//! in the table after death; `Dead` only ever describes an empty slot.

use std::any::Any;
use std::fmt;
use std::time::Instant;

use context::Context;

use crate::scheduler::{Scheduler, Yielder};
use crate::stack::StackSnapshot;

/// Stable identifier of a coroutine within one scheduler.
///
/// Ids are reused after the record they named is destroyed, never before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoroutineId(usize);

impl CoroutineId {
    /// Create an id from a raw slot index.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw slot index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for CoroutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coroutine({})", self.0)
    }
}

/// Externally observable state of a coroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineStatus {
    /// Created, body not yet entered.
    Ready,
    /// Body currently executing on the shared stack.
    Running,
    /// Suspended at a pause point; stack bytes saved in its snapshot.
    Suspended,
    /// No such coroutine (the slot is empty).
    Dead,
}

impl CoroutineStatus {
    /// Get the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CoroutineStatus::Ready => "ready",
            CoroutineStatus::Running => "running",
            CoroutineStatus::Suspended => "suspended",
            CoroutineStatus::Dead => "dead",
        }
    }
}

impl fmt::Display for CoroutineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a coroutine cannot be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// The slot table is full and has reached its hard ceiling.
    AtCapacity {
        /// The table capacity at the time of the attempt.
        capacity: usize,
    },
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::AtCapacity { capacity } => {
                write!(f, "coroutine table is full ({} slots, hard ceiling reached)", capacity)
            }
        }
    }
}

impl std::error::Error for SpawnError {}

/// The capability set a coroutine registers with the scheduler.
///
/// This is the bundled callback form: the main body plus the lifecycle
/// hooks, bound to whatever state the implementing type carries. The
/// scheduler stores it as a trait object and drives every method itself;
/// hosts never call these directly.
///
/// Only [`run`](CoroutineTask::run) is required; the hooks default to
/// no-ops and [`user_data`](CoroutineTask::user_data) to `None`.
pub trait CoroutineTask {
    /// The coroutine body. Executes on the shared scratch stack and may
    /// suspend itself any number of times through the [`Yielder`].
    ///
    /// Returning from this method ends the coroutine: its record is
    /// destroyed (firing [`on_delete`](CoroutineTask::on_delete)) before
    /// control returns to the host.
    fn run(&mut self, cx: &mut Yielder);

    /// Called exactly once when the record is destroyed, whether the body
    /// returned, the host called [`Scheduler::destroy`], or the scheduler
    /// was closed.
    fn on_delete(&mut self, sched: &mut Scheduler) {
        let _ = sched;
    }

    /// Called when a timeout sweep expires this coroutine, just before its
    /// fatal flag is set and it is given a final scheduling turn.
    fn on_timeout(&mut self, sched: &mut Scheduler, id: CoroutineId) {
        let _ = (sched, id);
    }

    /// Opaque payload exposed through [`Scheduler::user_data`].
    fn user_data(&self) -> Option<&dyn Any> {
        None
    }
}

/// Adapter so plain closures can be spawned as coroutine bodies.
pub(crate) struct FnTask<F> {
    body: F,
}

impl<F> FnTask<F>
where
    F: FnMut(&mut Yielder),
{
    pub(crate) fn new(body: F) -> Self {
        Self { body }
    }
}

impl<F> CoroutineTask for FnTask<F>
where
    F: FnMut(&mut Yielder),
{
    fn run(&mut self, cx: &mut Yielder) {
        (self.body)(cx)
    }
}

/// One registered coroutine, exclusively owned by its slot.
pub(crate) struct Coroutine {
    /// The callback set. `None` only inside the window where a timeout
    /// hook has temporarily taken it out of the record.
    pub(crate) task: Option<Box<dyn CoroutineTask>>,
    /// Saved execution context; `Some` only while suspended.
    pub(crate) context: Option<Context>,
    /// Private copy of the coroutine's live scratch-stack region.
    pub(crate) snapshot: StackSnapshot,
    /// Current state; never `Dead` while the record exists.
    pub(crate) status: CoroutineStatus,
    /// Creation time. Timeout age is measured from here, never reset.
    pub(crate) created_at: Instant,
    /// Set once by the timeout sweep; advisory only.
    pub(crate) fatal: bool,
}

impl Coroutine {
    /// Create a fresh record around a callback set.
    pub(crate) fn new(task: Box<dyn CoroutineTask>) -> Self {
        Self {
            task: Some(task),
            context: None,
            snapshot: StackSnapshot::new(),
            status: CoroutineStatus::Ready,
            created_at: Instant::now(),
            fatal: false,
        }
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("status", &self.status)
            .field("fatal", &self.fatal)
            .field("saved_bytes", &self.snapshot.len())
            .finish()
    }
}
