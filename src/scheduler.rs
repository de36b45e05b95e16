//! Cooperative Coroutine Scheduler
//!
//! One scheduler drives many coroutines over a single shared native stack.
//!
//! ## Design
//!
//! - `resume` switches from the host into a coroutine through the context
//!   primitive; the coroutine runs until it pauses or its body returns.
//! - On every pause the coroutine's live region of the shared stack is
//!   copied into its private snapshot; on the next resume the bytes are
//!   copied back to the exact same addresses, so locals survive suspension
//!   byte-for-byte.
//! - A body that returns is destroyed immediately: the on-delete hook
//!   fires, the slot is freed, and control returns to the original
//!   resumer.
//! - A bounded round-robin sweep expires coroutines past their allowed
//!   age: on-timeout hook, advisory fatal flag, one forced scheduling turn.
//!   Cancellation is cooperative: the scheduler never unwinds a coroutine.
//!
//! Exactly one coroutine is live per scheduler at any instant, and a
//! scheduler is driven by one thread at a time (`Scheduler` is not `Send`).

use std::any::Any;
use std::fmt;
use std::time::{Duration, Instant};

use context::{Context, Transfer};

use crate::config::{ConfigError, SchedulerConfig};
use crate::coroutine::{Coroutine, CoroutineId, CoroutineStatus, CoroutineTask, FnTask, SpawnError};
use crate::log::{self, LogLevel};
use crate::slots::SlotTable;
use crate::stack::{ScratchStack, SWITCH_RED_ZONE};

const LOG_TARGET: &str = "weft::scheduler";

/// A cooperative scheduler for stackful coroutines.
///
/// Create one with [`crate::open`] or [`crate::open_with`]. Dropping the
/// scheduler (or calling [`close`](Scheduler::close)) is an abrupt
/// teardown: every still-live record is destroyed and its on-delete hook
/// fired, whether or not its body ever finished.
pub struct Scheduler {
    /// The one native stack region coroutine bodies execute on.
    scratch: ScratchStack,
    /// Record slots indexed by coroutine id.
    slots: SlotTable,
    /// Currently executing coroutine, if any.
    running: Option<CoroutineId>,
    /// Host-side context while a coroutine runs; refreshed on every switch
    /// into a coroutine, consumed on every switch out.
    host: Option<Context>,
    /// Where the next timeout sweep resumes scanning.
    sweep_cursor: usize,
}

impl Scheduler {
    /// Create a scheduler from a configuration.
    ///
    /// Validates the configuration and applies its log level.
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.log_level != log::level() {
            log::set_level(config.log_level);
        }

        let sched = Self {
            scratch: ScratchStack::new(config.stack_limit),
            slots: SlotTable::new(config.initial_slots, config.max_slots),
            running: None,
            host: None,
            sweep_cursor: 0,
        };
        log::LogBuilder::new(LogLevel::Debug)
            .target(LOG_TARGET)
            .message("scheduler opened")
            .field_int("stack_limit", config.stack_limit as i64)
            .field_int("slots", config.initial_slots as i64)
            .emit();
        Ok(sched)
    }

    /// Register a new coroutine and return its id.
    ///
    /// The coroutine is created `Ready` and does not run until the first
    /// [`resume`](Scheduler::resume). Fails only when the slot table is
    /// full at its hard ceiling.
    pub fn spawn(&mut self, task: impl CoroutineTask + 'static) -> Result<CoroutineId, SpawnError> {
        let id = self.slots.insert(Box::new(Coroutine::new(Box::new(task))))?;
        log::LogBuilder::new(LogLevel::Debug)
            .target(LOG_TARGET)
            .message("coroutine created")
            .field_int("id", id.index() as i64)
            .field_int("live", self.slots.len() as i64)
            .emit();
        Ok(id)
    }

    /// Register a plain closure as a coroutine body.
    pub fn spawn_fn<F>(&mut self, body: F) -> Result<CoroutineId, SpawnError>
    where
        F: FnMut(&mut Yielder) + 'static,
    {
        self.spawn(FnTask::new(body))
    }

    /// Hand control to a coroutine until it pauses or completes.
    ///
    /// A `Ready` coroutine starts its body on the shared stack; a
    /// `Suspended` one has its saved stack bytes restored and continues
    /// exactly where it paused. Resuming an empty slot is a silent no-op;
    /// "already gone" is an ordinary outcome.
    ///
    /// # Panics
    ///
    /// Panics if another coroutine is already running or `id` is out of
    /// range. Both are host programming errors.
    pub fn resume(&mut self, id: CoroutineId) {
        assert!(
            self.running.is_none(),
            "resume of {} while {} is running",
            id,
            self.running.map(|r| r.index()).unwrap_or(0),
        );

        let status = match self.slots.get(id) {
            None => return,
            Some(record) => record.status,
        };

        match status {
            CoroutineStatus::Ready => {
                let ctx = unsafe { Context::new(self.scratch.region(), trampoline) };
                let record = self.slots.get_mut(id).expect("record vanished before start");
                record.status = CoroutineStatus::Running;
                self.running = Some(id);

                let ptr = self as *mut Scheduler as usize;
                let t = unsafe { ctx.resume(ptr) };
                self.after_switch(id, t);
            }
            CoroutineStatus::Suspended => {
                let top = self.scratch.top();
                let record = self.slots.get_mut(id).expect("record vanished before resume");
                let ctx = record
                    .context
                    .take()
                    .expect("suspended coroutine has no saved context");
                // Put its stack bytes back at the addresses they were
                // captured from; the host runs on its own stack here.
                unsafe { record.snapshot.restore(top) };
                record.status = CoroutineStatus::Running;
                self.running = Some(id);

                let ptr = self as *mut Scheduler as usize;
                let t = unsafe { ctx.resume(ptr) };
                self.after_switch(id, t);
            }
            other => panic!("resume of {} in state '{}'", id, other),
        }
    }

    /// Host side of a switch back out of a coroutine.
    ///
    /// A pause leaves the record suspended and delivers its stack
    /// watermark through the transfer payload; the live region is saved
    /// here, on the host stack. A completed coroutine already destroyed
    /// its record (the slot is empty, or reused by an on-delete hook), so
    /// its dead context is simply dropped.
    fn after_switch(&mut self, id: CoroutineId, t: Transfer) {
        let suspended = matches!(
            self.slots.get(id),
            Some(record) if record.status == CoroutineStatus::Suspended
        );
        if !suspended {
            return;
        }

        let top = self.scratch.top() as usize;
        let watermark = t.data;
        debug_assert!(watermark <= top && watermark > self.scratch.floor());

        let depth = top - watermark;
        assert!(
            depth <= self.scratch.limit(),
            "{} overflowed the shared stack: {} bytes used, limit {}",
            id,
            depth,
            self.scratch.limit(),
        );

        let save_len = (depth + SWITCH_RED_ZONE).min(self.scratch.limit());
        let record = self.slots.get_mut(id).expect("suspended record vanished");
        unsafe { record.snapshot.capture((top - save_len) as *const u8, save_len) };
        record.context = Some(t.context);
    }

    /// Destroy a coroutine record, firing its on-delete hook.
    ///
    /// Returns `false` if the slot was already empty. A coroutine
    /// destroyed while suspended never runs again: locals captured in its
    /// snapshot are released as raw bytes, not dropped. Well-behaved
    /// coroutines exit through their own body instead (see
    /// [`is_fatal`](Scheduler::is_fatal)).
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub fn destroy(&mut self, id: CoroutineId) -> bool {
        let Some(mut record) = self.slots.remove(id) else {
            return false;
        };
        log::LogBuilder::new(LogLevel::Debug)
            .target(LOG_TARGET)
            .message("coroutine destroyed")
            .field_int("id", id.index() as i64)
            .field_int("live", self.slots.len() as i64)
            .emit();
        // The task is absent only when the record is torn down from inside
        // its own timeout hook; the hook already owns the task then.
        if let Some(mut task) = record.task.take() {
            task.on_delete(self);
        }
        true
    }

    /// Expire coroutines older than `life`, checking at most `max_checks`
    /// slots (and never more than the table capacity) in one call.
    ///
    /// The scan resumes where the previous call stopped and wraps
    /// circularly, so repeated calls visit every slot no matter how small
    /// `max_checks` is. Each expired coroutine gets its on-timeout hook,
    /// its fatal flag set, and one forced scheduling turn; it is expected
    /// to notice the flag at its next pause point and return. Age is
    /// measured from creation, so a coroutine that survives its forced
    /// turn is expired again by later sweeps.
    ///
    /// Returns the number of coroutines expired by this call.
    pub fn sweep(&mut self, max_checks: usize, life: Duration) -> usize {
        let cap = self.slots.capacity();
        let now = Instant::now();
        let mut expired = 0;

        for _ in 0..max_checks.min(cap) {
            let index = if self.sweep_cursor >= cap { 0 } else { self.sweep_cursor };
            self.sweep_cursor = index + 1;
            let id = CoroutineId::new(index);

            let age = match self.slots.get(id) {
                None => continue,
                Some(record) => now.duration_since(record.created_at),
            };
            if age < life {
                continue;
            }

            log::LogBuilder::new(LogLevel::Debug)
                .target(LOG_TARGET)
                .message("coroutine expired")
                .field_int("id", index as i64)
                .field_int("age_ms", age.as_millis() as i64)
                .emit();

            // The hook gets the scheduler and the task simultaneously, so
            // the task is taken out of the record for the duration.
            let mut task = self
                .slots
                .get_mut(id)
                .and_then(|record| record.task.take())
                .expect("live record has no task");
            task.on_timeout(self, id);

            match self.slots.get_mut(id) {
                Some(record) if record.task.is_none() => {
                    record.task = Some(task);
                    record.fatal = true;
                }
                // The hook destroyed the record (or its slot was reused):
                // nothing left to flag or resume, but it still expired.
                _ => {
                    expired += 1;
                    continue;
                }
            }

            expired += 1;
            self.resume(id);
        }

        expired
    }

    /// Id of the currently executing coroutine, `None` between turns.
    pub fn running_id(&self) -> Option<CoroutineId> {
        self.running
    }

    /// Status of a coroutine; `Dead` if the slot is empty.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub fn status(&self, id: CoroutineId) -> CoroutineStatus {
        match self.slots.get(id) {
            Some(record) => record.status,
            None => CoroutineStatus::Dead,
        }
    }

    /// Whether `id` currently names a live coroutine. Tolerates any id.
    pub fn exists(&self, id: CoroutineId) -> bool {
        self.slots.is_occupied(id)
    }

    /// Whether a timeout sweep has flagged this coroutine. `false` for an
    /// empty slot.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub fn is_fatal(&self, id: CoroutineId) -> bool {
        self.slots.get(id).map(|record| record.fatal).unwrap_or(false)
    }

    /// The user payload registered by a coroutine's task, `None` for an
    /// empty slot or a task without one.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub fn user_data(&self, id: CoroutineId) -> Option<&dyn Any> {
        self.slots.get(id)?.task.as_ref()?.user_data()
    }

    /// Current slot table capacity.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Number of live coroutines.
    pub fn live_count(&self) -> usize {
        self.slots.len()
    }

    /// Tear the scheduler down, destroying every still-live record.
    ///
    /// On-delete hooks fire for each; bodies do not get a final turn. This
    /// also runs on `Drop`; `close` just makes the teardown explicit.
    pub fn close(self) {
        // Drop does the work.
    }

    fn teardown(&mut self) {
        let live = self.slots.len();
        for index in 0..self.slots.capacity() {
            let id = CoroutineId::new(index);
            if self.slots.is_occupied(id) {
                self.destroy(id);
            }
        }
        if live > 0 {
            log::LogBuilder::new(LogLevel::Debug)
                .target(LOG_TARGET)
                .message("scheduler closed")
                .field_int("reclaimed", live as i64)
                .emit();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("running", &self.running)
            .field("live", &self.slots.len())
            .field("capacity", &self.slots.capacity())
            .field("sweep_cursor", &self.sweep_cursor)
            .finish()
    }
}

/// Capability handle passed to a running coroutine body.
///
/// A `Yielder` only ever exists inside [`CoroutineTask::run`], which makes
/// "yield with no running coroutine" unrepresentable. Besides pausing, it
/// exposes the scheduler operations the original design hands to every
/// callback: registering new coroutines and the read-only queries.
pub struct Yielder {
    sched: *mut Scheduler,
    id: CoroutineId,
}

impl Yielder {
    /// The id of the coroutine this body belongs to.
    pub fn id(&self) -> CoroutineId {
        self.id
    }

    /// Suspend the current coroutine and return control to the host.
    ///
    /// The live region of the shared stack is saved into the coroutine's
    /// snapshot; the call returns when the host resumes this coroutine
    /// again, with every local intact.
    pub fn pause(&mut self) {
        self.sched = suspend_current(self.sched);
    }

    /// Whether a timeout sweep has flagged this coroutine. A body that
    /// sees `true` should wind down and return promptly.
    pub fn is_fatal(&self) -> bool {
        let id = self.id;
        unsafe { (*self.sched).is_fatal(id) }
    }

    /// Register a new coroutine from inside a body.
    pub fn spawn(&mut self, task: impl CoroutineTask + 'static) -> Result<CoroutineId, SpawnError> {
        unsafe { (*self.sched).spawn(task) }
    }

    /// Register a closure as a new coroutine from inside a body.
    pub fn spawn_fn<F>(&mut self, body: F) -> Result<CoroutineId, SpawnError>
    where
        F: FnMut(&mut Yielder) + 'static,
    {
        unsafe { (*self.sched).spawn_fn(body) }
    }

    /// Status of any coroutine on this scheduler.
    pub fn status(&self, id: CoroutineId) -> CoroutineStatus {
        unsafe { (*self.sched).status(id) }
    }

    /// Whether `id` names a live coroutine.
    pub fn exists(&self, id: CoroutineId) -> bool {
        unsafe { (*self.sched).exists(id) }
    }

    /// Id of the running coroutine, which is always `Some(self.id())` here.
    pub fn running_id(&self) -> Option<CoroutineId> {
        unsafe { (*self.sched).running_id() }
    }

    /// Number of live coroutines.
    pub fn live_count(&self) -> usize {
        unsafe { (*self.sched).live_count() }
    }

    /// Current slot table capacity.
    pub fn capacity(&self) -> usize {
        unsafe { (*self.sched).capacity() }
    }
}

impl fmt::Debug for Yielder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Yielder").field("id", &self.id).finish()
    }
}

/// Coroutine side of a pause.
///
/// Must stay out of line: the watermark probe has to sit below every
/// caller frame that needs restoring, and everything deeper than it (this
/// frame's remainder, the switch wrapper, the primitive's register spill)
/// is covered by the red zone.
///
/// The scheduler may have been moved by the host while we were suspended,
/// so the switch back in re-delivers the current scheduler address through
/// the transfer payload; nothing captured before the suspension is used
/// after it.
#[inline(never)]
fn suspend_current(sched: *mut Scheduler) -> *mut Scheduler {
    let probe: u8 = 0;
    let watermark = &probe as *const u8 as usize;

    let host = unsafe {
        let s = &mut *sched;
        let id = s.running.take().expect("pause with no running coroutine");
        let record = s.slots.get_mut(id).expect("running coroutine has no record");
        record.status = CoroutineStatus::Suspended;
        s.host.take().expect("no host context to suspend into")
    };

    let t = unsafe { host.resume(watermark) };

    let fresh = t.data as *mut Scheduler;
    unsafe {
        (*fresh).host = Some(t.context);
    }
    fresh
}

/// Entry point for every coroutine, running on the shared scratch stack.
///
/// Receives the host context and the scheduler address, runs the body,
/// then destroys the record and jumps back to the host. The on-delete hook
/// still observes `running_id() == Some(id)`, exactly like the original
/// completion path; `running` is cleared right after.
extern "C" fn trampoline(t: Transfer) -> ! {
    let sched = t.data as *mut Scheduler;

    let (id, task) = unsafe {
        (*sched).host = Some(t.context);
        let id = (*sched)
            .running
            .expect("entered the shared stack with no running coroutine");
        let record = (*sched)
            .slots
            .get_mut(id)
            .expect("running coroutine has no record");
        let task: *mut Box<dyn CoroutineTask> = record
            .task
            .as_mut()
            .expect("running coroutine has no task");
        (id, task)
    };

    let mut yielder = Yielder { sched, id };
    unsafe { (*task).run(&mut yielder) };

    // Any pause in between may have re-pointed the handle.
    let sched = yielder.sched;
    unsafe {
        (*sched).destroy(id);
        (*sched).running = None;
        let host = (*sched)
            .host
            .take()
            .expect("no host context to return to");
        let _ = host.resume(0);
    }
    unreachable!("a completed coroutine context was resumed");
}
