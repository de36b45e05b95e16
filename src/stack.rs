//! Shared Stack & Snapshots
//!
//! The byte-copy machinery behind the suspend/resume protocol.
//!
//! A scheduler owns exactly one native stack region, the scratch stack,
//! and every coroutine body executes on it. When a coroutine suspends, the
//! bytes it is using at the tail of the scratch stack are copied out into
//! its own [`StackSnapshot`]; when it is resumed, they are copied back to
//! the same addresses before control jumps into its saved context. Total
//! memory is therefore one scratch stack plus the sum of actual peak usage
//! per live coroutine, instead of a full stack per coroutine.

use context::stack::{ProtectedFixedSizeStack, Stack};

/// Bytes saved below the measured watermark on every suspend.
///
/// The watermark is taken inside the suspend call, but the context
/// primitive spills a register record on the scratch stack below it during
/// the jump out, and the switch wrapper's own frame sits below the
/// measuring frame. One page covers both with a wide margin.
pub(crate) const SWITCH_RED_ZONE: usize = 4096;

/// The single native stack region shared by all coroutines of a scheduler.
///
/// Allocated with a guard page below it, so runaway consumption faults
/// before it can silently corrupt adjacent memory.
pub(crate) struct ScratchStack {
    inner: ProtectedFixedSizeStack,
    limit: usize,
}

impl ScratchStack {
    /// Allocate a scratch stack of `limit` usable bytes.
    pub(crate) fn new(limit: usize) -> Self {
        let inner = ProtectedFixedSizeStack::new(limit)
            .unwrap_or_else(|e| panic!("failed to allocate {} byte shared stack: {:?}", limit, e));
        Self { inner, limit }
    }

    /// The high end of the region; coroutine stacks grow down from here.
    pub(crate) fn top(&self) -> *mut u8 {
        self.inner.top() as *mut u8
    }

    /// The lowest address a coroutine may consume down to.
    pub(crate) fn floor(&self) -> usize {
        self.top() as usize - self.limit
    }

    /// Usable capacity in bytes.
    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    /// Region to hand to the context primitive when starting a coroutine.
    pub(crate) fn region(&self) -> &ProtectedFixedSizeStack {
        &self.inner
    }
}

impl std::fmt::Debug for ScratchStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchStack")
            .field("top", &self.top())
            .field("limit", &self.limit)
            .finish()
    }
}

/// A coroutine's private copy of its live region of the scratch stack.
///
/// Empty while the coroutine runs or before its first suspension. The
/// buffer grows to the coroutine's peak usage and is never shrunk.
#[derive(Default)]
pub(crate) struct StackSnapshot {
    buf: Vec<u8>,
}

impl StackSnapshot {
    /// Create an empty snapshot.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Saved length in bytes.
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether anything is currently saved.
    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Copy `len` bytes starting at `bottom` into the snapshot, replacing
    /// any previous contents.
    ///
    /// # Safety
    ///
    /// `bottom..bottom + len` must be readable memory.
    pub(crate) unsafe fn capture(&mut self, bottom: *const u8, len: usize) {
        self.buf.clear();
        self.buf.extend_from_slice(std::slice::from_raw_parts(bottom, len));
    }

    /// Copy the snapshot back so that its last byte lands just below `top`,
    /// restoring the exact addresses it was captured from.
    ///
    /// # Safety
    ///
    /// `top - len()..top` must be writable memory not currently in use as
    /// the executing stack.
    pub(crate) unsafe fn restore(&self, top: *mut u8) {
        let len = self.buf.len();
        std::ptr::copy_nonoverlapping(self.buf.as_ptr(), top.sub(len), len);
    }
}

impl std::fmt::Debug for StackSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackSnapshot")
            .field("len", &self.buf.len())
            .field("capacity", &self.buf.capacity())
            .finish()
    }
}
