//! Collector-wide suppression flags.
//!
//! Collaborators and the collector itself pause counting through these:
//! - `paging`: the persistence layer is (de)serializing a subgraph; counting
//!   on nodes marked paged is suppressed
//! - `freeing`: the garbage queue is being drained; all counting is
//!   suppressed so destructors can drop their handles freely
//! - `collecting`: a cycle collection pass is running

use crate::heap::HeapContext;
use std::cell::Cell;

/// Process-wide switches owned by a [`HeapContext`].
#[derive(Debug, Default)]
pub struct SuppressionFlags {
    /// Nesting depth of paging windows.
    paging_depth: Cell<u32>,
    /// Set while the garbage queue drains.
    freeing: Cell<bool>,
    /// Set while a collection pass runs; visible to collaborators.
    collecting: Cell<bool>,
    /// Re-entrancy guard for `collect_cycles`.
    running: Cell<bool>,
}

impl SuppressionFlags {
    /// Create flags with everything cleared.
    pub const fn new() -> Self {
        Self {
            paging_depth: Cell::new(0),
            freeing: Cell::new(false),
            collecting: Cell::new(false),
            running: Cell::new(false),
        }
    }

    /// Check if a paging window is open.
    #[inline]
    pub fn paging(&self) -> bool {
        self.paging_depth.get() > 0
    }

    /// Current paging window nesting depth.
    #[inline]
    pub fn paging_depth(&self) -> u32 {
        self.paging_depth.get()
    }

    /// Check if the garbage queue is draining.
    #[inline]
    pub fn freeing(&self) -> bool {
        self.freeing.get()
    }

    /// Check if a collection pass is running.
    #[inline]
    pub fn collecting(&self) -> bool {
        self.collecting.get()
    }

    pub(crate) fn start_paging(&self) {
        self.paging_depth.set(self.paging_depth.get() + 1);
    }

    pub(crate) fn end_paging(&self) {
        let depth = self.paging_depth.get();
        debug_assert!(depth > 0, "notify_end_paging without matching start");
        self.paging_depth.set(depth.saturating_sub(1));
    }

    pub(crate) fn set_freeing(&self, freeing: bool) {
        self.freeing.set(freeing);
    }

    /// Enter a collection pass.
    ///
    /// Returns false if a pass is already running.
    pub(crate) fn try_enter_collection(&self) -> bool {
        if self.running.get() {
            return false;
        }
        self.running.set(true);
        self.collecting.set(true);
        true
    }

    pub(crate) fn exit_collection(&self) {
        self.collecting.set(false);
        self.running.set(false);
    }
}

/// RAII paging window.
///
/// Opened by [`HeapContext::paging_scope`]; the window closes when the
/// scope is dropped.
///
/// # Example
///
/// ```ignore
/// node.set_paged(true);
/// {
///     let _scope = heap.paging_scope();
///     // Temporary handles created while (de)serializing don't count.
///     let tmp = node.clone();
///     drop(tmp);
/// }
/// ```
pub struct PagingScope<'a> {
    context: &'a HeapContext,
}

impl<'a> PagingScope<'a> {
    pub(crate) fn new(context: &'a HeapContext) -> Self {
        context.notify_start_paging();
        Self { context }
    }
}

impl Drop for PagingScope<'_> {
    fn drop(&mut self) {
        self.context.notify_end_paging();
    }
}
