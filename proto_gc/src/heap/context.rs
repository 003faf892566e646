//! Collector context: the counting protocol and the garbage queue.

use crate::Color;
use crate::collector::{self, CollectionResult};
use crate::config::CollectorConfig;
use crate::flags::{PagingScope, SuppressionFlags};
use crate::node::{GcBox, NodeHeader, NodeRef};
use crate::roots::{Handle, RootProvider, RootSet};
use crate::stats::CollectorStats;
use crate::trace::{EdgeCollector, Trace};

use std::cell::RefCell;
use std::ptr::NonNull;
use std::rc::Rc;

/// All state shared by the handles of one heap.
///
/// Handles hold an `Rc<HeapContext>`, so collaborators that only see a
/// handle can still reach the collector through [`Handle::context`].
pub struct HeapContext {
    /// Configuration parameters.
    config: CollectorConfig,

    /// Paging, freeing and collecting switches.
    flags: SuppressionFlags,

    /// Suspect roots awaiting the next pass.
    roots: RootSet,

    /// Nodes queued for physical deletion.
    garbage: RefCell<Vec<NodeRef>>,

    /// Supplier of permanent roots.
    root_provider: RefCell<Option<Box<dyn RootProvider>>>,

    /// Collector statistics.
    stats: CollectorStats,
}

impl HeapContext {
    pub(crate) fn new(config: CollectorConfig) -> Self {
        let roots = RootSet::with_capacity(config.initial_root_capacity);
        Self {
            config,
            flags: SuppressionFlags::new(),
            roots,
            garbage: RefCell::new(Vec::new()),
            root_provider: RefCell::new(None),
            stats: CollectorStats::new(),
        }
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate a node and return the first handle to it.
    pub(crate) fn alloc_node<T: Trace + 'static>(
        self: &Rc<Self>,
        value: T,
        color: Color,
    ) -> Handle<T> {
        let boxed = Box::new(GcBox {
            header: NodeHeader::new(color),
            value,
        });
        let ptr = NonNull::from(Box::leak(boxed));
        self.stats.record_allocation();
        Handle::new(Rc::clone(self), ptr)
    }

    // =========================================================================
    // Counting Protocol
    // =========================================================================

    /// Check if counting on `node` is switched off by an open paging window.
    #[inline]
    pub(crate) fn is_suppressed(&self, node: NodeRef) -> bool {
        self.flags.paging() && node.header().is_paged()
    }

    /// A handle to `node` was created.
    pub(crate) fn upcount(&self, node: NodeRef) {
        if self.flags.freeing() || self.is_suppressed(node) {
            return;
        }
        let header = node.header();
        header.increment();
        if !header.color().is_acyclic() {
            header.set_color(Color::Black);
        }
    }

    /// A handle to `node` was dropped.
    pub(crate) fn dncount(&self, node: NodeRef) {
        // While freeing, `node` may already be deleted; don't touch it.
        if self.flags.freeing() || self.is_suppressed(node) {
            return;
        }
        if self.decrement_edge(node) {
            self.release(node);
        }
    }

    /// Decrement `node` and classify the result.
    ///
    /// Returns true if the count reached zero and the node must be released.
    /// Otherwise the node has become a possible root.
    fn decrement_edge(&self, node: NodeRef) -> bool {
        if node.header().decrement() == 0 {
            return true;
        }
        self.possible_root(node);
        false
    }

    /// Release a node whose count reached zero, and every node that reaches
    /// zero as a consequence.
    ///
    /// Children are decremented as if the node were already gone. Green
    /// nodes keep their color; other nodes turn Black. Outside a pass a
    /// buffered node leaves the root set and is queued with the rest; during
    /// a pass it stays buffered and the next pass frees it.
    pub(crate) fn release(&self, node: NodeRef) {
        let mut pending = vec![node];

        while let Some(node) = pending.pop() {
            for child in node.child_edges() {
                if self.is_suppressed(child) {
                    continue;
                }
                if self.decrement_edge(child) {
                    pending.push(child);
                }
            }

            let header = node.header();
            if !header.color().is_acyclic() {
                header.set_color(Color::Black);
                if header.is_buffered() {
                    if self.flags.collecting() {
                        continue;
                    }
                    self.roots.remove(node);
                    header.set_buffered(false);
                }
            }
            self.queue_garbage(node);
            log::trace!("released {:?}", node);
        }

        self.drain_if_idle();
    }

    /// Record that `node` may head a garbage cycle.
    pub(crate) fn possible_root(&self, node: NodeRef) {
        let header = node.header();
        match header.color() {
            Color::Green => return,
            Color::Purple => {}
            _ => header.set_color(Color::Purple),
        }
        if !header.is_buffered() {
            header.set_buffered(true);
            self.roots.push(node);
            self.stats.record_root_buffered();
        }
    }

    // =========================================================================
    // Garbage Queue
    // =========================================================================

    /// Queue a node for physical deletion, freeing at once outside a pass.
    pub(crate) fn enqueue_free(&self, node: NodeRef) {
        self.queue_garbage(node);
        self.drain_if_idle();
    }

    fn queue_garbage(&self, node: NodeRef) {
        let header = node.header();
        if header.is_garbaged() {
            return;
        }
        header.set_garbaged(true);
        self.garbage.borrow_mut().push(node);
    }

    fn drain_if_idle(&self) {
        if !self.flags.collecting() && !self.flags.freeing() {
            self.free_garbage(false);
        }
    }

    /// Finalize and delete every queued node that is not paging-suppressed.
    ///
    /// All finalize hooks run before any node is deleted, so a hook may
    /// still look at other nodes of the same batch. Returns the number of
    /// nodes deleted.
    pub(crate) fn free_garbage(&self, by_collection: bool) -> usize {
        let queued = std::mem::take(&mut *self.garbage.borrow_mut());
        if queued.is_empty() {
            return 0;
        }

        let (doomed, spared): (Vec<NodeRef>, Vec<NodeRef>) =
            queued.into_iter().partition(|&node| !self.is_suppressed(node));
        for node in &spared {
            node.header().set_garbaged(false);
        }

        self.flags.set_freeing(true);
        for node in &doomed {
            // SAFETY: queued nodes have no counted referrers left, and each
            // node is queued at most once thanks to the garbaged flag.
            unsafe { node.finalize() };
        }
        for &node in &doomed {
            // SAFETY: as above; handles dropped by the value's destructor
            // see the freeing flag and leave their targets alone.
            unsafe { node.destroy() };
        }
        self.flags.set_freeing(false);

        if !spared.is_empty() {
            log::trace!("spared {} paged nodes", spared.len());
            self.stats.record_spared(spared.len());
        }
        self.stats.record_frees(doomed.len(), by_collection);
        doomed.len()
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Run a cycle collection pass over the buffered suspect roots.
    ///
    /// Must only be called at a safe point: no borrows of managed values may
    /// be outstanding. Returns `None` if a pass is already running or
    /// garbage is being freed; the nested call is swallowed.
    pub fn collect_cycles(&self) -> Option<CollectionResult> {
        collector::collect_cycles(self)
    }

    /// Check if the root set has grown past the configured trigger.
    ///
    /// Permanent roots reseeded by the last pass don't count.
    #[inline]
    pub fn should_collect(&self) -> bool {
        self.roots.suspect_count() >= self.config.root_buffer_trigger
    }

    /// Run a pass if [`should_collect`](Self::should_collect) says so.
    pub fn collect_if_needed(&self) -> Option<CollectionResult> {
        if self.should_collect() {
            self.collect_cycles()
        } else {
            None
        }
    }

    /// Check if a collection pass is running.
    ///
    /// An object cache polls this to avoid evicting paged objects mid-pass.
    #[inline]
    pub fn cycle_collecting(&self) -> bool {
        self.flags.collecting()
    }

    // =========================================================================
    // Paging
    // =========================================================================

    /// Open a paging window. Windows nest.
    pub fn notify_start_paging(&self) {
        self.flags.start_paging();
        log::trace!("paging depth {}", self.flags.paging_depth());
    }

    /// Close the innermost paging window.
    pub fn notify_end_paging(&self) {
        self.flags.end_paging();
        log::trace!("paging depth {}", self.flags.paging_depth());
    }

    /// Open a paging window that closes when the returned scope drops.
    pub fn paging_scope(&self) -> PagingScope<'_> {
        PagingScope::new(self)
    }

    // =========================================================================
    // Permanent Roots
    // =========================================================================

    /// Register the supplier of permanent roots, replacing any previous one.
    ///
    /// Nodes the provider reports stay alive through the handles it owns;
    /// clearing the provider drops them like any other handle.
    pub fn set_root_provider(&self, provider: Box<dyn RootProvider>) {
        // Drop the old provider outside the borrow; it may own handles.
        let previous = self.root_provider.replace(Some(provider));
        drop(previous);
    }

    /// Unregister the supplier of permanent roots.
    pub fn clear_root_provider(&self) {
        let previous = self.root_provider.take();
        drop(previous);
    }

    /// Get the current permanent roots.
    pub fn global_roots(&self) -> Vec<NodeRef> {
        let mut collector = EdgeCollector::new();
        if let Some(provider) = self.root_provider.borrow().as_ref() {
            provider.global_roots(&mut collector);
        }
        collector.into_edges().into_vec()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of buffered suspect roots.
    #[inline]
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Get the suspect root set.
    pub fn roots(&self) -> &RootSet {
        &self.roots
    }

    /// Number of nodes waiting in the garbage queue.
    pub fn pending_garbage(&self) -> usize {
        self.garbage.borrow().len()
    }

    /// Get the configuration.
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Get the suppression flags.
    pub fn flags(&self) -> &SuppressionFlags {
        &self.flags
    }

    /// Get collector statistics.
    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }
}
