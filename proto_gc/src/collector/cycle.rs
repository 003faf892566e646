//! Synchronous trial deletion.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A ⇄ B, no external handles            A ⇄ B, C holds A                │
//! │                                                                         │
//! │  mark_gray:  A(1→0) B(1→0) gray         A(2→1) B(1→0) gray              │
//! │  scan:       A=0, B=0 → white           A=1 → scan_black, B restored    │
//! │  collect:    A, B queued                nothing queued                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every walk runs off an explicit worklist so deep graphs cannot overflow
//! the native stack.

use super::CollectionResult;
use crate::Color;
use crate::heap::HeapContext;
use crate::node::NodeRef;
use rustc_hash::FxHashSet;

/// State of one collection pass.
pub(super) struct CyclePass<'a> {
    context: &'a HeapContext,
    /// Permanent roots, snapshotted when the pass starts.
    permanent: FxHashSet<NodeRef>,
    /// Shared worklist for the graph walks.
    worklist: Vec<NodeRef>,
    result: CollectionResult,
}

impl<'a> CyclePass<'a> {
    pub(super) fn new(context: &'a HeapContext) -> Self {
        Self {
            context,
            permanent: FxHashSet::default(),
            worklist: Vec::with_capacity(64),
            result: CollectionResult::default(),
        }
    }

    /// Run all four phases, in order.
    pub(super) fn run(mut self) -> CollectionResult {
        let global_roots = self.context.global_roots();
        self.permanent = global_roots.iter().copied().collect();
        self.result.permanent_roots = self.permanent.len();

        let candidates = self.context.roots().take();
        self.result.roots_examined = candidates.len();

        let candidates = self.mark_roots(candidates);
        log::trace!("mark roots: {} candidates left", candidates.len());

        self.protect_permanent(&global_roots);
        self.scan_roots(&candidates);
        log::trace!("scan roots: {} whitened", self.result.nodes_whitened);

        self.collect_roots(&candidates, &global_roots);
        log::trace!("collect roots: {} queued", self.context.pending_garbage());

        self.result.nodes_freed = self.context.free_garbage(true);
        self.result
    }

    // =========================================================================
    // Phase 1: MarkRoots
    // =========================================================================

    /// Gray the subgraph of every root still Purple; drop the rest from the
    /// root set. Returns the roots that were grayed.
    fn mark_roots(&mut self, candidates: Vec<NodeRef>) -> Vec<NodeRef> {
        let mut grayed = Vec::with_capacity(candidates.len());

        for node in candidates {
            let header = node.header();
            if header.color() == Color::Purple {
                self.mark_gray(node);
                grayed.push(node);
                continue;
            }

            header.set_buffered(false);
            // Released while buffered: left here for us to free.
            if header.color() == Color::Black
                && header.count() == 0
                && !self.permanent.contains(&node)
            {
                self.context.enqueue_free(node);
            }
        }

        grayed
    }

    /// Color `root` and everything reachable from it Gray, subtracting each
    /// internal edge from its target's count.
    ///
    /// Green children lose the edge but are not entered.
    fn mark_gray(&mut self, root: NodeRef) {
        root.header().set_color(Color::Gray);
        self.worklist.push(root);

        while let Some(node) = self.worklist.pop() {
            for child in node.child_edges() {
                let header = child.header();
                header.decrement();
                if !matches!(header.color(), Color::Gray | Color::Green) {
                    header.set_color(Color::Gray);
                    self.worklist.push(child);
                }
            }
        }
    }

    // =========================================================================
    // Phase 2: ScanRoots
    // =========================================================================

    /// Permanent roots are live by definition; undo the trial deletion of
    /// any that were grayed.
    fn protect_permanent(&mut self, global_roots: &[NodeRef]) {
        for &node in global_roots {
            if node.header().color() == Color::Gray {
                self.scan_black(node);
            }
        }
    }

    fn scan_roots(&mut self, candidates: &[NodeRef]) {
        for &node in candidates {
            self.scan(node);
        }
    }

    /// Gray nodes with a remaining count are externally referenced and get
    /// restored; gray nodes at zero turn White.
    fn scan(&mut self, root: NodeRef) {
        let mut pending = vec![root];

        while let Some(node) = pending.pop() {
            let header = node.header();
            if header.color() != Color::Gray {
                continue;
            }
            if header.count() > 0 {
                self.scan_black(node);
            } else {
                header.set_color(Color::White);
                self.result.nodes_whitened += 1;
                pending.extend(node.child_edges());
            }
        }
    }

    /// Recolor `root` Black and give back every edge the trial deletion
    /// took from its subgraph.
    ///
    /// Green children get their edge back but are not entered.
    fn scan_black(&mut self, root: NodeRef) {
        let header = root.header();
        if header.color() == Color::White {
            self.unwhiten();
        }
        header.set_color(Color::Black);
        self.worklist.push(root);

        while let Some(node) = self.worklist.pop() {
            for child in node.child_edges() {
                let header = child.header();
                header.increment();
                match header.color() {
                    Color::Black | Color::Green => {}
                    color => {
                        if color == Color::White {
                            self.unwhiten();
                        }
                        header.set_color(Color::Black);
                        self.worklist.push(child);
                    }
                }
            }
        }
    }

    /// A node counted as whitened was proven live after all.
    #[inline]
    fn unwhiten(&mut self) {
        self.result.nodes_whitened = self.result.nodes_whitened.saturating_sub(1);
    }

    // =========================================================================
    // Phase 3: CollectRoots
    // =========================================================================

    fn collect_roots(&mut self, candidates: &[NodeRef], global_roots: &[NodeRef]) {
        for &node in candidates {
            node.header().set_buffered(false);
        }
        self.context.roots().seed(global_roots);

        for &node in candidates {
            if !self.context.is_suppressed(node) {
                self.collect_white(node);
            }
        }
    }

    /// Queue every White node reachable from `root`.
    ///
    /// A Green child whose last referrers were all White has hit zero; it
    /// goes through the ordinary Green release. Permanent roots never do.
    fn collect_white(&mut self, root: NodeRef) {
        self.worklist.push(root);

        while let Some(node) = self.worklist.pop() {
            let header = node.header();
            match header.color() {
                Color::White if !header.is_buffered() => {
                    header.set_color(Color::Black);
                    self.worklist.extend(node.child_edges());
                    self.context.enqueue_free(node);
                }
                Color::Green
                    if header.count() == 0
                        && !header.is_garbaged()
                        && !self.permanent.contains(&node) =>
                {
                    self.context.release(node);
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::heap::Heap;
    use crate::roots::Handle;
    use crate::trace::{Trace, Tracer};
    use crate::Color;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Slot {
        edges: RefCell<Vec<Handle<Slot>>>,
    }

    unsafe impl Trace for Slot {
        fn trace(&self, tracer: &mut dyn Tracer) {
            self.edges.trace(tracer);
        }
    }

    fn link(from: &Handle<Slot>, to: &Handle<Slot>) {
        from.edges.borrow_mut().push(to.clone());
    }

    #[test]
    fn test_empty_pass() {
        let heap = Heap::with_defaults();
        let result = heap.collect_cycles().expect("not nested");
        assert_eq!(result.roots_examined, 0);
        assert_eq!(result.nodes_freed, 0);
    }

    #[test]
    fn test_two_cycle_whitened_and_freed() {
        let heap = Heap::with_defaults();
        let a = heap.alloc(Slot::default());
        let b = heap.alloc(Slot::default());
        link(&a, &b);
        link(&b, &a);
        let (a_node, b_node) = (a.node(), b.node());
        drop(b);
        drop(a);

        assert_eq!(a_node.header().count(), 1);
        assert_eq!(b_node.header().count(), 1);
        assert_eq!(heap.root_count(), 2);

        let result = heap.collect_cycles().expect("not nested");
        assert_eq!(result.nodes_whitened, 2);
        assert_eq!(result.nodes_freed, 2);
        assert_eq!(heap.stats().live_nodes(), 0);
    }

    #[test]
    fn test_external_reference_restores_counts() {
        let heap = Heap::with_defaults();
        let a = heap.alloc(Slot::default());
        let b = heap.alloc(Slot::default());
        link(&a, &b);
        link(&b, &a);
        drop(b);

        let result = heap.collect_cycles().expect("not nested");
        assert_eq!(result.nodes_whitened, 0);
        assert_eq!(result.nodes_freed, 0);

        // a: external handle + b's edge; b: a's edge
        assert_eq!(a.count(), 2);
        assert_eq!(a.color(), Color::Black);
        let b = a.edges.borrow()[0].clone();
        assert_eq!(b.count(), 2);
        assert_eq!(b.color(), Color::Black);
    }

    #[test]
    fn test_green_child_of_cycle_released() {
        let heap = Heap::with_defaults();
        let leaf = heap.alloc_acyclic(Slot::default());
        let a = heap.alloc(Slot::default());
        link(&a, &a);
        link(&a, &leaf);
        drop(leaf);
        drop(a);

        let result = heap.collect_cycles().expect("not nested");
        assert_eq!(result.nodes_whitened, 1);
        assert_eq!(result.nodes_freed, 2);
        assert_eq!(heap.stats().live_nodes(), 0);
    }

    #[test]
    fn test_shared_green_child_survives() {
        let heap = Heap::with_defaults();
        let leaf = heap.alloc_acyclic(Slot::default());
        let a = heap.alloc(Slot::default());
        link(&a, &a);
        link(&a, &leaf);
        drop(a);

        heap.collect_cycles();
        assert_eq!(leaf.count(), 1);
        assert_eq!(leaf.color(), Color::Green);
        assert_eq!(heap.stats().live_nodes(), 1);
    }

    #[test]
    fn test_permanent_root_cycle_survives() {
        let heap = Heap::with_defaults();
        let a = heap.alloc(Slot::default());
        let b = heap.alloc(Slot::default());
        link(&a, &b);
        link(&b, &a);
        let a_node = a.node();
        heap.set_root_provider(Box::new(vec![a.clone()]));
        drop(b);
        drop(a);

        let result = heap.collect_cycles().expect("not nested");
        assert_eq!(result.permanent_roots, 1);
        assert_eq!(result.nodes_freed, 0);
        // b's edge plus the provider's handle
        assert_eq!(a_node.header().count(), 2);
        assert_eq!(a_node.header().color(), Color::Purple);
        assert!(heap.roots().contains(a_node));

        // Unregistered, the cycle is ordinary garbage again
        heap.clear_root_provider();
        let result = heap.collect_cycles().expect("not nested");
        assert_eq!(result.nodes_freed, 2);
        assert_eq!(heap.stats().live_nodes(), 0);
    }

    #[test]
    fn test_green_permanent_root_outlives_its_referrers() {
        let heap = Heap::with_defaults();
        let leaf = heap.alloc_acyclic(Slot::default());
        let a = heap.alloc(Slot::default());
        link(&a, &a);
        link(&a, &leaf);
        let leaf_node = leaf.node();
        heap.set_root_provider(Box::new(vec![leaf.clone()]));
        drop(leaf);
        drop(a);

        let result = heap.collect_cycles().expect("not nested");
        assert_eq!(result.nodes_freed, 1);
        assert_eq!(leaf_node.header().count(), 1);
        assert_eq!(leaf_node.header().color(), Color::Green);
        assert!(!heap.roots().contains(leaf_node));

        heap.clear_root_provider();
        assert_eq!(heap.stats().live_nodes(), 0);
    }
}
