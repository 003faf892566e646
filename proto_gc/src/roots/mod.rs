//! Suspect roots and permanent roots.
//!
//! Two kinds of roots matter to the cycle collector:
//! - Suspect roots: nodes whose count dropped without reaching zero, buffered
//!   in the [`RootSet`] until the next pass
//! - Permanent roots: nodes the embedding application declares always live
//!   (interpreter globals), supplied by a [`RootProvider`]
//!
//! Owning handles live here too, since they are what makes roots.

mod handles;

pub use handles::Handle;

use crate::Color;
use crate::node::NodeRef;
use crate::trace::{Trace, Tracer};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;

/// Working set of suspect roots awaiting cycle analysis.
///
/// A node is in the set iff its `buffered` flag is set; the flag is what
/// prevents duplicate entries. A position index lets a released root
/// leave the set in O(1). Permanent roots reseeded by a pass are tracked
/// apart so they don't count towards the collection trigger.
pub struct RootSet {
    inner: RefCell<Entries>,
}

#[derive(Default)]
struct Entries {
    nodes: Vec<NodeRef>,
    index: FxHashMap<NodeRef, usize>,
    seeded: FxHashSet<NodeRef>,
}

impl RootSet {
    /// Create an empty root set.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty root set with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RefCell::new(Entries {
                nodes: Vec::with_capacity(capacity),
                index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
                seeded: FxHashSet::default(),
            }),
        }
    }

    /// Buffer a node. The caller has already set its `buffered` flag.
    pub(crate) fn push(&self, node: NodeRef) {
        debug_assert!(node.header().is_buffered());
        let mut inner = self.inner.borrow_mut();
        let position = inner.nodes.len();
        inner.index.insert(node, position);
        inner.nodes.push(node);
    }

    /// Remove a node, returning false if it is not in the set.
    ///
    /// The caller clears the `buffered` flag.
    pub(crate) fn remove(&self, node: NodeRef) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(position) = inner.index.remove(&node) else {
            return false;
        };
        inner.seeded.remove(&node);
        inner.nodes.swap_remove(position);
        if let Some(&moved) = inner.nodes.get(position) {
            inner.index.insert(moved, position);
        }
        true
    }

    /// Take the current contents, leaving the set empty.
    pub(crate) fn take(&self) -> Vec<NodeRef> {
        let mut inner = self.inner.borrow_mut();
        inner.index.clear();
        inner.seeded.clear();
        std::mem::take(&mut inner.nodes)
    }

    /// Seed the set with permanent roots, buffering those not yet buffered.
    ///
    /// Seeded roots turn Purple so the next pass examines them again; once
    /// their provider is gone they are collectable like any other node.
    pub(crate) fn seed(&self, permanent: &[NodeRef]) {
        for &node in permanent {
            let header = node.header();
            if !header.is_buffered() && !header.color().is_acyclic() {
                header.set_color(Color::Purple);
                header.set_buffered(true);
                self.push(node);
                self.inner.borrow_mut().seeded.insert(node);
            }
        }
    }

    /// Get number of buffered roots.
    pub fn len(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    /// Number of buffered roots that are not reseeded permanent roots.
    pub fn suspect_count(&self) -> usize {
        let inner = self.inner.borrow();
        inner.nodes.len() - inner.seeded.len()
    }

    /// Check if no roots are buffered.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().nodes.is_empty()
    }

    /// Check if a node is buffered in this set.
    pub fn contains(&self, node: NodeRef) -> bool {
        self.inner.borrow().index.contains_key(&node)
    }

    /// Check the set's invariants: every entry is flagged buffered and not
    /// Green, and appears exactly once.
    pub fn verify(&self) -> bool {
        let inner = self.inner.borrow();
        inner.index.len() == inner.nodes.len()
            && inner.seeded.iter().all(|node| inner.index.contains_key(node))
            && inner.nodes.iter().enumerate().all(|(position, node)| {
                let header = node.header();
                header.is_buffered()
                    && !header.color().is_acyclic()
                    && inner.index.get(node) == Some(&position)
            })
    }
}

impl Default for RootSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for the embedding application's permanent roots.
///
/// Permanent roots are never reclaimed by a collection pass, even when
/// nothing outside their own cycles references them.
///
/// # Safety
///
/// The collector dereferences every reported node. Implementations must:
/// 1. Report only nodes kept alive by a [`Handle`] the provider owns, for
///    as long as the provider is registered
/// 2. Not create or drop handles while reporting
///
/// A node reported without such a handle can be freed by ordinary counting
/// while the provider still names it.
pub unsafe trait RootProvider {
    /// Report every permanent root.
    fn global_roots(&self, tracer: &mut dyn Tracer);
}

/// Safety: Every reported node is held by one of the vector's handles.
unsafe impl<T: Trace + 'static> RootProvider for Vec<Handle<T>> {
    fn global_roots(&self, tracer: &mut dyn Tracer) {
        self.trace(tracer);
    }
}
