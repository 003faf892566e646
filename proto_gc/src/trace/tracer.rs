//! Tracer interface for edge enumeration.

use crate::node::{Edges, NodeRef};

/// Visitor for the counted edges reported by [`Trace::trace`].
///
/// The collector uses tracers to:
/// - Collect a node's child edges before decrementing or restoring them
/// - Gather the permanent roots from a [`RootProvider`]
///
/// [`Trace::trace`]: crate::Trace::trace
/// [`RootProvider`]: crate::RootProvider
pub trait Tracer {
    /// Visit one counted reference.
    fn trace_node(&mut self, node: NodeRef);
}

/// A tracer that records every reported edge.
#[derive(Default)]
pub struct EdgeCollector {
    edges: Edges,
}

impl EdgeCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self {
            edges: Edges::new(),
        }
    }

    /// Get the recorded edges.
    pub fn edges(&self) -> &[NodeRef] {
        &self.edges
    }

    /// Number of recorded edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Check if no edges were recorded.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub(crate) fn into_edges(self) -> Edges {
        self.edges
    }
}

impl Tracer for EdgeCollector {
    #[inline]
    fn trace_node(&mut self, node: NodeRef) {
        self.edges.push(node);
    }
}

/// A counting tracer for debugging and statistics.
#[derive(Default)]
pub struct CountingTracer {
    /// Number of edges traced.
    pub node_count: usize,
}

impl CountingTracer {
    /// Create a new counting tracer.
    pub fn new() -> Self {
        Self { node_count: 0 }
    }
}

impl Tracer for CountingTracer {
    fn trace_node(&mut self, _node: NodeRef) {
        self.node_count += 1;
    }
}
