//! Heap ownership and allocation.
//!
//! The heap is split in two:
//! - `Heap`: the owner, created once by the embedding runtime; dropping it
//!   tears the collector down
//! - `HeapContext`: the shared collector state every handle points back to

mod context;

pub use context::HeapContext;

use crate::Color;
use crate::config::{CollectorConfig, ConfigError};
use crate::roots::Handle;
use crate::trace::Trace;

use std::ops::Deref;
use std::rc::Rc;

/// Owner of a counted heap.
///
/// `Heap` dereferences to [`HeapContext`], so every collector entry point
/// is available on it directly.
///
/// # Example
///
/// ```ignore
/// let heap = Heap::new(CollectorConfig::low_latency())?;
/// let node = heap.alloc(42i64);
/// assert_eq!(*node, 42);
/// ```
pub struct Heap {
    context: Rc<HeapContext>,
}

impl Heap {
    /// Create a new heap with the given configuration.
    pub fn new(config: CollectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!(
            "heap created: root trigger {}, collect on drop {}",
            config.root_buffer_trigger,
            config.collect_on_drop
        );
        Ok(Self {
            context: Rc::new(HeapContext::new(config)),
        })
    }

    /// Create a heap with default configuration.
    pub fn with_defaults() -> Self {
        Self {
            context: Rc::new(HeapContext::new(CollectorConfig::default())),
        }
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate a node that takes part in cycle analysis.
    #[inline]
    pub fn alloc<T: Trace + 'static>(&self, value: T) -> Handle<T> {
        self.context.alloc_node(value, Color::Black)
    }

    /// Allocate a node the caller guarantees can never be part of a cycle.
    ///
    /// The node is colored Green: it is freed the moment its count reaches
    /// zero and never enters the root set. If it does end up on a cycle,
    /// that cycle leaks.
    #[inline]
    pub fn alloc_acyclic<T: Trace + 'static>(&self, value: T) -> Handle<T> {
        self.context.alloc_node(value, Color::Green)
    }

    /// Get the shared collector context.
    pub fn context(&self) -> &Rc<HeapContext> {
        &self.context
    }
}

impl Deref for Heap {
    type Target = HeapContext;

    #[inline]
    fn deref(&self) -> &HeapContext {
        &self.context
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        // The provider may own handles; releasing it breaks the
        // context -> provider -> handle -> context loop.
        self.context.clear_root_provider();

        if self.context.config().collect_on_drop {
            if let Some(result) = self.context.collect_cycles() {
                log::debug!("final collection freed {} nodes", result.nodes_freed);
            }
        }
    }
}
