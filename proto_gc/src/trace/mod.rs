//! Edge enumeration for reference counting.
//!
//! The `Trace` trait is the core interface between managed objects and the
//! collector. It is the collector's only view of the object graph: every
//! counted edge an object owns must be reported, or the trial deletion
//! bookkeeping silently goes wrong.

pub mod tracer;

pub use tracer::{CountingTracer, EdgeCollector, Tracer};

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Trait for types that can live in a counted node.
///
/// # Safety
///
/// This trait is unsafe because incorrect implementations can cause:
/// - Memory leaks (failing to report an owned handle keeps a cycle alive)
/// - Use-after-free (reporting a node that is not owned lets a pass
///   decrement a count it has no claim on)
///
/// Implementations must:
/// 1. Report EVERY [`Handle`] this value owns, directly or through nested
///    containers, exactly once per handle
/// 2. Report nothing else
/// 3. Not create or drop handles while tracing
///
/// # Example
///
/// ```ignore
/// use proto_gc::{Handle, Trace, Tracer};
/// use std::cell::RefCell;
///
/// struct Object {
///     parent: RefCell<Option<Handle<Object>>>,
///     slots: RefCell<Vec<Handle<Object>>>,
/// }
///
/// unsafe impl Trace for Object {
///     fn trace(&self, tracer: &mut dyn Tracer) {
///         self.parent.trace(tracer);
///         self.slots.trace(tracer);
///     }
/// }
/// ```
///
/// [`Handle`]: crate::Handle
pub unsafe trait Trace {
    /// Report every counted child edge of this value.
    fn trace(&self, tracer: &mut dyn Tracer);

    /// Called immediately before the node is physically deleted.
    ///
    /// During finalization:
    /// - Counting is suppressed; dropping or cloning handles has no effect
    /// - Other nodes freed in the same batch are finalized but not yet
    ///   deleted
    /// - New nodes must not be allocated
    ///
    /// Default implementation does nothing.
    fn finalize(&mut self) {}

    /// Called after [`Trace::finalize`] for nodes marked paged, so a
    /// persistence layer can record eviction bookkeeping.
    ///
    /// Default implementation does nothing.
    fn finalize_paged(&mut self) {}
}

// =============================================================================
// Trace implementations for primitives
// =============================================================================

macro_rules! impl_leaf_trace {
    ($($ty:ty),* $(,)?) => {
        $(
            /// Safety: Holds no handles.
            unsafe impl Trace for $ty {
                #[inline]
                fn trace(&self, _tracer: &mut dyn Tracer) {}
            }
        )*
    };
}

impl_leaf_trace!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    usize,
    i8,
    i16,
    i32,
    i64,
    isize,
    f32,
    f64,
    str,
    String,
);

// =============================================================================
// Trace implementations for containers
// =============================================================================

unsafe impl<T: Trace> Trace for Vec<T> {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for item in self {
            item.trace(tracer);
        }
    }
}

unsafe impl<T: Trace> Trace for VecDeque<T> {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for item in self {
            item.trace(tracer);
        }
    }
}

unsafe impl<T: Trace> Trace for Option<T> {
    fn trace(&self, tracer: &mut dyn Tracer) {
        if let Some(inner) = self {
            inner.trace(tracer);
        }
    }
}

unsafe impl<T: Trace + ?Sized> Trace for Box<T> {
    fn trace(&self, tracer: &mut dyn Tracer) {
        (**self).trace(tracer);
    }
}

unsafe impl<T: Trace> Trace for [T] {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for item in self {
            item.trace(tracer);
        }
    }
}

/// Safety: Traces through a shared borrow. Tracing while the cell is
/// mutably borrowed panics rather than under-reporting edges.
unsafe impl<T: Trace> Trace for RefCell<T> {
    fn trace(&self, tracer: &mut dyn Tracer) {
        self.borrow().trace(tracer);
    }
}

/// Safety: Keys are plain data; only values may own handles.
unsafe impl<K, V: Trace, S> Trace for HashMap<K, V, S> {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for value in self.values() {
            value.trace(tracer);
        }
    }
}

/// Safety: Keys are plain data; only values may own handles.
unsafe impl<K, V: Trace> Trace for BTreeMap<K, V> {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for value in self.values() {
            value.trace(tracer);
        }
    }
}
