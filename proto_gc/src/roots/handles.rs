//! Owning handles.
//!
//! A `Handle` is the only thing that changes a node's count: creating or
//! cloning one increments, dropping one decrements. Holding a handle keeps
//! the node alive across collection passes.

use crate::Color;
use crate::heap::HeapContext;
use crate::node::{GcBox, NodeRef, RefCount};
use crate::trace::{Trace, Tracer};

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;
use std::rc::Rc;

/// A counted reference to a managed value.
///
/// Handles stored inside managed values are the graph's edges and must be
/// reported by the owner's [`Trace::trace`]. Handles held elsewhere (on the
/// interpreter stack, in native code) are external references.
///
/// # Example
///
/// ```ignore
/// let a = heap.alloc(Slot::default());
/// let b = a.clone(); // count 2
/// drop(b);           // count 1, node buffered as a suspect root
/// ```
pub struct Handle<T: Trace + 'static> {
    /// Collector the node belongs to.
    context: Rc<HeapContext>,
    /// The node; live while this handle's count is held.
    ptr: NonNull<GcBox<T>>,
    /// The handle shares ownership of a `T`.
    _marker: PhantomData<T>,
}

impl<T: Trace + 'static> Handle<T> {
    /// Take a new counted reference to `ptr`.
    pub(crate) fn new(context: Rc<HeapContext>, ptr: NonNull<GcBox<T>>) -> Self {
        let handle = Self {
            context,
            ptr,
            _marker: PhantomData,
        };
        handle.context.upcount(handle.node());
        handle
    }

    /// Get the type-erased node reference.
    #[inline]
    pub fn node(&self) -> NodeRef {
        NodeRef::new(self.ptr)
    }

    /// Check if two handles refer to the same node.
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Get the node's reference count.
    pub fn count(&self) -> RefCount {
        self.node().header().count()
    }

    /// Get the node's color.
    pub fn color(&self) -> Color {
        self.node().header().color()
    }

    /// Check if the node is buffered as a suspect root.
    pub fn is_buffered(&self) -> bool {
        self.node().header().is_buffered()
    }

    /// Check if the node's lifetime is managed by a persistence layer.
    pub fn is_paged(&self) -> bool {
        self.node().header().is_paged()
    }

    /// Mark the node as paged or not.
    ///
    /// While a paging window is open, counting on a paged node is
    /// suppressed. Toggle this only outside paging windows.
    pub fn set_paged(&self, paged: bool) {
        self.node().header().set_paged(paged);
    }

    /// Get the collector this node belongs to.
    pub fn context(&self) -> &Rc<HeapContext> {
        &self.context
    }
}

impl<T: Trace + 'static> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self::new(Rc::clone(&self.context), self.ptr)
    }
}

impl<T: Trace + 'static> Drop for Handle<T> {
    fn drop(&mut self) {
        self.context.dncount(self.node());
    }
}

impl<T: Trace + 'static> Deref for Handle<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the count this handle holds keeps the node out of the
        // garbage queue. Handles created inside a paging window on a paged
        // node hold no count and rely on the persistence layer instead.
        unsafe { &(*self.ptr.as_ptr()).value }
    }
}

impl<T: Trace + 'static> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("node", &self.node())
            .field("header", self.node().header())
            .finish()
    }
}

/// Safety: A handle is exactly one counted edge.
unsafe impl<T: Trace + 'static> Trace for Handle<T> {
    #[inline]
    fn trace(&self, tracer: &mut dyn Tracer) {
        tracer.trace_node(self.node());
    }
}

#[cfg(test)]
mod tests {
    use crate::Color;
    use crate::heap::Heap;
    use crate::trace::EdgeCollector;
    use crate::Trace;

    #[test]
    fn test_clone_and_drop_adjust_count() {
        let heap = Heap::with_defaults();
        let a = heap.alloc(10i64);
        assert_eq!(a.count(), 1);

        let b = a.clone();
        assert_eq!(a.count(), 2);
        assert!(super::Handle::ptr_eq(&a, &b));

        drop(b);
        assert_eq!(a.count(), 1);
        assert_eq!(a.color(), Color::Purple);
    }

    #[test]
    fn test_deref_reads_value() {
        let heap = Heap::with_defaults();
        let names = heap.alloc(vec![String::from("parent"), String::from("self")]);
        assert_eq!(names.len(), 2);
        assert_eq!(names[1], "self");
    }

    #[test]
    fn test_handle_traces_its_node() {
        let heap = Heap::with_defaults();
        let a = heap.alloc(1u8);
        let b = heap.alloc(2u8);
        let edges = vec![a.clone(), b.clone(), a.clone()];

        let mut collector = EdgeCollector::new();
        edges.trace(&mut collector);

        assert_eq!(collector.edges(), &[a.node(), b.node(), a.node()]);
    }

    #[test]
    fn test_paged_flag() {
        let heap = Heap::with_defaults();
        let a = heap.alloc(());
        assert!(!a.is_paged());
        a.set_paged(true);
        assert!(a.is_paged());
        assert_eq!(a.color(), Color::Black);
    }

    #[test]
    fn test_debug_shows_header() {
        let heap = Heap::with_defaults();
        let a = heap.alloc(0i32);
        let text = format!("{:?}", a);
        assert!(text.contains("count: 1"));
        assert!(text.contains("Black"));
    }
}
