//! Counted nodes.
//!
//! Every managed allocation is a [`GcBox`]: a [`NodeHeader`] followed by
//! the value. The header carries the reference count and a packed byte of
//! collector state:
//!
//! ```text
//!   7   6   5          4       3          2   1   0
//! ┌───┬───┬──────────┬───────┬──────────┬───────────┐
//! │ 0 │ 0 │ garbaged │ paged │ buffered │   color   │
//! └───┴───┴──────────┴───────┴──────────┴───────────┘
//! ```
//!
//! The collector refers to nodes through [`NodeRef`], a type-erased pointer
//! to a live `GcBox`.

use crate::Color;
use crate::trace::{EdgeCollector, Trace};
use smallvec::SmallVec;
use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;

/// Reference count type.
pub type RefCount = u32;

/// A count at this value is sticky: the node is immortal.
pub const STICKY_COUNT: RefCount = RefCount::MAX;

const COLOR_MASK: u8 = 0b0000_0111;
const BUFFERED_FLAG: u8 = 0b0000_1000;
const PAGED_FLAG: u8 = 0b0001_0000;
const GARBAGED_FLAG: u8 = 0b0010_0000;

/// Inline edge list; most objects own only a handful of handles.
pub(crate) type Edges = SmallVec<[NodeRef; 8]>;

// =============================================================================
// NodeHeader
// =============================================================================

/// Collector state stored in front of every managed value.
pub struct NodeHeader {
    /// Number of live handles referencing the node.
    count: Cell<RefCount>,
    /// Packed color and flags; see the module docs.
    flags: Cell<u8>,
}

impl NodeHeader {
    /// Create a header with a zero count and the given color.
    pub(crate) fn new(color: Color) -> Self {
        Self {
            count: Cell::new(0),
            flags: Cell::new(color as u8),
        }
    }

    /// Get the reference count.
    #[inline]
    pub fn count(&self) -> RefCount {
        self.count.get()
    }

    /// Increment the count. Sticky counts stay put.
    #[inline]
    pub(crate) fn increment(&self) {
        let count = self.count.get();
        if count != STICKY_COUNT {
            self.count.set(count + 1);
        }
    }

    /// Decrement the count, returning the new value.
    #[inline]
    pub(crate) fn decrement(&self) -> RefCount {
        let count = self.count.get();
        if count == STICKY_COUNT {
            return count;
        }
        debug_assert!(count > 0, "reference count underflow");
        let count = count.saturating_sub(1);
        self.count.set(count);
        count
    }

    /// Get the current color.
    #[inline]
    pub fn color(&self) -> Color {
        Color::from_bits(self.flags.get() & COLOR_MASK)
    }

    /// Set the current color.
    #[inline]
    pub(crate) fn set_color(&self, color: Color) {
        self.flags.set((self.flags.get() & !COLOR_MASK) | color as u8);
    }

    /// Check if the node is in the root set.
    #[inline]
    pub fn is_buffered(&self) -> bool {
        self.flag(BUFFERED_FLAG)
    }

    #[inline]
    pub(crate) fn set_buffered(&self, buffered: bool) {
        self.set_flag(BUFFERED_FLAG, buffered);
    }

    /// Check if the node's lifetime is managed by a persistence layer.
    #[inline]
    pub fn is_paged(&self) -> bool {
        self.flag(PAGED_FLAG)
    }

    #[inline]
    pub(crate) fn set_paged(&self, paged: bool) {
        self.set_flag(PAGED_FLAG, paged);
    }

    /// Check if the node is queued for physical deletion.
    #[inline]
    pub fn is_garbaged(&self) -> bool {
        self.flag(GARBAGED_FLAG)
    }

    #[inline]
    pub(crate) fn set_garbaged(&self, garbaged: bool) {
        self.set_flag(GARBAGED_FLAG, garbaged);
    }

    #[inline]
    fn flag(&self, mask: u8) -> bool {
        self.flags.get() & mask != 0
    }

    #[inline]
    fn set_flag(&self, mask: u8, on: bool) {
        let flags = if on {
            self.flags.get() | mask
        } else {
            self.flags.get() & !mask
        };
        self.flags.set(flags);
    }
}

impl fmt::Debug for NodeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHeader")
            .field("count", &self.count())
            .field("color", &self.color())
            .field("buffered", &self.is_buffered())
            .field("paged", &self.is_paged())
            .field("garbaged", &self.is_garbaged())
            .finish()
    }
}

// =============================================================================
// GcBox
// =============================================================================

/// A managed allocation: header followed by the value.
#[repr(C)]
pub(crate) struct GcBox<T: ?Sized> {
    pub(crate) header: NodeHeader,
    pub(crate) value: T,
}

// =============================================================================
// NodeRef
// =============================================================================

/// Type-erased reference to a counted node.
///
/// A `NodeRef` does not own a count. It is what [`Tracer`]s receive and what
/// the root set and garbage queue hold.
///
/// Most crate-internal methods are safe because the collector only ever
/// holds `NodeRef`s to nodes it has not yet destroyed; a `NodeRef` obtained
/// from a [`Handle`] is valid for as long as that handle is.
///
/// [`Tracer`]: crate::Tracer
/// [`Handle`]: crate::Handle
#[derive(Clone, Copy)]
pub struct NodeRef {
    // NOTE: `ptr` came from `Box::into_raw` and has not been destroyed.
    ptr: NonNull<GcBox<dyn Trace>>,
}

impl NodeRef {
    /// Erase a typed box pointer.
    #[inline]
    pub(crate) fn new<T: Trace + 'static>(ptr: NonNull<GcBox<T>>) -> Self {
        Self { ptr }
    }

    /// Address of the node, for identity comparisons.
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as *const () as usize
    }

    /// Get the node's header.
    #[inline]
    pub(crate) fn header(&self) -> &NodeHeader {
        // SAFETY: see the type-level note; the box is live.
        unsafe { &(*self.ptr.as_ptr()).header }
    }

    /// Enumerate the nodes this node holds counted references to.
    pub(crate) fn child_edges(&self) -> Edges {
        let mut collector = EdgeCollector::new();
        // SAFETY: the box is live, and collection only happens at safe
        // points where no mutable borrow of the value is outstanding.
        unsafe { (*self.ptr.as_ptr()).value.trace(&mut collector) };
        collector.into_edges()
    }

    /// Run the finalize hooks: `finalize` always, then `finalize_paged` if
    /// the node is paged.
    ///
    /// # Safety
    ///
    /// Must be called at most once, while the node is queued for deletion
    /// and no other reference to its value exists.
    pub(crate) unsafe fn finalize(&self) {
        let paged = self.header().is_paged();
        let value = unsafe { &mut (*self.ptr.as_ptr()).value };
        value.finalize();
        if paged {
            value.finalize_paged();
        }
    }

    /// Drop the value and free the allocation.
    ///
    /// # Safety
    ///
    /// The node must not be referenced by the collector or any handle
    /// afterwards.
    pub(crate) unsafe fn destroy(self) {
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({:#x})", self.addr())
    }
}
