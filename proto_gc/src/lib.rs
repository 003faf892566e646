//! Proto Memory Manager
//!
//! A cycle-collecting reference counter for the Proto object runtime.
//!
//! # Architecture
//!
//! Every managed object lives in a counted node. Counts are driven only by
//! [`Handle`]s: cloning a handle increments, dropping one decrements.
//!
//! - **Acyclic garbage** is reclaimed synchronously: when a count reaches
//!   zero the node releases its children and is freed on the spot.
//!
//! - **Cyclic garbage** can never reach zero on its own. A node whose count
//!   drops but stays positive is buffered as a *suspect root*, and a
//!   stop-the-world pass ([`HeapContext::collect_cycles`]) runs synchronous
//!   Bacon–Rajan trial deletion over the buffered roots.
//!
//! ```text
//! ┌──────────────┐  clone/drop   ┌──────────────┐  count > 0   ┌──────────────┐
//! │    Handle    │──────────────▶│  NodeHeader  │─────────────▶│   RootSet    │
//! └──────────────┘               └──────────────┘              └──────────────┘
//!                                       │ count == 0                  │
//!                                       ▼                             ▼
//!                                ┌──────────────┐   White      ┌──────────────┐
//!                                │ garbage queue│◀─────────────│collect_cycles│
//!                                └──────────────┘              └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use proto_gc::{Heap, Handle, Trace, Tracer};
//! use std::cell::RefCell;
//!
//! struct Slot {
//!     next: RefCell<Option<Handle<Slot>>>,
//! }
//!
//! unsafe impl Trace for Slot {
//!     fn trace(&self, tracer: &mut dyn Tracer) {
//!         self.next.trace(tracer);
//!     }
//! }
//!
//! let heap = Heap::with_defaults();
//! let a = heap.alloc(Slot { next: RefCell::new(None) });
//! *a.next.borrow_mut() = Some(a.clone()); // self cycle
//! drop(a);
//!
//! // At a scheduler safe point:
//! heap.collect_cycles();
//! ```
//!
//! # Safety
//!
//! The collector trusts its collaborators:
//! - Every managed type must report exactly the handles it owns from
//!   [`Trace::trace`]
//! - Collections must only run at safe points, with no borrows of managed
//!   values outstanding

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collector;
pub mod config;
pub mod flags;
pub mod heap;
pub mod node;
pub mod roots;
pub mod trace;

mod stats;

// Re-exports for convenient access
pub use collector::CollectionResult;
pub use config::{CollectorConfig, ConfigError};
pub use flags::{PagingScope, SuppressionFlags};
pub use heap::{Heap, HeapContext};
pub use node::{NodeRef, RefCount};
pub use roots::{Handle, RootProvider, RootSet};
pub use stats::{CollectorStats, GcTimer};
pub use trace::{CountingTracer, EdgeCollector, Trace, Tracer};

/// Node color for synchronous trial deletion.
///
/// Colors move through the following states during a node's life:
/// - Black while in normal use, Purple once buffered as a suspect root
/// - Gray while a pass speculatively removes internal edges
/// - White once the pass proves only internal references remain
/// - Green for nodes that can never take part in a cycle
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// In use, or free.
    Black = 0,
    /// Possible member of a garbage cycle (being trial-deleted).
    Gray = 1,
    /// Member of a garbage cycle, awaiting physical free.
    White = 2,
    /// Buffered candidate root of a garbage cycle.
    Purple = 3,
    /// Statically acyclic; never analyzed for cycles.
    Green = 4,
}

impl Color {
    /// Decode a color from its packed representation.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Color::Gray,
            2 => Color::White,
            3 => Color::Purple,
            4 => Color::Green,
            _ => Color::Black,
        }
    }

    /// Check if nodes of this color are exempt from cycle analysis.
    #[inline]
    pub fn is_acyclic(self) -> bool {
        matches!(self, Color::Green)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_bits_roundtrip() {
        for color in [
            Color::Black,
            Color::Gray,
            Color::White,
            Color::Purple,
            Color::Green,
        ] {
            assert_eq!(Color::from_bits(color as u8), color);
        }
    }

    #[test]
    fn test_only_green_is_acyclic() {
        assert!(Color::Green.is_acyclic());
        assert!(!Color::Purple.is_acyclic());
        assert!(!Color::Black.is_acyclic());
    }
}
