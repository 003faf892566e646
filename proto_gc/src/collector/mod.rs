//! Cycle collection.
//!
//! Plain counting cannot free a cycle: every member keeps the next one's
//! count above zero. Nodes whose count drops without reaching zero are
//! buffered as suspect roots, and [`collect_cycles`] runs synchronous trial
//! deletion over them:
//!
//! 1. MarkRoots: gray every subgraph reachable from a Purple root,
//!    subtracting internal edges from the counts
//! 2. ScanRoots: whatever still has a count is referenced from outside and
//!    is restored to Black with its subgraph; the rest turns White
//! 3. CollectRoots: queue every White node and reseed the root set with the
//!    permanent roots
//! 4. FreeGarbage: finalize and delete the queue
//!
//! Phases run to completion over all roots before the next one starts.
//!
//! [`collect_cycles`]: crate::HeapContext::collect_cycles

mod cycle;

use crate::heap::HeapContext;
use crate::stats::GcTimer;
use cycle::CyclePass;
use std::time::Duration;

/// Result of a cycle collection pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionResult {
    /// Suspect roots taken from the root set.
    pub roots_examined: usize,
    /// Permanent roots reported by the root provider.
    pub permanent_roots: usize,
    /// Nodes proven to be cyclic garbage.
    pub nodes_whitened: usize,
    /// Nodes physically deleted, including acyclic garbage found on the way.
    pub nodes_freed: usize,
    /// Wall time of the pass.
    pub duration: Duration,
}

/// Run one pass. Calls made during a pass or while garbage is being
/// freed return `None`.
pub(crate) fn collect_cycles(context: &HeapContext) -> Option<CollectionResult> {
    if context.flags().freeing() || !context.flags().try_enter_collection() {
        log::debug!("collect_cycles called during a pass; skipped");
        context.stats().record_skipped_collection();
        return None;
    }

    let timer = GcTimer::start("collect_cycles");
    log::debug!("cycle collection: {} suspect roots", context.root_count());

    let mut result = CyclePass::new(context).run();

    result.duration = timer.stop();
    context.flags().exit_collection();
    context.stats().record_collection(result.duration);

    log::debug!(
        "cycle collection: {} whitened, {} freed in {:?}",
        result.nodes_whitened,
        result.nodes_freed,
        result.duration
    );

    if context.config().verify_roots && !context.roots().verify() {
        log::error!("root set invariants violated after collection");
        debug_assert!(false, "root set invariants violated after collection");
    }

    Some(result)
}
