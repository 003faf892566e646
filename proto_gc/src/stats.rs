//! Collector statistics.
//!
//! Tracks allocation and reclamation counts and pass times for monitoring
//! and tuning.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Statistics about reference counting and cycle collection activity.
#[derive(Debug)]
pub struct CollectorStats {
    // =========================================================================
    // Allocation Statistics
    // =========================================================================
    /// Total nodes allocated since start.
    pub nodes_allocated: AtomicU64,
    /// Nodes freed as soon as their count reached zero.
    pub nodes_freed_immediately: AtomicU64,
    /// Nodes freed by a collection pass.
    pub nodes_freed_by_collection: AtomicU64,
    /// Queued nodes left to the persistence layer because they were paged.
    pub nodes_spared_paged: AtomicU64,

    // =========================================================================
    // Collection Statistics
    // =========================================================================
    /// Number of completed collection passes.
    pub collections: AtomicU64,
    /// Number of nested `collect_cycles` calls that were swallowed.
    pub skipped_collections: AtomicU64,
    /// Total time spent in collection passes (nanoseconds).
    pub collection_time_ns: AtomicU64,
    /// Total number of nodes buffered as suspect roots.
    pub roots_buffered: AtomicU64,
}

impl CollectorStats {
    /// Create new empty statistics.
    pub const fn new() -> Self {
        Self {
            nodes_allocated: AtomicU64::new(0),
            nodes_freed_immediately: AtomicU64::new(0),
            nodes_freed_by_collection: AtomicU64::new(0),
            nodes_spared_paged: AtomicU64::new(0),
            collections: AtomicU64::new(0),
            skipped_collections: AtomicU64::new(0),
            collection_time_ns: AtomicU64::new(0),
            roots_buffered: AtomicU64::new(0),
        }
    }

    /// Record a node allocation.
    #[inline]
    pub fn record_allocation(&self) {
        self.nodes_allocated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch of physical frees.
    pub fn record_frees(&self, count: usize, by_collection: bool) {
        let counter = if by_collection {
            &self.nodes_freed_by_collection
        } else {
            &self.nodes_freed_immediately
        };
        counter.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record queued nodes skipped because they are paged.
    pub fn record_spared(&self, count: usize) {
        self.nodes_spared_paged.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a node entering the root set.
    #[inline]
    pub fn record_root_buffered(&self) {
        self.roots_buffered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed pass.
    pub fn record_collection(&self, duration: Duration) {
        self.collections.fetch_add(1, Ordering::Relaxed);
        self.collection_time_ns.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Record a swallowed nested pass.
    pub fn record_skipped_collection(&self) {
        self.skipped_collections.fetch_add(1, Ordering::Relaxed);
    }

    /// Total nodes freed, by either path.
    pub fn nodes_freed(&self) -> u64 {
        self.nodes_freed_immediately.load(Ordering::Relaxed)
            + self.nodes_freed_by_collection.load(Ordering::Relaxed)
    }

    /// Nodes allocated and not yet freed.
    pub fn live_nodes(&self) -> u64 {
        self.nodes_allocated
            .load(Ordering::Relaxed)
            .saturating_sub(self.nodes_freed())
    }

    /// Get total collection time.
    pub fn total_collection_time(&self) -> Duration {
        Duration::from_nanos(self.collection_time_ns.load(Ordering::Relaxed))
    }

    /// Get average pause time per pass.
    pub fn avg_pause(&self) -> Duration {
        let count = self.collections.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        let total_ns = self.collection_time_ns.load(Ordering::Relaxed);
        Duration::from_nanos(total_ns / count)
    }

    /// Reset all statistics.
    ///
    /// Allocation counts are kept so `live_nodes()` stays meaningful.
    pub fn reset(&self) {
        self.collections.store(0, Ordering::Relaxed);
        self.skipped_collections.store(0, Ordering::Relaxed);
        self.collection_time_ns.store(0, Ordering::Relaxed);
        self.roots_buffered.store(0, Ordering::Relaxed);
        self.nodes_spared_paged.store(0, Ordering::Relaxed);
    }

    /// Render a human-readable summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Collector Statistics ===");
        let _ = writeln!(
            out,
            "Nodes: {} allocated, {} live",
            self.nodes_allocated.load(Ordering::Relaxed),
            self.live_nodes()
        );
        let _ = writeln!(
            out,
            "Freed: {} immediately, {} by collection, {} spared (paged)",
            self.nodes_freed_immediately.load(Ordering::Relaxed),
            self.nodes_freed_by_collection.load(Ordering::Relaxed),
            self.nodes_spared_paged.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "Collections: {} ({} skipped), {} roots buffered",
            self.collections.load(Ordering::Relaxed),
            self.skipped_collections.load(Ordering::Relaxed),
            self.roots_buffered.load(Ordering::Relaxed)
        );
        let _ = write!(
            out,
            "Pause: {:?} total, {:?} avg",
            self.total_collection_time(),
            self.avg_pause()
        );
        out
    }
}

impl Default for CollectorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer for measuring collection passes.
pub struct GcTimer {
    start: Instant,
    label: &'static str,
}

impl GcTimer {
    /// Start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            start: Instant::now(),
            label,
        }
    }

    /// Stop the timer and return the elapsed duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        log::trace!("{}: {:?}", self.label, elapsed);
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_node_accounting() {
        let stats = CollectorStats::new();

        for _ in 0..5 {
            stats.record_allocation();
        }
        stats.record_frees(2, false);
        stats.record_frees(1, true);

        assert_eq!(stats.nodes_freed(), 3);
        assert_eq!(stats.live_nodes(), 2);
    }

    #[test]
    fn test_pause_timing() {
        let stats = CollectorStats::new();

        stats.record_collection(Duration::from_micros(100));
        stats.record_collection(Duration::from_micros(300));

        assert_eq!(stats.collections.load(Ordering::Relaxed), 2);
        assert_eq!(stats.avg_pause(), Duration::from_micros(200));
        assert_eq!(stats.total_collection_time(), Duration::from_micros(400));
    }

    #[test]
    fn test_reset_keeps_allocations() {
        let stats = CollectorStats::new();
        stats.record_allocation();
        stats.record_root_buffered();
        stats.record_collection(Duration::from_micros(5));

        stats.reset();
        assert_eq!(stats.collections.load(Ordering::Relaxed), 0);
        assert_eq!(stats.roots_buffered.load(Ordering::Relaxed), 0);
        assert_eq!(stats.live_nodes(), 1);
    }

    #[test]
    fn test_summary_mentions_counts() {
        let stats = CollectorStats::new();
        stats.record_allocation();
        stats.record_allocation();
        stats.record_frees(1, true);

        let summary = stats.summary();
        assert!(summary.contains("2 allocated, 1 live"));
        assert!(summary.contains("1 by collection"));
    }
}
