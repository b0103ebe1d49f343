//! Atomic counters for boundary observability.
//!
//! All counters use relaxed ordering. They are diagnostic, not
//! synchronization primitives.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-context boundary counters.
#[derive(Debug)]
pub struct BoundaryMetrics {
    /// Foreign calls that reached `Dispatched`.
    pub calls_dispatched: AtomicU64,
    pub calls_succeeded: AtomicU64,
    pub calls_failed: AtomicU64,
    pub handles_acquired: AtomicU64,
    pub handles_released: AtomicU64,
    pub buffers_wrapped: AtomicU64,
    pub buffers_released: AtomicU64,
    pub double_releases: AtomicU64,
    pub use_after_release: AtomicU64,
    pub allocator_mismatches: AtomicU64,
    /// String fields cut to their foreign capacity.
    pub truncations: AtomicU64,
    /// Resources returned alongside a failure signal and released on the spot.
    pub leak_candidates: AtomicU64,
}

impl BoundaryMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            calls_dispatched: AtomicU64::new(0),
            calls_succeeded: AtomicU64::new(0),
            calls_failed: AtomicU64::new(0),
            handles_acquired: AtomicU64::new(0),
            handles_released: AtomicU64::new(0),
            buffers_wrapped: AtomicU64::new(0),
            buffers_released: AtomicU64::new(0),
            double_releases: AtomicU64::new(0),
            use_after_release: AtomicU64::new(0),
            allocator_mismatches: AtomicU64::new(0),
            truncations: AtomicU64::new(0),
            leak_candidates: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls_dispatched: Self::get(&self.calls_dispatched),
            calls_succeeded: Self::get(&self.calls_succeeded),
            calls_failed: Self::get(&self.calls_failed),
            handles_acquired: Self::get(&self.handles_acquired),
            handles_released: Self::get(&self.handles_released),
            buffers_wrapped: Self::get(&self.buffers_wrapped),
            buffers_released: Self::get(&self.buffers_released),
            double_releases: Self::get(&self.double_releases),
            use_after_release: Self::get(&self.use_after_release),
            allocator_mismatches: Self::get(&self.allocator_mismatches),
            truncations: Self::get(&self.truncations),
            leak_candidates: Self::get(&self.leak_candidates),
        }
    }
}

impl Default for BoundaryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`BoundaryMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub calls_dispatched: u64,
    pub calls_succeeded: u64,
    pub calls_failed: u64,
    pub handles_acquired: u64,
    pub handles_released: u64,
    pub buffers_wrapped: u64,
    pub buffers_released: u64,
    pub double_releases: u64,
    pub use_after_release: u64,
    pub allocator_mismatches: u64,
    pub truncations: u64,
    pub leak_candidates: u64,
}

impl MetricsSnapshot {
    /// Total lifecycle violations observed.
    #[must_use]
    pub const fn violations(&self) -> u64 {
        self.double_releases + self.use_after_release + self.allocator_mismatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_metrics_are_zero() {
        let m = BoundaryMetrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn increment_works() {
        let m = BoundaryMetrics::new();
        BoundaryMetrics::inc(&m.calls_dispatched);
        BoundaryMetrics::inc(&m.calls_dispatched);
        BoundaryMetrics::inc(&m.double_releases);
        BoundaryMetrics::inc(&m.allocator_mismatches);
        let snap = m.snapshot();
        assert_eq!(snap.calls_dispatched, 2);
        assert_eq!(snap.violations(), 2);
    }
}
