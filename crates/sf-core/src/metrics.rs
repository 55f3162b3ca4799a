//! Caller-owned load metrics.
//!
//! Every component that touches a store takes a `&LoadMetrics` from its
//! caller. There is no process-wide counter state: two result sets loaded
//! side by side accumulate into their own metrics objects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A simple timer that measures elapsed time.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Create and start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time in seconds.
    pub fn elapsed_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop the timer and record it into an accumulator.
    pub fn stop_into(self, acc: &AccumulatingTimer) {
        acc.record(self.elapsed_s());
    }
}

/// Accumulating timer for tracking total time across multiple calls.
pub struct AccumulatingTimer {
    total_ns: AtomicU64,
}

impl Default for AccumulatingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatingTimer {
    /// Create a new accumulating timer.
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
        }
    }

    /// Record a timing measurement.
    pub fn record(&self, duration_s: f64) {
        let nanos = (duration_s * 1e9) as u64;
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Get total time spent (in seconds).
    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 / 1e9
    }
}

/// Request counters and timings for one result set.
#[derive(Default)]
pub struct LoadMetrics {
    queries: AtomicU64,
    rows_scanned: AtomicU64,
    rows_skipped: AtomicU64,
    handles_created: AtomicU64,
    search_probes: AtomicU64,
    entities_skipped: AtomicU64,
    pub query_time: AccumulatingTimer,
}

/// Plain copy of [`LoadMetrics`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub queries: u64,
    pub rows_scanned: u64,
    pub rows_skipped: u64,
    pub handles_created: u64,
    pub search_probes: u64,
    pub entities_skipped: u64,
    pub query_time_s: f64,
}

impl LoadMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rows(&self, n: u64) {
        self.rows_scanned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_skipped_rows(&self, n: u64) {
        self.rows_skipped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_handle_created(&self) {
        self.handles_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_probes(&self, n: u64) {
        self.search_probes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_skipped_entity(&self) {
        self.entities_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries: self.queries(),
            rows_scanned: self.rows_scanned.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
            handles_created: self.handles_created.load(Ordering::Relaxed),
            search_probes: self.search_probes.load(Ordering::Relaxed),
            entities_skipped: self.entities_skipped.load(Ordering::Relaxed),
            query_time_s: self.query_time.total_seconds(),
        }
    }
}

impl MetricsSnapshot {
    /// Counter growth between an earlier snapshot and this one.
    pub fn since(&self, earlier: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            queries: self.queries - earlier.queries,
            rows_scanned: self.rows_scanned - earlier.rows_scanned,
            rows_skipped: self.rows_skipped - earlier.rows_skipped,
            handles_created: self.handles_created - earlier.handles_created,
            search_probes: self.search_probes - earlier.search_probes,
            entities_skipped: self.entities_skipped - earlier.entities_skipped,
            query_time_s: self.query_time_s - earlier.query_time_s,
        }
    }
}
