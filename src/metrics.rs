//! Crawl-wide counters (§3 Data Model, C8).
//!
//! Every field is a bare atomic behind a shared `Arc<Metrics>` — no mutex,
//! no `static`/`lazy_static`, matching the "shared ownership pointer, not a
//! global" redesign decision (§9). The Autoscaler samples `total_ops` once a
//! second to derive a rolling ops/sec average; the Coordinator polls
//! `total_queue_length` and `active_workers` to decide when the crawl is
//! done; the bootstrap layer reads everything once at the end to print a
//! summary.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    /// Listing requests currently in flight across all workers.
    pub ops_in_flight: AtomicU64,
    /// Listing requests issued since startup (successful or not).
    pub total_ops: AtomicU64,
    /// Prefixes waiting in the frontier, kept in lock-step with
    /// [`crate::frontier::Frontier`].
    pub total_queue_length: AtomicU64,
    /// Objects written to the output sink since startup.
    pub total_objects_found: AtomicU64,
    /// Workers currently alive (spawned, not yet exited).
    pub active_workers: AtomicUsize,
    /// Worker count the Autoscaler currently wants alive.
    pub target_workers: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_op(&self) {
        self.total_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_objects(&self, count: u64) {
        if count > 0 {
            self.total_objects_found.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn snapshot_total_ops(&self) -> u64 {
        self.total_ops.load(Ordering::Relaxed)
    }

    pub fn queue_len(&self) -> u64 {
        self.total_queue_length.load(Ordering::Relaxed)
    }

    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    pub fn target_workers(&self) -> usize {
        self.target_workers.load(Ordering::Relaxed)
    }

    pub fn set_target_workers(&self, target: usize) {
        self.target_workers.store(target, Ordering::Relaxed);
    }

    /// A point-in-time copy of every counter, used for the end-of-run
    /// summary and for diagnostics logging.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            ops_in_flight: self.ops_in_flight.load(Ordering::Relaxed),
            total_ops: self.total_ops.load(Ordering::Relaxed),
            total_queue_length: self.total_queue_length.load(Ordering::Relaxed),
            total_objects_found: self.total_objects_found.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed),
            target_workers: self.target_workers.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub ops_in_flight: u64,
    pub total_ops: u64,
    pub total_queue_length: u64,
    pub total_objects_found: u64,
    pub active_workers: usize,
    pub target_workers: usize,
}
