//! The shared prefix frontier (§3, §4.4, C4).
//!
//! A min-priority queue ordered by depth (shallower prefixes drain before
//! deeper ones), holding batches of sibling prefixes per depth level. A pop
//! removes exactly one prefix: the top batch is popped off the heap, one
//! path is taken from its tail, and the (possibly still non-empty) batch is
//! pushed back — the "pop, mutate a local copy, re-push" pattern named in
//! §9 as the chosen alternative to mutating the heap's top element in
//! place, which `BinaryHeap` does not allow safely.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::{Arc, Mutex};

use crate::metrics::Metrics;

/// A prefix filter for a listing request; the empty string means "no
/// prefix", i.e. the bucket root.
pub type Prefix = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub depth: u32,
    pub paths: Vec<Prefix>,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the shallowest depth sorts
        // highest and is popped first.
        other.depth.cmp(&self.depth)
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct Frontier {
    queue: Mutex<BinaryHeap<FrontierEntry>>,
    metrics: Arc<Metrics>,
}

impl Frontier {
    /// Construct a frontier seeded with the bucket root at depth 0, as the
    /// Coordinator does at startup (§4.9).
    pub fn new(metrics: Arc<Metrics>) -> Self {
        let mut queue = BinaryHeap::new();
        queue.push(FrontierEntry {
            depth: 0,
            paths: vec![String::new()],
        });
        metrics.total_queue_length.fetch_add(1, AtomicOrdering::SeqCst);
        Self {
            queue: Mutex::new(queue),
            metrics,
        }
    }

    pub fn len(&self) -> u64 {
        self.metrics.total_queue_length.load(AtomicOrdering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pop a single `(depth, prefix)` pair, if the frontier is non-empty.
    pub fn pop_one(&self) -> Option<(u32, Prefix)> {
        let mut queue = self.queue.lock().unwrap();
        let mut entry = queue.pop()?;
        let path = entry.paths.pop()?;
        let depth = entry.depth;
        if !entry.paths.is_empty() {
            queue.push(entry);
        }
        drop(queue);
        self.metrics.total_queue_length.fetch_sub(1, AtomicOrdering::SeqCst);
        Some((depth, path))
    }

    /// Push a freshly discovered batch of sibling prefixes at `depth`.
    pub fn push(&self, depth: u32, paths: Vec<Prefix>) {
        if paths.is_empty() {
            return;
        }
        let count = paths.len() as u64;
        let mut queue = self.queue.lock().unwrap();
        queue.push(FrontierEntry { depth, paths });
        drop(queue);
        self.metrics.total_queue_length.fetch_add(count, AtomicOrdering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S3 — shallower prefixes drain before deeper ones regardless of push
    /// order (§8).
    #[test]
    fn pops_shallowest_depth_first() {
        let metrics = Arc::new(Metrics::new());
        let frontier = Frontier::new(metrics);
        // root (depth 0) already seeded; drain it first.
        let (depth, prefix) = frontier.pop_one().unwrap();
        assert_eq!((depth, prefix.as_str()), (0, ""));

        frontier.push(2, vec!["a/b/".into(), "a/c/".into()]);
        frontier.push(1, vec!["a/".into()]);

        let (depth, prefix) = frontier.pop_one().unwrap();
        assert_eq!((depth, prefix.as_str()), (1, "a/"));

        let (depth, _) = frontier.pop_one().unwrap();
        assert_eq!(depth, 2);
        let (depth, _) = frontier.pop_one().unwrap();
        assert_eq!(depth, 2);
        assert!(frontier.pop_one().is_none());
    }

    #[test]
    fn queue_length_tracks_pushes_and_pops() {
        let metrics = Arc::new(Metrics::new());
        let frontier = Frontier::new(metrics.clone());
        assert_eq!(frontier.len(), 1);
        frontier.push(1, vec!["x/".into(), "y/".into()]);
        assert_eq!(frontier.len(), 3);
        frontier.pop_one();
        assert_eq!(frontier.len(), 2);
        assert_eq!(metrics.queue_len(), 2);
    }

    #[test]
    fn batch_survives_until_drained() {
        let metrics = Arc::new(Metrics::new());
        let frontier = Frontier::new(metrics);
        frontier.pop_one(); // drain seeded root
        frontier.push(0, vec!["a/".into(), "b/".into(), "c/".into()]);
        assert_eq!(frontier.pop_one().unwrap().1, "c/");
        assert_eq!(frontier.pop_one().unwrap().1, "b/");
        assert_eq!(frontier.pop_one().unwrap().1, "a/");
        assert!(frontier.pop_one().is_none());
    }
}
