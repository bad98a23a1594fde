//! Bounded row cache with distance-based eviction.
//!
//! Maps row index → payload. The payload type is opaque to the cache; only
//! the index key is ever inspected.
//!
//! Eviction contract (`prune`):
//! * Only rows farther than `keep_distance` from `center` are candidates.
//! * Candidates are removed farthest-first until `len() <= target_size`.
//! * If more than `target_size` rows sit within `keep_distance`, the bound is
//!   not met. The rows the user is looking at always win over the size cap.
//!
//! Replacement is whole-record: `put` on an existing index swaps the payload,
//! nothing is merged.

use ahash::AHashMap;
use core_range::RowRange;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use tracing::{debug, trace};

/// One addressable row as returned by a data provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<P> {
    pub index: usize,
    pub payload: P,
}

impl<P> Row<P> {
    pub fn new(index: usize, payload: P) -> Self {
        Self { index, payload }
    }
}

/// Lookup / mutation counters.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    replacements: AtomicU64,
    evictions: AtomicU64,
    prune_passes: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub replacements: u64,
    pub evictions: u64,
    pub prune_passes: u64,
}

impl CacheMetrics {
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Relaxed),
            misses: self.misses.load(Relaxed),
            inserts: self.inserts.load(Relaxed),
            replacements: self.replacements.load(Relaxed),
            evictions: self.evictions.load(Relaxed),
            prune_passes: self.prune_passes.load(Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct RowCache<P> {
    rows: AHashMap<usize, P>,
    metrics: CacheMetrics,
}

impl<P> Default for RowCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> RowCache<P> {
    pub fn new() -> Self {
        Self {
            rows: AHashMap::new(),
            metrics: CacheMetrics::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: AHashMap::with_capacity(capacity),
            metrics: CacheMetrics::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn get(&self, index: usize) -> Option<&P> {
        let found = self.rows.get(&index);
        if found.is_some() {
            self.metrics.hits.fetch_add(1, Relaxed);
        } else {
            self.metrics.misses.fetch_add(1, Relaxed);
        }
        found
    }

    pub fn has(&self, index: usize) -> bool {
        self.rows.contains_key(&index)
    }

    /// Insert or replace the payload for `index`, returning the previous one.
    pub fn put(&mut self, index: usize, payload: P) -> Option<P> {
        let prev = self.rows.insert(index, payload);
        if prev.is_some() {
            self.metrics.replacements.fetch_add(1, Relaxed);
        } else {
            self.metrics.inserts.fetch_add(1, Relaxed);
        }
        prev
    }

    /// Insert a batch of rows; returns how many were stored.
    pub fn put_rows<I>(&mut self, rows: I) -> usize
    where
        I: IntoIterator<Item = Row<P>>,
    {
        let mut n = 0;
        for row in rows {
            self.put(row.index, row.payload);
            n += 1;
        }
        n
    }

    pub fn remove(&mut self, index: usize) -> Option<P> {
        self.rows.remove(&index)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Number of cached indices inside `range`.
    pub fn count_in(&self, range: RowRange) -> usize {
        range.iter().filter(|i| self.rows.contains_key(i)).count()
    }

    /// Maximal contiguous runs of absent indices within `range`, in ascending
    /// order. Single linear scan over the range.
    pub fn find_missing(&self, range: RowRange) -> Vec<RowRange> {
        let mut out = Vec::new();
        let mut run_start: Option<usize> = None;
        for index in range.iter() {
            let present = self.rows.contains_key(&index);
            match (present, run_start) {
                (false, None) => run_start = Some(index),
                (true, Some(start)) => {
                    out.push(RowRange::new(start, index));
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            out.push(RowRange::new(start, range.end));
        }
        out
    }

    /// Evict rows farther than `keep_distance` from `center`, farthest first,
    /// until `len() <= target_size` or no candidates remain. Returns the number
    /// of evicted rows.
    pub fn prune(&mut self, center: usize, keep_distance: usize, target_size: usize) -> usize {
        self.metrics.prune_passes.fetch_add(1, Relaxed);
        if self.rows.len() <= target_size {
            return 0;
        }
        let mut candidates: Vec<(usize, usize)> = self
            .rows
            .keys()
            .map(|&index| (center.abs_diff(index), index))
            .filter(|(distance, _)| *distance > keep_distance)
            .collect();
        // Farthest first; ties broken by higher index for determinism.
        candidates.sort_unstable_by(|a, b| b.cmp(a));

        let excess = self.rows.len() - target_size;
        let mut evicted = 0;
        for (distance, index) in candidates.into_iter().take(excess) {
            trace!(target: "cache.prune", index, distance, "evict_row");
            self.rows.remove(&index);
            evicted += 1;
        }
        self.metrics.evictions.fetch_add(evicted as u64, Relaxed);
        debug!(
            target: "cache.prune",
            center,
            keep_distance,
            target_size,
            evicted,
            remaining = self.rows.len(),
            bound_met = self.rows.len() <= target_size,
            "prune_complete"
        );
        evicted
    }

    /// Iterate over cached `(index, payload)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &P)> {
        self.rows.iter().map(|(i, p)| (*i, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(indices: impl IntoIterator<Item = usize>) -> RowCache<String> {
        let mut c = RowCache::new();
        for i in indices {
            c.put(i, format!("row{i}"));
        }
        c
    }

    #[test]
    fn put_overwrites_whole_record() {
        let mut c = RowCache::new();
        assert!(c.put(3, "old").is_none());
        assert_eq!(c.put(3, "new"), Some("old"));
        assert_eq!(c.get(3), Some(&"new"));
        let snap = c.metrics_snapshot();
        assert_eq!(snap.inserts, 1);
        assert_eq!(snap.replacements, 1);
    }

    #[test]
    fn get_tracks_hits_and_misses() {
        let c = cache_with([1]);
        assert!(c.get(1).is_some());
        assert!(c.get(2).is_none());
        let snap = c.metrics_snapshot();
        assert_eq!((snap.hits, snap.misses), (1, 1));
    }

    #[test]
    fn find_missing_returns_maximal_runs() {
        let c = cache_with([2, 3, 7]);
        let gaps = c.find_missing(RowRange::new(0, 10));
        assert_eq!(
            gaps,
            vec![
                RowRange::new(0, 2),
                RowRange::new(4, 7),
                RowRange::new(8, 10)
            ]
        );
    }

    #[test]
    fn find_missing_fully_cached_is_empty() {
        let c = cache_with(0..20);
        assert!(c.find_missing(RowRange::new(5, 15)).is_empty());
        assert!(c.find_missing(RowRange::empty()).is_empty());
    }

    #[test]
    fn prune_evicts_farthest_first() {
        let mut c = cache_with((0..10).chain(90..100));
        // center 5, keep 10 -> candidates are 90..100, farthest (99) first.
        let evicted = c.prune(5, 10, 15);
        assert_eq!(evicted, 5);
        assert_eq!(c.len(), 15);
        for i in 95..100 {
            assert!(!c.has(i), "row {i} should be evicted");
        }
        for i in 90..95 {
            assert!(c.has(i), "row {i} should survive");
        }
    }

    #[test]
    fn prune_respects_keep_distance_over_bound() {
        let mut c = cache_with(0..30);
        let evicted = c.prune(15, 20, 10);
        assert_eq!(evicted, 0, "every row lies within keep distance");
        assert_eq!(c.len(), 30);
    }

    #[test]
    fn prune_noop_under_target() {
        let mut c = cache_with(0..5);
        assert_eq!(c.prune(1000, 0, 5), 0);
        assert_eq!(c.len(), 5);
    }
}
