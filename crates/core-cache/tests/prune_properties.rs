//! Property-based tests for gap detection and eviction bounds.

use core_cache::RowCache;
use core_range::RowRange;
use proptest::collection::btree_set;
use proptest::prelude::*;

proptest! {
    // After prune: size <= target, or every survivor lies within keep distance.
    #[test]
    fn prune_bound_or_all_within_keep(
        indices in btree_set(0usize..2000, 0..400),
        center in 0usize..2000,
        keep in 0usize..300,
        target in 0usize..300,
    ) {
        let mut c = RowCache::new();
        for i in &indices {
            c.put(*i, ());
        }
        c.prune(center, keep, target);
        let all_near = c.iter().all(|(i, _)| center.abs_diff(i) <= keep);
        prop_assert!(c.len() <= target || all_near);
    }

    // Prune never evicts a row within keep distance.
    #[test]
    fn prune_keeps_near_rows(
        indices in btree_set(0usize..2000, 0..400),
        center in 0usize..2000,
        keep in 0usize..300,
        target in 0usize..300,
    ) {
        let mut c = RowCache::new();
        for i in &indices {
            c.put(*i, ());
        }
        c.prune(center, keep, target);
        for i in indices.iter().filter(|i| center.abs_diff(**i) <= keep) {
            prop_assert!(c.has(*i));
        }
    }

    // Missing runs are disjoint, ordered, non-adjacent, and cover exactly the absent indices.
    #[test]
    fn find_missing_is_exact(
        indices in btree_set(0usize..300, 0..200),
        start in 0usize..300,
        len in 0usize..300,
    ) {
        let mut c = RowCache::new();
        for i in &indices {
            c.put(*i, ());
        }
        let range = RowRange::with_len(start, len);
        let runs = c.find_missing(range);
        let mut prev_end: Option<usize> = None;
        for r in &runs {
            prop_assert!(!r.is_empty());
            if let Some(end) = prev_end {
                prop_assert!(r.start > end, "runs must be maximal and ordered");
            }
            prev_end = Some(r.end);
        }
        for i in range.iter() {
            let in_run = runs.iter().any(|r| r.contains(i));
            prop_assert_eq!(in_run, !c.has(i));
        }
    }
}
