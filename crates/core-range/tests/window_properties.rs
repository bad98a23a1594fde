//! Property-based tests for window calculation invariants.

use core_range::{RangeCalculator, RowRange, ScrollDirection};
use proptest::prelude::*;

proptest! {
    // Desired range always lies inside the universe and covers the visible range.
    #[test]
    fn desired_within_universe(
        total in 0usize..5000,
        buffer in 0usize..200,
        offset in 0usize..100_000,
        extent in 0usize..2000,
        height in 1usize..64,
    ) {
        let calc = RangeCalculator::new(buffer, total);
        let w = calc.window(offset, extent, height);
        prop_assert!(w.desired.end <= total);
        prop_assert!(w.visible.end <= total);
        prop_assert!(w.desired.covers(&w.visible));
    }

    // Forward and backward segments partition desired minus visible.
    #[test]
    fn segments_partition_buffer(
        total in 1usize..5000,
        buffer in 0usize..200,
        offset in 0usize..50_000,
        extent in 1usize..2000,
        height in 1usize..64,
        down in any::<bool>(),
    ) {
        let calc = RangeCalculator::new(buffer, total);
        let w = calc.window(offset, extent, height);
        let dir = if down { ScrollDirection::Down } else { ScrollDirection::Up };
        let seg = w.segments(dir);
        prop_assert!(!seg.forward.overlaps(&w.visible));
        prop_assert!(!seg.backward.overlaps(&w.visible));
        prop_assert!(!seg.forward.overlaps(&seg.backward));
        prop_assert_eq!(seg.forward.len() + seg.backward.len() + w.visible.len(), w.desired.len());
    }

    // Covering is order independent.
    #[test]
    fn covering_is_commutative(a in 0usize..1000, al in 0usize..100, b in 0usize..1000, bl in 0usize..100) {
        let ra = RowRange::with_len(a, al);
        let rb = RowRange::with_len(b, bl);
        prop_assert_eq!(RowRange::covering([ra, rb]), RowRange::covering([rb, ra]));
    }
}
