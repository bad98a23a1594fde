//! Row range arithmetic and viewport → index mapping.
//!
//! Everything in this crate is a pure function of its inputs: scroll offset,
//! viewport extent, row height, buffer size and the fixed universe size. The
//! engine recomputes a [`ViewWindow`] on every scroll / resize and derives its
//! fetch priorities from it.
//!
//! Conventions:
//! * All ranges are half-open `[start, end)` row indices.
//! * Offsets and extents are expressed in the same unit as row heights
//!   (pixels in a browser, terminal lines in the TUI).

use std::fmt;

pub mod direction;
pub mod window;

pub use direction::{DirectionTracker, ScrollDirection};
pub use window::{BufferSegments, RangeCalculator, RowHeightMode, RowMetrics, ViewWindow};

/// Half-open interval of row indices.
///
/// A range with `end <= start` is empty; constructors normalize such input so
/// `end >= start` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub const fn new(start: usize, end: usize) -> Self {
        if end < start {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    pub const fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Range starting at `start` holding `count` rows.
    pub const fn with_len(start: usize, count: usize) -> Self {
        Self::new(start, start.saturating_add(count))
    }

    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub const fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    /// True when both ranges are non-empty and share at least one index.
    pub fn overlaps(&self, other: &RowRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    /// True when `other` lies entirely inside `self`. Empty ranges are
    /// contained everywhere.
    pub fn covers(&self, other: &RowRange) -> bool {
        other.is_empty() || (self.start <= other.start && other.end <= self.end)
    }

    /// True when `self` holds at least one index outside `other`.
    pub fn extends_beyond(&self, other: &RowRange) -> bool {
        !other.covers(self)
    }

    /// Smallest range covering both inputs. Empty inputs are ignored.
    pub fn cover(self, other: RowRange) -> RowRange {
        match (self.is_empty(), other.is_empty()) {
            (true, _) => other,
            (_, true) => self,
            _ => RowRange::new(self.start.min(other.start), self.end.max(other.end)),
        }
    }

    /// Smallest range covering every non-empty input, `None` if there is none.
    pub fn covering<I>(ranges: I) -> Option<RowRange>
    where
        I: IntoIterator<Item = RowRange>,
    {
        ranges
            .into_iter()
            .filter(|r| !r.is_empty())
            .reduce(RowRange::cover)
    }

    pub fn intersect(&self, other: &RowRange) -> RowRange {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start >= end {
            RowRange::empty()
        } else {
            RowRange::new(start, end)
        }
    }

    /// Clamp into the universe `[0, total)`.
    pub fn clamp_to(&self, total: usize) -> RowRange {
        RowRange::new(self.start.min(total), self.end.min(total))
    }

    /// Grow by `by` rows on both sides, clamped to `[0, total)`.
    pub fn expand(&self, by: usize, total: usize) -> RowRange {
        RowRange::new(self.start.saturating_sub(by), self.end.saturating_add(by)).clamp_to(total)
    }

    /// Middle index; used as the eviction center for the rendered range.
    pub fn midpoint(&self) -> usize {
        self.start + self.len() / 2
    }

    /// Absolute distance from `index` to this range (0 when inside).
    pub fn distance_to(&self, index: usize) -> usize {
        if index < self.start {
            self.start - index
        } else if index >= self.end && !self.is_empty() {
            index - (self.end - 1)
        } else {
            0
        }
    }

    pub fn iter(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl From<std::ops::Range<usize>> for RowRange {
    fn from(r: std::ops::Range<usize>) -> Self {
        RowRange::new(r.start, r.end)
    }
}

impl From<RowRange> for std::ops::Range<usize> {
    fn from(r: RowRange) -> Self {
        r.start..r.end
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_inverted_bounds() {
        let r = RowRange::new(10, 4);
        assert!(r.is_empty());
        assert_eq!(r.start, 10);
        assert_eq!(r.len(), 0);
    }

    #[test]
    fn overlap_is_half_open() {
        let a = RowRange::new(100, 150);
        assert!(a.overlaps(&RowRange::new(149, 200)));
        assert!(!a.overlaps(&RowRange::new(150, 200)), "adjacent ranges are disjoint");
        assert!(!a.overlaps(&RowRange::new(400, 450)));
        assert!(!a.overlaps(&RowRange::empty()));
    }

    #[test]
    fn covering_merges_min_start_max_end() {
        let merged = RowRange::covering([
            RowRange::new(500, 521),
            RowRange::new(521, 571),
            RowRange::new(450, 500),
            RowRange::empty(),
        ]);
        assert_eq!(merged, Some(RowRange::new(450, 571)));
        assert_eq!(RowRange::covering(Vec::new()), None);
    }

    #[test]
    fn expand_clamps_to_universe() {
        let r = RowRange::new(10, 30).expand(50, 40);
        assert_eq!(r, RowRange::new(0, 40));
    }

    #[test]
    fn extends_beyond_checks_containment() {
        let rendered = RowRange::new(0, 71);
        assert!(RowRange::new(450, 571).extends_beyond(&rendered));
        assert!(!RowRange::new(10, 60).extends_beyond(&rendered));
        assert!(!RowRange::empty().extends_beyond(&rendered));
    }

    #[test]
    fn distance_to_outside_points() {
        let r = RowRange::new(10, 20);
        assert_eq!(r.distance_to(5), 5);
        assert_eq!(r.distance_to(15), 0);
        assert_eq!(r.distance_to(19), 0);
        assert_eq!(r.distance_to(25), 6);
    }

    #[test]
    fn display_uses_half_open_notation() {
        assert_eq!(RowRange::new(450, 571).to_string(), "[450,571)");
    }
}
