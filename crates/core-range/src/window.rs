//! Viewport window calculation.
//!
//! Maps `(offset, extent, row_height)` onto the visible row range and the
//! wider desired range (visible ± buffer), and splits the buffer into the
//! segment ahead of and behind the current scroll direction.

use crate::{RowRange, ScrollDirection};

/// Row height family selected by the viewport width breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowHeightMode {
    Desktop,
    Mobile,
}

impl RowHeightMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowHeightMode::Desktop => "desktop",
            RowHeightMode::Mobile => "mobile",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMetrics {
    pub desktop_height: usize,
    pub mobile_height: usize,
    /// Widths at or below this value use the mobile height.
    pub mobile_breakpoint: usize,
}

impl RowMetrics {
    pub fn mode_for(&self, width: usize) -> RowHeightMode {
        if width <= self.mobile_breakpoint {
            RowHeightMode::Mobile
        } else {
            RowHeightMode::Desktop
        }
    }

    /// Height for `mode`, never zero.
    pub fn height(&self, mode: RowHeightMode) -> usize {
        let h = match mode {
            RowHeightMode::Desktop => self.desktop_height,
            RowHeightMode::Mobile => self.mobile_height,
        };
        h.max(1)
    }
}

/// Result of one window computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewWindow {
    pub first_visible: usize,
    pub visible: RowRange,
    /// `visible` expanded by the buffer size, clamped to the universe.
    pub desired: RowRange,
}

/// Buffer rows outside the visible range, oriented by scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSegments {
    pub forward: RowRange,
    pub backward: RowRange,
}

impl ViewWindow {
    /// Rows of `desired` after `visible`.
    pub fn ahead(&self) -> RowRange {
        RowRange::new(self.visible.end, self.desired.end)
    }

    /// Rows of `desired` before `visible`.
    pub fn behind(&self) -> RowRange {
        RowRange::new(self.desired.start, self.visible.start.max(self.desired.start))
    }

    pub fn segments(&self, direction: ScrollDirection) -> BufferSegments {
        match direction {
            ScrollDirection::Down => BufferSegments {
                forward: self.ahead(),
                backward: self.behind(),
            },
            ScrollDirection::Up => BufferSegments {
                forward: self.behind(),
                backward: self.ahead(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeCalculator {
    pub buffer_size: usize,
    pub total_rows: usize,
}

impl RangeCalculator {
    pub fn new(buffer_size: usize, total_rows: usize) -> Self {
        Self {
            buffer_size,
            total_rows,
        }
    }

    /// Number of rows that can be at least partially visible: whole rows in
    /// the extent plus one for the row straddling the top/bottom edge.
    pub fn visible_count(extent: usize, row_height: usize) -> usize {
        if extent == 0 {
            return 0;
        }
        extent.div_ceil(row_height.max(1)) + 1
    }

    pub fn first_visible(offset: usize, row_height: usize) -> usize {
        offset / row_height.max(1)
    }

    /// Largest meaningful scroll offset for the universe.
    pub fn max_offset(&self, extent: usize, row_height: usize) -> usize {
        self.total_rows
            .saturating_mul(row_height.max(1))
            .saturating_sub(extent)
    }

    pub fn window(&self, offset: usize, extent: usize, row_height: usize) -> ViewWindow {
        let first_visible = Self::first_visible(offset, row_height).min(self.total_rows);
        let count = Self::visible_count(extent, row_height);
        let visible = RowRange::with_len(first_visible, count).clamp_to(self.total_rows);
        let desired = visible.expand(self.buffer_size, self.total_rows);
        ViewWindow {
            first_visible,
            visible,
            desired,
        }
    }
}
