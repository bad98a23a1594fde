//! Scroll direction tracking with hysteresis.
//!
//! Sub-threshold deltas (touchpad jitter, fractional scroll snapping) must not
//! flip the direction used to prioritize buffer fetches. The reference offset
//! only advances when a delta exceeds the threshold, so a slow sequence of
//! small moves in one direction still accumulates into a flip.

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollDirection {
    /// Toward higher row indices.
    #[default]
    Down,
    /// Toward lower row indices.
    Up,
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Down => "down",
            ScrollDirection::Up => "up",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectionTracker {
    threshold: usize,
    anchor: usize,
    direction: ScrollDirection,
}

impl DirectionTracker {
    pub fn new(threshold: usize, initial_offset: usize) -> Self {
        Self {
            threshold,
            anchor: initial_offset,
            direction: ScrollDirection::default(),
        }
    }

    pub fn direction(&self) -> ScrollDirection {
        self.direction
    }

    /// Feed a new scroll offset; returns the (possibly unchanged) direction.
    pub fn observe(&mut self, offset: usize) -> ScrollDirection {
        let delta = offset.abs_diff(self.anchor);
        if delta > self.threshold {
            let next = if offset > self.anchor {
                ScrollDirection::Down
            } else {
                ScrollDirection::Up
            };
            if next != self.direction {
                trace!(
                    target: "range.direction",
                    from = self.direction.as_str(),
                    to = next.as_str(),
                    delta,
                    "direction_flip"
                );
            }
            self.direction = next;
            self.anchor = offset;
        }
        self.direction
    }

    /// Re-anchor without changing direction (used after a resize rescales offsets).
    pub fn reset(&mut self, offset: usize) {
        self.anchor = offset;
    }
}
