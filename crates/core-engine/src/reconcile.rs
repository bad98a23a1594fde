//! Priority grouping for the reconciliation pass.
//!
//! Missing runs of the desired range are split into three groups, requested
//! in order: runs touching the visible rows, runs in the buffer segment the
//! user is scrolling toward, then runs in the opposite segment. A run that
//! straddles the visible edge stays whole in the visible group so a jump
//! produces one covering request instead of three.

use core_range::{RowRange, ScrollDirection, ViewWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Visible,
    Forward,
    Backward,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Visible => "visible",
            GroupKind::Forward => "forward",
            GroupKind::Backward => "backward",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityGroup {
    pub kind: GroupKind,
    pub runs: Vec<RowRange>,
}

/// Partition `missing` (ascending runs within `window.desired`) into
/// non-empty groups in request order.
pub fn priority_groups(
    window: &ViewWindow,
    direction: ScrollDirection,
    missing: &[RowRange],
) -> Vec<PriorityGroup> {
    let segments = window.segments(direction);
    let mut visible = Vec::new();
    let mut forward = Vec::new();
    let mut backward = Vec::new();
    for run in missing.iter().copied().filter(|r| !r.is_empty()) {
        if run.overlaps(&window.visible) {
            visible.push(run);
        } else if run.overlaps(&segments.forward) {
            forward.push(run);
        } else {
            backward.push(run);
        }
    }
    [
        (GroupKind::Visible, visible),
        (GroupKind::Forward, forward),
        (GroupKind::Backward, backward),
    ]
    .into_iter()
    .filter(|(_, runs)| !runs.is_empty())
    .map(|(kind, runs)| PriorityGroup { kind, runs })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_range::RangeCalculator;
    use pretty_assertions::assert_eq;

    fn window_at_500() -> ViewWindow {
        // visible [500,521), desired [450,571)
        RangeCalculator::new(50, 1000).window(5000, 200, 10)
    }

    #[test]
    fn whole_gap_across_visible_is_one_group() {
        let w = window_at_500();
        let groups = priority_groups(&w, ScrollDirection::Down, &[RowRange::new(450, 571)]);
        assert_eq!(
            groups,
            vec![PriorityGroup {
                kind: GroupKind::Visible,
                runs: vec![RowRange::new(450, 571)]
            }]
        );
    }

    #[test]
    fn scrolling_down_requests_ahead_before_behind() {
        let w = window_at_500();
        let missing = [RowRange::new(450, 500), RowRange::new(521, 571)];
        let groups = priority_groups(&w, ScrollDirection::Down, &missing);
        let order: Vec<_> = groups.iter().map(|g| (g.kind, g.runs.clone())).collect();
        assert_eq!(
            order,
            vec![
                (GroupKind::Forward, vec![RowRange::new(521, 571)]),
                (GroupKind::Backward, vec![RowRange::new(450, 500)]),
            ]
        );
    }

    #[test]
    fn scrolling_up_requests_behind_first() {
        let w = window_at_500();
        let missing = [RowRange::new(450, 500), RowRange::new(521, 571)];
        let groups = priority_groups(&w, ScrollDirection::Up, &missing);
        assert_eq!(groups[0].runs, vec![RowRange::new(450, 500)]);
        assert_eq!(groups[0].kind, GroupKind::Forward);
        assert_eq!(groups[1].runs, vec![RowRange::new(521, 571)]);
    }

    #[test]
    fn nothing_missing_yields_no_groups() {
        let w = window_at_500();
        assert!(priority_groups(&w, ScrollDirection::Down, &[]).is_empty());
    }

    #[test]
    fn multiple_runs_per_segment_stay_together() {
        let w = window_at_500();
        let missing = [
            RowRange::new(505, 507),
            RowRange::new(530, 540),
            RowRange::new(550, 560),
        ];
        let groups = priority_groups(&w, ScrollDirection::Down, &missing);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].kind, GroupKind::Visible);
        assert_eq!(
            groups[1].runs,
            vec![RowRange::new(530, 540), RowRange::new(550, 560)]
        );
    }
}
