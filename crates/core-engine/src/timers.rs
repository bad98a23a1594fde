//! Debounce deadlines.
//!
//! Timers are plain deadlines owned by the engine; the runtime sleeps until
//! `next_deadline` and feeds expirations back as `Event::Timer`. Arming a
//! timer that is already armed replaces its deadline (trailing debounce).
//! Retry timers are keyed by the failed range so distinct ranges coexist.

use core_events::TimerKind;
use core_range::RowRange;
use std::time::Instant;

#[derive(Debug, Default, Clone)]
pub struct TimerSet {
    repaint: Option<Instant>,
    settle: Option<Instant>,
    resize: Option<Instant>,
    recheck: Option<Instant>,
    retries: Vec<(RowRange, Instant)>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, kind: TimerKind) -> Option<&mut Option<Instant>> {
        match kind {
            TimerKind::Repaint => Some(&mut self.repaint),
            TimerKind::Settle => Some(&mut self.settle),
            TimerKind::Resize => Some(&mut self.resize),
            TimerKind::Recheck => Some(&mut self.recheck),
            TimerKind::Retry(_) => None,
        }
    }

    pub fn arm(&mut self, kind: TimerKind, deadline: Instant) {
        if let TimerKind::Retry(range) = kind {
            match self.retries.iter_mut().find(|(r, _)| *r == range) {
                Some(entry) => entry.1 = deadline,
                None => self.retries.push((range, deadline)),
            }
            return;
        }
        if let Some(slot) = self.slot(kind) {
            *slot = Some(deadline);
        }
    }

    pub fn disarm(&mut self, kind: TimerKind) {
        if let TimerKind::Retry(range) = kind {
            self.retries.retain(|(r, _)| *r != range);
            return;
        }
        if let Some(slot) = self.slot(kind) {
            *slot = None;
        }
    }

    /// Drop retry deadlines for ranges lying entirely inside `range`.
    pub fn disarm_retries_within(&mut self, range: RowRange) -> usize {
        let before = self.retries.len();
        self.retries.retain(|(r, _)| !range.covers(r));
        before - self.retries.len()
    }

    pub fn disarm_all(&mut self) {
        *self = Self::default();
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        match kind {
            TimerKind::Repaint => self.repaint,
            TimerKind::Settle => self.settle,
            TimerKind::Resize => self.resize,
            TimerKind::Recheck => self.recheck,
            TimerKind::Retry(range) => self
                .retries
                .iter()
                .find(|(r, _)| *r == range)
                .map(|(_, at)| *at),
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadline(kind).is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [self.repaint, self.settle, self.resize, self.recheck]
            .into_iter()
            .flatten()
            .chain(self.retries.iter().map(|(_, at)| *at))
            .min()
    }

    /// Remove and return the earliest timer due at `now`, if any. Ties resolve
    /// in declaration order: resize, repaint, settle, recheck, then retries.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerKind> {
        let mut best: Option<(Instant, TimerKind)> = None;
        let fixed = [
            (self.resize, TimerKind::Resize),
            (self.repaint, TimerKind::Repaint),
            (self.settle, TimerKind::Settle),
            (self.recheck, TimerKind::Recheck),
        ];
        let retries = self
            .retries
            .iter()
            .map(|(range, at)| (Some(*at), TimerKind::Retry(*range)));
        for (deadline, kind) in fixed.into_iter().chain(retries) {
            let Some(at) = deadline else { continue };
            if at > now {
                continue;
            }
            if best.is_none_or(|(current, _)| at < current) {
                best = Some((at, kind));
            }
        }
        let (_, kind) = best?;
        self.disarm(kind);
        Some(kind)
    }
}
