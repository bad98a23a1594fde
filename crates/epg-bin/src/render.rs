//! Terminal painter for guide rows.
//!
//! Each channel occupies `row_height` terminal lines: a header with number
//! and name, a program line, and a separator when there is room for one.
//! Rows without cached data paint a placeholder.

use crate::provider::{ChannelRow, Program};
use core_engine::{RenderFrame, RowRenderer};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use tracing::{trace, warn};
use unicode_width::UnicodeWidthChar;

pub const PLACEHOLDER: &str = "…loading";

/// Truncate `text` to `width` terminal cells, marking the cut with `…`.
pub fn fit(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::with_capacity(text.len().min(width * 4));
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            if width > 0 {
                while used + 1 > width {
                    let Some(last) = out.pop() else { break };
                    used -= last.width().unwrap_or(0);
                }
                out.push('…');
            }
            return out;
        }
        used += w;
        out.push(ch);
    }
    out
}

fn clock(minute: u32) -> String {
    format!("{:02}:{:02}", (minute / 60) % 24, minute % 60)
}

fn program_line(programs: &[Program]) -> String {
    programs
        .iter()
        .map(|p| format!("{} {}", clock(p.start_minute), p.title))
        .collect::<Vec<_>>()
        .join(" │ ")
}

/// Text for line `sub` (0-based) of a row `row_height` lines tall.
pub fn row_line(index: usize, row: Option<&ChannelRow>, sub: usize, row_height: usize) -> String {
    if row_height > 2 && sub == row_height - 1 {
        return String::new();
    }
    match (row, sub) {
        (Some(row), 0) => format!("{:>5}  {}", row.number, row.name),
        (Some(row), _) => format!("       {}", program_line(&row.programs)),
        (None, 0) => format!("{:>5}  {PLACEHOLDER}", index + 1),
        (None, _) => String::new(),
    }
}

pub fn status_line(frame: &RenderFrame<'_, ChannelRow>) -> String {
    let in_flight = frame
        .in_flight
        .map(|r| r.to_string())
        .unwrap_or_else(|| "idle".to_string());
    format!(
        " rows {} · cached {} · fetching {} · offset {} · q quits",
        frame.rendered,
        frame.cache.len(),
        in_flight,
        frame.scroll_offset
    )
}

pub struct TerminalRenderer<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn draw(&mut self, frame: &RenderFrame<'_, ChannelRow>) -> io::Result<()> {
        let height = frame.row_height.max(1);
        let width = frame.width;
        for line in 0..frame.extent {
            let absolute = frame.scroll_offset + line;
            let index = absolute / height;
            let text = if frame.rendered.contains(index) {
                row_line(index, frame.cache.get(index), absolute % height, height)
            } else {
                String::new()
            };
            queue!(
                self.out,
                MoveTo(0, line as u16),
                Clear(ClearType::CurrentLine),
                Print(fit(&text, width))
            )?;
        }
        queue!(
            self.out,
            MoveTo(0, frame.extent as u16),
            Clear(ClearType::CurrentLine),
            SetAttribute(Attribute::Reverse),
            Print(fit(&status_line(frame), width)),
            SetAttribute(Attribute::Reset)
        )?;
        self.out.flush()
    }
}

impl<W: Write + Send> RowRenderer<ChannelRow> for TerminalRenderer<W> {
    fn paint(&mut self, frame: &RenderFrame<'_, ChannelRow>) {
        trace!(
            target: "render",
            rendered = %frame.rendered,
            placeholders = frame.placeholders(),
            "paint"
        );
        if let Err(err) = self.draw(frame) {
            warn!(target: "render", error = %err, "paint_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SyntheticGuide;
    use core_cache::RowCache;
    use core_range::RowRange;
    use pretty_assertions::assert_eq;

    #[test]
    fn fit_truncates_by_cell_width() {
        assert_eq!(fit("abcdef", 10), "abcdef");
        assert_eq!(fit("abcdef", 4), "abc…");
        assert_eq!(fit("日本語テレビ", 5), "日本…");
        assert_eq!(fit("abc", 0), "");
    }

    #[test]
    fn row_lines_follow_height() {
        let guide = SyntheticGuide::new(10);
        let row = guide.channel(0, 0);
        assert!(row_line(0, Some(&row), 0, 3).contains(&row.name));
        assert!(row_line(0, Some(&row), 1, 3).contains("00:00"));
        assert_eq!(row_line(0, Some(&row), 2, 3), "");
        assert!(row_line(0, Some(&row), 1, 2).contains("00:00"));
        assert!(row_line(6, None, 0, 2).contains(PLACEHOLDER));
    }

    #[test]
    fn paint_writes_rows_placeholders_and_status() {
        let guide = SyntheticGuide::new(100);
        let mut cache = RowCache::new();
        cache.put_rows(guide.initial_rows(RowRange::new(0, 2)));
        let frame = RenderFrame {
            rendered: RowRange::new(0, 4),
            visible: RowRange::new(0, 4),
            scroll_offset: 0,
            row_height: 3,
            extent: 12,
            width: 80,
            cache: &cache,
            in_flight: Some(RowRange::new(2, 4)),
        };
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer.paint(&frame);
        let out = String::from_utf8_lossy(renderer.writer()).to_string();
        assert!(out.contains(&guide.channel(0, 0).name));
        assert!(out.contains(PLACEHOLDER));
        assert!(out.contains("fetching [2,4)"));
    }
}
