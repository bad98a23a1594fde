//! Crossterm terminal session.
//!
//! Raw mode and the alternate screen are entered once and restored when the
//! session drops, including on early return or panic unwinding.

use anyhow::Result;
use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode, enable_raw_mode,
        size,
    },
};
use std::io::stdout;
use tracing::{debug, warn};

/// Lines reserved below the guide for the status bar.
pub const STATUS_ROWS: u16 = 1;

pub struct TerminalSession {
    active: bool,
}

impl TerminalSession {
    pub fn enter(title: &str) -> Result<Self> {
        enable_raw_mode()?;
        let session = Self { active: true };
        execute!(stdout(), EnterAlternateScreen, Hide, SetTitle(title))?;
        debug!(target: "runtime", "terminal_entered");
        Ok(session)
    }

    /// Current size as `(width, guide_height)` with the status bar excluded.
    pub fn guide_area() -> Result<(usize, usize)> {
        let (w, h) = size()?;
        Ok(guide_area_from(w, h))
    }

    fn leave(&mut self) -> Result<()> {
        if self.active {
            execute!(stdout(), LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.active = false;
        }
        Ok(())
    }
}

/// Split a raw terminal size into the guide area.
pub fn guide_area_from(width: u16, height: u16) -> (usize, usize) {
    (width as usize, height.saturating_sub(STATUS_ROWS) as usize)
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Err(err) = self.leave() {
            warn!(target: "runtime", error = %err, "terminal_restore_failed");
        }
    }
}
