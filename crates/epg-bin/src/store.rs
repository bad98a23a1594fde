//! JSON file holding the last scroll offset.

use anyhow::{Context, Result};
use core_engine::ScrollPositionStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct ScrollFile {
    offset: usize,
}

#[derive(Debug, Clone)]
pub struct JsonScrollStore {
    path: PathBuf,
}

impl JsonScrollStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/epgview/scroll.json`, falling back to the working directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("epgview"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scroll.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScrollPositionStore for JsonScrollStore {
    fn load(&self) -> Result<Option<usize>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let file: ScrollFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        debug!(target: "runtime", path = %self.path.display(), offset = file.offset, "scroll_position_loaded");
        Ok(Some(file.offset))
    }

    fn save(&mut self, offset: usize) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = serde_json::to_string(&ScrollFile { offset })?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}
