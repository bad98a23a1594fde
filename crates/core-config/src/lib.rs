//! Configuration loading and parsing.
//!
//! Parses `epgview.toml` (or an override path provided by the binary). Every
//! field carries a serde default so a partial file is valid; unknown fields
//! are ignored to allow forward evolution. A missing file yields defaults; a
//! file that fails to parse is logged and also yields defaults.
//!
//! The raw parsed values are kept in [`ConfigFile`]. [`Config::settings`]
//! derives the clamped [`GuideSettings`] the engine consumes (durations
//! resolved, degenerate zeros lifted to their minimums).

use anyhow::Result;
use core_range::RowMetrics;
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "epgview.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RowsConfig {
    #[serde(default = "RowsConfig::default_desktop_height")]
    pub desktop_height: usize,
    #[serde(default = "RowsConfig::default_mobile_height")]
    pub mobile_height: usize,
    #[serde(default = "RowsConfig::default_mobile_breakpoint")]
    pub mobile_breakpoint: usize,
}

impl Default for RowsConfig {
    fn default() -> Self {
        Self {
            desktop_height: Self::default_desktop_height(),
            mobile_height: Self::default_mobile_height(),
            mobile_breakpoint: Self::default_mobile_breakpoint(),
        }
    }
}

impl RowsConfig {
    const fn default_desktop_height() -> usize {
        3
    }
    const fn default_mobile_height() -> usize {
        2
    }
    const fn default_mobile_breakpoint() -> usize {
        100
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    #[serde(default = "WindowConfig::default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "WindowConfig::default_max_cache_size")]
    pub max_cache_size: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            buffer_size: Self::default_buffer_size(),
            max_cache_size: Self::default_max_cache_size(),
        }
    }
}

impl WindowConfig {
    const fn default_buffer_size() -> usize {
        50
    }
    const fn default_max_cache_size() -> usize {
        500
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    #[serde(default = "FetchConfig::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "FetchConfig::default_retry_delay_ms")] // linear backoff unit
    pub retry_delay_ms: u64,
    #[serde(default = "FetchConfig::default_recheck_delay_ms")]
    pub recheck_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::default_max_retries(),
            retry_delay_ms: Self::default_retry_delay_ms(),
            recheck_delay_ms: Self::default_recheck_delay_ms(),
        }
    }
}

impl FetchConfig {
    const fn default_max_retries() -> u32 {
        3
    }
    const fn default_retry_delay_ms() -> u64 {
        1000
    }
    const fn default_recheck_delay_ms() -> u64 {
        50
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    /// Scroll delta (offset units) required before the direction may flip.
    #[serde(default = "TimingConfig::default_direction_threshold")]
    pub direction_threshold: usize,
    #[serde(default = "TimingConfig::default_repaint_debounce_ms")]
    pub repaint_debounce_ms: u64,
    #[serde(default = "TimingConfig::default_settle_debounce_ms")]
    pub settle_debounce_ms: u64,
    #[serde(default = "TimingConfig::default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            direction_threshold: Self::default_direction_threshold(),
            repaint_debounce_ms: Self::default_repaint_debounce_ms(),
            settle_debounce_ms: Self::default_settle_debounce_ms(),
            resize_debounce_ms: Self::default_resize_debounce_ms(),
        }
    }
}

impl TimingConfig {
    const fn default_direction_threshold() -> usize {
        5
    }
    const fn default_repaint_debounce_ms() -> u64 {
        16
    }
    const fn default_settle_debounce_ms() -> u64 {
        150
    }
    const fn default_resize_debounce_ms() -> u64 {
        150
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub rows: RowsConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Engine-facing settings with clamps applied and durations resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuideSettings {
    pub rows: RowMetrics,
    pub buffer_size: usize,
    pub max_cache_size: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub recheck_delay: Duration,
    pub direction_threshold: usize,
    pub repaint_debounce: Duration,
    pub settle_debounce: Duration,
    pub resize_debounce: Duration,
}

impl GuideSettings {
    /// Eviction keeps every row within twice the buffer of the view center.
    pub fn keep_distance(&self) -> usize {
        self.buffer_size.saturating_mul(2)
    }
}

impl Default for GuideSettings {
    fn default() -> Self {
        Config::default().settings()
    }
}

/// Best-effort config path: local working directory first, then the platform
/// config dir (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("epgview").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                file,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

fn at_least<T: PartialOrd + Copy + std::fmt::Debug>(field: &'static str, raw: T, min: T) -> T {
    if raw < min {
        info!(target: "config", field, raw = ?raw, clamped = ?min, "config_value_clamped");
        min
    } else {
        raw
    }
}

impl Config {
    /// Derive engine settings. Zero row heights, zero retries and a zero cache
    /// bound are lifted to 1; each adjustment is logged on target `config`.
    pub fn settings(&self) -> GuideSettings {
        let f = &self.file;
        GuideSettings {
            rows: RowMetrics {
                desktop_height: at_least("rows.desktop_height", f.rows.desktop_height, 1),
                mobile_height: at_least("rows.mobile_height", f.rows.mobile_height, 1),
                mobile_breakpoint: f.rows.mobile_breakpoint,
            },
            buffer_size: f.window.buffer_size,
            max_cache_size: at_least("window.max_cache_size", f.window.max_cache_size, 1),
            max_retries: at_least("fetch.max_retries", f.fetch.max_retries, 1),
            retry_delay: Duration::from_millis(f.fetch.retry_delay_ms),
            recheck_delay: Duration::from_millis(f.fetch.recheck_delay_ms),
            direction_threshold: f.timing.direction_threshold,
            repaint_debounce: Duration::from_millis(f.timing.repaint_debounce_ms),
            settle_debounce: Duration::from_millis(f.timing.settle_debounce_ms),
            resize_debounce: Duration::from_millis(f.timing.resize_debounce_ms),
        }
    }
}
