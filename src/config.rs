//! Configuration loading and management
//!
//! The overlay settings live in a `config.json` whose keys match the
//! settings surface: `executables`, `x`, `y`, `w`, `h`, `font-name`,
//! `font-size` and `hide`. The engine only ever sees a whole snapshot;
//! the settings surface replaces it atomically via IPC.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

/// Font used when the snapshot carries no `font-name`
pub const DEFAULT_FONT_NAME: &str = "Segoe UI";
/// Font size used when the snapshot carries no `font-size`
pub const DEFAULT_FONT_SIZE: u32 = 18;
/// Seconds the text stays visible after the last release
pub const DEFAULT_HIDE_SECS: u64 = 1;

const DEFAULT_Y: i32 = 5;
const DEFAULT_W: i32 = 400;
const DEFAULT_H: i32 = 100;

/// Immutable overlay configuration snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Executable paths of the applications the overlay activates for.
    /// May be empty, in which case the display simply never shows.
    pub executables: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<i32>,

    #[serde(rename = "font-name", skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(rename = "font-size", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,

    /// Seconds before the displayed text is cleared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide: Option<u64>,
}

/// Errors surfaced to the administrative caller when a snapshot cannot
/// be read or written. The engine itself only ever receives well-typed
/// snapshots.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Config {
    /// Load a snapshot from the given file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(raw.trim())?;
        Ok(config)
    }

    /// Load a snapshot, writing a default `{"executables": []}` file
    /// first when none exists
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(?path, "no configuration found, writing default");
            let default = Config::default();
            default.save(path)?;
            return Ok(default);
        }
        Self::load(path)
    }

    /// Persist the snapshot as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// How long the text stays visible after the last release
    pub fn hide_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.hide.unwrap_or(DEFAULT_HIDE_SECS))
    }

    pub fn effective_y(&self) -> i32 {
        self.y.unwrap_or(DEFAULT_Y)
    }

    pub fn effective_w(&self) -> i32 {
        self.w.unwrap_or(DEFAULT_W)
    }

    pub fn effective_h(&self) -> i32 {
        self.h.unwrap_or(DEFAULT_H)
    }

    pub fn effective_font_name(&self) -> &str {
        self.font_name.as_deref().unwrap_or(DEFAULT_FONT_NAME)
    }

    pub fn effective_font_size(&self) -> u32 {
        self.font_size.unwrap_or(DEFAULT_FONT_SIZE)
    }

    /// Target paths normalized for case-insensitive, separator-stable
    /// membership tests
    pub fn normalized_targets(&self) -> Vec<String> {
        self.executables
            .iter()
            .map(|exe| crate::focus::normalize_exe_path(Path::new(exe)))
            .collect()
    }
}

/// Path of the configuration file, overridable for tests and
/// non-standard installs
pub fn config_path() -> PathBuf {
    std::env::var_os("KEYSHOW_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

/// Localhost address the IPC server binds to
pub fn ipc_addr() -> String {
    std::env::var("KEYSHOW_IPC_ADDR").unwrap_or_else(|_| "127.0.0.1:53127".to_string())
}
