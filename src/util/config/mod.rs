//! Reader configuration
//!
//! The heap format does not record the superblock's field widths, so a
//! standalone reader needs them from somewhere. They, and lookup behaviour
//! the file cannot express, come from a TOML file.
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. Explicit --config file
//! 3. User-level (~/.config/frhp/config.toml)
//! 4. Default values
//! ```
//!
//! # Example
//!
//! ```toml
//! [format]
//! size_of_offsets = 8
//! size_of_lengths = 8
//!
//! [heap]
//! legacy_inline_ids = false
//!
//! [log]
//! level = "debug"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::format::Superblock;
use crate::heap::{HeapError, HeapOptions};
use crate::util::logger::LogLevel;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Superblock field widths
    #[serde(default)]
    pub format: FormatConfig,
    /// Heap lookup settings
    #[serde(default)]
    pub heap: HeapConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Superblock field widths
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormatConfig {
    #[serde(default = "default_width")]
    pub size_of_offsets: u8,
    #[serde(default = "default_width")]
    pub size_of_lengths: u8,
}

fn default_width() -> u8 {
    8
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            size_of_offsets: 8,
            size_of_lengths: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct HeapConfig {
    /// Resolve mode-3 identifiers as inline payloads
    #[serde(default)]
    pub legacy_inline_ids: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
}

impl ReaderConfig {
    pub fn superblock(&self) -> Result<Superblock, ConfigError> {
        Superblock::new(self.format.size_of_offsets, self.format.size_of_lengths)
            .map_err(ConfigError::InvalidWidths)
    }

    pub fn heap_options(&self) -> HeapOptions {
        HeapOptions {
            legacy_inline_ids: self.heap.legacy_inline_ids,
        }
    }
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("frhp"));
    }

    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("frhp"));
    }

    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("frhp"));
    }

    None
}

/// Get the user config file path (~/.config/frhp/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Parse a configuration from TOML text
pub fn parse_config(content: &str) -> Result<ReaderConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::ParseError)
}

/// Load configuration from `path`, or the user config if `path` is `None`.
///
/// A missing user config yields the defaults; a missing explicit path is an error.
pub fn load_config(path: Option<&Path>) -> Result<ReaderConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match get_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(ReaderConfig::default()),
        },
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::IoError {
        path: path.clone(),
        source,
    })?;
    parse_config(&content)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid field widths: {0}")]
    InvalidWidths(#[source] HeapError),
}
