//! Configuration handling for scribe
//!
//! Settings live in `scribe.toml`:
//!
//! ```toml
//! [log]
//! level = "info"
//! json = false
//!
//! [output]
//! format = "text"
//! ```
//!
//! Every key is optional. Command-line flags override whatever the file says.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "scribe.toml";

/// Errors loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Scribe configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,

    /// Report settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level used when neither `--log-level` nor `RUST_LOG` is given
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit log lines as JSON
    #[serde(default)]
    pub json: bool,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Report format: `text` or `json`
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Report format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_format() -> OutputFormat {
    OutputFormat::Text
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load an explicit config file, or `scribe.toml` in `dir` if present.
    ///
    /// An explicit path must exist. A missing implicit file means defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = dir.join(CONFIG_FILE_NAME);
                if path.exists() {
                    Self::load(&path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }
}
