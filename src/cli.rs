//! Command implementations for the scribe binary.
//!
//! Each `run_*` function does the work of one subcommand and returns the
//! response; printing and exit codes are left to `main`.

use std::path::Path;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cache::{CacheStatus, CacheStore, LoadedCache};
use crate::config::{Config, OutputFormat};
use crate::error::ScribeError;
use crate::output::{DiffResponse, InspectResponse, MissCounts};
use scribe_core::snapshot::ModelSnapshot;

/// Exit code for `diff` when the caches differ.
pub const EXIT_DIFFERENCES_FOUND: u8 = 1;

/// Pick the report format: the flag wins over the config file.
pub fn resolve_format(flag: Option<OutputFormat>, config: &Config) -> OutputFormat {
    flag.unwrap_or(config.output.format)
}

/// Build the log filter: `--log-level` wins, then `RUST_LOG`, then the
/// config file level.
///
/// A config level that is not a valid filter directive is an argument error.
pub fn log_filter(
    flag: Option<tracing::Level>,
    config: &Config,
) -> Result<EnvFilter, ScribeError> {
    if let Some(level) = flag {
        return Ok(EnvFilter::new(level.to_string()));
    }
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => config_log_filter(&config.log.level),
    }
}

fn config_log_filter(level: &str) -> Result<EnvFilter, ScribeError> {
    EnvFilter::try_new(level).map_err(|err| {
        ScribeError::invalid_args(format!("invalid log level `{}` in config: {}", level, err))
    })
}

fn load(path: &Path) -> Result<LoadedCache, ScribeError> {
    let loaded = CacheStore::new(path).load()?;
    if let CacheStatus::VersionMismatch { found } = loaded.status {
        info!(
            "{} was written with schema version {}, treating it as empty",
            path.display(),
            found
        );
    }
    Ok(loaded)
}

/// `scribe inspect <cache>`: list the cached declarations.
///
/// A missing cache file is reported as a cold cache rather than an error.
pub fn run_inspect(path: &Path) -> Result<InspectResponse, ScribeError> {
    let loaded = load(path)?;
    debug!(
        "inspecting {}: {} hits, {} misses",
        path.display(),
        loaded.hits(),
        loaded.misses.len()
    );
    Ok(InspectResponse::new(path.display().to_string(), &loaded))
}

/// `scribe diff <old> <new>`: compare two caches.
///
/// A missing side compares as empty, so diffing against a first run lists
/// every declaration as added.
pub fn run_diff(old: &Path, new: &Path) -> Result<DiffResponse, ScribeError> {
    let previous = load(old)?;
    let current = load(new)?;
    let changes = ModelSnapshot::compare(&previous.snapshot, &current.snapshot);
    Ok(DiffResponse::new(
        old.display().to_string(),
        new.display().to_string(),
        changes,
        MissCounts {
            old: previous.misses.len(),
            new: current.misses.len(),
        },
    ))
}
