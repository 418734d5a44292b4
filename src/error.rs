//! Error types and exit codes for the scribe CLI.
//!
//! `ScribeError` is the single error type commands return. Subsystem errors
//! (cache, config) are bridged into it with `From` impls, and
//! `OutputErrorCode` maps each variant to a stable process exit code:
//! - `2`: Invalid arguments (bad log level, unreadable config)
//! - `3`: Cache errors (cache file unreadable, corrupt or unwritable)
//! - `10`: Internal errors (bugs, unexpected state)
//!
//! Exit code `1` is not an error: `scribe diff` returns it when the two
//! caches differ.

use std::fmt;

use thiserror::Error;

use crate::cache::CacheError;
use crate::config::ConfigError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes used as CLI exit codes and in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, bad config).
    InvalidArguments = 2,
    /// A cache file could not be read or written.
    CacheError = 3,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum ScribeError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Config file could not be used.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cache file could not be used.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl ScribeError {
    pub fn invalid_args(message: impl Into<String>) -> Self {
        ScribeError::InvalidArguments {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ScribeError::InternalError {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&ScribeError> for OutputErrorCode {
    fn from(err: &ScribeError) -> Self {
        match err {
            ScribeError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            ScribeError::Config(_) => OutputErrorCode::InvalidArguments,
            ScribeError::Cache(_) => OutputErrorCode::CacheError,
            ScribeError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<ScribeError> for OutputErrorCode {
    fn from(err: ScribeError) -> Self {
        OutputErrorCode::from(&err)
    }
}

impl From<std::io::Error> for ScribeError {
    fn from(err: std::io::Error) -> Self {
        ScribeError::internal(format!("IO error: {}", err))
    }
}

// ============================================================================
// Tests
// ============================================================================
