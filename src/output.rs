//! Response types and rendering for CLI output.
//!
//! Every command builds one response value. With `--format json` it is
//! printed with [`emit_response`]; with `--format text` the `render_*`
//! functions print a short human report. Field and array order are
//! deterministic: responses are built from ordered snapshots.

use std::io::{self, Write};

use serde::Serialize;

use crate::cache::{CacheMiss, CacheStatus, LoadedCache};
use crate::error::{OutputErrorCode, ScribeError};
use scribe_core::method::{Method, Parameter};
use scribe_core::snapshot::{ChangeSet, MethodKey};
use scribe_core::types::AccessLevel;

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Inspect
// ============================================================================

/// One parameter as reported by `inspect`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSummary {
    pub argument_label: String,
    pub name: String,
    pub type_name: String,
}

impl From<&Parameter> for ParameterSummary {
    fn from(param: &Parameter) -> Self {
        ParameterSummary {
            argument_label: param.argument_label().to_string(),
            name: param.name().to_string(),
            type_name: param.type_name().to_string(),
        }
    }
}

/// One cached callable with its derived properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSummary {
    pub scope: String,
    pub selector_name: String,
    pub short_name: String,
    pub parameters: Vec<ParameterSummary>,
    pub return_type_name: String,
    pub unwrapped_return_type_name: String,
    pub access_level: AccessLevel,
    pub is_static: bool,
    pub is_class: bool,
    pub is_initializer: bool,
    pub is_optional_return_type: bool,
    pub annotations: Vec<String>,
}

impl MethodSummary {
    pub fn new(key: &MethodKey, method: &Method) -> Self {
        MethodSummary {
            scope: key.scope.clone(),
            selector_name: method.selector_name().to_string(),
            short_name: method.short_name().to_string(),
            parameters: method.parameters().iter().map(ParameterSummary::from).collect(),
            return_type_name: method.return_type_name().to_string(),
            unwrapped_return_type_name: method.unwrapped_return_type_name().to_string(),
            access_level: method.access_level(),
            is_static: method.is_static(),
            is_class: method.is_class(),
            is_initializer: method.is_initializer(),
            is_optional_return_type: method.is_optional_return_type(),
            annotations: method.annotations().keys().map(str::to_string).collect(),
        }
    }
}

/// Response for `scribe inspect`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectResponse {
    pub status: String,
    pub schema_version: String,
    pub cache: String,
    pub cache_status: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_at: Option<String>,
    pub methods: Vec<MethodSummary>,
    pub misses: Vec<CacheMiss>,
}

impl InspectResponse {
    pub fn new(cache: impl Into<String>, loaded: &LoadedCache) -> Self {
        InspectResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            cache: cache.into(),
            cache_status: loaded.status,
            written_at: loaded.written_at.clone(),
            methods: loaded
                .snapshot
                .iter()
                .map(|(key, method)| MethodSummary::new(key, method))
                .collect(),
            misses: loaded.misses.clone(),
        }
    }
}

// ============================================================================
// Diff
// ============================================================================

/// Entries dropped while loading each side of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MissCounts {
    pub old: usize,
    pub new: usize,
}

/// Response for `scribe diff`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResponse {
    pub status: String,
    pub schema_version: String,
    pub old: String,
    pub new: String,
    pub changes: ChangeSet,
    pub regenerate: Vec<MethodKey>,
    pub misses: MissCounts,
}

impl DiffResponse {
    pub fn new(
        old: impl Into<String>,
        new: impl Into<String>,
        changes: ChangeSet,
        misses: MissCounts,
    ) -> Self {
        let regenerate = changes.needs_regeneration().into_iter().cloned().collect();
        DiffResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            old: old.into(),
            new: new.into(),
            changes,
            regenerate,
            misses,
        }
    }

    pub fn has_differences(&self) -> bool {
        !self.changes.is_empty()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error details in an error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    /// Numeric error code, also the exit code.
    pub code: u8,
    /// Human-readable message.
    pub message: String,
}

impl ErrorInfo {
    pub fn from_error(err: &ScribeError) -> Self {
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
        }
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &ScribeError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Emitters
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

fn describe_status(status: CacheStatus) -> String {
    match status {
        CacheStatus::Cold => "no cache".to_string(),
        CacheStatus::Warm => "ok".to_string(),
        CacheStatus::VersionMismatch { found } => {
            format!("discarded (schema version {})", found)
        }
    }
}

/// Text report for `inspect`.
pub fn render_inspect_text(response: &InspectResponse, writer: &mut impl Write) -> io::Result<()> {
    writeln!(
        writer,
        "{}: {}, {} declarations, {} misses",
        response.cache,
        describe_status(response.cache_status),
        response.methods.len(),
        response.misses.len()
    )?;
    for method in &response.methods {
        let mut flags = Vec::new();
        if method.is_static {
            flags.push("static");
        }
        if method.is_class {
            flags.push("class");
        }
        if method.is_initializer {
            flags.push("init");
        }
        if method.is_optional_return_type {
            flags.push("optional");
        }
        let name = if method.scope.is_empty() {
            method.selector_name.clone()
        } else {
            format!("{}.{}", method.scope, method.selector_name)
        };
        write!(
            writer,
            "  {} {} -> {}",
            method.access_level, name, method.return_type_name
        )?;
        if !flags.is_empty() {
            write!(writer, " [{}]", flags.join(", "))?;
        }
        writeln!(writer)?;
    }
    for miss in &response.misses {
        writeln!(
            writer,
            "  miss #{}: {} ({})",
            miss.index,
            miss.reason.as_str(),
            miss.message
        )?;
    }
    Ok(())
}

/// Text report for `diff`.
pub fn render_diff_text(response: &DiffResponse, writer: &mut impl Write) -> io::Result<()> {
    let changes = &response.changes;
    if changes.is_empty() {
        writeln!(
            writer,
            "no changes ({} declarations unchanged)",
            changes.unchanged.len()
        )?;
        return Ok(());
    }
    for key in &changes.added {
        writeln!(writer, "added    {}", key)?;
    }
    for key in &changes.removed {
        writeln!(writer, "removed  {}", key)?;
    }
    for modified in &changes.modified {
        writeln!(writer, "modified {}", modified.key)?;
        for line in modified.diff.to_string().lines() {
            writeln!(writer, "    {}", line)?;
        }
    }
    writeln!(
        writer,
        "{} added, {} removed, {} modified, {} unchanged",
        changes.added.len(),
        changes.removed.len(),
        changes.modified.len(),
        changes.unchanged.len()
    )
}

// ============================================================================
// Tests
// ============================================================================
