//! Versioned on-disk cache of the declaration model.
//!
//! The cache is one JSON document:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "writtenAt": "2026-01-01T00:00:00Z",
//!   "entries": [
//!     { "scope": "Widget", "fingerprint": "<sha256>", "method": { ... } }
//!   ]
//! }
//! ```
//!
//! Loading never fails on a single bad entry. An entry that does not decode,
//! or whose stored fingerprint no longer matches its decoded content, is
//! reported as a [`CacheMiss`] and left out of the snapshot so the pipeline
//! re-derives that declaration from source. A document written under another
//! schema version is discarded as a whole.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use scribe_core::codec::CacheCodec;
use scribe_core::diff::{fingerprint, Fingerprint};
use scribe_core::error::ModelError;
use scribe_core::method::Method;
use scribe_core::snapshot::ModelSnapshot;

/// Version of the cache document layout. Bump on any record change.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Errors
// ============================================================================

/// Errors that make a cache file unusable as a whole.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache file exists but could not be read.
    #[error("cannot read cache {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The cache file could not be written.
    #[error("cannot write cache {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not a cache document at all.
    #[error("cache {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type CacheResult<T> = Result<T, CacheError>;

// ============================================================================
// Document Layout
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheDocument<'a> {
    schema_version: u32,
    written_at: String,
    entries: Vec<CacheEntry<'a>>,
}

#[derive(Serialize)]
struct CacheEntry<'a> {
    scope: &'a str,
    fingerprint: Fingerprint,
    method: Value,
}

/// Lenient view of a document: entries stay raw so each decodes on its own.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    schema_version: u32,
    #[serde(default)]
    written_at: Option<String>,
    #[serde(default)]
    entries: Vec<Value>,
}

#[derive(Deserialize)]
struct RawEntry {
    scope: String,
    fingerprint: Fingerprint,
    method: Value,
}

// ============================================================================
// Load Results
// ============================================================================

/// How a load went as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheStatus {
    /// No cache file: first run.
    Cold,
    /// Document read under the current schema version.
    Warm,
    /// Document written under another schema version and discarded.
    VersionMismatch { found: u32 },
}

/// Why an entry was not restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    /// The entry lacks `scope`, `fingerprint` or `method`.
    MalformedEntry,
    /// The method record failed to decode.
    Undecodable,
    /// The decoded method does not hash to the stored fingerprint.
    FingerprintMismatch,
    /// Another entry already claimed this scope and selector.
    DuplicateSelector,
}

impl MissReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissReason::MalformedEntry => "malformed entry",
            MissReason::Undecodable => "undecodable method record",
            MissReason::FingerprintMismatch => "fingerprint mismatch",
            MissReason::DuplicateSelector => "duplicate selector",
        }
    }
}

/// A cache entry that was dropped during load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheMiss {
    /// Position of the entry in the document.
    pub index: usize,
    /// Scope, when the entry got far enough to name one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub reason: MissReason,
    pub message: String,
}

/// Result of [`CacheStore::load`].
#[derive(Debug, Clone)]
pub struct LoadedCache {
    pub status: CacheStatus,
    /// Write time recorded in the document, if any.
    pub written_at: Option<String>,
    /// Every entry that decoded and verified.
    pub snapshot: ModelSnapshot,
    pub misses: Vec<CacheMiss>,
}

impl LoadedCache {
    fn empty(status: CacheStatus) -> Self {
        LoadedCache {
            status,
            written_at: None,
            snapshot: ModelSnapshot::new(),
            misses: Vec::new(),
        }
    }

    pub fn hits(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_cold(&self) -> bool {
        self.status == CacheStatus::Cold
    }
}

// ============================================================================
// CacheStore
// ============================================================================

/// A cache file on disk.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CacheStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `snapshot` to disk atomically.
    ///
    /// The document goes to a temp file in the target directory first and is
    /// renamed over the old cache, so readers never observe a partial write.
    pub fn save(&self, snapshot: &ModelSnapshot) -> CacheResult<()> {
        let entries = snapshot
            .iter()
            .map(|(key, method)| CacheEntry {
                scope: &key.scope,
                fingerprint: fingerprint(method),
                method: method.encode(),
            })
            .collect();
        let document = CacheDocument {
            schema_version: CACHE_SCHEMA_VERSION,
            written_at: format_timestamp(SystemTime::now()),
            entries,
        };
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| self.write_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.write_error(e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| self.write_error(e))?;
        temp.write_all(&bytes).map_err(|e| self.write_error(e))?;
        temp.flush().map_err(|e| self.write_error(e))?;
        temp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        info!(
            "wrote {} cached declarations to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Read the cache back.
    ///
    /// A missing file is a cold cache, not an error. Only an unreadable file
    /// or a document that is not a cache at all fails the load.
    pub fn load(&self) -> CacheResult<LoadedCache> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no cache at {}, starting cold", self.path.display());
                return Ok(LoadedCache::empty(CacheStatus::Cold));
            }
            Err(source) => {
                return Err(CacheError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let raw: RawDocument =
            serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        if raw.schema_version != CACHE_SCHEMA_VERSION {
            warn!(
                "discarding cache {}: schema version {} (expected {})",
                self.path.display(),
                raw.schema_version,
                CACHE_SCHEMA_VERSION
            );
            return Ok(LoadedCache::empty(CacheStatus::VersionMismatch {
                found: raw.schema_version,
            }));
        }

        let mut loaded = LoadedCache::empty(CacheStatus::Warm);
        loaded.written_at = raw.written_at;
        for (index, entry) in raw.entries.into_iter().enumerate() {
            if let Err(miss) = restore_entry(index, entry, &mut loaded.snapshot) {
                warn!(
                    "cache entry {} in {}: {} ({})",
                    index,
                    self.path.display(),
                    miss.reason.as_str(),
                    miss.message
                );
                loaded.misses.push(miss);
            }
        }

        debug!(
            "loaded {} cached declarations from {} ({} misses)",
            loaded.hits(),
            self.path.display(),
            loaded.misses.len()
        );
        Ok(loaded)
    }

    fn write_error(&self, source: io::Error) -> CacheError {
        CacheError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

/// Decode and verify one entry into `snapshot`.
fn restore_entry(index: usize, entry: Value, snapshot: &mut ModelSnapshot) -> Result<(), CacheMiss> {
    let entry: RawEntry = serde_json::from_value(entry).map_err(|e| CacheMiss {
        index,
        scope: None,
        reason: MissReason::MalformedEntry,
        message: e.to_string(),
    })?;

    let miss = |reason: MissReason, message: String| CacheMiss {
        index,
        scope: Some(entry.scope.clone()),
        reason,
        message,
    };

    let method = Method::decode(&entry.method)
        .map_err(|e| miss(MissReason::Undecodable, e.to_string()))?;

    let actual = fingerprint(&method);
    if actual != entry.fingerprint {
        return Err(miss(
            MissReason::FingerprintMismatch,
            format!(
                "`{}` stored {}, content hashes to {}",
                method.selector_name(),
                entry.fingerprint,
                actual
            ),
        ));
    }

    match snapshot.insert(entry.scope.clone(), method) {
        Ok(()) => Ok(()),
        Err(err @ ModelError::DuplicateSelector { .. }) => {
            Err(miss(MissReason::DuplicateSelector, err.to_string()))
        }
        Err(err) => Err(miss(MissReason::Undecodable, err.to_string())),
    }
}

/// Format a timestamp for the cache document (ISO 8601).
fn format_timestamp(time: SystemTime) -> String {
    use chrono::{DateTime, Utc};

    let datetime: DateTime<Utc> = time.into();
    datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ============================================================================
// Tests
// ============================================================================
