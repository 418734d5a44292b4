//! Scribe: declaration model cache and change detection
//!
//! The scanner produces one callable declaration per method, function or
//! initializer it finds. Scribe caches that model between runs, compares the
//! cached and freshly scanned models, and tells the template stage which
//! declarations need to be rendered again.

// Declaration model - re-exported from scribe-core
pub use scribe_core::annotations;
pub use scribe_core::codec;
pub use scribe_core::diff;
pub use scribe_core::error as model_error;
pub use scribe_core::method;
pub use scribe_core::resolve;
pub use scribe_core::snapshot;
pub use scribe_core::types;

// Persistence and front door
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
