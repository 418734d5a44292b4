//! Core declaration model for scribe.
//!
//! This crate provides the language-agnostic pieces of the code generation
//! pipeline that sit between the scanner and the template stage:
//! - Type references with optionality metadata
//! - Callable declarations ([`method::Method`]) and their parameters
//! - Annotation maps with closed value types
//! - Non-owning cross references into an external type table
//! - Structural diffing over declared comparable fields
//! - The cache codec used to persist the model between runs
//! - Model snapshots and change sets for incremental regeneration

pub mod annotations;
pub mod codec;
pub mod diff;
pub mod error;
pub mod method;
pub mod resolve;
pub mod snapshot;
pub mod types;
