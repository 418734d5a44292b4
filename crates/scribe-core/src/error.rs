//! Error types for the declaration model.
//!
//! Two families of errors live here:
//! - [`ModelError`]: rejected mutations of an already constructed model
//!   (rebinding a resolved slot, duplicate keys, non-finite numbers)
//! - [`DecodeError`]: a cache record that cannot be turned back into an entity
//!
//! Construction preconditions (an empty selector or parameter name) are not
//! represented here: they are caller bugs and panic at the boundary.

use std::fmt;

use thiserror::Error;

use crate::resolve::TypeId;

// ============================================================================
// Entity Kind
// ============================================================================

/// Kind of entity a cache record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Method,
    Parameter,
}

impl EntityKind {
    /// Lowercase name used in messages and fingerprints.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Method => "method",
            EntityKind::Parameter => "parameter",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Model Errors
// ============================================================================

/// Errors raised when mutating the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A back-reference slot was already bound to a different type.
    #[error("{slot} is already resolved to {existing}, cannot rebind to {requested}")]
    AlreadyResolved {
        slot: String,
        existing: TypeId,
        requested: TypeId,
    },

    /// Two callables with the same selector were declared in one scope.
    #[error("duplicate selector `{selector_name}` in scope `{scope}`")]
    DuplicateSelector {
        scope: String,
        selector_name: String,
    },

    /// An annotation key was inserted twice.
    #[error("duplicate annotation key `{key}`")]
    DuplicateAnnotation { key: String },

    /// An annotation number was NaN or infinite.
    #[error("annotation number must be finite, got {value}")]
    NonFiniteNumber { value: String },
}

/// Result type for model mutations.
pub type ModelResult<T> = Result<T, ModelError>;

// ============================================================================
// Decode Errors
// ============================================================================

/// Reasons a cache record produced no entity.
///
/// Any of these means "cache miss for this declaration": the caller must fall
/// back to re-parsing the source rather than use a partial entity.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A required field is missing or has the wrong shape.
    #[error("{entity} record is malformed: {source}")]
    Malformed {
        entity: EntityKind,
        #[source]
        source: serde_json::Error,
    },

    /// A required name field is present but empty.
    #[error("{entity} record has an empty `{field}`")]
    EmptyField { entity: EntityKind, field: String },
}

impl DecodeError {
    pub(crate) fn malformed(entity: EntityKind, source: serde_json::Error) -> Self {
        DecodeError::Malformed { entity, source }
    }

    pub(crate) fn empty_field(entity: EntityKind, field: impl Into<String>) -> Self {
        DecodeError::EmptyField {
            entity,
            field: field.into(),
        }
    }

    /// Kind of entity the failing record described.
    pub fn entity(&self) -> EntityKind {
        match self {
            DecodeError::Malformed { entity, .. } | DecodeError::EmptyField { entity, .. } => {
                *entity
            }
        }
    }
}

/// Result type for cache decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_resolved_display() {
        let err = ModelError::AlreadyResolved {
            slot: "return type of `make()`".to_string(),
            existing: TypeId::new(1),
            requested: TypeId::new(2),
        };
        assert_eq!(
            err.to_string(),
            "return type of `make()` is already resolved to type_1, cannot rebind to type_2"
        );
    }

    #[test]
    fn duplicate_selector_display() {
        let err = ModelError::DuplicateSelector {
            scope: "Foo".to_string(),
            selector_name: "bar(baz:)".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate selector `bar(baz:)` in scope `Foo`");
    }

    #[test]
    fn empty_field_display_and_kind() {
        let err = DecodeError::empty_field(EntityKind::Method, "selectorName");
        assert_eq!(err.to_string(), "method record has an empty `selectorName`");
        assert_eq!(err.entity(), EntityKind::Method);
    }

    #[test]
    fn malformed_keeps_source() {
        let source = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let err = DecodeError::malformed(EntityKind::Parameter, source);
        assert!(err.to_string().starts_with("parameter record is malformed: "));
        assert!(std::error::Error::source(&err).is_some());
    }
}
