//! Structural diffing over declared comparable fields.
//!
//! Every entity that takes part in change detection implements [`Diffable`]:
//! it names its comparable fields up front and produces a [`Diff`] against
//! another value of the same type. Fields that are not in the list
//! (resolved back-references, scanner bookkeeping) are never visited.
//!
//! Paths in a diff use the cache schema names: `returnTypeName`,
//! `parameters[1].argumentLabel`, `annotations.skipEquality`.
//!
//! ## Comparison Rules
//!
//! | Field shape | Rule |
//! |-------------|------|
//! | Scalar | Reported as `modified` with old and new values |
//! | Sequence | Element-wise and order-sensitive; extra elements are `added` / `removed` |
//! | Annotation map | Key-by-key; `added`, `removed` or `modified` per key |

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::annotations::Annotations;
use crate::error::EntityKind;
use crate::method::{Method, Parameter};

// ============================================================================
// Diff Types
// ============================================================================

/// How a single field changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present on both sides with different values.
    Modified { old: Value, new: Value },
    /// Only present on the new side.
    Added { value: Value },
    /// Only present on the old side.
    Removed { value: Value },
}

/// A change at one field path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    /// Dotted field path, e.g. `parameters[0].typeName`.
    pub path: String,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

/// Field-level differences between two entities.
///
/// An empty diff means the entities are equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diff {
    changes: Vec<FieldChange>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Changes in field declaration order.
    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    /// Paths of all changed fields.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.path.as_str())
    }

    /// Change recorded for `path`, if any.
    pub fn get(&self, path: &str) -> Option<&ChangeKind> {
        self.changes
            .iter()
            .find(|c| c.path == path)
            .map(|c| &c.kind)
    }

    pub fn into_changes(self) -> Vec<FieldChange> {
        self.changes
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for change in &self.changes {
            match &change.kind {
                ChangeKind::Modified { old, new } => {
                    writeln!(f, "~ {}: {} -> {}", change.path, old, new)?
                }
                ChangeKind::Added { value } => writeln!(f, "+ {}: {}", change.path, value)?,
                ChangeKind::Removed { value } => writeln!(f, "- {}: {}", change.path, value)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// Diffable
// ============================================================================

/// Entities with an explicit comparable-field contract.
pub trait Diffable {
    /// Entity kind, used to namespace fingerprints.
    const KIND: EntityKind;

    /// Names of the fields that take part in equality, in report order.
    const COMPARABLE_FIELDS: &'static [&'static str];

    /// Differences from `self` (old) to `other` (new).
    fn diff(&self, other: &Self) -> Diff;

    /// The comparable fields as a JSON object keyed by field name.
    fn comparable_value(&self) -> Value;
}

impl Diffable for Parameter {
    const KIND: EntityKind = EntityKind::Parameter;
    const COMPARABLE_FIELDS: &'static [&'static str] = &["argumentLabel", "name", "typeName"];

    fn diff(&self, other: &Self) -> Diff {
        let mut builder = DiffBuilder::default();
        builder.field("argumentLabel", self.argument_label(), other.argument_label());
        builder.field("name", self.name(), other.name());
        builder.field("typeName", self.type_name(), other.type_name());
        builder.finish()
    }

    fn comparable_value(&self) -> Value {
        json!({
            "argumentLabel": self.argument_label(),
            "name": self.name(),
            "typeName": self.type_name(),
        })
    }
}

impl Diffable for Method {
    const KIND: EntityKind = EntityKind::Method;
    const COMPARABLE_FIELDS: &'static [&'static str] = &[
        "selectorName",
        "parameters",
        "returnTypeName",
        "accessLevel",
        "isStatic",
        "isClass",
        "isFailableInitializer",
        "annotations",
    ];

    fn diff(&self, other: &Self) -> Diff {
        let mut builder = DiffBuilder::default();
        builder.field("selectorName", self.selector_name(), other.selector_name());
        builder.sequence("parameters", self.parameters(), other.parameters());
        builder.field(
            "returnTypeName",
            self.return_type_name(),
            other.return_type_name(),
        );
        builder.field("accessLevel", &self.access_level(), &other.access_level());
        builder.field("isStatic", &self.is_static(), &other.is_static());
        builder.field("isClass", &self.is_class(), &other.is_class());
        builder.field(
            "isFailableInitializer",
            &self.is_failable_initializer(),
            &other.is_failable_initializer(),
        );
        builder.annotations("annotations", self.annotations(), other.annotations());
        builder.finish()
    }

    fn comparable_value(&self) -> Value {
        let parameters: Vec<Value> = self
            .parameters()
            .iter()
            .map(Diffable::comparable_value)
            .collect();
        json!({
            "selectorName": self.selector_name(),
            "parameters": parameters,
            "returnTypeName": self.return_type_name(),
            "accessLevel": self.access_level(),
            "isStatic": self.is_static(),
            "isClass": self.is_class(),
            "isFailableInitializer": self.is_failable_initializer(),
            "annotations": self.annotations(),
        })
    }
}

// ============================================================================
// DiffBuilder
// ============================================================================

#[derive(Default)]
struct DiffBuilder {
    changes: Vec<FieldChange>,
}

impl DiffBuilder {
    fn push(&mut self, path: String, kind: ChangeKind) {
        self.changes.push(FieldChange { path, kind });
    }

    fn field<T>(&mut self, name: &str, old: &T, new: &T)
    where
        T: PartialEq + Serialize + ?Sized,
    {
        if old != new {
            self.push(
                name.to_string(),
                ChangeKind::Modified {
                    old: to_value(old),
                    new: to_value(new),
                },
            );
        }
    }

    fn sequence<T: Diffable>(&mut self, name: &str, old: &[T], new: &[T]) {
        for index in 0..old.len().max(new.len()) {
            let path = format!("{}[{}]", name, index);
            match (old.get(index), new.get(index)) {
                (Some(a), Some(b)) => {
                    for change in a.diff(b).into_changes() {
                        self.push(format!("{}.{}", path, change.path), change.kind);
                    }
                }
                (Some(a), None) => self.push(
                    path,
                    ChangeKind::Removed {
                        value: a.comparable_value(),
                    },
                ),
                (None, Some(b)) => self.push(
                    path,
                    ChangeKind::Added {
                        value: b.comparable_value(),
                    },
                ),
                (None, None) => {}
            }
        }
    }

    fn annotations(&mut self, name: &str, old: &Annotations, new: &Annotations) {
        for (key, old_value) in old.iter() {
            let path = format!("{}.{}", name, key);
            match new.get(key) {
                Some(new_value) if new_value != old_value => self.push(
                    path,
                    ChangeKind::Modified {
                        old: to_value(old_value),
                        new: to_value(new_value),
                    },
                ),
                Some(_) => {}
                None => self.push(
                    path,
                    ChangeKind::Removed {
                        value: to_value(old_value),
                    },
                ),
            }
        }
        for (key, new_value) in new.iter() {
            if !old.contains_key(key) {
                self.push(
                    format!("{}.{}", name, key),
                    ChangeKind::Added {
                        value: to_value(new_value),
                    },
                );
            }
        }
    }

    fn finish(self) -> Diff {
        Diff {
            changes: self.changes,
        }
    }
}

/// Serialize a field value for a diff report.
///
/// Field values are strings, booleans, enums and string-keyed maps, none of
/// which can fail to serialize.
fn to_value<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

// ============================================================================
// Fingerprints
// ============================================================================

/// SHA-256 digest (hex) of an entity's comparable fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint the comparable fields of `entity`.
///
/// Two entities that compare equal always have the same fingerprint.
/// Annotations are emitted in key order, so the digest does not depend on
/// annotation insertion order.
pub fn fingerprint<T: Diffable>(entity: &T) -> Fingerprint {
    let canonical = entity.comparable_value().to_string();
    let mut hasher = Sha256::new();
    hasher.update(T::KIND.as_str().as_bytes());
    hasher.update(b"\x00");
    hasher.update(canonical.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}

// ============================================================================
// Tests
// ============================================================================
