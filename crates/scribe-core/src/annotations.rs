//! Annotation maps attached to declarations.
//!
//! Annotations come from marker comments such as
//! `// scribe: skipEquality, name = "value", count = 2`. The annotation parser
//! lives outside this crate; here they are a map from case-sensitive keys to a
//! closed set of value kinds. A bare marker (`skipEquality`) is stored as
//! `true`.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ModelError, ModelResult};

// ============================================================================
// AnnotationValue
// ============================================================================

/// Value of a single annotation.
///
/// Serializes untagged, so the persisted form is plain JSON
/// (`true`, `2`, `2.5`, `"text"`, `[...]`, `{...}`). Integers and floats are
/// kept apart: `2` and `2.0` are different values, and an integer never
/// passes through `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Float(FiniteFloat),
    String(String),
    Array(Vec<AnnotationValue>),
    Map(Annotations),
}

impl AnnotationValue {
    /// Float value, rejecting NaN and infinities.
    pub fn float(value: f64) -> ModelResult<Self> {
        FiniteFloat::new(value).map(AnnotationValue::Float)
    }

    /// String contents, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean contents, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer contents, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AnnotationValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric contents of either number kind. Large integers may round.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnnotationValue::Int(n) => Some(*n as f64),
            AnnotationValue::Float(n) => Some(n.get()),
            _ => None,
        }
    }
}

impl From<bool> for AnnotationValue {
    fn from(value: bool) -> Self {
        AnnotationValue::Bool(value)
    }
}

impl From<i64> for AnnotationValue {
    fn from(value: i64) -> Self {
        AnnotationValue::Int(value)
    }
}

impl From<i32> for AnnotationValue {
    fn from(value: i32) -> Self {
        AnnotationValue::Int(i64::from(value))
    }
}

impl From<FiniteFloat> for AnnotationValue {
    fn from(value: FiniteFloat) -> Self {
        AnnotationValue::Float(value)
    }
}

impl TryFrom<f64> for AnnotationValue {
    type Error = ModelError;

    fn try_from(value: f64) -> ModelResult<Self> {
        AnnotationValue::float(value)
    }
}

impl From<&str> for AnnotationValue {
    fn from(value: &str) -> Self {
        AnnotationValue::String(value.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(value: String) -> Self {
        AnnotationValue::String(value)
    }
}

impl From<Vec<AnnotationValue>> for AnnotationValue {
    fn from(values: Vec<AnnotationValue>) -> Self {
        AnnotationValue::Array(values)
    }
}

impl From<Annotations> for AnnotationValue {
    fn from(map: Annotations) -> Self {
        AnnotationValue::Map(map)
    }
}

// ============================================================================
// FiniteFloat
// ============================================================================

/// An `f64` that is neither NaN nor infinite, so equality is reflexive and
/// every value has a JSON spelling.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct FiniteFloat(f64);

impl FiniteFloat {
    pub fn new(value: f64) -> ModelResult<Self> {
        if value.is_finite() {
            Ok(FiniteFloat(value))
        } else {
            Err(ModelError::NonFiniteNumber {
                value: value.to_string(),
            })
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl fmt::Display for FiniteFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<'de> Deserialize<'de> for FiniteFloat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        FiniteFloat::new(value).map_err(de::Error::custom)
    }
}

// ============================================================================
// Annotations
// ============================================================================

/// Annotation map with unique, case-sensitive keys.
///
/// Iteration is in key order, so two maps built from the same pairs in a
/// different insertion order are equal and serialize identically.
///
/// Deserialization rejects objects that repeat a key rather than letting the
/// last occurrence win.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Annotations(BTreeMap<String, AnnotationValue>);

impl Annotations {
    /// Create an empty annotation map.
    pub fn new() -> Self {
        Annotations::default()
    }

    /// Build a map from pairs, failing on the first repeated key.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> ModelResult<Self>
    where
        K: Into<String>,
        V: Into<AnnotationValue>,
    {
        let mut annotations = Annotations::new();
        for (key, value) in pairs {
            annotations.insert(key, value)?;
        }
        Ok(annotations)
    }

    /// Insert a new annotation. Fails if `key` is already present.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AnnotationValue>,
    ) -> ModelResult<()> {
        match self.0.entry(key.into()) {
            btree_map::Entry::Occupied(entry) => Err(ModelError::DuplicateAnnotation {
                key: entry.key().clone(),
            }),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value.into());
                Ok(())
            }
        }
    }

    /// Insert a bare marker annotation (stored as `true`).
    pub fn mark(&mut self, key: impl Into<String>) -> ModelResult<()> {
        self.insert(key, true)
    }

    pub fn get(&self, key: &str) -> Option<&AnnotationValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate annotations in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnnotationValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Annotations {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(AnnotationsVisitor)
    }
}

struct AnnotationsVisitor;

impl<'de> Visitor<'de> for AnnotationsVisitor {
    type Value = Annotations;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map of annotation names to values")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut annotations = Annotations::new();
        while let Some((key, value)) = access.next_entry::<String, AnnotationValue>()? {
            annotations.insert(key, value).map_err(de::Error::custom)?;
        }
        Ok(annotations)
    }
}

// ============================================================================
// Tests
// ============================================================================
