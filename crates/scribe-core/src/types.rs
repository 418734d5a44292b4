//! Type references and access levels.
//!
//! A [`TypeName`] identifies a type purely by its textual spelling. It is
//! independent of whether the type has been resolved against the type table:
//! optionality and the unwrapped name are computed from the raw text on every
//! call and cannot be set separately.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// TypeName
// ============================================================================

/// Wrapper spelling for optionals (`Optional<T>`).
const OPTIONAL_WRAPPER: &str = "Optional";

/// Wrapper spelling for implicitly unwrapped optionals.
const IMPLICITLY_UNWRAPPED_WRAPPER: &str = "ImplicitlyUnwrappedOptional";

/// The name of a type as written in a declaration.
///
/// # Optionality
///
/// | Spelling | Optional | Implicitly unwrapped | Unwrapped name |
/// |----------|----------|----------------------|----------------|
/// | `Int` | no | no | `Int` |
/// | `Int?` | yes | no | `Int` |
/// | `Int!` | yes | yes | `Int` |
/// | `Optional<Int>` | yes | no | `Int` |
/// | `ImplicitlyUnwrappedOptional<Int>` | yes | yes | `Int` |
///
/// Only one level of optionality is stripped: `Int??` unwraps to `Int?`.
///
/// # Examples
///
/// ```
/// use scribe_core::types::TypeName;
///
/// let name = TypeName::new("String?");
/// assert!(name.is_optional());
/// assert_eq!(name.unwrapped_type_name(), "String");
/// ```
///
/// # Serialization
///
/// A `TypeName` serializes as its raw spelling:
///
/// ```
/// use scribe_core::types::TypeName;
///
/// let name = TypeName::new("[Int]");
/// assert_eq!(serde_json::to_string(&name).unwrap(), "\"[Int]\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName {
    name: String,
}

impl TypeName {
    /// Create a type name from its raw spelling.
    pub fn new(name: impl Into<String>) -> Self {
        TypeName { name: name.into() }
    }

    /// The "no value" type used as the default return type.
    pub fn void() -> Self {
        TypeName::new("Void")
    }

    /// Raw spelling, exactly as it was constructed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the type is optional (including implicitly unwrapped optionals).
    pub fn is_optional(&self) -> bool {
        split_optional(&self.name).is_some()
    }

    /// Whether the type is an implicitly unwrapped optional (`T!`).
    pub fn is_implicitly_unwrapped_optional(&self) -> bool {
        matches!(split_optional(&self.name), Some((_, true)))
    }

    /// Type name with one level of optionality removed.
    ///
    /// Non-optional names are returned with surrounding whitespace trimmed.
    pub fn unwrapped_type_name(&self) -> &str {
        match split_optional(&self.name) {
            Some((inner, _)) => inner,
            None => self.name.trim(),
        }
    }

    /// Whether this names the empty type (`Void`, `()` or nothing at all).
    pub fn is_void(&self) -> bool {
        matches!(self.name.trim(), "" | "Void" | "()")
    }
}

impl Default for TypeName {
    fn default() -> Self {
        TypeName::void()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        TypeName::new(name)
    }
}

/// Split an optional spelling into `(inner, implicitly_unwrapped)`.
///
/// Returns `None` for non-optional spellings.
fn split_optional(name: &str) -> Option<(&str, bool)> {
    let trimmed = name.trim();
    if let Some(inner) = trimmed.strip_suffix('?') {
        return Some((inner.trim_end(), false));
    }
    if let Some(inner) = trimmed.strip_suffix('!') {
        return Some((inner.trim_end(), true));
    }
    if let Some(inner) = strip_generic_wrapper(trimmed, OPTIONAL_WRAPPER) {
        return Some((inner, false));
    }
    if let Some(inner) = strip_generic_wrapper(trimmed, IMPLICITLY_UNWRAPPED_WRAPPER) {
        return Some((inner, true));
    }
    None
}

fn strip_generic_wrapper<'a>(name: &'a str, wrapper: &str) -> Option<&'a str> {
    name.strip_prefix(wrapper)?
        .trim_start()
        .strip_prefix('<')?
        .strip_suffix('>')
        .map(str::trim)
}

// ============================================================================
// AccessLevel
// ============================================================================

/// Declared access level of a callable.
///
/// Serializes to lowercase keywords (`"fileprivate"`, `"open"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Visible only inside the enclosing declaration.
    Private,
    /// Visible only inside the defining file.
    FilePrivate,
    /// Visible inside the defining module (default).
    #[default]
    Internal,
    /// Visible to importing modules.
    Public,
    /// Visible and overridable from importing modules.
    Open,
}

impl AccessLevel {
    /// Keyword spelling of this access level.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Private => "private",
            AccessLevel::FilePrivate => "fileprivate",
            AccessLevel::Internal => "internal",
            AccessLevel::Public => "public",
            AccessLevel::Open => "open",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
