//! Whole-model snapshots and change detection between runs.
//!
//! A [`ModelSnapshot`] holds every callable of one scan, keyed by its
//! declaring scope and selector. Comparing the snapshot restored from the
//! cache with the one produced by the current scan yields a [`ChangeSet`]:
//! only added and modified declarations get forwarded to the template stage.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::{Diff, Diffable};
use crate::error::{ModelError, ModelResult};
use crate::method::Method;
use crate::resolve::{resolve_method, ResolutionSummary, TypeLookup};

// ============================================================================
// MethodKey
// ============================================================================

/// Identity of a callable in the whole model.
///
/// Selector names are only unique within their declaring scope (a type name
/// or a file scope), so the scope is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodKey {
    pub scope: String,
    pub selector_name: String,
}

impl MethodKey {
    pub fn new(scope: impl Into<String>, selector_name: impl Into<String>) -> Self {
        MethodKey {
            scope: scope.into(),
            selector_name: selector_name.into(),
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope.is_empty() {
            f.write_str(&self.selector_name)
        } else {
            write!(f, "{}.{}", self.scope, self.selector_name)
        }
    }
}

// ============================================================================
// ModelSnapshot
// ============================================================================

/// All callables of one scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSnapshot {
    methods: BTreeMap<MethodKey, Method>,
}

impl ModelSnapshot {
    pub fn new() -> Self {
        ModelSnapshot::default()
    }

    /// Add a callable declared in `scope`.
    ///
    /// Fails if the scope already declares a callable with the same selector.
    pub fn insert(&mut self, scope: impl Into<String>, method: Method) -> ModelResult<()> {
        let key = MethodKey::new(scope, method.selector_name());
        match self.methods.entry(key) {
            btree_map::Entry::Occupied(entry) => Err(ModelError::DuplicateSelector {
                scope: entry.key().scope.clone(),
                selector_name: entry.key().selector_name.clone(),
            }),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(method);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &MethodKey) -> Option<&Method> {
        self.methods.get(key)
    }

    pub fn get_mut(&mut self, key: &MethodKey) -> Option<&mut Method> {
        self.methods.get_mut(key)
    }

    pub fn contains(&self, key: &MethodKey) -> bool {
        self.methods.contains_key(key)
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&MethodKey, &Method)> {
        self.methods.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &MethodKey> {
        self.methods.keys()
    }

    /// Callables declared in `scope`, in selector order.
    pub fn methods_in_scope<'a>(&'a self, scope: &'a str) -> impl Iterator<Item = &'a Method> + 'a {
        self.methods
            .iter()
            .filter(move |(key, _)| key.scope == scope)
            .map(|(_, method)| method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Run the resolution pass over every callable.
    pub fn resolve_all<L: TypeLookup + ?Sized>(&mut self, types: &L) -> ResolutionSummary {
        let mut summary = ResolutionSummary::default();
        for method in self.methods.values_mut() {
            summary.merge(resolve_method(method, types));
        }
        debug!(
            "resolved {} type references ({} already bound, {} unresolved)",
            summary.resolved, summary.already_resolved, summary.unresolved
        );
        summary
    }

    /// Compare a previous snapshot (usually restored from the cache) with the
    /// current one.
    pub fn compare(previous: &ModelSnapshot, current: &ModelSnapshot) -> ChangeSet {
        let mut changes = ChangeSet::default();

        for (key, old) in &previous.methods {
            match current.methods.get(key) {
                Some(new) => {
                    let diff = old.diff(new);
                    if diff.is_empty() {
                        changes.unchanged.push(key.clone());
                    } else {
                        changes.modified.push(ModifiedMethod {
                            key: key.clone(),
                            diff,
                        });
                    }
                }
                None => changes.removed.push(key.clone()),
            }
        }
        changes.added = current
            .methods
            .keys()
            .filter(|key| !previous.methods.contains_key(*key))
            .cloned()
            .collect();

        debug!(
            "compared snapshots: {} added, {} removed, {} modified, {} unchanged",
            changes.added.len(),
            changes.removed.len(),
            changes.modified.len(),
            changes.unchanged.len()
        );
        changes
    }
}

impl<'a> IntoIterator for &'a ModelSnapshot {
    type Item = (&'a MethodKey, &'a Method);
    type IntoIter = btree_map::Iter<'a, MethodKey, Method>;

    fn into_iter(self) -> Self::IntoIter {
        self.methods.iter()
    }
}

// ============================================================================
// ChangeSet
// ============================================================================

/// A callable whose comparable fields changed between runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifiedMethod {
    pub key: MethodKey,
    pub diff: Diff,
}

/// Result of comparing two snapshots. Every list is in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    pub added: Vec<MethodKey>,
    pub removed: Vec<MethodKey>,
    pub modified: Vec<ModifiedMethod>,
    pub unchanged: Vec<MethodKey>,
}

impl ChangeSet {
    /// True when nothing was added, removed or modified.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Keys the template stage has to render again, in key order.
    pub fn needs_regeneration(&self) -> Vec<&MethodKey> {
        let mut keys: Vec<&MethodKey> = self
            .added
            .iter()
            .chain(self.modified.iter().map(|m| &m.key))
            .collect();
        keys.sort();
        keys
    }
}

// ============================================================================
// Tests
// ============================================================================
