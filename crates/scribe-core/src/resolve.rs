//! Non-owning cross references into the external type table.
//!
//! Type entities live in a table owned by the higher-level model, and they may
//! themselves point back at callables (for example as initializers). To keep
//! that graph acyclic in terms of ownership, a callable refers to a type only
//! by [`TypeId`], an index into the external table. Holding a `TypeId` never
//! keeps a type alive and never participates in equality, diffing or cache
//! identity.
//!
//! The resolution pass runs after the scan: for every slot not yet bound it
//! asks a [`TypeLookup`] for the unwrapped type name and records the answer.
//! Ids restored from the cache count as not yet bound, since the table that
//! produced them may have been renumbered. A miss is not an error, the slot
//! simply ends up empty.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ModelError, ModelResult};
use crate::method::Method;

// ============================================================================
// TypeId
// ============================================================================

/// Index of a type entity in the externally owned type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Create a new type ID.
    pub fn new(id: u32) -> Self {
        TypeId(id)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type_{}", self.0)
    }
}

// ============================================================================
// TypeSlot
// ============================================================================

/// Write-once holder for a resolved type.
///
/// A slot filled from the cache is only `Restored`: the id came from the
/// type table of an earlier run, so the next resolution pass may rebind or
/// drop it. A slot bound during this run is final.
///
/// Deliberately implements neither `PartialEq` nor `Serialize`, so an entity
/// that embeds a slot cannot accidentally derive equality over it.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) enum TypeSlot {
    #[default]
    Empty,
    Restored(TypeId),
    Bound(TypeId),
}

impl TypeSlot {
    /// Slot rebuilt from a cached id.
    pub(crate) fn restored(id: Option<TypeId>) -> Self {
        match id {
            Some(id) => TypeSlot::Restored(id),
            None => TypeSlot::Empty,
        }
    }

    pub(crate) fn get(&self) -> Option<TypeId> {
        match *self {
            TypeSlot::Empty => None,
            TypeSlot::Restored(id) | TypeSlot::Bound(id) => Some(id),
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        matches!(self, TypeSlot::Bound(_))
    }

    pub(crate) fn is_restored(&self) -> bool {
        matches!(self, TypeSlot::Restored(_))
    }

    /// Bind the slot. Binding to the id it already holds is a no-op, and a
    /// restored id may be replaced.
    pub(crate) fn bind(&mut self, id: TypeId, describe: impl FnOnce() -> String) -> ModelResult<()> {
        match *self {
            TypeSlot::Bound(existing) if existing == id => Ok(()),
            TypeSlot::Bound(existing) => Err(ModelError::AlreadyResolved {
                slot: describe(),
                existing,
                requested: id,
            }),
            TypeSlot::Empty | TypeSlot::Restored(_) => {
                *self = TypeSlot::Bound(id);
                Ok(())
            }
        }
    }

    /// Bind a slot that is not yet bound this run. Returns `false` when it was.
    pub(crate) fn fill(&mut self, id: TypeId) -> bool {
        if self.is_bound() {
            return false;
        }
        *self = TypeSlot::Bound(id);
        true
    }

    pub(crate) fn clear(&mut self) {
        *self = TypeSlot::Empty;
    }
}

// ============================================================================
// TypeLookup
// ============================================================================

/// Lookup of a type name in the whole-codebase type table.
///
/// Implementors receive the unwrapped type name (`Foo` for `Foo?`).
pub trait TypeLookup {
    fn lookup(&self, name: &str) -> Option<TypeId>;
}

impl<S: BuildHasher> TypeLookup for HashMap<String, TypeId, S> {
    fn lookup(&self, name: &str) -> Option<TypeId> {
        self.get(name).copied()
    }
}

impl TypeLookup for BTreeMap<String, TypeId> {
    fn lookup(&self, name: &str) -> Option<TypeId> {
        self.get(name).copied()
    }
}

impl<T: TypeLookup + ?Sized> TypeLookup for &T {
    fn lookup(&self, name: &str) -> Option<TypeId> {
        (**self).lookup(name)
    }
}

// ============================================================================
// Resolution Pass
// ============================================================================

/// Outcome counts of a resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    /// Slots bound by this pass, including restored ids that were refreshed.
    pub resolved: usize,
    /// Slots that were already bound this run and left untouched.
    pub already_resolved: usize,
    /// Slots whose type name the lookup did not know. Such slots end up empty.
    pub unresolved: usize,
}

impl ResolutionSummary {
    /// Accumulate another summary into this one.
    pub fn merge(&mut self, other: ResolutionSummary) {
        self.resolved += other.resolved;
        self.already_resolved += other.already_resolved;
        self.unresolved += other.unresolved;
    }

    fn record(&mut self, outcome: SlotOutcome) {
        match outcome {
            SlotOutcome::Resolved => self.resolved += 1,
            SlotOutcome::AlreadyResolved => self.already_resolved += 1,
            SlotOutcome::Unresolved => self.unresolved += 1,
        }
    }
}

/// Fill the unbound back-reference slots of `method` from `types`.
///
/// Parameters are resolved by their unwrapped type name; the return type is
/// resolved the same way unless it is `Void`. Slots bound earlier in this run
/// are never rebound. Ids restored from the cache are looked up again: they
/// are rebound to the current table's id, or dropped when the name is no
/// longer known.
pub fn resolve_method<L: TypeLookup + ?Sized>(method: &mut Method, types: &L) -> ResolutionSummary {
    let mut summary = ResolutionSummary::default();
    let selector = method.selector_name().to_string();

    for param in method.parameters_mut() {
        let type_name = param.type_name().unwrapped_type_name().to_string();
        let outcome = resolve_slot(param.type_slot_mut(), &type_name, types);
        if outcome == SlotOutcome::Unresolved {
            trace!(
                "unresolved type `{}` for parameter `{}` of `{}`",
                param.type_name(),
                param.name(),
                selector
            );
        }
        summary.record(outcome);
    }

    if !method.return_type_name().is_void() {
        let type_name = method.unwrapped_return_type_name().to_string();
        let outcome = resolve_slot(method.return_type_slot_mut(), &type_name, types);
        if outcome == SlotOutcome::Unresolved {
            trace!(
                "unresolved return type `{}` of `{}`",
                method.return_type_name(),
                selector
            );
        }
        summary.record(outcome);
    }

    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotOutcome {
    Resolved,
    AlreadyResolved,
    Unresolved,
}

fn resolve_slot<L: TypeLookup + ?Sized>(
    slot: &mut TypeSlot,
    name: &str,
    types: &L,
) -> SlotOutcome {
    if slot.is_bound() {
        return SlotOutcome::AlreadyResolved;
    }
    match types.lookup(name) {
        Some(id) => {
            slot.fill(id);
            SlotOutcome::Resolved
        }
        None => {
            // A cached id for a name the current table lacks is stale
            if slot.is_restored() {
                slot.clear();
            }
            SlotOutcome::Unresolved
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Parameter;

    fn type_table() -> HashMap<String, TypeId> {
        let mut table = HashMap::new();
        table.insert("Foo".to_string(), TypeId::new(1));
        table.insert("Bar".to_string(), TypeId::new(2));
        table
    }

    #[test]
    fn type_id_display() {
        assert_eq!(TypeId::new(7).to_string(), "type_7");
    }

    #[test]
    fn slot_binds_once() {
        let mut slot = TypeSlot::default();
        assert!(slot.get().is_none());
        slot.bind(TypeId::new(1), || "slot".to_string()).unwrap();
        assert_eq!(slot.get(), Some(TypeId::new(1)));

        // Same id again is fine
        slot.bind(TypeId::new(1), || "slot".to_string()).unwrap();

        let err = slot.bind(TypeId::new(2), || "slot".to_string()).unwrap_err();
        assert_eq!(
            err,
            ModelError::AlreadyResolved {
                slot: "slot".to_string(),
                existing: TypeId::new(1),
                requested: TypeId::new(2),
            }
        );
        assert_eq!(slot.get(), Some(TypeId::new(1)));
    }

    #[test]
    fn resolves_parameters_and_return_type_by_unwrapped_name() {
        let mut method = Method::new("make(foo:bar:)")
            .with_parameters([
                Parameter::new("foo", "Foo?"),
                Parameter::new("bar", "Bar"),
            ])
            .with_return_type_name("Foo!");

        let summary = resolve_method(&mut method, &type_table());

        assert_eq!(
            summary,
            ResolutionSummary {
                resolved: 3,
                already_resolved: 0,
                unresolved: 0
            }
        );
        assert_eq!(method.parameters()[0].resolved_type(), Some(TypeId::new(1)));
        assert_eq!(method.parameters()[1].resolved_type(), Some(TypeId::new(2)));
        assert_eq!(method.return_type(), Some(TypeId::new(1)));
    }

    #[test]
    fn misses_leave_slots_empty() {
        let mut method = Method::new("take(value:)")
            .with_parameters([Parameter::new("value", "Unknown")])
            .with_return_type_name("AlsoUnknown?");

        let summary = resolve_method(&mut method, &type_table());

        assert_eq!(summary.unresolved, 2);
        assert_eq!(summary.resolved, 0);
        assert!(method.parameters()[0].resolved_type().is_none());
        assert!(method.return_type().is_none());
        // Derived properties still work without resolution
        assert!(method.is_optional_return_type());
        assert_eq!(method.unwrapped_return_type_name(), "AlsoUnknown");
    }

    #[test]
    fn void_return_type_is_not_looked_up() {
        let mut table = type_table();
        table.insert("Void".to_string(), TypeId::new(99));
        let mut method = Method::new("run");

        let summary = resolve_method(&mut method, &table);

        assert_eq!(summary, ResolutionSummary::default());
        assert!(method.return_type().is_none());
    }

    #[test]
    fn second_pass_does_not_rebind() {
        let mut method = Method::new("take(foo:)").with_parameters([Parameter::new("foo", "Foo")]);
        resolve_method(&mut method, &type_table());

        let mut other_table = HashMap::new();
        other_table.insert("Foo".to_string(), TypeId::new(42));
        let summary = resolve_method(&mut method, &other_table);

        assert_eq!(summary.already_resolved, 1);
        assert_eq!(method.parameters()[0].resolved_type(), Some(TypeId::new(1)));
    }

    fn lookup_via<L: TypeLookup>(types: L, name: &str) -> Option<TypeId> {
        types.lookup(name)
    }

    #[test]
    fn btree_lookup_and_reference_lookup() {
        let table: BTreeMap<String, TypeId> = [("Foo".to_string(), TypeId::new(3))].into();
        let as_dyn: &dyn TypeLookup = &table;
        assert_eq!(as_dyn.lookup("Foo"), Some(TypeId::new(3)));
        assert_eq!(lookup_via(&table, "Foo"), Some(TypeId::new(3)));
        assert_eq!(lookup_via(&table, "Missing"), None);
    }

    #[test]
    fn fill_only_binds_empty_slots() {
        let mut slot = TypeSlot::default();
        assert!(slot.fill(TypeId::new(1)));
        assert!(!slot.fill(TypeId::new(2)));
        assert_eq!(slot.get(), Some(TypeId::new(1)));
        slot.clear();
        assert!(slot.get().is_none());
    }

    #[test]
    fn restored_slot_yields_to_a_bind() {
        let mut slot = TypeSlot::restored(Some(TypeId::new(1)));
        assert_eq!(slot.get(), Some(TypeId::new(1)));
        assert!(!slot.is_bound());

        slot.bind(TypeId::new(7), || "slot".to_string()).unwrap();
        assert_eq!(slot.get(), Some(TypeId::new(7)));
        assert!(slot.is_bound());
        assert!(slot.bind(TypeId::new(1), || "slot".to_string()).is_err());

        let mut empty = TypeSlot::restored(None);
        assert!(empty.get().is_none());
        assert!(empty.fill(TypeId::new(2)));
    }

    #[test]
    fn restored_ids_are_rebound_against_the_current_table() {
        let mut method = Method::new("make(x:)")
            .with_parameters([Parameter::new("x", "Foo")
                .with_type_slot(TypeSlot::restored(Some(TypeId::new(1))))])
            .with_return_type_name("Foo")
            .with_return_type_slot(TypeSlot::restored(Some(TypeId::new(1))));

        let mut table = HashMap::new();
        table.insert("Foo".to_string(), TypeId::new(7));
        let summary = resolve_method(&mut method, &table);

        assert_eq!(
            summary,
            ResolutionSummary {
                resolved: 2,
                already_resolved: 0,
                unresolved: 0
            }
        );
        assert_eq!(method.parameters()[0].resolved_type(), Some(TypeId::new(7)));
        assert_eq!(method.return_type(), Some(TypeId::new(7)));

        // Now bound for this run
        let again = resolve_method(&mut method, &type_table());
        assert_eq!(again.already_resolved, 2);
        assert_eq!(method.return_type(), Some(TypeId::new(7)));
    }

    #[test]
    fn restored_ids_for_unknown_names_are_dropped() {
        let mut method = Method::new("make(x:)")
            .with_parameters([Parameter::new("x", "Gone")
                .with_type_slot(TypeSlot::restored(Some(TypeId::new(5))))]);

        let summary = resolve_method(&mut method, &type_table());

        assert_eq!(summary.unresolved, 1);
        assert!(method.parameters()[0].resolved_type().is_none());
    }

    #[test]
    fn summaries_merge() {
        let mut total = ResolutionSummary {
            resolved: 1,
            already_resolved: 2,
            unresolved: 3,
        };
        total.merge(ResolutionSummary {
            resolved: 10,
            already_resolved: 20,
            unresolved: 30,
        });
        assert_eq!(
            total,
            ResolutionSummary {
                resolved: 11,
                already_resolved: 22,
                unresolved: 33
            }
        );
    }
}
