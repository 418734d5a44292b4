//! Callable declarations: methods, functions and initializers.
//!
//! A [`Method`] is built once per parsed declaration from plain structured
//! data handed over by the scanner. Downstream generation passes may rewrite
//! argument labels and the return type text before the model is diffed and
//! cached; every other field is fixed at construction.
//!
//! # Equality
//!
//! `PartialEq` compares only the comparable fields listed in
//! [`crate::diff::Diffable::COMPARABLE_FIELDS`]. Resolved type back-references
//! and the scanner's [`ParserData`] never affect equality, so two scans of the
//! same source text compare equal regardless of which other files were
//! present or in which order they were visited.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::annotations::Annotations;
use crate::error::ModelResult;
use crate::resolve::{TypeId, TypeSlot};
use crate::types::{AccessLevel, TypeName};

/// Selector prefix that marks an initializer.
const INITIALIZER_PREFIX: &str = "init(";

// ============================================================================
// Parameter
// ============================================================================

/// One formal parameter of a callable.
#[derive(Clone)]
pub struct Parameter {
    argument_label: String,
    name: String,
    type_name: TypeName,
    resolved_type: TypeSlot,
}

impl Parameter {
    /// Create a parameter whose argument label equals its internal name.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn new(name: impl Into<String>, type_name: impl Into<TypeName>) -> Self {
        let name = name.into();
        Parameter::labeled(name.clone(), name, type_name)
    }

    /// Create a parameter with an explicit external label.
    ///
    /// The label may be `_` or any other spelling; only the internal name is
    /// required to be non-empty.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn labeled(
        argument_label: impl Into<String>,
        name: impl Into<String>,
        type_name: impl Into<TypeName>,
    ) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "parameter name must not be empty");
        Parameter {
            argument_label: argument_label.into(),
            name,
            type_name: type_name.into(),
            resolved_type: TypeSlot::default(),
        }
    }

    /// Create a parameter from a scanner triple, defaulting a missing label to
    /// the internal name.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn from_parts(
        argument_label: Option<&str>,
        name: &str,
        type_name: impl Into<TypeName>,
    ) -> Self {
        Parameter::labeled(argument_label.unwrap_or(name), name, type_name)
    }

    /// External name used at call sites.
    pub fn argument_label(&self) -> &str {
        &self.argument_label
    }

    /// Rename the external label without touching the internal name.
    pub fn set_argument_label(&mut self, label: impl Into<String>) {
        self.argument_label = label.into();
    }

    /// Internal name used inside the body.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    /// Resolved parameter type, if the resolution pass found one.
    pub fn resolved_type(&self) -> Option<TypeId> {
        self.resolved_type.get()
    }

    /// Record the resolved type. Rebinding to a different type is rejected.
    pub fn resolve_type(&mut self, id: TypeId) -> ModelResult<()> {
        let name = &self.name;
        self.resolved_type
            .bind(id, || format!("type of parameter `{}`", name))
    }

    pub(crate) fn type_slot_mut(&mut self) -> &mut TypeSlot {
        &mut self.resolved_type
    }

    pub(crate) fn with_type_slot(mut self, slot: TypeSlot) -> Self {
        self.resolved_type = slot;
        self
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.argument_label == other.argument_label
            && self.name == other.name
            && self.type_name == other.type_name
    }
}

// The resolved type is left out, as for `Method`.
impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("argument_label", &self.argument_label)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish()
    }
}

// ============================================================================
// ParserData
// ============================================================================

/// Scanner bookkeeping attached to a parsed declaration.
///
/// The payload is whatever type the scanner chose. Only code that names that
/// type can read it back, through [`ParserData::downcast_ref`]. It has no
/// equality, no serialization and its `Debug` output hides the contents.
#[derive(Clone)]
pub struct ParserData(Arc<dyn Any + Send + Sync>);

impl ParserData {
    /// Wrap a scanner payload.
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        ParserData(Arc::new(payload))
    }

    /// The payload, if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for ParserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParserData(..)")
    }
}

// ============================================================================
// Method
// ============================================================================

/// A callable declaration.
///
/// # Examples
///
/// ```
/// use scribe_core::method::{Method, Parameter};
///
/// let method = Method::new("init(bar:)")
///     .with_parameters([Parameter::new("bar", "Int")])
///     .with_return_type_name("Foo")
///     .with_failable_initializer(true);
///
/// assert_eq!(method.short_name(), "init");
/// assert!(method.is_initializer());
/// assert!(method.is_optional_return_type());
/// ```
#[derive(Clone)]
pub struct Method {
    selector_name: String,
    parameters: Vec<Parameter>,
    return_type_name: TypeName,
    return_type: TypeSlot,
    access_level: AccessLevel,
    is_static: bool,
    is_class: bool,
    is_failable_initializer: bool,
    annotations: Annotations,
    parser_data: Option<ParserData>,
}

impl Method {
    /// Create a method with no parameters, a `Void` return type, internal
    /// access, no modifiers and no annotations.
    ///
    /// # Panics
    ///
    /// Panics if `selector_name` is empty.
    pub fn new(selector_name: impl Into<String>) -> Self {
        let selector_name = selector_name.into();
        assert!(!selector_name.is_empty(), "selector name must not be empty");
        Method {
            selector_name,
            parameters: Vec::new(),
            return_type_name: TypeName::void(),
            return_type: TypeSlot::default(),
            access_level: AccessLevel::default(),
            is_static: false,
            is_class: false,
            is_failable_initializer: false,
            annotations: Annotations::new(),
            parser_data: None,
        }
    }

    /// Set the parameters in declaration order.
    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters = parameters.into_iter().collect();
        self
    }

    /// Set the return type.
    pub fn with_return_type_name(mut self, return_type_name: impl Into<TypeName>) -> Self {
        self.return_type_name = return_type_name.into();
        self
    }

    /// Set the access level.
    pub fn with_access_level(mut self, access_level: AccessLevel) -> Self {
        self.access_level = access_level;
        self
    }

    /// Mark as a static method.
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// Mark as a class method.
    pub fn with_class(mut self, is_class: bool) -> Self {
        self.is_class = is_class;
        self
    }

    /// Mark as a failable initializer (`init?`).
    pub fn with_failable_initializer(mut self, is_failable: bool) -> Self {
        self.is_failable_initializer = is_failable;
        self
    }

    /// Set the annotations.
    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Attach scanner bookkeeping.
    pub fn with_parser_data(mut self, parser_data: ParserData) -> Self {
        self.parser_data = Some(parser_data);
        self
    }

    pub(crate) fn with_return_type_slot(mut self, slot: TypeSlot) -> Self {
        self.return_type = slot;
        self
    }

    // ------------------------------------------------------------------------
    // Stored fields
    // ------------------------------------------------------------------------

    /// Full name including argument labels, e.g. `foo(bar:)`.
    pub fn selector_name(&self) -> &str {
        &self.selector_name
    }

    /// Parameters in declaration order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Mutable access to the parameters for label rewrites.
    pub fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.parameters
    }

    /// Replace the whole parameter list.
    ///
    /// The selector name is left as is. Callers that change the number or the
    /// labels of the parameters own keeping `selector_name` in step with them.
    pub fn set_parameters(&mut self, parameters: impl IntoIterator<Item = Parameter>) {
        self.parameters = parameters.into_iter().collect();
    }

    /// Parameter with the given internal name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn return_type_name(&self) -> &TypeName {
        &self.return_type_name
    }

    /// Rewrite the return type text.
    ///
    /// A resolved return type recorded for the previous name is dropped, since
    /// it no longer describes the new spelling.
    pub fn set_return_type_name(&mut self, return_type_name: impl Into<TypeName>) {
        let return_type_name = return_type_name.into();
        if return_type_name != self.return_type_name {
            self.return_type.clear();
        }
        self.return_type_name = return_type_name;
    }

    /// Resolved return type, if the resolution pass found one.
    pub fn return_type(&self) -> Option<TypeId> {
        self.return_type.get()
    }

    /// Record the resolved return type. Rebinding to a different type is rejected.
    pub fn resolve_return_type(&mut self, id: TypeId) -> ModelResult<()> {
        let selector = &self.selector_name;
        self.return_type
            .bind(id, || format!("return type of `{}`", selector))
    }

    pub(crate) fn return_type_slot_mut(&mut self) -> &mut TypeSlot {
        &mut self.return_type
    }

    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_class(&self) -> bool {
        self.is_class
    }

    pub fn is_failable_initializer(&self) -> bool {
        self.is_failable_initializer
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Scanner bookkeeping, if any was attached.
    pub fn parser_data(&self) -> Option<&ParserData> {
        self.parser_data.as_ref()
    }

    // ------------------------------------------------------------------------
    // Derived properties
    // ------------------------------------------------------------------------

    /// Name without argument labels or parentheses: `foo` for `foo(bar:)`.
    pub fn short_name(&self) -> &str {
        match self.selector_name.find('(') {
            Some(index) => &self.selector_name[..index],
            None => &self.selector_name,
        }
    }

    /// Whether this is an initializer (`init(...)`).
    pub fn is_initializer(&self) -> bool {
        self.selector_name.starts_with(INITIALIZER_PREFIX)
    }

    /// Whether calling this can produce no value: an optional return type or a
    /// failable initializer.
    pub fn is_optional_return_type(&self) -> bool {
        self.return_type_name.is_optional() || self.is_failable_initializer
    }

    pub fn unwrapped_return_type_name(&self) -> &str {
        self.return_type_name.unwrapped_type_name()
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.selector_name == other.selector_name
            && self.parameters == other.parameters
            && self.return_type_name == other.return_type_name
            && self.access_level == other.access_level
            && self.is_static == other.is_static
            && self.is_class == other.is_class
            && self.is_failable_initializer == other.is_failable_initializer
            && self.annotations == other.annotations
    }
}

// Resolved return type and parser data are left out of the description.
impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("selector_name", &self.selector_name)
            .field("parameters", &self.parameters)
            .field("return_type_name", &self.return_type_name)
            .field("access_level", &self.access_level)
            .field("is_static", &self.is_static)
            .field("is_class", &self.is_class)
            .field("is_failable_initializer", &self.is_failable_initializer)
            .field("annotations", &self.annotations)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    /// Stand-in for a scanner's own bookkeeping type.
    #[derive(Debug, PartialEq)]
    struct SourceSpan {
        start: usize,
        end: usize,
        text: &'static str,
    }

    fn span(start: usize, end: usize, text: &'static str) -> ParserData {
        ParserData::new(SourceSpan { start, end, text })
    }

    mod parameter_tests {
        use super::*;

        #[test]
        fn label_defaults_to_name() {
            let param = Parameter::new("count", "Int");
            assert_eq!(param.argument_label(), "count");
            assert_eq!(param.name(), "count");
            assert_eq!(param.type_name().name(), "Int");
            assert!(param.resolved_type().is_none());
        }

        #[test]
        fn debug_hides_resolved_type() {
            let mut param = Parameter::labeled("with", "value", "Foo");
            param.resolve_type(TypeId::new(4)).unwrap();
            let rendered = format!("{:?}", param);
            assert!(rendered.contains("argument_label: \"with\""));
            assert!(rendered.contains("name: \"value\""));
            assert!(!rendered.contains("type_4"));
            assert!(!rendered.contains("TypeId"));
            assert!(!rendered.contains("resolved_type"));
        }

        #[test]
        fn from_parts_uses_label_when_present() {
            let labeled = Parameter::from_parts(Some("with"), "value", "String");
            assert_eq!(labeled.argument_label(), "with");
            assert_eq!(labeled.name(), "value");

            let unlabeled = Parameter::from_parts(None, "value", "String");
            assert_eq!(unlabeled.argument_label(), "value");
        }

        #[test]
        fn label_can_be_rewritten() {
            let mut param = Parameter::labeled("_", "value", "Int");
            param.set_argument_label("newValue");
            assert_eq!(param.argument_label(), "newValue");
            assert_eq!(param.name(), "value");
        }

        #[test]
        #[should_panic(expected = "parameter name must not be empty")]
        fn empty_name_panics() {
            let _ = Parameter::new("", "Int");
        }

        #[test]
        fn equality_ignores_resolved_type() {
            let mut a = Parameter::new("foo", "Foo");
            let b = Parameter::new("foo", "Foo");
            a.resolve_type(TypeId::new(1)).unwrap();
            assert_eq!(a, b);
        }

        #[test]
        fn equality_compares_label() {
            let a = Parameter::labeled("a", "foo", "Foo");
            let b = Parameter::labeled("b", "foo", "Foo");
            assert_ne!(a, b);
        }

        #[test]
        fn resolve_type_rejects_rebinding() {
            let mut param = Parameter::new("foo", "Foo");
            param.resolve_type(TypeId::new(1)).unwrap();
            param.resolve_type(TypeId::new(1)).unwrap();
            let err = param.resolve_type(TypeId::new(2)).unwrap_err();
            assert!(err.to_string().contains("type of parameter `foo`"));
            assert_eq!(param.resolved_type(), Some(TypeId::new(1)));
        }
    }

    mod method_tests {
        use super::*;

        #[test]
        fn defaults() {
            let method = Method::new("run");
            assert!(method.parameters().is_empty());
            assert!(method.return_type_name().is_void());
            assert_eq!(method.access_level(), AccessLevel::Internal);
            assert!(!method.is_static());
            assert!(!method.is_class());
            assert!(!method.is_failable_initializer());
            assert!(method.annotations().is_empty());
            assert!(method.parser_data().is_none());
            assert!(method.return_type().is_none());
        }

        #[test]
        #[should_panic(expected = "selector name must not be empty")]
        fn empty_selector_panics() {
            let _ = Method::new("");
        }

        #[test]
        fn short_name_truncates_at_parenthesis() {
            assert_eq!(Method::new("foo(bar:baz:)").short_name(), "foo");
            assert_eq!(Method::new("run").short_name(), "run");
            assert_eq!(Method::new("init()").short_name(), "init");
        }

        #[test]
        fn initializer_detection() {
            assert!(Method::new("init(bar:)").is_initializer());
            assert!(Method::new("init()").is_initializer());
            assert!(!Method::new("initialize(bar:)").is_initializer());
            assert!(!Method::new("init").is_initializer());
        }

        #[test]
        fn failable_initializer_has_optional_return() {
            let method = Method::new("init(bar:)")
                .with_parameters([Parameter::new("bar", "Int")])
                .with_return_type_name("Foo")
                .with_failable_initializer(true);
            assert!(method.is_initializer());
            assert!(!method.return_type_name().is_optional());
            assert!(method.is_optional_return_type());
            assert_eq!(method.unwrapped_return_type_name(), "Foo");
        }

        #[test]
        fn optional_return_type() {
            let method = Method::new("find(id:)").with_return_type_name("User?");
            assert!(method.is_optional_return_type());
            assert_eq!(method.unwrapped_return_type_name(), "User");
        }

        #[test]
        fn parameter_lookup_by_name() {
            let method = Method::new("move(from:to:)").with_parameters([
                Parameter::labeled("from", "source", "Int"),
                Parameter::labeled("to", "destination", "Int"),
            ]);
            assert_eq!(
                method.parameter("destination").map(Parameter::argument_label),
                Some("to")
            );
            assert!(method.parameter("to").is_none());
        }

        #[test]
        fn labels_mutable_through_parameters_mut() {
            let mut method =
                Method::new("set(value:)").with_parameters([Parameter::new("value", "Int")]);
            method.parameters_mut()[0].set_argument_label("_");
            assert_eq!(method.parameters()[0].argument_label(), "_");
        }

        #[test]
        fn parameter_list_can_be_replaced() {
            let mut method =
                Method::new("move(to:)").with_parameters([Parameter::new("to", "Point")]);
            method.set_parameters([
                Parameter::new("x", "Int"),
                Parameter::new("y", "Int"),
            ]);
            assert_eq!(method.parameters().len(), 2);
            assert!(method.parameter("to").is_none());
            assert_eq!(method.selector_name(), "move(to:)");
        }

        #[test]
        fn set_return_type_name_drops_stale_resolution() {
            let mut method = Method::new("make()").with_return_type_name("Foo");
            method.resolve_return_type(TypeId::new(3)).unwrap();

            method.set_return_type_name("Foo");
            assert_eq!(method.return_type(), Some(TypeId::new(3)));

            method.set_return_type_name("Bar?");
            assert!(method.return_type().is_none());
            assert_eq!(method.unwrapped_return_type_name(), "Bar");
        }

        #[test]
        fn equality_ignores_back_references_and_parser_data() {
            let build = || {
                Method::new("foo(bar:)")
                    .with_parameters([Parameter::new("bar", "Bar")])
                    .with_return_type_name("Baz")
            };
            let mut a = build().with_parser_data(span(0, 10, "func foo(bar: Bar) -> Baz"));
            let mut b = build().with_parser_data(span(40, 50, "something else"));
            a.resolve_return_type(TypeId::new(1)).unwrap();
            b.resolve_return_type(TypeId::new(2)).unwrap();
            a.parameters_mut()[0].resolve_type(TypeId::new(5)).unwrap();
            assert_eq!(a, b);
            assert_eq!(a, build());
        }

        #[test]
        fn parameter_order_is_significant() {
            let x = Parameter::new("x", "Int");
            let y = Parameter::new("y", "Int");
            let a = Method::new("f(x:y:)").with_parameters([x.clone(), y.clone()]);
            let b = Method::new("f(x:y:)").with_parameters([y, x]);
            assert_ne!(a, b);
        }

        #[test]
        fn modifiers_affect_equality() {
            let base = Method::new("f()");
            assert_ne!(base, base.clone().with_static(true));
            assert_ne!(base, base.clone().with_class(true));
            assert_ne!(base, base.clone().with_failable_initializer(true));
            assert_ne!(base, base.clone().with_access_level(AccessLevel::Public));
        }

        #[test]
        fn debug_hides_back_references_and_parser_data() {
            let mut method = Method::new("f()").with_parser_data(span(0, 3, "secret source text"));
            method.resolve_return_type(TypeId::new(9)).unwrap();
            let rendered = format!("{:?}", method);
            assert!(rendered.contains("selector_name: \"f()\""));
            assert!(!rendered.contains("secret"));
            assert!(!rendered.contains("type_9"));
            assert!(!rendered.contains("TypeId"));
        }

        #[test]
        fn parser_data_is_kept_for_the_scanner() {
            let method = Method::new("f()").with_parser_data(span(4, 9, "f()"));
            let data = method.parser_data().unwrap();
            assert_eq!(
                data.downcast_ref::<SourceSpan>(),
                Some(&SourceSpan {
                    start: 4,
                    end: 9,
                    text: "f()"
                })
            );
            assert_eq!(format!("{:?}", data), "ParserData(..)");
        }

        #[test]
        fn parser_data_is_unreadable_without_the_payload_type() {
            let data = span(0, 3, "f()");
            assert!(data.downcast_ref::<String>().is_none());
            assert!(data.downcast_ref::<std::ops::Range<usize>>().is_none());
        }

        #[test]
        fn entities_are_send_and_sync() {
            assert_send_sync::<Method>();
            assert_send_sync::<Parameter>();
        }
    }
}
