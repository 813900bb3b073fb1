//! Module namespaces
//!
//! A [`Namespace`] is the Rust stand-in for a module's top-level attributes:
//! an ordered table of named bindings under a dotted module name. Reads go
//! through [`Namespace::get_value`] / [`Namespace::get`], which resolve
//! computed properties instead of handing back the wrapper.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cell::RefCell;

use crate::computed::ComputedProperty;
use crate::error::{Error, Result};

/// What a name in a namespace is bound to.
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Computed(ComputedProperty),
}

impl Binding {
    pub fn is_computed(&self) -> bool {
        matches!(self, Binding::Computed(_))
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Value(value)
    }
}

impl From<ComputedProperty> for Binding {
    fn from(property: ComputedProperty) -> Self {
        Binding::Computed(property)
    }
}

#[derive(Debug)]
pub struct Namespace {
    name: String,
    // In declaration order.
    bindings: Vec<(String, Binding)>,
    // Computed properties currently being resolved, for cycle detection.
    resolving: RefCell<Vec<String>>,
}

impl Clone for Namespace {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), bindings: self.bindings.clone(), resolving: RefCell::default() }
    }
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), bindings: Vec::new(), resolving: RefCell::default() }
    }

    /// Build a namespace from `(name, value)` pairs, in order.
    pub fn from_values<I, K>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut namespace = Self::new(name);
        for (key, value) in values {
            namespace.set(key, value);
        }
        namespace
    }

    /// Full dotted name, e.g. `weather.config.defaults`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First segment of the dotted name.
    pub fn root_name(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.bindings.iter().map(|(name, binding)| (name.as_str(), binding))
    }

    /// Raw binding, without resolving computed properties.
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.position(name).map(|idx| &self.bindings[idx].1)
    }

    /// Bind `name`, replacing any previous binding in place. Returns the
    /// replaced binding.
    pub fn set_binding(&mut self, name: impl Into<String>, binding: Binding) -> Option<Binding> {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => Some(std::mem::replace(&mut self.bindings[idx].1, binding)),
            None => {
                self.bindings.push((name, binding));
                None
            }
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Binding> {
        self.set_binding(name, Binding::Value(value.into()))
    }

    pub fn set_computed(
        &mut self,
        name: impl Into<String>,
        property: ComputedProperty,
    ) -> Option<Binding> {
        self.set_binding(name, Binding::Computed(property))
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        self.position(name).map(|idx| self.bindings.remove(idx).1)
    }

    /// Read an attribute. Computed properties are resolved on every call
    /// (or served from their cache when `compute_once` is set).
    pub fn get_value(&self, name: &str) -> Result<Value> {
        match self.binding(name) {
            Some(Binding::Value(value)) => Ok(value.clone()),
            Some(Binding::Computed(property)) => {
                if self.resolving.borrow().iter().any(|n| n == name) {
                    return Err(Error::CyclicComputedProperty { name: name.to_string() });
                }
                self.resolving.borrow_mut().push(name.to_string());
                let result = property.resolve(self);
                self.resolving.borrow_mut().pop();
                result
            }
            None => Err(Error::MissingAttribute {
                module: self.name.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Typed read, e.g. `namespace.get::<f64>("LEARNING_RATE")`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.get_value(name)?;
        serde_json::from_value(value)
            .map_err(|source| Error::Conversion { name: name.to_string(), source })
    }

    /// Resolve every attribute into a plain ordered map.
    pub fn resolve_all(&self) -> Result<Map<String, Value>> {
        self.names().map(|name| Ok((name.to_string(), self.get_value(name)?))).collect()
    }

    /// Copy every binding of `other` into this namespace (wildcard re-export).
    pub fn extend_from(&mut self, other: &Namespace) {
        for (name, binding) in other.iter() {
            self.set_binding(name, binding.clone());
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.bindings.iter().position(|(n, _)| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;
    use serde_json::json;

    fn weather() -> Namespace {
        Namespace::from_values(
            "weather",
            [
                ("BATCH_SIZE", json!(64)),
                ("LEARNING_RATE", json!(1e-4)),
                ("TODAYS_TEMP_FEATURE", json!(true)),
            ],
        )
    }

    fn average_from_today(compute_once: bool) -> ComputedProperty {
        ComputedProperty::from_expression(
            compute_once,
            Expression::parse("TODAYS_TEMP_FEATURE").expect("parse"),
        )
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut ns = weather();
        ns.set("BATCH_SIZE", 128);
        ns.set("NEW", "x");
        let names: Vec<_> = ns.names().collect();
        assert_eq!(names, vec!["BATCH_SIZE", "LEARNING_RATE", "TODAYS_TEMP_FEATURE", "NEW"]);
        assert_eq!(ns.get::<u32>("BATCH_SIZE").expect("batch"), 128);
    }

    #[test]
    fn test_root_name() {
        assert_eq!(Namespace::new("weather.config.defaults").root_name(), "weather");
        assert_eq!(Namespace::new("weather").root_name(), "weather");
    }

    #[test]
    fn test_missing_attribute() {
        let err = weather().get_value("NOPE").expect_err("missing");
        assert!(matches!(err, Error::MissingAttribute { ref name, .. } if name == "NOPE"));
    }

    #[test]
    fn test_typed_conversion_error() {
        let err = weather().get::<String>("BATCH_SIZE").expect_err("wrong type");
        assert!(matches!(err, Error::Conversion { .. }));
    }

    #[test]
    fn test_computed_tracks_dependency() {
        let mut ns = weather();
        ns.set_computed("AVERAGE_TEMP_FEATURE", average_from_today(false));
        assert_eq!(ns.get::<bool>("AVERAGE_TEMP_FEATURE").expect("read"), true);

        ns.set("TODAYS_TEMP_FEATURE", false);
        assert_eq!(ns.get::<bool>("AVERAGE_TEMP_FEATURE").expect("read"), false);
    }

    #[test]
    fn test_cached_computed_ignores_dependency_change() {
        let mut ns = weather();
        ns.set_computed("AVERAGE_TEMP_FEATURE", average_from_today(true));
        assert_eq!(ns.get::<bool>("AVERAGE_TEMP_FEATURE").expect("read"), true);

        ns.set("TODAYS_TEMP_FEATURE", false);
        assert_eq!(ns.get::<bool>("AVERAGE_TEMP_FEATURE").expect("read"), true);
    }

    #[test]
    fn test_reassignment_drops_property() {
        let mut ns = weather();
        ns.set_computed("AVERAGE_TEMP_FEATURE", average_from_today(true));
        let previous = ns.set("AVERAGE_TEMP_FEATURE", false);
        assert!(previous.is_some_and(|b| b.is_computed()));
        assert!(!ns.binding("AVERAGE_TEMP_FEATURE").expect("bound").is_computed());
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut ns = Namespace::new("loop");
        ns.set_computed(
            "A",
            ComputedProperty::from_expression(false, Expression::parse("B + 1").expect("parse")),
        );
        ns.set_computed(
            "B",
            ComputedProperty::from_expression(false, Expression::parse("A + 1").expect("parse")),
        );
        let err = ns.get_value("A").expect_err("cycle");
        assert!(matches!(err, Error::CyclicComputedProperty { .. }));
        // The resolving stack unwinds, so unrelated reads still work.
        ns.set("B", 1);
        assert_eq!(ns.get_value("A").expect("A"), json!(2));
    }

    #[test]
    fn test_resolve_all_and_extend() {
        let mut defaults = weather();
        defaults.set_computed("AVERAGE_TEMP_FEATURE", average_from_today(false));
        let mut module = Namespace::new("weather");
        module.extend_from(&defaults);

        let resolved = module.resolve_all().expect("resolve");
        assert_eq!(resolved.get("AVERAGE_TEMP_FEATURE"), Some(&json!(true)));
        assert_eq!(resolved.keys().last().map(String::as_str), Some("AVERAGE_TEMP_FEATURE"));
    }
}
