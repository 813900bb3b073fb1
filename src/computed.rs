//! Computed properties
//!
//! A computed property is an attribute whose value is produced by a function
//! of the namespace it is read through. With `compute_once` the first read is
//! cached for the lifetime of the binding; otherwise every read recomputes.

use once_cell::unsync::OnceCell;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::expr::Expression;
use crate::namespace::Namespace;

type ComputeFn = dyn Fn(&Namespace) -> Result<Value>;

#[derive(Clone)]
pub struct ComputedProperty {
    compute: Rc<ComputeFn>,
    compute_once: bool,
    cache: OnceCell<Value>,
    expression: Option<String>,
}

impl ComputedProperty {
    /// Wrap `compute`. The caching policy has no default and must be stated.
    pub fn new<F>(compute_once: bool, compute: F) -> Self
    where
        F: Fn(&Namespace) -> Result<Value> + 'static,
    {
        Self { compute: Rc::new(compute), compute_once, cache: OnceCell::new(), expression: None }
    }

    /// Property whose value is `expression` evaluated against the namespace.
    pub fn from_expression(compute_once: bool, expression: Expression) -> Self {
        let source = expression.source().to_string();
        let mut property = Self::new(compute_once, move |namespace: &Namespace| {
            expression.evaluate(|name| namespace.get_value(name))
        });
        property.expression = Some(source);
        property
    }

    pub fn compute_once(&self) -> bool {
        self.compute_once
    }

    pub fn is_cached(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Source text when the property was declared as an expression.
    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    /// Produce the property's value, consulting and filling the cache when
    /// `compute_once` is set.
    ///
    /// Reads should normally go through [`Namespace::get_value`], which also
    /// guards against a property depending on itself.
    pub fn resolve(&self, namespace: &Namespace) -> Result<Value> {
        if self.compute_once {
            if let Some(cached) = self.cache.get() {
                return Ok(cached.clone());
            }
        }
        let value = (self.compute)(namespace)?;
        if self.compute_once {
            let _ = self.cache.set(value.clone());
        }
        Ok(value)
    }
}

impl fmt::Debug for ComputedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedProperty")
            .field("compute_once", &self.compute_once)
            .field("cached", &self.cache.get())
            .field("expression", &self.expression)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_recompute_every_read() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let prop = ComputedProperty::new(false, move |_| {
            counter.set(counter.get() + 1);
            Ok(json!(counter.get()))
        });
        let ns = Namespace::new("weather");

        assert_eq!(prop.resolve(&ns).expect("first"), json!(1));
        assert_eq!(prop.resolve(&ns).expect("second"), json!(2));
        assert_eq!(calls.get(), 2);
        assert!(!prop.is_cached());
    }

    #[test]
    fn test_compute_once_caches_first_read() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let prop = ComputedProperty::new(true, move |_| {
            counter.set(counter.get() + 1);
            Ok(json!(counter.get()))
        });
        let ns = Namespace::new("weather");

        assert_eq!(prop.resolve(&ns).expect("first"), json!(1));
        assert_eq!(prop.resolve(&ns).expect("second"), json!(1));
        assert_eq!(calls.get(), 1);
        assert!(prop.is_cached());
    }

    #[test]
    fn test_failed_compute_is_not_cached() {
        let ns = Namespace::new("weather");
        let prop = ComputedProperty::from_expression(
            true,
            Expression::parse("MISSING").expect("parse"),
        );
        assert!(prop.resolve(&ns).is_err());
        assert!(!prop.is_cached());
        assert_eq!(prop.expression(), Some("MISSING"));
    }
}
