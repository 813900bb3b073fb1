//! Configurable modules
//!
//! A [`ModuleDefinition`] is the recipe for building a module: a factory for
//! its defaults namespace plus derived values that depend on the configured
//! attributes. Every [`ModuleDefinition::build`] produces an independent
//! [`Module`], so differently configured variants can live side by side.

use serde_json::Value;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::args::extract_config_paths;
use crate::config::{apply_config_paths, load_namespace};
use crate::error::Result;
use crate::expr::Expression;
use crate::namespace::Namespace;

type DefaultsFn = dyn Fn() -> Result<Namespace>;
type DeriveFn = dyn Fn(&Namespace) -> Result<Value>;

/// How a derived value is computed from the configured namespace.
#[derive(Clone)]
pub enum Derivation {
    Expression(Expression),
    Function(Rc<DeriveFn>),
}

impl Derivation {
    fn evaluate(&self, namespace: &Namespace) -> Result<Value> {
        match self {
            Derivation::Expression(expression) => {
                expression.evaluate(|name| namespace.get_value(name))
            }
            Derivation::Function(derive) => derive(namespace),
        }
    }
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Derivation::Expression(expression) => {
                f.debug_tuple("Expression").field(&expression.source()).finish()
            }
            Derivation::Function(_) => f.write_str("Function(..)"),
        }
    }
}

#[derive(Clone)]
pub struct ModuleDefinition {
    name: String,
    defaults: Rc<DefaultsFn>,
    derived: Vec<(String, Derivation)>,
}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("name", &self.name)
            .field("derived", &self.derived)
            .finish_non_exhaustive()
    }
}

impl ModuleDefinition {
    /// `defaults` is called once per build and must return a fresh namespace.
    pub fn new<F>(name: impl Into<String>, defaults: F) -> Self
    where
        F: Fn() -> Result<Namespace> + 'static,
    {
        Self { name: name.into(), defaults: Rc::new(defaults), derived: Vec::new() }
    }

    /// Defaults read from a config source on every build.
    pub fn from_file(name: impl Into<String>, defaults_path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let defaults_path = defaults_path.into();
        let defaults_name = format!("{}.config.defaults", name);
        Self::new(name, move || load_namespace(&defaults_name, &defaults_path))
    }

    /// Add a value derived from the configured attributes, evaluated once per build.
    pub fn derive<F>(mut self, name: impl Into<String>, derive: F) -> Self
    where
        F: Fn(&Namespace) -> Result<Value> + 'static,
    {
        self.derived.push((name.into(), Derivation::Function(Rc::new(derive))));
        self
    }

    /// [`derive`](Self::derive) with an expression, e.g.
    /// `int(TODAYS_TEMP_FEATURE) + int(AVERAGE_TEMP_FEATURE)`.
    pub fn derive_expr(mut self, name: impl Into<String>, expression: &str) -> Result<Self> {
        let expression = Expression::parse(expression)?;
        self.derived.push((name.into(), Derivation::Expression(expression)));
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn derived(&self) -> &[(String, Derivation)] {
        &self.derived
    }

    /// A fresh defaults namespace from the factory.
    pub fn defaults(&self) -> Result<Namespace> {
        (self.defaults)()
    }

    /// Build a module configured with `config_paths`.
    pub fn build<P: AsRef<Path>>(&self, config_paths: &[P]) -> Result<Module> {
        let mut defaults = self.defaults()?;
        apply_config_paths(&self.name, &mut defaults, config_paths)?;
        self.instantiate(defaults)
    }

    /// Build a module configured with the paths following `--config` in `argv`.
    pub fn build_from_args<S: AsRef<str>>(&self, argv: &[S]) -> Result<Module> {
        self.build(&extract_config_paths(argv))
    }

    /// Re-export `defaults` into a module namespace and evaluate the derived
    /// values against it, in declaration order.
    pub fn instantiate(&self, defaults: Namespace) -> Result<Module> {
        let mut namespace = Namespace::new(self.name.clone());
        namespace.extend_from(&defaults);
        for (name, derivation) in &self.derived {
            let value = derivation.evaluate(&namespace)?;
            tracing::debug!("{}: derived {} = {}", self.name, name, value);
            namespace.set(name.clone(), value);
        }
        Ok(Module { defaults, namespace })
    }
}

/// A built module: the configured defaults and the namespace re-exported from them.
#[derive(Debug, Clone)]
pub struct Module {
    defaults: Namespace,
    namespace: Namespace,
}

impl Module {
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn defaults(&self) -> &Namespace {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut Namespace {
        &mut self.defaults
    }

    pub fn into_namespace(self) -> Namespace {
        self.namespace
    }
}

impl Deref for Module {
    type Target = Namespace;

    fn deref(&self) -> &Namespace {
        &self.namespace
    }
}

impl DerefMut for Module {
    fn deref_mut(&mut self) -> &mut Namespace {
        &mut self.namespace
    }
}
