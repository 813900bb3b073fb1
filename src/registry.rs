//! Module registry
//!
//! The registry plays the role of a host program's module table: definitions
//! are registered once, [`ModuleRegistry::import`] builds a module the first
//! time it is asked for (configured from the `--config` paths in the process
//! arguments) and hands out the same instance afterwards.

use std::collections::HashMap;
use std::path::Path;

use crate::config::apply_config_paths;
use crate::error::{Error, Result};
use crate::module::{Module, ModuleDefinition};

#[derive(Debug)]
pub struct ModuleRegistry {
    argv: Vec<String>,
    definitions: HashMap<String, ModuleDefinition>,
    loaded: HashMap<String, Module>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    /// Registry reading `--config` from the current process arguments.
    pub fn new() -> Self {
        Self::with_args(std::env::args())
    }

    pub fn with_args<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            definitions: HashMap::new(),
            loaded: HashMap::new(),
        }
    }

    /// Register `definition` under its name. Replacing a definition discards
    /// the instance imported from the old one.
    pub fn register(&mut self, definition: ModuleDefinition) -> Option<ModuleDefinition> {
        let name = definition.name().to_string();
        self.loaded.remove(&name);
        self.definitions.insert(name, definition)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.loaded.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.loaded.get_mut(name)
    }

    /// The shared instance of `name`, building it on first use.
    pub fn import(&mut self, name: &str) -> Result<&mut Module> {
        if !self.loaded.contains_key(name) {
            let module = self.definition(name)?.build_from_args(&self.argv)?;
            tracing::debug!("Imported module {}", name);
            self.loaded.insert(name.to_string(), module);
        }
        self.loaded.get_mut(name).ok_or_else(|| Error::UnknownModule(name.to_string()))
    }

    /// Apply config sources to the imported module's defaults in place.
    ///
    /// The module namespace keeps its current values until [`reload`](Self::reload).
    pub fn configure<P: AsRef<Path>>(&mut self, name: &str, config_paths: &[P]) -> Result<()> {
        let module = self.import(name)?;
        apply_config_paths(name, module.defaults_mut(), config_paths)
    }

    /// Rebuild the module namespace from its current defaults.
    pub fn reload(&mut self, name: &str) -> Result<&mut Module> {
        let definition = self.definition(name)?.clone();
        let defaults = match self.loaded.remove(name) {
            Some(module) => module.defaults().clone(),
            None => return self.import(name),
        };
        let module = definition.instantiate(defaults)?;
        self.loaded.insert(name.to_string(), module);
        self.loaded.get_mut(name).ok_or_else(|| Error::UnknownModule(name.to_string()))
    }

    /// A new, independently configured instance of `name`. The shared
    /// instance, if any, is left untouched.
    pub fn compose<P: AsRef<Path>>(&self, name: &str, config_paths: &[P]) -> Result<Module> {
        self.definition(name)?.build(config_paths)
    }

    fn definition(&self, name: &str) -> Result<&ModuleDefinition> {
        self.definitions.get(name).ok_or_else(|| Error::UnknownModule(name.to_string()))
    }
}
