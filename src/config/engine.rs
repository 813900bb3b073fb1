//! Applying config sources onto namespaces

use std::path::{Path, PathBuf};

use super::loader::{load_source, ConfigSource};
use crate::args::{config_paths_from_env, extract_config_paths};
use crate::error::Result;
use crate::module::{Module, ModuleDefinition};
use crate::namespace::Namespace;

/// Apply config sources onto `config_module`, the defaults namespace of the
/// module family `module_name`.
///
/// With `config_paths` set to `None`, the paths following `--config` in the
/// process arguments are used. Sources tagged for another module are skipped.
/// Only `config_module` is mutated; re-exporting its attributes into the
/// module namespace is left to the caller (see [`ModuleDefinition`]).
pub fn configure(
    module_name: &str,
    config_module: &mut Namespace,
    config_paths: Option<&[PathBuf]>,
) -> Result<()> {
    match config_paths {
        Some(paths) => apply_config_paths(module_name, config_module, paths),
        None => apply_config_paths(module_name, config_module, &config_paths_from_env()),
    }
}

/// [`configure`] with the paths scanned from an explicit argument list.
pub fn configure_with_argv<S: AsRef<str>>(
    module_name: &str,
    config_module: &mut Namespace,
    argv: &[S],
) -> Result<()> {
    apply_config_paths(module_name, config_module, &extract_config_paths(argv))
}

/// Load each source in order and apply the ones that target `module_name`.
pub fn apply_config_paths<P: AsRef<Path>>(
    module_name: &str,
    config_module: &mut Namespace,
    config_paths: &[P],
) -> Result<()> {
    for path in config_paths {
        let source = load_source(path.as_ref())?;
        if !source.applies_to(module_name) {
            tracing::debug!(
                "Skipping {}: MODULE is {:?}, configuring {}",
                source.path().display(),
                source.module().unwrap_or_default(),
                module_name
            );
            continue;
        }
        apply_source(config_module, source)?;
    }
    Ok(())
}

fn apply_source(config_module: &mut Namespace, source: ConfigSource) -> Result<()> {
    let path = source.path().to_path_buf();
    for (name, binding) in source.into_attributes()? {
        let kind = if binding.is_computed() { "computed property" } else { "value" };
        if config_module.set_binding(name.clone(), binding).is_some() {
            tracing::debug!("{}: {} overridden with {} from {}", config_module.name(), name, kind, path.display());
        } else {
            tracing::debug!("{}: {} added as {} from {}", config_module.name(), name, kind, path.display());
        }
    }
    Ok(())
}

/// Build an independent module from `definition`, configured with
/// `config_paths`. Existing instances of the module are never touched.
pub fn compose<P: AsRef<Path>>(definition: &ModuleDefinition, config_paths: &[P]) -> Result<Module> {
    definition.build(config_paths)
}
