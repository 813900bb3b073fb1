//! Configuration loading and merging
//!
//! Loads config sources and applies their overrides onto module namespaces,
//! in the order the sources were given (last source wins).

pub mod engine;
pub mod loader;

pub use engine::{apply_config_paths, compose, configure, configure_with_argv};
pub use loader::{load_namespace, load_source, ConfigSource, Declaration};
