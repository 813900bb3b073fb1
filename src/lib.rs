//! yapecs: experiment configuration bound to module namespaces
//!
//! A module's configuration lives in an ordinary namespace of attributes.
//! Config files passed with `--config` override those attributes when the
//! module is built, differently configured copies can be composed side by
//! side, and restartable grid searches pull the next untried combination of
//! hyperparameters from a progress file.
//!
//! ```no_run
//! use serde_json::json;
//! use yapecs::{ModuleDefinition, ModuleRegistry, Namespace};
//!
//! # fn main() -> yapecs::Result<()> {
//! let weather = ModuleDefinition::new("weather", || {
//!     Ok(Namespace::from_values(
//!         "weather.config.defaults",
//!         [("BATCH_SIZE", json!(64)), ("TODAYS_TEMP_FEATURE", json!(true))],
//!     ))
//! });
//!
//! let mut registry = ModuleRegistry::new();
//! registry.register(weather);
//! let batch_size: u32 = registry.import("weather")?.get("BATCH_SIZE")?;
//!
//! let variant = registry.compose("weather", &["experiments/small-batch.toml"])?;
//! let small: u32 = variant.get("BATCH_SIZE")?;
//! # let _ = (batch_size, small);
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod computed;
pub mod config;
pub mod error;
pub mod expr;
pub mod grid;
pub mod module;
pub mod namespace;
pub mod registry;

pub use args::{extract_config_paths, ConfigArgs};
pub use computed::ComputedProperty;
pub use config::{compose, configure, configure_with_argv, load_source, ConfigSource};
pub use error::{Error, Result};
pub use expr::Expression;
pub use grid::{grid_search, GridSearch};
pub use module::{Derivation, Module, ModuleDefinition};
pub use namespace::{Binding, Namespace};
pub use registry::ModuleRegistry;
