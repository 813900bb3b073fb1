//! Error types for configuration loading, merging and grid search.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for yapecs
#[derive(Error, Debug)]
pub enum Error {
    /// A config source could not be read or parsed
    #[error("Failed to load config source {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// Every combination of a grid search has already been handed out
    #[error("grid search exhausted: {index} of {total} combinations used ({})", progress_file.display())]
    ExhaustedSearch { progress_file: PathBuf, index: usize, total: usize },

    /// A computed property was declared without a caching policy
    #[error("computed property `{name}` in {} must set compute_once", path.display())]
    AmbiguousComputedProperty { name: String, path: PathBuf },

    /// A computed property read itself while being computed
    #[error("computed property `{name}` depends on itself")]
    CyclicComputedProperty { name: String },

    #[error("module `{module}` has no attribute `{name}`")]
    MissingAttribute { module: String, name: String },

    /// An attribute could not be converted to the requested type
    #[error("attribute `{name}` has an unexpected type: {source}")]
    Conversion {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Expression parsing or evaluation errors
    #[error("Expression error: {0}")]
    Expression(String),

    /// The grid search progress file is corrupt
    #[error("Invalid progress file {}: {reason}", path.display())]
    Progress { path: PathBuf, reason: String },

    /// One of the grid search value lists is empty
    #[error("grid search parameter #{position} has no candidate values")]
    EmptySearchSpace { position: usize },

    #[error("No module registered under `{0}`")]
    UnknownModule(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for yapecs operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load { path: path.into(), reason: reason.into() }
    }

    pub(crate) fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }

    /// True when this is the designed "search finished" signal.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::ExhaustedSearch { .. })
    }
}
