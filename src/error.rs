//! Error type shared by the catalog, its collections and the infrastructure boundaries.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The collection checkout has no `self-service.yaml` at its root.
    #[error("app collection config does not exist: {}", path.display())]
    ManifestMissing { path: PathBuf },

    /// The manifest exists but is not valid YAML or fails schema validation.
    #[error("invalid app collection config: {0}")]
    ManifestInvalid(String),

    #[error("app collection '{name}' already exists")]
    CollectionAlreadyExists { name: String },

    #[error("app collection '{name}' does not exist")]
    CollectionNotFound { name: String },

    #[error("app '{app}' not found in collection '{collection}'")]
    AppNotFound { collection: String, app: String },

    #[error("either \"master\" or \"main\" branch must exist in origin of {}", directory.display())]
    NoDefaultBranch { directory: PathBuf },

    /// A collection or app name that is not a single path component.
    #[error("invalid name '{0}': must not be empty, '.', '..' or contain path separators")]
    InvalidName(String),

    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),

    #[error("could not determine the application data directory")]
    DataDirUnavailable,

    #[error("ansible run failed: {0}")]
    Runner(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
