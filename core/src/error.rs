use std::{io, path::PathBuf, result};

use thiserror::Error;

/// Errors raised by [`ConfigStore`](crate::ConfigStore) operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// `DATA_PATH` was found neither in the process environment nor in a `.env` file.
    #[error("DATA_PATH is not set in the environment or in a .env file")]
    MissingDataPath,

    /// A `.env` file exists but could not be read or parsed.
    #[error("failed to read .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),

    /// The requested configuration file does not exist.
    #[error("configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// The parent directory of a write target does not exist.
    #[error("parent directory does not exist for {}", path.display())]
    PathNotFound { path: PathBuf },

    /// A data or figure format outside the supported set was requested.
    #[error("unsupported format '{format}' (expected one of: {expected})")]
    UnsupportedFormat {
        format: String,
        expected: &'static str,
    },

    /// CSV output was requested for a value that is not a table.
    #[error("cannot write '{format}' from {actual}: a table is required")]
    TypeMismatch {
        format: String,
        actual: &'static str,
    },

    /// The requested data artifact does not exist.
    #[error("artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    /// A required configuration key is absent.
    #[error("configuration key '{key}' is missing")]
    MissingKey { key: String },

    /// A configuration key holds a value of the wrong shape.
    #[error("configuration key '{key}' is invalid: {reason}")]
    InvalidKey { key: String, reason: String },

    /// A configuration document parsed to something other than a mapping.
    #[error("configuration at {} is not a mapping", path.display())]
    InvalidConfiguration { path: PathBuf },

    /// A table whose rows do not match its header.
    #[error("invalid table: {0}")]
    InvalidTable(String),

    /// Pixel data or plot series that cannot be rendered.
    #[error("invalid figure: {0}")]
    InvalidFigure(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
