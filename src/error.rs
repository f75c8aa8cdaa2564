//! Error types for the zclgen store, generation pipeline and state files.
//!
//! "Not found" is never an error here: queries answer `None`, an empty
//! vector or a zero count.

use crate::types::SessionId;
use std::path::PathBuf;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Constraint violation on {table}: {message}")]
    ConstraintViolation { table: &'static str, message: String },

    #[error("Unsupported store schema version {found} (this build supports up to {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn constraint(table: &'static str, message: impl Into<String>) -> Self {
        StorageError::ConstraintViolation {
            table,
            message: message.into(),
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StorageError::ConstraintViolation { .. })
    }
}

/// Generation-unit errors. Each one fails only the unit that raised it.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid generation options: {0}")]
    Options(String),

    #[error("Template resolution failed for '{template}': {message}")]
    TemplateResolution { template: String, message: String },

    #[error("Unknown helper API: {0}")]
    HelperResolution(String),

    #[error("Unknown row type: {0}")]
    UnknownRowType(String),

    #[error("Render failed for '{template}': {message}")]
    Render { template: String, message: String },

    #[error("Output I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// API-level errors surfaced to the CLI and other collaborators
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Generation error: {0}")]
    GenerationError(#[from] GenerationError),

    #[error("State file error: {0}")]
    ImportExport(String),

    #[error("Catalog load failed: {0}")]
    CatalogLoad(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
