//! Error types for the rowlake-core crate.

use thiserror::Error;

/// Top-level error type for lake operations.
///
/// Schema mismatches are not errors here: validation accumulates them
/// into a [`ValidationReport`](crate::data::validate::ValidationReport)
/// instead of failing.
#[derive(Debug, Error)]
pub enum LakeError {
    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Transform step '{step}' failed: {message}")]
    Transform { step: String, message: String },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Adapter failure reading {input}: {message}")]
    Adapter { input: String, message: String },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Page {page} fetch failed: {message}")]
    PageFetch { page: usize, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl LakeError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn unsupported_format(tag: impl Into<String>) -> Self {
        Self::UnsupportedFormat(tag.into())
    }

    pub fn transform(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            step: step.into(),
            message: message.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn adapter(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adapter {
            input: input.into(),
            message: message.into(),
        }
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True for structural reference errors that callers should surface
    /// immediately rather than retry.
    pub fn is_reference_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::UnsupportedFormat(_))
    }
}
