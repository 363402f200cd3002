//! Error types for the binding engine
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for binding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the binding engine
#[derive(Error, Debug)]
pub enum Error {
    /// A path segment could not be resolved against the object graph
    #[error("Cannot resolve path '{path}': {reason}")]
    PathResolution {
        /// The path that failed to resolve
        path: String,
        /// What went wrong at the failing segment
        reason: String,
    },

    /// A path string could not be parsed
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The raw path string
        path: String,
        /// Parse failure description
        reason: String,
    },

    /// A candidate value was rejected by the schema
    ///
    /// Never surfaces past a connection hook; hooks convert it into the
    /// `errored` partition of an [`UpdateResult`](crate::update::UpdateResult).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A binding key is already held by a live connection
    #[error("Binding key '{0}' is already connected")]
    DuplicateBinding(String),

    /// No communicator is registered under the key
    #[error("Cannot find binding for '{0}'")]
    BindingNotFound(String),

    /// The schema has no metadata for the field
    #[error("Cannot find field '{0}'")]
    FieldNotFound(String),

    /// The linked object shape cannot serve the requested operation
    #[error("Unsupported linked object: {0}")]
    UnsupportedLinkedObject(String),

    /// `update_in_view` was called before `connect`
    #[error("Communicator {0} has no active connection")]
    NotConnected(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a path resolution error
    pub fn path_resolution(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathResolution {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a path parse error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a duplicate binding error
    pub fn duplicate_binding(key: impl Into<String>) -> Self {
        Self::DuplicateBinding(key.into())
    }

    /// Create a "binding not found" error
    pub fn binding_not_found(key: impl Into<String>) -> Self {
        Self::BindingNotFound(key.into())
    }

    /// Create a "field not found" error
    pub fn field_not_found(field: impl Into<String>) -> Self {
        Self::FieldNotFound(field.into())
    }

    /// Create an unsupported linked object error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedLinkedObject(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether callers should treat this as "no metadata available"
    /// rather than a failure.
    pub fn is_missing_metadata(&self) -> bool {
        matches!(self, Self::BindingNotFound(_) | Self::FieldNotFound(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
