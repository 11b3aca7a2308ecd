//! Error types
//!
//! `ApiError` is what callers see. It keeps malformed input (paths, facet
//! configuration, config files) apart from store failures so that only the
//! latter are retried.

use thiserror::Error;

/// Failures of the physical store and its persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Invalid item state: {0}")]
    InvalidItemState(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for StorageError {
    fn from(err: serde_yaml::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Malformed path expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("'{path}' is not a valid path: {reason}")]
    Malformed { path: String, reason: String },
}

impl PathError {
    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        PathError::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Malformed facet configuration (range specs, display options).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FacetConfigError {
    #[error("Malformed facet '{facet}': {reason}")]
    Malformed { facet: String, reason: String },

    #[error("Unknown range resolution '{0}'")]
    UnknownResolution(String),
}

/// Caller-visible error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    MalformedPath(#[from] PathError),

    #[error(transparent)]
    MalformedFacet(#[from] FacetConfigError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl ApiError {
    /// Caller or configuration bug; retrying cannot help.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ApiError::MalformedPath(_) | ApiError::MalformedFacet(_) | ApiError::ConfigError(_)
        )
    }

    /// Transient store failure worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::StorageError(StorageError::Unavailable(_)) => true,
            ApiError::StorageError(StorageError::IoError(_)) => true,
            ApiError::StorageError(StorageError::Sled(_)) => true,
            ApiError::StorageError(StorageError::InvalidItemState(_)) => true,
            _ => false,
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
