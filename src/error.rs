//! Error types for Lens.
//!
//! All fallible library operations return [`Result<T>`], whose error type
//! [`LensError`] mirrors the failure categories a search request can hit:
//! validation, missing index, feature computation, storage and metadata.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LensError>;

/// Which stage of query encoding failed.
///
/// Callers see a single "feature computation failed" category; the kind is
/// kept so logs and tests can still tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureErrorKind {
    /// The query bytes could not be decoded as an image.
    Decode,
    /// The embedding provider failed (model, device or runtime error).
    Inference,
}

impl std::fmt::Display for FeatureErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureErrorKind::Decode => f.write_str("decode"),
            FeatureErrorKind::Inference => f.write_str("inference"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LensError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid or missing index: {0}")]
    IndexNotFound(String),

    #[error("Failed to compute features: {message}")]
    FeatureComputation {
        kind: FeatureErrorKind,
        message: String,
    },

    #[error("Index error: {0}")]
    Index(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LensError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        LensError::InvalidArgument(msg.into())
    }

    pub fn index_not_found<S: Into<String>>(mode: S) -> Self {
        LensError::IndexNotFound(mode.into())
    }

    pub fn decode<S: Into<String>>(msg: S) -> Self {
        LensError::FeatureComputation {
            kind: FeatureErrorKind::Decode,
            message: msg.into(),
        }
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        LensError::FeatureComputation {
            kind: FeatureErrorKind::Inference,
            message: msg.into(),
        }
    }

    pub fn index<S: Into<String>>(msg: S) -> Self {
        LensError::Index(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        LensError::Storage(msg.into())
    }

    pub fn metadata<S: Into<String>>(msg: S) -> Self {
        LensError::Metadata(msg.into())
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        LensError::InvalidConfig(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        LensError::NotFound(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        LensError::Internal(msg.into())
    }

    /// Returns `true` for errors caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LensError::InvalidArgument(_) | LensError::IndexNotFound(_)
        )
    }
}
