//! Error types surfaced to the request boundary

use thiserror::Error;

use crate::validator::ValidationOutcome;
use crate::version::VersionError;

/// Failures reported by an external store implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or is in an unusable state
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The write conflicts with an existing record
    #[error("Store conflict: {0}")]
    Conflict(String),
}

/// Outcomes that end a request without a successful payload
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid version format: {0}")]
    InvalidVersionFormat(#[from] VersionError),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("The form is not a JSON/Properties/Yaml file")]
    UnsupportedContentType(String),

    #[error("File content error:\n{0}")]
    StructuralError(String),

    #[error("{}", .0.rejection_message().unwrap_or_default())]
    MissingReferences(ValidationOutcome),

    #[error("Manifest not found: {0}")]
    ManifestNotFound(String),

    #[error("Manifest {0} does not have any files related to it")]
    NoAssociatedArtifacts(String),

    #[error("Manifest {identifier} has an unreadable payload: {reason}")]
    CorruptManifest { identifier: String, reason: String },

    #[error("Validator definition for {identifier} is unreadable: {reason}")]
    CorruptValidator { identifier: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status code the boundary answers with
    pub fn status(&self) -> u16 {
        match self {
            ApiError::InvalidVersionFormat(_)
            | ApiError::InvalidRequest(_)
            | ApiError::UnsupportedContentType(_)
            | ApiError::StructuralError(_)
            | ApiError::MissingReferences(_) => 400,
            ApiError::NotFound(_) | ApiError::ManifestNotFound(_) => 404,
            ApiError::NoAssociatedArtifacts(_) => 204,
            ApiError::CorruptManifest { .. }
            | ApiError::CorruptValidator { .. }
            | ApiError::Store(_)
            | ApiError::Serialization(_) => 500,
        }
    }

    /// Returns true if the caller sent something we refuse (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Returns true if the failure is on our side (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }
}

/// Result type for boundary operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;
