//! Error types for the permission registry

use thiserror::Error;

/// Permission registry errors
///
/// Every failure surfaced to a caller falls into one of four categories. The
/// HTTP layer maps them one-to-one onto status codes.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Referenced role, PBU, catalog entry or link does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate key, duplicate edge or link, cycle-closing edge, or a
    /// concurrent write that won the race
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Naming violation, self-inheritance, depth limit, malformed payload or
    /// inactive reference
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Persistence or infrastructure failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Stable machine-readable code for wire payloads
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::NotFound(_) => "NOT_FOUND",
            RegistryError::Conflict(_) => "CONFLICT",
            RegistryError::BadRequest(_) => "BAD_REQUEST",
            RegistryError::Internal(_) => "INTERNAL",
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        RegistryError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        RegistryError::Conflict(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        RegistryError::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        RegistryError::Internal(msg.into())
    }
}

impl From<crate::store::StoreError> for RegistryError {
    fn from(err: crate::store::StoreError) -> Self {
        use crate::store::StoreError;
        match err {
            StoreError::NotFound(msg) => RegistryError::NotFound(msg),
            StoreError::Conflict(msg) => RegistryError::Conflict(msg),
            StoreError::Stale(msg) => {
                RegistryError::Conflict(format!("concurrent modification: {}", msg))
            }
            StoreError::Unexpected(e) => RegistryError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Internal(format!("serialization failed: {}", err))
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
