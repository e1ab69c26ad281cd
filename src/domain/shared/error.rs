//! Domain errors

use thiserror::Error;

/// Failure reported by the realtime data store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Malformed value at {path}: {reason}")]
    Serialization { path: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("User not authenticated")]
    NotAuthenticated,

    /// The action needs a call in progress and there is none
    #[error("No active call to {0}")]
    NoActiveCall(&'static str),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
