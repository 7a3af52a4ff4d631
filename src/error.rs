//! Error Types
//!
//! Domain errors raised by the connection graph and the user directory.
//! Application plumbing (config, startup) uses `anyhow` via [`crate::Result`].

use crate::store::UserId;
use std::fmt;
use std::time::Duration;

/// Result type for connection graph and directory operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Result type for the persistence boundary
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a [`crate::store::UserStore`] implementation
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store constraint violated: {0}")]
    Constraint(String),
}

/// Why a request was refused as conflicting with existing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The caller already has an open request to the target
    RequestAlreadySent,
    /// The target already has an open request to the caller
    RequestAlreadyReceived,
    AlreadyConnected,
    EmailTaken,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ConflictKind::RequestAlreadySent => "connection request already sent",
            ConflictKind::RequestAlreadyReceived => {
                "this user has already sent you a connection request"
            }
            ConflictKind::AlreadyConnected => "users are already connected",
            ConflictKind::EmailTaken => "email is already registered",
        };
        f.write_str(message)
    }
}

/// Coarse error category, used for HTTP status mapping and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidOperation,
    Conflict,
    StoreFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidOperation => "invalid_operation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::StoreFailure => "store_failure",
        }
    }
}

/// Errors surfaced by graph and directory operations
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("no pending connection request from {0}")]
    RequestNotFound(UserId),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{0}")]
    Conflict(ConflictKind),

    #[error("store failure: {0}")]
    StoreFailure(#[from] StoreError),
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::UserNotFound(_) | GraphError::RequestNotFound(_) => ErrorKind::NotFound,
            GraphError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            GraphError::Conflict(_) => ErrorKind::Conflict,
            GraphError::StoreFailure(_) => ErrorKind::StoreFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let id = UserId::new();
        assert_eq!(GraphError::UserNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(GraphError::RequestNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(
            GraphError::Conflict(ConflictKind::AlreadyConnected).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            GraphError::from(StoreError::Unavailable("down".into())).kind(),
            ErrorKind::StoreFailure
        );
    }

    #[test]
    fn test_conflict_messages_distinguish_pending_and_connected() {
        let pending = GraphError::Conflict(ConflictKind::RequestAlreadySent).to_string();
        let connected = GraphError::Conflict(ConflictKind::AlreadyConnected).to_string();
        assert_ne!(pending, connected);
        assert!(connected.contains("connected"));
    }
}
