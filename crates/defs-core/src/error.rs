use crate::queue::OperationEvent;

/// Errors returned by storage backend calls.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BackendError {
    /// Path does not exist.
    #[error("Path not found: {0}")]
    NotFound(String),

    /// Path is not a directory (for list operations).
    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    /// Path is already taken by an entry of another kind.
    #[error("Path already exists: {0}")]
    AlreadyExists(String),

    /// Directory still has children.
    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Path traversal attempt detected.
    #[error("Path traversal attempt detected: {0}")]
    PathTraversal(String),

    /// The signer is not allowed to perform this call.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Connection to a backend failed.
    #[error("Connection to backend '{backend}' failed")]
    ConnectionFailed {
        backend: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out for path: {path}")]
    Timeout { operation: String, path: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other backend-specific error.
    #[error("Backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Returns true if this error is transient and the call may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::ConnectionFailed { .. } => true,
            BackendError::Timeout { .. } => true,
            BackendError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Errors surfaced by the directory manager.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VfsError {
    /// No signer is connected.
    #[error("No account connected. Configure 'account' or call set_signer before mutating.")]
    NoAccount,

    /// The signer lacks the required role or does not own the target address.
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Unclassified failure, including rejected preconditions and malformed input.
    #[error("Unknown error: {0}")]
    Unknown(String),

    /// Path does not exist in the mirrored tree.
    #[error("Path not found: {0}")]
    NotFound(String),

    /// Backend failure outside the operation queue (reads, role checks).
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// A queued operation settled with an error event.
    #[error("Operation {} ({}) failed: {}", .0.id, .0.kind, .0.result.outcome)]
    OperationFailed(Box<OperationEvent>),

    /// The queue worker is gone.
    #[error("Operation queue is closed")]
    QueueClosed,

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl VfsError {
    /// The error event carried by a failed operation, if any.
    pub fn event(&self) -> Option<&OperationEvent> {
        match self {
            VfsError::OperationFailed(event) => Some(event),
            _ => None,
        }
    }
}

impl From<defs_config::ConfigError> for VfsError {
    fn from(e: defs_config::ConfigError) -> Self {
        VfsError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{OperationKind, OperationOutcome, OperationResult, OperationStatus};

    #[test]
    fn test_backend_is_transient_connection_failed() {
        let err = BackendError::ConnectionFailed {
            backend: "rpc".to_string(),
            source: Box::new(std::io::Error::other("conn err")),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn test_backend_is_transient_timeout() {
        let err = BackendError::Timeout {
            operation: "list".to_string(),
            path: "0xabc/a".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn test_backend_not_transient_not_found() {
        let err = BackendError::NotFound("0xabc/missing".to_string());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_vfs_from_backend() {
        let err: VfsError = BackendError::Other("boom".to_string()).into();
        assert!(matches!(err, VfsError::Backend(BackendError::Other(_))));
    }

    #[test]
    fn test_vfs_from_config_error() {
        let config_err = defs_config::ConfigError::InvalidConfig("bad config".to_string());
        let err: VfsError = config_err.into();
        assert!(matches!(err, VfsError::Config(_)));
    }

    #[test]
    fn test_operation_failed_display_and_event() {
        let event = OperationEvent {
            id: 7,
            kind: OperationKind::UploadFile,
            status: OperationStatus::Error,
            result: OperationResult {
                destination: Some("a".to_string()),
                outcome: OperationOutcome::Failed {
                    message: "rpc down".to_string(),
                },
            },
        };
        let err = VfsError::OperationFailed(Box::new(event));

        let msg = err.to_string();
        assert!(msg.contains("upload-file"));
        assert!(msg.contains("rpc down"));
        assert_eq!(err.event().map(|e| e.id), Some(7));
    }

    #[test]
    fn test_display_no_account() {
        let msg = VfsError::NoAccount.to_string();
        assert!(msg.contains("account"));
    }
}
