//! Error types for the replication engine.

use fibersync_protocol::ProtocolError;
use fibersync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote data service failed or was unreachable.
    #[error("remote error: {message}")]
    Remote {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Local replica error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed request or response.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An entity name that is not in the registry.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The remote reports it is offline.
    #[error("not connected to remote")]
    NotConnected,

    /// The attempt was dropped before it completed.
    #[error("sync attempt abandoned")]
    Abandoned,

    /// Invalid configuration (registry file, batch size).
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Creates a retryable remote error.
    pub fn remote_retryable(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote error.
    pub fn remote_fatal(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried by the caller.
    ///
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote { retryable, .. } => *retryable,
            SyncError::NotConnected | SyncError::Abandoned => true,
            _ => false,
        }
    }

    /// Message recorded in status records and failure lists.
    ///
    /// Remote errors report the remote's own message unmodified.
    pub fn status_message(&self) -> String {
        match self {
            SyncError::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::remote_retryable("connection reset").is_retryable());
        assert!(!SyncError::remote_fatal("permission denied").is_retryable());
        assert!(SyncError::NotConnected.is_retryable());
        assert!(!SyncError::UnknownEntity("ghost".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::NotConnected;
        assert_eq!(err.to_string(), "not connected to remote");

        let err = SyncError::UnknownEntity("widgets".into());
        assert!(err.to_string().contains("widgets"));
    }

    #[test]
    fn status_message_keeps_remote_text() {
        assert_eq!(SyncError::remote_fatal("boom").status_message(), "boom");
        assert_eq!(
            SyncError::Abandoned.status_message(),
            "sync attempt abandoned"
        );
    }

    #[test]
    fn store_errors_convert() {
        let err: SyncError = StoreError::unknown_table("nodes").into();
        assert!(matches!(err, SyncError::Store(_)));
    }
}
