//! Sync error types.

use std::time::Duration;
use thiserror::Error;

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The connectivity gate failed; nothing was transferred.
    #[error("Offline: {target} unreachable: {reason}")]
    Offline { target: String, reason: String },

    #[error("Local directory not found: {path}")]
    LocalDirMissing { path: String },

    /// The copy step ran and reported failure.
    #[error("Transfer via {backend} failed: {message}")]
    TransferFailed { backend: String, message: String },

    #[error("Transfer did not finish within {timeout:?}")]
    TransferTimeout { timeout: Duration },

    #[error("Status file error: {message}")]
    Status { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn transfer_failed(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransferFailed {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    /// True for the offline gate, which operators must be able to tell
    /// apart from a rejected transfer.
    pub fn is_offline(&self) -> bool {
        matches!(self, SyncError::Offline { .. })
    }
}
