//! Error types for the DAQ supervisor.
//!
//! Two layers of errors are used throughout the workspace:
//!
//! - [`ProcessError`] for everything that touches an OS process (spawning,
//!   signaling, permission repair, single-instance violations).
//! - [`Error`] for supervisor-level failures (configuration, readiness,
//!   I/O), which can wrap a [`ProcessError`].
//!
//! ```rust
//! use daq_common::{Error, Result, ResultExt};
//!
//! fn load() -> Result<()> {
//!     Err(Error::not_found("/etc/daq-supervisor/config.yaml"))
//! }
//!
//! fn boot() -> Result<()> {
//!     load().context("Failed to load configuration")
//! }
//!
//! assert!(boot().unwrap_err().to_string().contains("Failed to load configuration"));
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for supervisor operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A file or directory the supervisor reads does not exist.
    #[error("{resource} does not exist")]
    NotFound { resource: String },

    /// A configured value is malformed.
    #[error("Invalid value: {message}")]
    Validation { message: String },

    /// The graphical session never became reachable.
    #[error("Session not ready after {waited:?} (timeout {timeout:?})")]
    ReadinessTimeout { waited: Duration, timeout: Duration },

    /// A process-level failure.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Setup of a supervisor facility (logging, runtime) failed.
    #[error("Supervisor setup failed: {0}")]
    Internal(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Another error with a description of what was being attempted.
    #[error("{message}: {source}")]
    WithContext { message: String, source: Box<Error> },
}

impl Error {
    /// `resource` is missing.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn readiness_timeout(waited: Duration, timeout: Duration) -> Self {
        Self::ReadinessTimeout { waited, timeout }
    }

    /// Wrap with a description of the failed operation.
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::WithContext {
            message: message.into(),
            source: Box::new(self),
        }
    }
}

/// `.context(..)` on supervisor results, mirroring `anyhow::Context`.
pub trait ResultExt<T> {
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(message))
    }
}

/// Failures of OS process operations, keyed by process name (or pid).
#[derive(Error, Debug, Clone)]
pub enum ProcessError {
    #[error("Process already running: {id} (pids {pids:?})")]
    AlreadyRunning { id: String, pids: Vec<u32> },

    #[error("Failed to start '{id}': {reason}")]
    SpawnFailed { id: String, reason: String },

    #[error("Failed to signal '{id}': {reason}")]
    StopFailed { id: String, reason: String },

    #[error("Invalid launch settings for '{id}': {reason}")]
    Configuration { id: String, reason: String },

    #[error("Launch script missing: {id} - {path}")]
    ScriptMissing { id: String, path: String },

    #[error("Permission repair failed: {id} - {reason}")]
    PermissionDenied { id: String, reason: String },

    #[error("Process lookup failed: {id} - {reason}")]
    LookupFailed { id: String, reason: String },
}

impl ProcessError {
    pub fn already_running(id: impl Into<String>, pids: Vec<u32>) -> Self {
        Self::AlreadyRunning {
            id: id.into(),
            pids,
        }
    }

    pub fn spawn_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn stop_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StopFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn script_missing(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::ScriptMissing {
            id: id.into(),
            path: path.into(),
        }
    }

    pub fn permission_denied(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn lookup_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LookupFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result of a process operation.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;
