//! # DAQ Common
//!
//! Types and error definitions shared by every crate of the DAQ supervisor.
//!
//! The supervisor watches a single long-running acquisition process (the
//! *primary*) and a passive log viewer (the *companion*). This crate holds
//! the vocabulary both sides of the system agree on: process roles, the
//! handle recorded when a process is launched, the timestamp format used in
//! every log file, and the error taxonomy.

pub mod errors;
pub mod types;

pub use errors::{Error, ProcessError, ProcessResult, Result, ResultExt};
pub use types::{format_log_timestamp, parse_log_timestamp, ProcessHandle, ProcessRole, LOG_TIMESTAMP_FORMAT};
