//! Core domain types used throughout the DAQ supervisor.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Timestamp prefix used by every log file the system reads or writes.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Logical role of a supervised process.
///
/// The registry is keyed by role, so there is at most one handle per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessRole {
    /// The long-running acquisition workload.
    Primary,
    /// The passive log viewer that observes the primary's output.
    Companion,
}

impl ProcessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessRole::Primary => "primary",
            ProcessRole::Companion => "companion",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Record of a process launched by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessHandle {
    /// Stable identifier, unique across supervised processes.
    pub name: String,
    pub role: ProcessRole,
    /// Launch command as a single printable line.
    pub command: String,
    pub working_directory: Option<PathBuf>,
    pub started_at: DateTime<Local>,
    pub pid: u32,
}

impl ProcessHandle {
    /// Time elapsed since launch.
    pub fn uptime(&self) -> chrono::Duration {
        Local::now().signed_duration_since(self.started_at)
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, pid {}, started {})",
            self.name,
            self.role,
            self.pid,
            format_log_timestamp(&self.started_at)
        )
    }
}

/// Formats a timestamp the way log lines are prefixed.
pub fn format_log_timestamp(at: &DateTime<Local>) -> String {
    at.format(LOG_TIMESTAMP_FORMAT).to_string()
}

/// Parses the `YYYY-MM-DD HH:MM:SS` prefix of a log line, if present.
pub fn parse_log_timestamp(line: &str) -> Option<NaiveDateTime> {
    let prefix = line.get(..19)?;
    NaiveDateTime::parse_from_str(prefix, LOG_TIMESTAMP_FORMAT).ok()
}
