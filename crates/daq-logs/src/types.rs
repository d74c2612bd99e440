//! Core types for log inspection

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Keywords that mark a line as an error or warning (matched case-insensitively).
///
/// The acquisition program logs partly in Spanish, hence `fallo`.
pub const SEVERITY_KEYWORDS: &[&str] = &[
    "error",
    "exception",
    "traceback",
    "critical",
    "fatal",
    // also covers "warning"
    "warn",
    "fallo",
];

/// Whether a line contains any of the severity keywords.
pub fn is_severity_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    SEVERITY_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Statistics over one log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStats {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub line_count: u64,
    /// Lines matching a severity keyword.
    pub severity_lines: u64,
    /// Timestamp prefix of the last timestamped line.
    pub last_entry: Option<NaiveDateTime>,
    pub modified: Option<DateTime<Local>>,
}

impl LogStats {
    /// Size formatted for display.
    pub fn human_size(&self) -> String {
        human_size(self.size_bytes)
    }
}

/// Format a byte count as B / KB / MB.
pub fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}
