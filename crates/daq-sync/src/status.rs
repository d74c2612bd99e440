//! Last-run status file.
//!
//! Written after every sync run for display purposes. Never read back to
//! decide what to copy.

use crate::error::{SyncError, SyncResult};
use crate::watchdog::SyncOutcome;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub finished_at: DateTime<Local>,
    pub outcome: SyncOutcome,
    pub transferred: u64,
    pub local_dir: PathBuf,
    pub remote_dest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncStatus {
    /// Save to disk (atomic write).
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> SyncResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SyncError::status(format!("Failed to serialize sync status: {}", e)))?;

        // Write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, json).await.map_err(|e| {
            SyncError::status(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        tokio::fs::rename(&temp_path, path).await.map_err(|e| {
            SyncError::status(format!("Failed to rename status file {}: {}", path.display(), e))
        })?;

        Ok(())
    }

    /// Load from disk; `Ok(None)` when no run has been recorded yet.
    pub fn load<P: AsRef<Path>>(path: P) -> SyncResult<Option<Self>> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| SyncError::status(format!("Invalid status file {}: {}", path.display(), e)))
    }
}
