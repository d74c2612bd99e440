//! Transfer backends.
//!
//! A backend copies every new or changed file under a local directory to a
//! destination and streams one [`TransferLine`] per event as it happens.
//! Backends are additive: files that only exist at the destination are
//! never touched.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use walkdir::WalkDir;

/// One line of transfer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferLine {
    /// A file was copied (relative path or backend description).
    Copied(String),
    /// A file could not be copied.
    Error(String),
    /// Any other backend output.
    Output(String),
}

/// Totals reported by a backend once it finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub transferred: u64,
    pub unchanged: u64,
    pub errors: u64,
}

#[async_trait]
pub trait Transfer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Copy `local_dir` to `remote`, sending lines to `lines` as they occur.
    ///
    /// The sender is dropped when the copy finishes.
    async fn copy(
        &self,
        local_dir: &Path,
        remote: &str,
        lines: UnboundedSender<TransferLine>,
    ) -> SyncResult<TransferSummary>;
}

/// Which backend a sync run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferBackend {
    /// `rclone` for `remote:path` destinations, filesystem for absolute paths.
    #[default]
    Auto,
    Rclone,
    Filesystem,
}

/// Resolve a backend for a destination.
pub fn select_transfer(
    backend: TransferBackend,
    remote: &str,
    rclone: &RcloneTransfer,
) -> Arc<dyn Transfer> {
    let filesystem = match backend {
        TransferBackend::Auto => Path::new(remote).is_absolute(),
        TransferBackend::Rclone => false,
        TransferBackend::Filesystem => true,
    };

    if filesystem {
        Arc::new(FilesystemTransfer)
    } else {
        Arc::new(rclone.clone())
    }
}

/// Runs `rclone copy --update -v <local> <remote>`.
///
/// rclone logs one `... : <file>: Copied (new|replaced ...)` line per file
/// on stderr at `-v`; those are reported as [`TransferLine::Copied`].
#[derive(Debug, Clone)]
pub struct RcloneTransfer {
    pub binary: PathBuf,
    pub extra_args: Vec<String>,
}

impl Default for RcloneTransfer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("rclone"),
            extra_args: Vec::new(),
        }
    }
}

impl RcloneTransfer {
    fn classify(line: &str) -> TransferLine {
        if line.contains("Copied") {
            TransferLine::Copied(line.to_string())
        } else if line.contains("ERROR") {
            TransferLine::Error(line.to_string())
        } else {
            TransferLine::Output(line.to_string())
        }
    }
}

#[async_trait]
impl Transfer for RcloneTransfer {
    fn name(&self) -> &'static str {
        "rclone"
    }

    async fn copy(
        &self,
        local_dir: &Path,
        remote: &str,
        lines: UnboundedSender<TransferLine>,
    ) -> SyncResult<TransferSummary> {
        let mut child = tokio::process::Command::new(&self.binary)
            .arg("copy")
            .arg("--update")
            .arg("-v")
            .args(&self.extra_args)
            .arg(local_dir)
            .arg(remote)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SyncError::transfer_failed(
                    self.name(),
                    format!("failed to start {}: {}", self.binary.display(), e),
                )
            })?;

        let mut summary = TransferSummary::default();
        let mut last_error: Option<String> = None;

        if let Some(stderr) = child.stderr.take() {
            let mut reader = BufReader::new(stderr).lines();
            while let Some(line) = reader.next_line().await? {
                let line = Self::classify(line.trim_end());
                match &line {
                    TransferLine::Copied(_) => summary.transferred += 1,
                    TransferLine::Error(text) => {
                        summary.errors += 1;
                        last_error = Some(text.clone());
                    }
                    TransferLine::Output(_) => {}
                }
                let _ = lines.send(line);
            }
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(summary)
        } else {
            Err(SyncError::transfer_failed(
                self.name(),
                match last_error {
                    Some(err) => format!("{} ({})", status, err),
                    None => status.to_string(),
                },
            ))
        }
    }
}

/// Copies into a directory on a mounted filesystem.
///
/// A file is copied when the destination is missing, differs in size, or
/// is older than the source. The destination root must already exist; an
/// absent root usually means the share is not mounted.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesystemTransfer;

impl FilesystemTransfer {
    fn needs_copy(src: &fs::Metadata, dest: &Path) -> bool {
        let Ok(dest_meta) = fs::metadata(dest) else {
            return true;
        };
        if src.len() != dest_meta.len() {
            return true;
        }
        match (src.modified(), dest_meta.modified()) {
            (Ok(src_time), Ok(dest_time)) => src_time > dest_time,
            _ => false,
        }
    }

    fn copy_tree(
        local_dir: &Path,
        dest_root: &Path,
        lines: &UnboundedSender<TransferLine>,
    ) -> SyncResult<TransferSummary> {
        let mut summary = TransferSummary::default();

        for entry in WalkDir::new(local_dir).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    summary.errors += 1;
                    let _ = lines.send(TransferLine::Error(e.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(local_dir) else {
                continue;
            };
            let dest = dest_root.join(relative);
            let relative = relative.display().to_string();

            let src_meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    summary.errors += 1;
                    let _ = lines.send(TransferLine::Error(format!("{}: {}", relative, e)));
                    continue;
                }
            };

            if !Self::needs_copy(&src_meta, &dest) {
                summary.unchanged += 1;
                continue;
            }

            // A file still being appended is copied as currently readable
            let copied = dest
                .parent()
                .map(fs::create_dir_all)
                .transpose()
                .and_then(|_| fs::copy(entry.path(), &dest));

            match copied {
                Ok(bytes) => {
                    summary.transferred += 1;
                    let _ = lines.send(TransferLine::Copied(format!("{} ({} bytes)", relative, bytes)));
                }
                Err(e) => {
                    summary.errors += 1;
                    let _ = lines.send(TransferLine::Error(format!("{}: {}", relative, e)));
                }
            }
        }

        Ok(summary)
    }
}

#[async_trait]
impl Transfer for FilesystemTransfer {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn copy(
        &self,
        local_dir: &Path,
        remote: &str,
        lines: UnboundedSender<TransferLine>,
    ) -> SyncResult<TransferSummary> {
        let dest_root = PathBuf::from(remote);
        if !dest_root.is_dir() {
            return Err(SyncError::transfer_failed(
                self.name(),
                format!("destination {} is not an existing directory", dest_root.display()),
            ));
        }

        let local_dir = local_dir.to_path_buf();
        debug!("Copying {} -> {}", local_dir.display(), dest_root.display());

        let summary = tokio::task::spawn_blocking(move || Self::copy_tree(&local_dir, &dest_root, &lines))
            .await
            .map_err(|e| SyncError::transfer_failed("filesystem", format!("copy task failed: {}", e)))??;

        if summary.errors > 0 {
            return Err(SyncError::transfer_failed(
                self.name(),
                format!(
                    "{} file(s) could not be copied ({} copied)",
                    summary.errors, summary.transferred
                ),
            ));
        }
        Ok(summary)
    }
}
