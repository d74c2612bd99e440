//! Sync Watchdog - one connectivity-gated copy pass per invocation
//!
//! ```text
//! idle -> checking-connectivity -> offline
//!                               -> online -> copying -> done | failed
//! ```
//!
//! Nothing carries over between runs. Offline and failed runs are logged
//! differently and map to different exit codes.

use crate::connectivity::ConnectivityProbe;
use crate::error::SyncError;
use crate::status::SyncStatus;
use crate::transfer::{Transfer, TransferLine, TransferSummary};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Phase of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    CheckingConnectivity,
    Offline,
    Online,
    Copying,
    Done,
    Failed,
}

/// Terminal outcome of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Done,
    Offline,
    Failed,
}

impl SyncOutcome {
    /// Process exit code: 0 converged, 1 transfer failed, 2 offline.
    pub fn exit_code(self) -> u8 {
        match self {
            SyncOutcome::Done => 0,
            SyncOutcome::Failed => 1,
            SyncOutcome::Offline => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncOutcome::Done => "done",
            SyncOutcome::Offline => "offline",
            SyncOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one sync run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub local_dir: PathBuf,
    pub remote_dest: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Every phase entered, in order.
    pub phases: Vec<SyncPhase>,
    pub outcome: SyncOutcome,
    /// Files reported as transferred during this run.
    pub transferred: u64,
    pub lines: Vec<TransferLine>,
    pub error: Option<String>,
}

impl SyncReport {
    fn new(local_dir: &Path, remote_dest: &str) -> Self {
        let now = Local::now();
        Self {
            local_dir: local_dir.to_path_buf(),
            remote_dest: remote_dest.to_string(),
            started_at: now,
            finished_at: now,
            phases: vec![SyncPhase::Idle],
            outcome: SyncOutcome::Failed,
            transferred: 0,
            lines: Vec::new(),
            error: None,
        }
    }

    fn enter(&mut self, phase: SyncPhase) {
        self.phases.push(phase);
    }

    pub fn phase(&self) -> SyncPhase {
        self.phases.last().copied().unwrap_or(SyncPhase::Idle)
    }

    fn finish(&mut self, outcome: SyncOutcome, error: Option<String>) {
        self.outcome = outcome;
        self.error = error;
        self.finished_at = Local::now();
        self.enter(match outcome {
            SyncOutcome::Done => SyncPhase::Done,
            SyncOutcome::Offline => SyncPhase::Offline,
            SyncOutcome::Failed => SyncPhase::Failed,
        });
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            finished_at: self.finished_at,
            outcome: self.outcome,
            transferred: self.transferred,
            local_dir: self.local_dir.clone(),
            remote_dest: self.remote_dest.clone(),
            message: self.error.clone(),
        }
    }
}

/// Runs sync passes with a fixed probe and transfer backend.
pub struct SyncWatchdog {
    probe: Arc<dyn ConnectivityProbe>,
    transfer: Arc<dyn Transfer>,
    transfer_timeout: Duration,
    status_file: Option<PathBuf>,
}

impl SyncWatchdog {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        transfer: Arc<dyn Transfer>,
        transfer_timeout: Duration,
    ) -> Self {
        Self {
            probe,
            transfer,
            transfer_timeout,
            status_file: None,
        }
    }

    /// Record the outcome of every run in a status file.
    pub fn with_status_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_file = Some(path.into());
        self
    }

    /// Perform one sync pass.
    pub async fn run_sync(&self, local_dir: &Path, remote_dest: &str) -> SyncReport {
        let mut report = SyncReport::new(local_dir, remote_dest);
        info!(
            "Sync started: {} -> {} (backend: {})",
            local_dir.display(),
            remote_dest,
            self.transfer.name()
        );

        report.enter(SyncPhase::CheckingConnectivity);
        if let Err(e) = self.probe.probe().await {
            error!("OFFLINE: {}; no transfer attempted", e);
            report.finish(SyncOutcome::Offline, Some(e.to_string()));
            self.record(&report).await;
            return report;
        }
        report.enter(SyncPhase::Online);
        info!("Connectivity to {} confirmed", self.probe.target());

        if !local_dir.is_dir() {
            let e = SyncError::LocalDirMissing {
                path: local_dir.display().to_string(),
            };
            error!("Sync FAILED: {}", e);
            report.finish(SyncOutcome::Failed, Some(e.to_string()));
            self.record(&report).await;
            return report;
        }

        report.enter(SyncPhase::Copying);
        let result = self.copy(&mut report).await;

        match result {
            Ok(summary) => {
                info!(
                    "Sync completed at {}: {} file(s) transferred, {} unchanged",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    report.transferred,
                    summary.unchanged
                );
                report.finish(SyncOutcome::Done, None);
            }
            Err(e) => {
                error!(
                    "Sync FAILED at {}: {} ({} file(s) transferred before the failure)",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    e,
                    report.transferred
                );
                report.finish(SyncOutcome::Failed, Some(e.to_string()));
            }
        }

        self.record(&report).await;
        report
    }

    /// Run the transfer, logging each line as it streams in.
    async fn copy(&self, report: &mut SyncReport) -> Result<TransferSummary, SyncError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let local_dir = report.local_dir.clone();
        let remote_dest = report.remote_dest.clone();
        let lines = &mut report.lines;
        let transferred = &mut report.transferred;

        let copy = self.transfer.copy(&local_dir, &remote_dest, tx);
        let drain = async {
            while let Some(line) = rx.recv().await {
                match &line {
                    TransferLine::Copied(text) => {
                        *transferred += 1;
                        info!("Transferred: {}", text);
                    }
                    TransferLine::Error(text) => warn!("Transfer error: {}", text),
                    TransferLine::Output(text) => info!("{}", text),
                }
                lines.push(line);
            }
        };

        match tokio::time::timeout(self.transfer_timeout, async { tokio::join!(copy, drain).0 }).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::TransferTimeout {
                timeout: self.transfer_timeout,
            }),
        }
    }

    async fn record(&self, report: &SyncReport) {
        let Some(path) = &self.status_file else {
            return;
        };
        if let Err(e) = report.status().save(path).await {
            warn!("Could not record sync status in {}: {}", path.display(), e);
        }
    }
}
