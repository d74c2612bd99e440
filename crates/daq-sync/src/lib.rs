//! # DAQ Sync
//!
//! The Sync Watchdog: one externally scheduled pass that
//!
//! 1. checks that the network is reachable ([`ConnectivityProbe`]),
//! 2. copies new or changed files from the local output directory to the
//!    remote destination ([`Transfer`]), never deleting anything remotely,
//! 3. logs every transferred file and a final summary.
//!
//! Each run is independent. Convergence comes from the transfer's own
//! copy-if-new-or-changed rule; the [`SyncStatus`] file written after each
//! run is informational only.

pub mod connectivity;
pub mod error;
pub mod status;
pub mod transfer;
pub mod watchdog;

pub use connectivity::{ConnectivityProbe, TcpConnectivityProbe};
pub use error::{SyncError, SyncResult};
pub use status::SyncStatus;
pub use transfer::{
    select_transfer, FilesystemTransfer, RcloneTransfer, Transfer, TransferBackend, TransferLine,
    TransferSummary,
};
pub use watchdog::{SyncOutcome, SyncPhase, SyncReport, SyncWatchdog};
