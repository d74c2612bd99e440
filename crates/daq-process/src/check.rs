//! Process existence checking and discovery.
//!
//! Supervised processes are found again by matching a recognizable
//! substring of their command line. This is the reconciliation path used
//! whenever no live handle is held (the control panel runs as a separate
//! process, and the supervisor itself may have been restarted).

use chrono::{DateTime, Local, TimeZone};
use daq_common::{ProcessError, ProcessResult};
use parking_lot::Mutex;
use sysinfo::{Pid, PidExt, ProcessExt, ProcessStatus, System, SystemExt};
use tracing::debug;

/// A running process whose command line matched a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedProcess {
    pub pid: u32,
    pub command_line: String,
    pub started_at: Option<DateTime<Local>>,
}

impl MatchedProcess {
    /// Seconds since the process started, when the start time is known.
    pub fn uptime_secs(&self) -> Option<i64> {
        self.started_at
            .map(|started| Local::now().signed_duration_since(started).num_seconds().max(0))
    }
}

/// View of the host process table.
///
/// Implemented over `sysinfo` + signals for production and by test doubles
/// in unit tests.
pub trait ProcessTable: Send + Sync {
    /// All live (non-zombie) processes whose command line contains `pattern`,
    /// excluding the calling process.
    fn find_matching(&self, pattern: &str) -> Vec<MatchedProcess>;

    /// Send a termination request to `pid`.
    fn terminate(&self, pid: u32) -> ProcessResult<()>;
}

/// Process table backed by `/proc` (through `sysinfo`).
pub struct SystemProcessTable {
    system: Mutex<System>,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn find_matching(&self, pattern: &str) -> Vec<MatchedProcess> {
        if pattern.is_empty() {
            return Vec::new();
        }

        let own_pid = Pid::from_u32(std::process::id());
        let mut system = self.system.lock();
        system.refresh_processes();

        let mut matches: Vec<MatchedProcess> = system
            .processes()
            .iter()
            .filter(|(pid, _)| **pid != own_pid)
            .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
            .filter_map(|(pid, process)| {
                let command_line = if process.cmd().is_empty() {
                    process.name().to_string()
                } else {
                    process.cmd().join(" ")
                };
                if !command_line.contains(pattern) {
                    return None;
                }
                Some(MatchedProcess {
                    pid: pid.as_u32(),
                    command_line,
                    started_at: Local.timestamp_opt(process.start_time() as i64, 0).single(),
                })
            })
            .collect();

        matches.sort_by_key(|m| m.pid);
        debug!("Pattern '{}' matched {} process(es)", pattern, matches.len());
        matches
    }

    fn terminate(&self, pid: u32) -> ProcessResult<()> {
        crate::terminate_gracefully(pid).map(|_| ())
    }
}

/// Check if a process with the given PID exists and is running.
///
/// Uses `kill(pid, 0)`, which sends no signal but reports whether the
/// process exists.
///
/// # Returns
///
/// * `Ok(true)` - Process exists
/// * `Ok(false)` - Process does not exist
/// * `Err(_)` - Error occurred while checking
pub fn process_exists(pid: u32) -> ProcessResult<bool> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid as NixPid;

    match kill(NixPid::from_raw(pid as i32), None) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        Err(nix::errno::Errno::EPERM) => Ok(true), // Exists but owned by someone else
        Err(e) => Err(ProcessError::lookup_failed(
            pid.to_string(),
            format!("Failed to check process: {}", e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_exists() {
        let current_pid = std::process::id();
        assert!(process_exists(current_pid).unwrap());
    }

    #[test]
    fn test_system_process() {
        // PID 1 (init/systemd) always exists
        assert!(process_exists(1).unwrap());
    }

    #[test]
    fn test_empty_pattern_matches_nothing() {
        let table = SystemProcessTable::new();
        assert!(table.find_matching("").is_empty());
    }

    #[test]
    fn test_own_process_is_excluded() {
        let table = SystemProcessTable::new();
        let own_exe = std::env::current_exe().unwrap();
        let own_name = own_exe.file_name().unwrap().to_string_lossy().to_string();

        let matches = table.find_matching(&own_name);
        assert!(matches.iter().all(|m| m.pid != std::process::id()));
    }

    #[tokio::test]
    async fn test_finds_spawned_process_by_pattern() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        let table = SystemProcessTable::new();
        let matches = table.find_matching("sleep 30");
        assert!(matches.iter().any(|m| m.pid == pid));

        child.kill().await.unwrap();
    }
}
