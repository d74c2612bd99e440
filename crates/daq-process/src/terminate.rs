//! Process termination primitives.

use crate::check::{process_exists, ProcessTable};
use daq_common::{ProcessError, ProcessResult};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{info, warn};

/// Send SIGTERM to a process.
///
/// Returns `Ok(false)` when the process had already exited, which is not an
/// error for a termination request.
pub fn terminate_gracefully(pid: u32) -> ProcessResult<bool> {
    if !process_exists(pid)? {
        return Ok(false);
    }

    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        Err(e) => Err(ProcessError::stop_failed(pid.to_string(), e.to_string())),
    }
}

/// Send a termination request to every process matching `pattern`.
///
/// Every match is attempted even if an earlier one fails; the first failure
/// is returned afterwards. Returns the pids that were signaled.
pub fn terminate_matching(table: &dyn ProcessTable, pattern: &str) -> ProcessResult<Vec<u32>> {
    let matches = table.find_matching(pattern);
    if matches.is_empty() {
        info!("No running process matches '{}', nothing to terminate", pattern);
        return Ok(Vec::new());
    }

    let mut signaled = Vec::with_capacity(matches.len());
    let mut first_error = None;

    for matched in matches {
        match table.terminate(matched.pid) {
            Ok(()) => {
                info!(pid = matched.pid, "Sent termination signal to '{}'", matched.command_line);
                signaled.push(matched.pid);
            }
            Err(e) => {
                warn!(pid = matched.pid, error = %e, "Failed to terminate '{}'", matched.command_line);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(signaled),
    }
}
