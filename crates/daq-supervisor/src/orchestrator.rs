//! Process Orchestrator - ordered, fail-fast launch of primary and companion.

use crate::registry::SharedRegistry;
use chrono::Local;
use daq_common::{format_log_timestamp, ProcessError, ProcessHandle, ProcessResult, ProcessRole};
use daq_process::{ensure_executable, validate_launch_script, LaunchSpec, Launcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Pids of a completed launch sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedPair {
    pub primary: u32,
    pub companion: u32,
    /// The companion was already running and was left alone.
    pub companion_reused: bool,
}

pub struct Orchestrator {
    launcher: Arc<dyn Launcher>,
    registry: SharedRegistry,
}

impl Orchestrator {
    pub fn new(launcher: Arc<dyn Launcher>, registry: SharedRegistry) -> Self {
        Self { launcher, registry }
    }

    /// Launch `primary`, wait `inter_launch_delay`, then launch `companion`.
    ///
    /// Both scripts are checked (and their execute bits repaired) before
    /// anything starts. Refuses to launch while a primary is alive. A
    /// companion that is already running is kept rather than duplicated. If
    /// the companion cannot be started the new primary is terminated again.
    pub async fn launch_sequence(
        &self,
        primary: &LaunchSpec,
        companion: &LaunchSpec,
        inter_launch_delay: Duration,
    ) -> ProcessResult<LaunchedPair> {
        for spec in [primary, companion] {
            validate_launch_script(&spec.name, &spec.script)?;
        }
        for spec in [primary, companion] {
            ensure_executable(&spec.name, &spec.script)?;
        }

        let running = self.registry.liveness(ProcessRole::Primary).pids();
        if !running.is_empty() {
            warn!(
                "Refusing to launch '{}': already running as pid(s) {:?}",
                primary.name, running
            );
            return Err(ProcessError::already_running(&primary.name, running));
        }

        let primary_pid = self.launch(ProcessRole::Primary, primary)?;

        if !inter_launch_delay.is_zero() {
            info!(
                "Waiting {:?} before launching '{}'",
                inter_launch_delay, companion.name
            );
            tokio::time::sleep(inter_launch_delay).await;
        }

        let existing = self.registry.liveness(ProcessRole::Companion).pids();
        if let Some(pid) = existing.first() {
            info!(
                "Companion '{}' already running (pid {}), not launching another",
                companion.name, pid
            );
            return Ok(LaunchedPair {
                primary: primary_pid,
                companion: *pid,
                companion_reused: true,
            });
        }

        let companion_pid = match self.launch(ProcessRole::Companion, companion) {
            Ok(pid) => pid,
            Err(e) => {
                error!(
                    "Failed to launch '{}', stopping '{}' (pid {}): {}",
                    companion.name, primary.name, primary_pid, e
                );
                if let Err(stop) = self.registry.terminate(ProcessRole::Primary) {
                    warn!("Could not stop '{}' (pid {}): {}", primary.name, primary_pid, stop);
                }
                return Err(e);
            }
        };
        Ok(LaunchedPair {
            primary: primary_pid,
            companion: companion_pid,
            companion_reused: false,
        })
    }

    fn launch(&self, role: ProcessRole, spec: &LaunchSpec) -> ProcessResult<u32> {
        let launched = self.launcher.launch(spec)?;
        let handle = ProcessHandle {
            name: spec.name.clone(),
            role,
            command: spec.command_line(),
            working_directory: spec.working_directory.clone(),
            started_at: Local::now(),
            pid: launched.pid,
        };

        info!(
            process = %spec.name,
            pid = launched.pid,
            "Launched {} '{}' at {} (pid {}): {}",
            role,
            spec.name,
            format_log_timestamp(&handle.started_at),
            launched.pid,
            handle.command
        );

        self.registry.register(handle, launched.child);
        Ok(launched.pid)
    }
}
