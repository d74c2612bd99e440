//! Process execution primitives.
//!
//! Supervised processes are started detached: in their own process group,
//! with stdin closed, so they survive the supervisor and never receive the
//! terminal's Ctrl+C.

use daq_common::{ProcessError, ProcessResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Child;
use tracing::debug;

/// How to launch one supervised process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Stable identifier, unique across supervised processes.
    pub name: String,
    /// Substring of the running process's command line used to find it again.
    pub match_pattern: String,
    /// Script or executable to run.
    pub script: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    /// Extra environment, added on top of the inherited one.
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// When set, stdout and stderr are appended to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_log: Option<PathBuf>,
}

impl LaunchSpec {
    /// The launch command as a single printable line.
    pub fn command_line(&self) -> String {
        std::iter::once(self.script.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a successful launch.
#[derive(Debug)]
pub struct LaunchedProcess {
    pub pid: u32,
    /// Owned child handle, kept so the process can be reaped and polled.
    pub child: Option<Child>,
}

/// Something that can start a supervised process.
pub trait Launcher: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> ProcessResult<LaunchedProcess>;
}

/// Launcher that starts real, detached OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedLauncher;

impl Launcher for DetachedLauncher {
    fn launch(&self, spec: &LaunchSpec) -> ProcessResult<LaunchedProcess> {
        let child = spawn_detached(spec)?;
        let pid = child
            .id()
            .ok_or_else(|| ProcessError::spawn_failed(&spec.name, "process exited before its pid was read"))?;
        Ok(LaunchedProcess {
            pid,
            child: Some(child),
        })
    }
}

/// Spawn `spec` in its own process group with stdin closed.
///
/// Must be called from within a tokio runtime.
pub fn spawn_detached(spec: &LaunchSpec) -> ProcessResult<Child> {
    let mut command = std::process::Command::new(&spec.script);
    command
        .args(&spec.args)
        .envs(&spec.environment)
        .stdin(Stdio::null())
        .process_group(0);

    if let Some(dir) = &spec.working_directory {
        command.current_dir(dir);
    }

    match &spec.output_log {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ProcessError::spawn_failed(&spec.name, format!("Failed to create log directory: {}", e))
                })?;
            }
            let stdout = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    ProcessError::spawn_failed(&spec.name, format!("Failed to open {}: {}", path.display(), e))
                })?;
            let stderr = stdout
                .try_clone()
                .map_err(|e| ProcessError::spawn_failed(&spec.name, e.to_string()))?;
            command.stdout(stdout).stderr(stderr);
        }
        None => {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
    }

    debug!("Spawning '{}': {}", spec.name, spec.command_line());

    tokio::process::Command::from(command)
        .spawn()
        .map_err(|e| ProcessError::spawn_failed(&spec.name, e.to_string()))
}
