//! Validation of launch specifications.

use daq_common::{ProcessError, ProcessResult};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::info;

/// Check that a launch script exists and is a regular file.
pub fn validate_launch_script(name: &str, path: &Path) -> ProcessResult<()> {
    if path.as_os_str().is_empty() {
        return Err(ProcessError::configuration(name, "Launch script path cannot be empty"));
    }

    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(ProcessError::configuration(
            name,
            format!("{} is not a regular file", path.display()),
        )),
        Err(_) => Err(ProcessError::script_missing(name, path.display().to_string())),
    }
}

/// Make sure a launch script carries the execute bits, adding them if not.
///
/// Returns `true` when the permissions had to be repaired.
pub fn ensure_executable(name: &str, path: &Path) -> ProcessResult<bool> {
    let meta = std::fs::metadata(path)
        .map_err(|_| ProcessError::script_missing(name, path.display().to_string()))?;

    let mut permissions = meta.permissions();
    let mode = permissions.mode();
    if mode & 0o111 == 0o111 {
        return Ok(false);
    }

    permissions.set_mode(mode | 0o111);
    std::fs::set_permissions(path, permissions)
        .map_err(|e| ProcessError::permission_denied(name, format!("{}: {}", path.display(), e)))?;

    info!("Added execute permission to {} ({:o} -> {:o})", path.display(), mode & 0o777, (mode | 0o111) & 0o777);
    Ok(true)
}

/// Validate a process name.
pub fn validate_process_name(name: &str) -> ProcessResult<()> {
    if name.is_empty() {
        return Err(ProcessError::configuration("validation", "Process name cannot be empty"));
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ProcessError::configuration(
            name,
            "Process name can only contain alphanumeric characters, dots, hyphens, and underscores",
        ));
    }

    Ok(())
}
