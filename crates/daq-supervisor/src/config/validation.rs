use super::*;
use crate::status::OperatingWindow;
use anyhow::{anyhow, Result};
use daq_process::validate_process_name;

/// Validate the complete configuration
///
/// Launch scripts are not checked here: they are validated right before
/// launching so that `panel` and `sync` work on hosts without them.
pub fn validate_config(config: &SupervisorConfig) -> Result<()> {
    validate_supervisor_options(&config.supervisor)?;
    validate_readiness_config(&config.readiness)?;
    validate_processes_config(&config.processes)?;
    validate_liveness_settings(&config.liveness)?;
    validate_panel_config(&config.panel)?;
    validate_sync_config(&config.sync)?;
    OperatingWindow::parse(&config.schedule.start, &config.schedule.end)?;
    Ok(())
}

fn validate_supervisor_options(options: &SupervisorOptions) -> Result<()> {
    match options.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => {
            return Err(anyhow!(
                "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
                options.log_level
            ))
        }
    }

    if options.autostart_log.as_os_str().is_empty() || options.sync_log.as_os_str().is_empty() {
        return Err(anyhow!("Log file paths cannot be empty"));
    }

    Ok(())
}

fn validate_readiness_config(readiness: &ReadinessConfig) -> Result<()> {
    if readiness.query_command.is_empty() || readiness.query_command[0].trim().is_empty() {
        return Err(anyhow!("Session query command cannot be empty"));
    }
    if readiness.timeout.is_zero() {
        return Err(anyhow!("Readiness timeout must be greater than 0"));
    }
    if readiness.poll_interval.is_zero() {
        return Err(anyhow!("Readiness poll interval must be greater than 0"));
    }
    if readiness.query_timeout.is_zero() {
        return Err(anyhow!("Session query timeout must be greater than 0"));
    }
    Ok(())
}

fn validate_processes_config(processes: &ProcessesConfig) -> Result<()> {
    for spec in [&processes.primary, &processes.companion] {
        validate_process_name(&spec.name)?;
        if spec.match_pattern.trim().is_empty() {
            return Err(anyhow!("Match pattern of process '{}' cannot be empty", spec.name));
        }
        if spec.script.as_os_str().is_empty() {
            return Err(anyhow!("Launch script of process '{}' cannot be empty", spec.name));
        }
    }

    // Liveness is looked up by name and pattern, so both must be unique
    if processes.primary.name == processes.companion.name {
        return Err(anyhow!("Duplicate process name: {}", processes.primary.name));
    }
    if processes.primary.match_pattern == processes.companion.match_pattern {
        return Err(anyhow!(
            "Primary and companion share the match pattern '{}'",
            processes.primary.match_pattern
        ));
    }

    if processes.credentials_file.is_some() && processes.credentials_var.trim().is_empty() {
        return Err(anyhow!("credentials_var is required when credentials_file is set"));
    }

    Ok(())
}

fn validate_liveness_settings(liveness: &LivenessSettings) -> Result<()> {
    if liveness.tick_interval.is_zero() {
        return Err(anyhow!("Liveness tick interval must be greater than 0"));
    }
    if liveness.heartbeat_every == 0 {
        return Err(anyhow!("heartbeat_every must be at least 1"));
    }
    Ok(())
}

fn validate_panel_config(panel: &PanelConfig) -> Result<()> {
    if panel.follow_poll.is_zero() {
        return Err(anyhow!("Live view poll interval must be greater than 0"));
    }
    if panel.recent_lines == 0 || panel.search_limit == 0 {
        return Err(anyhow!("recent_lines and search_limit must be at least 1"));
    }
    Ok(())
}

fn validate_sync_config(sync: &SyncConfig) -> Result<()> {
    if sync.remote_dest.trim().is_empty() {
        return Err(anyhow!("Sync remote destination cannot be empty"));
    }
    if sync.probe_address.trim().is_empty() {
        return Err(anyhow!("Connectivity probe address cannot be empty"));
    }
    if sync.probe_timeout.is_zero() || sync.transfer_timeout.is_zero() {
        return Err(anyhow!("Sync timeouts must be greater than 0"));
    }
    Ok(())
}
