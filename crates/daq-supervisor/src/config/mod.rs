use anyhow::{Context, Result};
use daq_process::LaunchSpec;
use daq_sync::TransferBackend;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod validation;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/daq-supervisor/config.yaml";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV_VAR: &str = "DAQ_SUPERVISOR_CONFIG";

const DEFAULT_BASE_DIR: &str = "/home/pi/Desktop";

/// Top-level configuration structure
///
/// Every section is optional; omitted values fall back to the paths of the
/// standard deployment under `/home/pi/Desktop`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub supervisor: SupervisorOptions,
    pub readiness: ReadinessConfig,
    pub processes: ProcessesConfig,
    pub liveness: LivenessSettings,
    pub panel: PanelConfig,
    pub sync: SyncConfig,
    pub schedule: ScheduleConfig,
}

/// Where the supervisor writes its own logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorOptions {
    pub log_level: String,
    /// Written by `boot` and by the control panel.
    pub autostart_log: PathBuf,
    /// Written by `sync`.
    pub sync_log: PathBuf,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            autostart_log: base_path("autostart.log"),
            sync_log: base_path("sync.log"),
        }
    }
}

/// Graphical session readiness gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Display to probe; `DISPLAY` from the environment when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    pub query_command: Vec<String>,
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,
    #[serde(with = "duration_serde")]
    pub query_timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            display: None,
            query_command: vec!["xset".to_string(), "q".to_string()],
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// The supervised processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessesConfig {
    /// The acquisition program.
    pub primary: LaunchSpec,
    /// The log viewer observing the primary's output.
    pub companion: LaunchSpec,
    #[serde(with = "duration_serde")]
    pub inter_launch_delay: Duration,
    /// Environment variable through which the acquisition program finds its
    /// credentials file.
    pub credentials_var: String,
    /// Credentials file forwarded in `credentials_var`. Never read here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,
}

impl Default for ProcessesConfig {
    fn default() -> Self {
        Self {
            primary: LaunchSpec {
                name: "acquisition".to_string(),
                match_pattern: "implementacion.py".to_string(),
                script: base_path("start_acquisition.sh"),
                args: Vec::new(),
                working_directory: Some(PathBuf::from(DEFAULT_BASE_DIR)),
                environment: HashMap::new(),
                output_log: Some(base_path("acquisition.log")),
            },
            companion: LaunchSpec {
                name: "log-viewer".to_string(),
                match_pattern: "view_acquisition_log.sh".to_string(),
                script: base_path("view_acquisition_log.sh"),
                args: Vec::new(),
                working_directory: Some(PathBuf::from(DEFAULT_BASE_DIR)),
                environment: HashMap::new(),
                output_log: None,
            },
            inter_launch_delay: Duration::from_secs(10),
            credentials_var: "SOLAR_DAQ_ENV_FILE".to_string(),
            credentials_file: None,
        }
    }
}

impl ProcessesConfig {
    /// Primary launch spec with the credentials override applied.
    pub fn primary_spec(&self) -> LaunchSpec {
        self.with_credentials(&self.primary)
    }

    /// Companion launch spec with the credentials override applied.
    pub fn companion_spec(&self) -> LaunchSpec {
        self.with_credentials(&self.companion)
    }

    fn with_credentials(&self, spec: &LaunchSpec) -> LaunchSpec {
        let mut spec = spec.clone();
        if let Some(file) = &self.credentials_file {
            spec.environment
                .entry(self.credentials_var.clone())
                .or_insert_with(|| file.display().to_string());
        }
        spec
    }

    /// The live-output log of the primary.
    pub fn live_log(&self) -> PathBuf {
        self.primary
            .output_log
            .clone()
            .unwrap_or_else(|| base_path("acquisition.log"))
    }
}

/// Liveness monitor timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessSettings {
    #[serde(with = "duration_serde")]
    pub tick_interval: Duration,
    /// Heartbeat summary every this many ticks.
    pub heartbeat_every: u32,
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            heartbeat_every: 5,
        }
    }
}

/// Interactive control panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub recent_lines: usize,
    pub search_limit: usize,
    /// Lines shown before following the live log.
    pub live_backlog: usize,
    #[serde(with = "duration_serde")]
    pub follow_poll: Duration,
    /// Wait between terminating the primary and relaunching it.
    #[serde(with = "duration_serde")]
    pub restart_grace: Duration,
    /// Autostart entrypoint used by `restart`; this binary's `boot` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<PathBuf>,
    pub entrypoint_args: Vec<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            recent_lines: 50,
            search_limit: 20,
            live_backlog: 20,
            follow_poll: Duration::from_millis(500),
            restart_grace: Duration::from_secs(3),
            entrypoint: None,
            entrypoint_args: Vec::new(),
        }
    }
}

/// Sync watchdog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub local_dir: PathBuf,
    pub remote_dest: String,
    pub backend: TransferBackend,
    pub probe_address: String,
    #[serde(with = "duration_serde")]
    pub probe_timeout: Duration,
    #[serde(with = "duration_serde")]
    pub transfer_timeout: Duration,
    pub rclone_binary: PathBuf,
    pub rclone_args: Vec<String>,
    /// Last-run status, shown by the control panel.
    pub status_file: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_dir: base_path("Mediciones"),
            remote_dest: "gdrive:Mediciones".to_string(),
            backend: TransferBackend::Auto,
            probe_address: "8.8.8.8:53".to_string(),
            probe_timeout: Duration::from_secs(5),
            transfer_timeout: Duration::from_secs(30 * 60),
            rclone_binary: PathBuf::from("rclone"),
            rclone_args: Vec::new(),
            status_file: base_path("last_sync.json"),
        }
    }
}

/// Operating window of the acquisition program (24h `HH:MM`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub start: String,
    pub end: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            start: "05:00".to_string(),
            end: "18:00".to_string(),
        }
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The file did not exist; built-in defaults are in use.
    Defaults(PathBuf),
}

impl SupervisorConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        // An empty document means "all defaults"
        let config: SupervisorConfig = if content.trim().is_empty() {
            SupervisorConfig::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the defaults if it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, ConfigSource)> {
        let path = path.as_ref();
        if path.exists() {
            Ok((Self::load_from_file(path)?, ConfigSource::File(path.to_path_buf())))
        } else {
            let config = SupervisorConfig::default();
            config.validate()?;
            Ok((config, ConfigSource::Defaults(path.to_path_buf())))
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

fn base_path(file: &str) -> PathBuf {
    Path::new(DEFAULT_BASE_DIR).join(file)
}

// Durations are written as "500ms", "10s", "5m" or "1h"
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let invalid = || format!("Invalid duration: {}", s);

        // Check for "ms" BEFORE "s" since "ms" ends with 's'
        if let Some(num) = s.strip_suffix("ms") {
            num.trim().parse().map(Duration::from_millis).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('s') {
            num.trim().parse().map(Duration::from_secs).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('m') {
            scaled(num, 60).ok_or_else(invalid)
        } else if let Some(num) = s.strip_suffix('h') {
            scaled(num, 3600).ok_or_else(invalid)
        } else {
            Err(format!("Duration must end with 'ms', 's', 'm' or 'h': {}", s))
        }
    }

    /// `num` units of `secs_per_unit` seconds, `None` on garbage or overflow.
    fn scaled(num: &str, secs_per_unit: u64) -> Option<Duration> {
        let units: u64 = num.trim().parse().ok()?;
        units.checked_mul(secs_per_unit).map(Duration::from_secs)
    }
}
