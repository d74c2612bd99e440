//! # DAQ Supervisor
//!
//! Supervision of the acquisition process on a single host:
//!
//! - [`BootSequence`] - readiness gate, ordered launch, background liveness
//! - [`Orchestrator`] - fail-fast, single-instance launch of primary and companion
//! - [`ProcessRegistry`] - owned process handles keyed by role, with
//!   name-matching reconciliation
//! - [`ControlPanel`] - interactive menu for inspection, stop and restart
//! - [`StatusReporter`] - process, log, measurement and sync statistics
//!
//! Configuration is loaded from YAML ([`SupervisorConfig`]); every value has
//! a default matching the standard deployment.

pub mod boot;
pub mod config;
pub mod orchestrator;
pub mod panel;
pub mod registry;
pub mod status;

pub use boot::{BootSequence, Booted};
pub use config::{
    ConfigSource, LivenessSettings, PanelConfig, ProcessesConfig, ReadinessConfig, ScheduleConfig,
    SupervisorConfig, SupervisorOptions, SyncConfig, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH,
};
pub use orchestrator::{LaunchedPair, Orchestrator};
pub use panel::{ControlCommand, ControlPanel, CtrlC, Interrupt, PrimaryControl, SystemPrimaryControl};
pub use registry::{Liveness, ProcessRegistry, SharedRegistry};
pub use status::{newest_csv, CsvReport, OperatingWindow, ProcessStatus, StatusReporter, WatchedProcess};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
