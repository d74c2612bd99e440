// E2E test framework for the DAQ supervisor

pub mod assertions;
pub mod log_parser;
pub mod supervisor;

pub use log_parser::LogParser;
pub use supervisor::{SupervisorRun, TestConfig, TestStation};

use std::env;
use std::path::PathBuf;

/// Overrides where the `daq-supervisor` binary is looked up.
pub const SUPERVISOR_BIN_VAR: &str = "DAQ_SUPERVISOR_BIN";

/// Path of the `daq-supervisor` binary next to the test executable.
pub fn get_supervisor_path() -> PathBuf {
    if let Ok(path) = env::var(SUPERVISOR_BIN_VAR) {
        let path = PathBuf::from(path);
        if !path.exists() {
            panic!("{} points to a missing binary: {}", SUPERVISOR_BIN_VAR, path.display());
        }
        return path;
    }

    let mut path = env::current_exe()
        .expect("Failed to get current exe path")
        .parent()
        .expect("Failed to get parent dir")
        .to_path_buf();

    // If we're in deps/, go up one level
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("daq-supervisor");

    if !path.exists() {
        panic!(
            "daq-supervisor binary not found at: {} (run cargo build --workspace first)",
            path.display()
        );
    }
    path
}
