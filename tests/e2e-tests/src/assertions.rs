//! Custom assertions and process helpers for E2E tests

use crate::log_parser::LogParser;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::path::Path;

/// Assert that a log file contains `pattern`
pub fn assert_log_contains(path: &Path, pattern: &str) -> Result<(), String> {
    let parser = LogParser::from_file(path);
    if parser.contains(pattern) {
        Ok(())
    } else {
        Err(format!(
            "'{}' not found in {}. Log:\n{:#?}",
            pattern,
            path.display(),
            parser.lines()
        ))
    }
}

/// Assert that no line of a log file contains `pattern`
pub fn assert_log_lacks(path: &Path, pattern: &str) -> Result<(), String> {
    let parser = LogParser::from_file(path);
    match parser.lines().iter().find(|line| line.contains(pattern)) {
        None => Ok(()),
        Some(line) => Err(format!("Unexpected '{}' in {}: {}", pattern, path.display(), line)),
    }
}

/// Every line of the file must use the `YYYY-MM-DD HH:MM:SS - LEVEL - ` layout
pub fn assert_log_format(path: &Path) -> Result<(), String> {
    let parser = LogParser::from_file(path);
    if parser.lines().is_empty() {
        return Err(format!("{} is empty", path.display()));
    }
    let parsed = parser.entries().len();
    if parsed == parser.lines().len() {
        Ok(())
    } else {
        Err(format!(
            "{} of {} lines in {} are not in log file format",
            parser.lines().len() - parsed,
            parser.lines().len(),
            path.display()
        ))
    }
}

/// Read a pid written by a test script
pub fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Running and not a zombie (orphans may never be reaped inside containers)
pub fn is_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return true;
    };
    // pid (comm) state ...
    stat.rsplit_once(')')
        .map(|(_, rest)| rest.trim_start().chars().next() != Some('Z'))
        .unwrap_or(true)
}

pub fn signal(pid: u32, sig: Signal) {
    let _ = signal::kill(Pid::from_raw(pid as i32), sig);
}

/// Kill a launched process and everything in its process group
pub fn kill_group(pid: u32) {
    let _ = signal::killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
}
