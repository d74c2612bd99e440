//! Status and statistics shown by the control panel.

use chrono::{DateTime, Local, NaiveTime, Timelike};
use daq_common::{Error, ProcessRole, Result};
use daq_logs::types::human_size;
use daq_logs::LogStream;
use daq_process::{MatchedProcess, ProcessTable};
use daq_sync::SyncStatus;
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Daily window in which the acquisition program records data.
///
/// A window whose end is not after its start crosses midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl OperatingWindow {
    /// Parse two `HH:MM` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |value: &str| {
            NaiveTime::parse_from_str(value.trim(), "%H:%M")
                .map_err(|_| Error::validation(format!("Invalid time '{}', expected HH:MM", value)))
        };
        Ok(Self {
            start: parse(start)?,
            end: parse(end)?,
        })
    }

    /// Whether `time` falls inside the window (minute resolution).
    pub fn contains(&self, time: NaiveTime) -> bool {
        let minutes = |t: NaiveTime| t.hour() * 60 + t.minute();
        let (now, start, end) = (minutes(time), minutes(self.start), minutes(self.end));

        if end <= start {
            now >= start || now < end
        } else {
            now >= start && now < end
        }
    }

    pub fn contains_now(&self) -> bool {
        self.contains(Local::now().time())
    }

    /// e.g. `inside operating window 05:00-18:00`
    pub fn describe_now(&self) -> String {
        let state = if self.contains_now() { "inside" } else { "outside" };
        format!("{} operating window {}", state, self)
    }
}

impl fmt::Display for OperatingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// The newest CSV file in the measurement directory.
#[derive(Debug, Clone)]
pub struct CsvReport {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Data rows, excluding the header line.
    pub rows: u64,
    pub modified: DateTime<Local>,
}

/// Find the most recently modified `.csv` file directly under `dir`.
pub fn newest_csv(dir: &Path) -> Result<Option<CsvReport>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found(dir.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut newest: Option<(PathBuf, std::fs::Metadata, DateTime<Local>)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        let Ok(meta) = entry.metadata() else { continue };
        if !is_csv || !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else { continue };
        let modified = DateTime::<Local>::from(modified);

        if newest.as_ref().map_or(true, |(_, _, best)| modified > *best) {
            newest = Some((path, meta, modified));
        }
    }

    let Some((path, meta, modified)) = newest else {
        return Ok(None);
    };

    let lines = BufReader::new(std::fs::File::open(&path)?)
        .split(b'\n')
        .filter_map(|line| line.ok())
        .filter(|line| !line.is_empty())
        .count() as u64;

    Ok(Some(CsvReport {
        path,
        size_bytes: meta.len(),
        rows: lines.saturating_sub(1),
        modified,
    }))
}

/// Current state of one supervised process.
#[derive(Debug, Clone)]
pub struct ProcessStatus {
    pub name: String,
    pub role: ProcessRole,
    pub matches: Vec<MatchedProcess>,
}

impl ProcessStatus {
    pub fn is_alive(&self) -> bool {
        !self.matches.is_empty()
    }

    /// More than one process matches; identification is unreliable.
    pub fn is_ambiguous(&self) -> bool {
        self.matches.len() > 1
    }
}

/// A supervised process as seen by the status reporter.
#[derive(Debug, Clone)]
pub struct WatchedProcess {
    pub name: String,
    pub role: ProcessRole,
    pub match_pattern: String,
}

/// Builds the status views of the control panel.
pub struct StatusReporter {
    table: Arc<dyn ProcessTable>,
    processes: Vec<WatchedProcess>,
    logs: Vec<(String, LogStream)>,
    measurement_dir: PathBuf,
    sync_status_file: PathBuf,
    window: OperatingWindow,
}

impl StatusReporter {
    pub fn new(
        table: Arc<dyn ProcessTable>,
        processes: Vec<WatchedProcess>,
        logs: Vec<(String, LogStream)>,
        measurement_dir: PathBuf,
        sync_status_file: PathBuf,
        window: OperatingWindow,
    ) -> Self {
        Self {
            table,
            processes,
            logs,
            measurement_dir,
            sync_status_file,
            window,
        }
    }

    pub fn process_statuses(&self) -> Vec<ProcessStatus> {
        self.processes
            .iter()
            .map(|p| ProcessStatus {
                name: p.name.clone(),
                role: p.role,
                matches: self.table.find_matching(&p.match_pattern),
            })
            .collect()
    }

    /// One line per process: state, pids and uptime.
    pub fn render_processes<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for status in self.process_statuses() {
            if !status.is_alive() {
                writeln!(out, "  {:<12} {:<10} STOPPED", status.name, status.role)?;
                continue;
            }

            let details = status
                .matches
                .iter()
                .map(|m| match m.uptime_secs() {
                    Some(secs) => format!("pid {} up {}", m.pid, format_uptime(secs)),
                    None => format!("pid {}", m.pid),
                })
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "  {:<12} {:<10} RUNNING ({})", status.name, status.role, details)?;

            if status.is_ambiguous() {
                writeln!(
                    out,
                    "  WARNING: {} processes match '{}'; identification is ambiguous",
                    status.matches.len(),
                    status.name
                )?;
            }
        }
        Ok(())
    }

    /// Full statistics view.
    pub fn render_stats<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "Schedule: {}", self.window.describe_now())?;
        writeln!(out)?;

        writeln!(out, "Processes:")?;
        self.render_processes(out)?;
        writeln!(out)?;

        writeln!(out, "Logs:")?;
        for (label, stream) in &self.logs {
            match stream.stats() {
                Ok(stats) => {
                    let last = stats
                        .last_entry
                        .map(|ts| ts.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    writeln!(
                        out,
                        "  {:<10} {} | {} lines | {} error/warning lines | last entry {}",
                        label,
                        stats.human_size(),
                        stats.line_count,
                        stats.severity_lines,
                        last
                    )?;
                }
                Err(Error::NotFound { .. }) => {
                    writeln!(out, "  {:<10} not available ({})", label, stream.path().display())?
                }
                Err(e) => writeln!(out, "  {:<10} unreadable: {}", label, e)?,
            }
        }
        writeln!(out)?;

        writeln!(out, "Measurements ({}):", self.measurement_dir.display())?;
        match newest_csv(&self.measurement_dir) {
            Ok(Some(csv)) => {
                let name = csv
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                writeln!(
                    out,
                    "  newest {} | {} | {} rows | modified {}",
                    name,
                    human_size(csv.size_bytes),
                    csv.rows,
                    csv.modified.format("%Y-%m-%d %H:%M:%S")
                )?;
            }
            Ok(None) => writeln!(out, "  no CSV files yet")?,
            Err(Error::NotFound { .. }) => writeln!(out, "  directory not available")?,
            Err(e) => writeln!(out, "  unreadable: {}", e)?,
        }
        writeln!(out)?;

        writeln!(out, "Last sync:")?;
        match SyncStatus::load(&self.sync_status_file) {
            Ok(Some(status)) => {
                writeln!(
                    out,
                    "  {} at {} | {} file(s) transferred -> {}",
                    status.outcome.as_str().to_uppercase(),
                    status.finished_at.format("%Y-%m-%d %H:%M:%S"),
                    status.transferred,
                    status.remote_dest
                )?;
                if let Some(message) = status.message {
                    writeln!(out, "  {}", message)?;
                }
            }
            Ok(None) => writeln!(out, "  no sync recorded yet")?,
            Err(e) => {
                debug!("Sync status unreadable: {}", e);
                writeln!(out, "  status unreadable: {}", e)?
            }
        }

        Ok(())
    }
}

/// `3d 04h 12m`, `04h 12m`, `12m 05s`.
pub fn format_uptime(secs: i64) -> String {
    let secs = secs.max(0);
    let (days, hours, minutes, seconds) = (secs / 86_400, secs % 86_400 / 3600, secs % 3600 / 60, secs % 60);
    if days > 0 {
        format!("{}d {:02}h {:02}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{:02}h {:02}m", hours, minutes)
    } else {
        format!("{}m {:02}s", minutes, seconds)
    }
}
