//! Log output: file format and subscriber setup

use chrono::Local;
use daq_common::{format_log_timestamp, Error, Result, ResultExt};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Event format for log files: `YYYY-MM-DD HH:MM:SS - LEVEL - message fields`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLineFormat;

impl<S, N> FormatEvent<S, N> for LogLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            format_log_timestamp(&Local::now()),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Open a log file for appending, creating parent directories if needed.
pub fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(Error::from)
                .context(format!("Failed to create log directory {}", parent.display()))?;
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(Error::from)
        .context(format!("Failed to open log file {}", path.display()))
}

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Default filter directive when `RUST_LOG` is not set.
    pub level: String,
    /// Log file written in [`LogLineFormat`].
    pub file: Option<PathBuf>,
    /// Also log human-readable lines to stderr.
    pub console: bool,
}

/// Install the global `tracing` subscriber.
pub fn init_logging(options: &LoggingOptions) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.level));

    let file_layer = match &options.file {
        Some(path) => {
            let file = open_append(path)?;
            Some(
                fmt::layer()
                    .event_format(LogLineFormat)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let console_layer = options.console.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to initialize logging: {}", e)))
}
