//! Control Panel - interactive text menu over the supervised processes
//!
//! Reads one numeric choice per line. Read commands only look at log files
//! and the process table; `restart` and `stop` signal the primary by name.
//! Leaving the panel never touches the supervised processes.

use crate::config::PanelConfig;
use crate::status::StatusReporter;
use async_trait::async_trait;
use daq_common::{Error, ProcessResult};
use daq_logs::LogStream;
use daq_process::{terminate_matching, LaunchSpec, Launcher, ProcessTable};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Operator intent selected from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    ViewLive,
    ViewRecent,
    SearchErrors,
    ShowStats,
    ViewAutostartLog,
    Restart,
    Stop,
    Refresh,
    Exit,
}

impl ControlCommand {
    pub const ALL: [ControlCommand; 9] = [
        ControlCommand::ViewLive,
        ControlCommand::ViewRecent,
        ControlCommand::SearchErrors,
        ControlCommand::ShowStats,
        ControlCommand::ViewAutostartLog,
        ControlCommand::Restart,
        ControlCommand::Stop,
        ControlCommand::Refresh,
        ControlCommand::Exit,
    ];

    /// Menu key, 1-9.
    pub fn key(self) -> u8 {
        match self {
            ControlCommand::ViewLive => 1,
            ControlCommand::ViewRecent => 2,
            ControlCommand::SearchErrors => 3,
            ControlCommand::ShowStats => 4,
            ControlCommand::ViewAutostartLog => 5,
            ControlCommand::Restart => 6,
            ControlCommand::Stop => 7,
            ControlCommand::Refresh => 8,
            ControlCommand::Exit => 9,
        }
    }

    pub fn from_key(input: &str) -> Option<Self> {
        let key: u8 = input.trim().parse().ok()?;
        Self::ALL.into_iter().find(|cmd| cmd.key() == key)
    }

    pub fn label(self) -> &'static str {
        match self {
            ControlCommand::ViewLive => "View live output (Ctrl+C to return)",
            ControlCommand::ViewRecent => "View recent output",
            ControlCommand::SearchErrors => "Search recent errors",
            ControlCommand::ShowStats => "Show statistics",
            ControlCommand::ViewAutostartLog => "View autostart log",
            ControlCommand::Restart => "Restart acquisition",
            ControlCommand::Stop => "Stop acquisition",
            ControlCommand::Refresh => "Refresh status",
            ControlCommand::Exit => "Exit (processes keep running)",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}) {}", self.key(), self.label())
    }
}

/// Stop and relaunch authority over the primary.
#[async_trait]
pub trait PrimaryControl: Send + Sync {
    /// Signal every process matching the primary; returns the pids signalled.
    async fn terminate_primary(&self) -> ProcessResult<Vec<u32>>;

    /// Pids of primaries currently running.
    async fn running_primary(&self) -> Vec<u32>;

    /// Start the autostart entrypoint in the background; returns its pid.
    async fn relaunch(&self) -> ProcessResult<u32>;
}

/// [`PrimaryControl`] over the real process table.
pub struct SystemPrimaryControl {
    table: Arc<dyn ProcessTable>,
    primary_pattern: String,
    launcher: Arc<dyn Launcher>,
    entrypoint: LaunchSpec,
}

impl SystemPrimaryControl {
    pub fn new(
        table: Arc<dyn ProcessTable>,
        primary_pattern: impl Into<String>,
        launcher: Arc<dyn Launcher>,
        entrypoint: LaunchSpec,
    ) -> Self {
        Self {
            table,
            primary_pattern: primary_pattern.into(),
            launcher,
            entrypoint,
        }
    }
}

#[async_trait]
impl PrimaryControl for SystemPrimaryControl {
    async fn terminate_primary(&self) -> ProcessResult<Vec<u32>> {
        terminate_matching(self.table.as_ref(), &self.primary_pattern)
    }

    async fn running_primary(&self) -> Vec<u32> {
        self.table
            .find_matching(&self.primary_pattern)
            .into_iter()
            .map(|m| m.pid)
            .collect()
    }

    async fn relaunch(&self) -> ProcessResult<u32> {
        // The child handle is dropped; the entrypoint outlives the panel
        Ok(self.launcher.launch(&self.entrypoint)?.pid)
    }
}

/// Something that resolves when the operator interrupts a blocking view.
#[async_trait]
pub trait Interrupt: Send + Sync {
    async fn wait(&self);
}

/// Ctrl+C from the terminal.
pub struct CtrlC;

#[async_trait]
impl Interrupt for CtrlC {
    async fn wait(&self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// The interactive menu loop.
pub struct ControlPanel<R, W> {
    settings: PanelConfig,
    control: Arc<dyn PrimaryControl>,
    status: StatusReporter,
    live_log: LogStream,
    autostart_log: LogStream,
    interrupt: Arc<dyn Interrupt>,
    input: R,
    output: W,
}

impl<R, W> ControlPanel<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: PanelConfig,
        control: Arc<dyn PrimaryControl>,
        status: StatusReporter,
        live_log: LogStream,
        autostart_log: LogStream,
        interrupt: Arc<dyn Interrupt>,
        input: R,
        output: W,
    ) -> Self {
        Self {
            settings,
            control,
            status,
            live_log,
            autostart_log,
            interrupt,
            input,
            output,
        }
    }

    /// Run until `exit` or end of input.
    pub async fn run(&mut self) -> std::io::Result<()> {
        info!("Control panel opened");
        loop {
            self.render_menu()?;

            let mut line = String::new();
            if self.input.read_line(&mut line).await? == 0 {
                writeln!(self.output)?;
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let Some(command) = ControlCommand::from_key(&line) else {
                writeln!(self.output, "Invalid option '{}', choose 1-9", line.trim())?;
                continue;
            };

            if !self.execute(command).await? {
                break;
            }
        }

        writeln!(self.output, "Control panel closed; supervised processes keep running")?;
        self.output.flush()?;
        info!("Control panel closed");
        Ok(())
    }

    fn render_menu(&mut self) -> std::io::Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "=== DAQ control panel ===")?;
        self.status.render_processes(&mut self.output)?;
        writeln!(self.output)?;
        for command in ControlCommand::ALL {
            writeln!(self.output, "  {}", command)?;
        }
        write!(self.output, "Choice: ")?;
        self.output.flush()
    }

    /// Execute one command; `false` means the panel should close.
    pub async fn execute(&mut self, command: ControlCommand) -> std::io::Result<bool> {
        match command {
            ControlCommand::ViewLive => self.view_live().await?,
            ControlCommand::ViewRecent => {
                let stream = self.live_log.clone();
                self.show_recent(&stream, "Live output").await?
            }
            ControlCommand::SearchErrors => self.search_errors()?,
            ControlCommand::ShowStats => self.status.render_stats(&mut self.output)?,
            ControlCommand::ViewAutostartLog => {
                let stream = self.autostart_log.clone();
                self.show_recent(&stream, "Autostart log").await?
            }
            ControlCommand::Restart => self.restart().await?,
            ControlCommand::Stop => self.stop().await?,
            ControlCommand::Refresh => self.status.render_processes(&mut self.output)?,
            ControlCommand::Exit => return Ok(false),
        }
        self.output.flush()?;
        Ok(true)
    }

    fn not_available(&mut self, what: &str, stream: &LogStream) -> std::io::Result<()> {
        writeln!(
            self.output,
            "{} not available yet ({} does not exist)",
            what,
            stream.path().display()
        )
    }

    async fn view_live(&mut self) -> std::io::Result<()> {
        if !self.live_log.exists() {
            let stream = self.live_log.clone();
            return self.not_available("Live output", &stream);
        }

        writeln!(self.output, "--- following {} (Ctrl+C to return) ---", self.live_log.path().display())?;

        let cancel = CancellationToken::new();
        let result = {
            let follow = self.live_log.follow(
                self.settings.live_backlog,
                &mut self.output,
                self.settings.follow_poll,
                cancel.clone(),
            );
            tokio::pin!(follow);

            tokio::select! {
                result = &mut follow => result,
                _ = self.interrupt.wait() => {
                    cancel.cancel();
                    follow.await
                }
            }
        };

        writeln!(self.output)?;
        writeln!(self.output, "--- back to menu ---")?;
        if let Err(e) = result {
            warn!("Live view ended: {}", e);
            writeln!(self.output, "Live view ended: {}", e)?;
        }
        Ok(())
    }

    async fn show_recent(&mut self, stream: &LogStream, what: &str) -> std::io::Result<()> {
        match stream.recent_lines(self.settings.recent_lines) {
            Ok(lines) if lines.is_empty() => writeln!(self.output, "{} is empty", what),
            Ok(lines) => {
                writeln!(self.output, "--- last {} line(s) of {} ---", lines.len(), what)?;
                for line in lines {
                    writeln!(self.output, "{}", line)?;
                }
                Ok(())
            }
            Err(Error::NotFound { .. }) => self.not_available(what, stream),
            Err(e) => writeln!(self.output, "Cannot read {}: {}", what, e),
        }
    }

    fn search_errors(&mut self) -> std::io::Result<()> {
        match self.live_log.search(self.settings.search_limit) {
            Ok(hits) if hits.is_empty() => writeln!(self.output, "No error lines found"),
            Ok(hits) => {
                writeln!(self.output, "--- {} most recent error line(s) ---", hits.len())?;
                for line in hits {
                    writeln!(self.output, "{}", line)?;
                }
                Ok(())
            }
            Err(Error::NotFound { .. }) => {
                let stream = self.live_log.clone();
                self.not_available("Live output", &stream)
            }
            Err(e) => writeln!(self.output, "Cannot search live output: {}", e),
        }
    }

    async fn restart(&mut self) -> std::io::Result<()> {
        info!("Restart requested from control panel");
        match self.control.terminate_primary().await {
            Ok(pids) if pids.is_empty() => writeln!(self.output, "Acquisition was not running")?,
            Ok(pids) => writeln!(self.output, "Sent termination signal to pid(s) {:?}", pids)?,
            Err(e) => {
                error!("Restart aborted, could not signal the primary: {}", e);
                writeln!(self.output, "Restart aborted: {}", e)?;
                return Ok(());
            }
        }

        writeln!(self.output, "Waiting {:?} before relaunch...", self.settings.restart_grace)?;
        self.output.flush()?;
        tokio::time::sleep(self.settings.restart_grace).await;

        let survivors = self.control.running_primary().await;
        if !survivors.is_empty() {
            error!(
                "Restart aborted, acquisition still running as pid(s) {:?} after {:?}",
                survivors, self.settings.restart_grace
            );
            return writeln!(
                self.output,
                "Restart aborted: acquisition still running as pid(s) {:?}",
                survivors
            );
        }

        match self.control.relaunch().await {
            Ok(pid) => {
                info!("Autostart entrypoint relaunched (pid {})", pid);
                writeln!(
                    self.output,
                    "Restarted (entrypoint pid {}); use Refresh to confirm",
                    pid
                )
            }
            Err(e) => {
                error!("Relaunch failed: {}", e);
                writeln!(self.output, "Relaunch failed: {}", e)
            }
        }
    }

    async fn stop(&mut self) -> std::io::Result<()> {
        info!("Stop requested from control panel");
        match self.control.terminate_primary().await {
            Ok(pids) if pids.is_empty() => writeln!(self.output, "Acquisition was not running"),
            Ok(pids) => {
                info!("Stop signal sent to pid(s) {:?}", pids);
                writeln!(self.output, "Sent termination signal to pid(s) {:?}", pids)
            }
            Err(e) => {
                error!("Stop failed: {}", e);
                writeln!(self.output, "Stop failed: {}", e)
            }
        }
    }
}
