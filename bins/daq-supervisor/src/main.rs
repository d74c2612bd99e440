use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use daq_logs::{init_logging, LogStream, LoggingOptions};
use daq_monitoring::DisplaySessionProbe;
use daq_process::{DetachedLauncher, LaunchSpec, SystemProcessTable};
use daq_supervisor::{
    BootSequence, ConfigSource, ControlPanel, CtrlC, OperatingWindow, StatusReporter,
    SupervisorConfig, SystemPrimaryControl, WatchedProcess, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH,
};
use daq_sync::{select_transfer, RcloneTransfer, SyncWatchdog, TcpConnectivityProbe};

/// Supervisor for the solar DAQ station
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE", env = CONFIG_ENV_VAR, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wait for the graphical session, launch the acquisition program and
    /// its log viewer, then watch them (default)
    Boot,
    /// Interactive control panel
    Panel,
    /// Copy new measurement files to the remote destination once
    Sync {
        /// Local measurement directory (overrides config)
        #[arg(value_name = "LOCAL_DIR")]
        local_dir: Option<PathBuf>,
        /// Remote destination, e.g. `gdrive:Mediciones` (overrides config)
        #[arg(value_name = "REMOTE_DEST")]
        remote_dest: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // clap exits with 2 on usage errors, which sync reserves for "offline"
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return Ok(if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            });
        }
    };
    let (config, source) = SupervisorConfig::load_or_default(&args.config)?;
    let command = args.command.unwrap_or(Command::Boot);

    let level = if args.debug {
        "debug".to_string()
    } else {
        config.supervisor.log_level.clone()
    };
    let (log_file, console) = match command {
        Command::Boot => (&config.supervisor.autostart_log, true),
        Command::Panel => (&config.supervisor.autostart_log, false),
        Command::Sync { .. } => (&config.supervisor.sync_log, true),
    };
    initialize_logging(&level, log_file, console);

    match &source {
        ConfigSource::File(path) => info!("Configuration loaded from {}", path.display()),
        ConfigSource::Defaults(path) => {
            info!("No configuration at {}, using defaults", path.display())
        }
    }

    match command {
        Command::Boot => boot(config).await,
        Command::Panel => panel(config, &args.config).await,
        Command::Sync {
            local_dir,
            remote_dest,
        } => sync(config, local_dir, remote_dest).await,
    }
}

fn initialize_logging(level: &str, file: &Path, console: bool) {
    let options = LoggingOptions {
        level: level.to_string(),
        file: Some(file.to_path_buf()),
        console,
    };
    if let Err(e) = init_logging(&options) {
        eprintln!("Cannot log to {}: {}; logging to the console only", file.display(), e);
        let fallback = LoggingOptions {
            file: None,
            console: true,
            ..options
        };
        if let Err(e) = init_logging(&fallback) {
            eprintln!("Logging disabled: {}", e);
        }
    }
}

async fn boot(config: SupervisorConfig) -> Result<ExitCode> {
    info!("Starting DAQ supervisor {}", daq_supervisor::VERSION);

    let readiness = &config.readiness;
    let session = Arc::new(DisplaySessionProbe::new(
        readiness.display.clone(),
        readiness.query_command.clone(),
        readiness.query_timeout,
    ));
    let boot = BootSequence::new(
        config,
        session,
        Arc::new(DetachedLauncher),
        Arc::new(SystemProcessTable::new()),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    match boot.run(cancel).await {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("Boot failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn panel(config: SupervisorConfig, config_path: &Path) -> Result<ExitCode> {
    let table = Arc::new(SystemProcessTable::new());
    let window = OperatingWindow::parse(&config.schedule.start, &config.schedule.end)?;
    let processes = &config.processes;

    let control = SystemPrimaryControl::new(
        table.clone(),
        processes.primary.match_pattern.clone(),
        Arc::new(DetachedLauncher),
        entrypoint(&config, config_path)?,
    );

    let live_log = LogStream::new(processes.live_log());
    let autostart_log = LogStream::new(&config.supervisor.autostart_log);
    let status = StatusReporter::new(
        table,
        vec![
            WatchedProcess {
                name: processes.primary.name.clone(),
                role: daq_common::ProcessRole::Primary,
                match_pattern: processes.primary.match_pattern.clone(),
            },
            WatchedProcess {
                name: processes.companion.name.clone(),
                role: daq_common::ProcessRole::Companion,
                match_pattern: processes.companion.match_pattern.clone(),
            },
        ],
        vec![
            ("live".to_string(), live_log.clone()),
            ("autostart".to_string(), autostart_log.clone()),
            ("sync".to_string(), LogStream::new(&config.supervisor.sync_log)),
        ],
        config.sync.local_dir.clone(),
        config.sync.status_file.clone(),
        window,
    );

    let mut panel = ControlPanel::new(
        config.panel.clone(),
        Arc::new(control),
        status,
        live_log,
        autostart_log,
        Arc::new(CtrlC),
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    );
    panel.run().await.context("Control panel I/O failed")?;
    Ok(ExitCode::SUCCESS)
}

/// What `restart` launches: the configured entrypoint, or this binary's `boot`.
fn entrypoint(config: &SupervisorConfig, config_path: &Path) -> Result<LaunchSpec> {
    let (script, args) = match &config.panel.entrypoint {
        Some(path) => (path.clone(), config.panel.entrypoint_args.clone()),
        None => {
            let exe = std::env::current_exe().context("Cannot locate the supervisor binary")?;
            let args = vec![
                "--config".to_string(),
                config_path.display().to_string(),
                "boot".to_string(),
            ];
            (exe, args)
        }
    };

    Ok(LaunchSpec {
        name: "autostart".to_string(),
        match_pattern: script.display().to_string(),
        script,
        args,
        working_directory: config.processes.primary.working_directory.clone(),
        environment: Default::default(),
        output_log: None,
    })
}

async fn sync(
    config: SupervisorConfig,
    local_dir: Option<PathBuf>,
    remote_dest: Option<String>,
) -> Result<ExitCode> {
    let settings = &config.sync;
    let local_dir = local_dir.unwrap_or_else(|| settings.local_dir.clone());
    let remote_dest = remote_dest.unwrap_or_else(|| settings.remote_dest.clone());

    let probe = TcpConnectivityProbe::new(settings.probe_address.clone(), settings.probe_timeout);
    let rclone = RcloneTransfer {
        binary: settings.rclone_binary.clone(),
        extra_args: settings.rclone_args.clone(),
    };
    let transfer = select_transfer(settings.backend, &remote_dest, &rclone);

    let watchdog = SyncWatchdog::new(Arc::new(probe), transfer, settings.transfer_timeout)
        .with_status_file(&settings.status_file);
    let report = watchdog.run_sync(&local_dir, &remote_dest).await;

    Ok(ExitCode::from(report.outcome.exit_code()))
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Cannot install signal handlers: {}", e);
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM signal"),
        _ = sigint.recv() => info!("Received SIGINT signal"),
    }
    cancel.cancel();
}
