//! Boot sequence: readiness gate, launch, then background liveness watch.

use crate::config::SupervisorConfig;
use crate::orchestrator::{LaunchedPair, Orchestrator};
use crate::registry::{ProcessRegistry, SharedRegistry};
use crate::status::OperatingWindow;
use daq_common::{Error, ProcessRole, Result};
use daq_monitoring::{LivenessConfig, LivenessMonitor, ReadinessProber, SessionProbe};
use daq_process::{Launcher, ProcessTable};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Everything the boot entrypoint needs, injected so tests can fake the
/// session, the launcher and the process table.
pub struct BootSequence {
    config: SupervisorConfig,
    session: Arc<dyn SessionProbe>,
    launcher: Arc<dyn Launcher>,
    table: Arc<dyn ProcessTable>,
}

/// State after a successful launch.
pub struct Booted {
    pub launched: LaunchedPair,
    pub registry: SharedRegistry,
}

impl BootSequence {
    pub fn new(
        config: SupervisorConfig,
        session: Arc<dyn SessionProbe>,
        launcher: Arc<dyn Launcher>,
        table: Arc<dyn ProcessTable>,
    ) -> Self {
        Self {
            config,
            session,
            launcher,
            table,
        }
    }

    /// Wait for the session, then launch primary and companion.
    ///
    /// Any error here is fatal for boot; nothing is retried.
    pub async fn start(&self) -> Result<Booted> {
        let readiness = &self.config.readiness;
        let state = ReadinessProber::new(self.session.clone())
            .wait_until_ready(readiness.timeout, readiness.poll_interval)
            .await;

        if !state.is_ready() {
            error!(
                "Graphical session not available after {:?}; nothing will be launched",
                state.elapsed
            );
            return Err(Error::readiness_timeout(state.elapsed, state.timeout));
        }

        let processes = &self.config.processes;
        let primary = processes.primary_spec();
        let companion = processes.companion_spec();

        let registry = SharedRegistry::new(ProcessRegistry::new(
            self.table.clone(),
            &[
                (ProcessRole::Primary, &primary),
                (ProcessRole::Companion, &companion),
            ],
        ));

        let launched = Orchestrator::new(self.launcher.clone(), registry.clone())
            .launch_sequence(&primary, &companion, processes.inter_launch_delay)
            .await
            .map_err(|e| {
                error!("Launch sequence failed: {}", e);
                Error::from(e)
            })?;

        info!(
            "Boot complete: {} pid {}, {} pid {}",
            primary.name, launched.primary, companion.name, launched.companion
        );
        Ok(Booted { launched, registry })
    }

    /// Build the liveness monitor for a booted registry.
    pub fn monitor(&self, registry: &SharedRegistry) -> Result<LivenessMonitor> {
        let window = OperatingWindow::parse(&self.config.schedule.start, &self.config.schedule.end)?;
        let mut monitor = LivenessMonitor::new(
            registry.names(),
            Arc::new(registry.clone()),
            LivenessConfig {
                tick_interval: self.config.liveness.tick_interval,
                heartbeat_every: self.config.liveness.heartbeat_every,
            },
        );
        monitor.set_heartbeat_note(move || Some(window.describe_now()));
        Ok(monitor)
    }

    /// Full boot: start, then watch until `cancel` fires.
    ///
    /// Returns `None` when cancelled before the launch happened. Cancelling
    /// leaves the supervised processes running.
    pub async fn run(self, cancel: CancellationToken) -> Result<Option<Booted>> {
        let booted = tokio::select! {
            result = self.start() => result?,
            _ = cancel.cancelled() => {
                info!("Boot cancelled before launch");
                return Ok(None);
            }
        };

        self.monitor(&booted.registry)?.run(cancel).await;
        info!("Supervisor stopping; supervised processes are left running");
        Ok(Some(booted))
    }
}
