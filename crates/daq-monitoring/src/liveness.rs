//! Liveness Monitor - periodic process liveness checks
//!
//! A background loop that asks a [`LivenessProbe`] whether each supervised
//! process is still running. It:
//! - emits a heartbeat summary on every Nth tick, whatever the outcome
//! - logs an alive -> dead transition at WARN level immediately
//! - logs a dead -> alive transition (e.g. after an operator restart)
//! - never starts or stops anything itself
//!
//! Liveness is looked up by name on every tick rather than cached, so the
//! monitor tolerates processes being replaced behind its back.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Answers "is the process with this name running right now?".
///
/// Implementations must be side-effect free with respect to the process:
/// asking never starts, stops or signals anything.
pub trait LivenessProbe: Send + Sync {
    fn is_alive(&self, name: &str) -> bool;
}

/// Callback contributing extra context to the heartbeat line.
pub type HeartbeatNote = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Liveness monitor configuration
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// Interval between liveness checks
    pub tick_interval: Duration,
    /// Emit a heartbeat summary every this many ticks
    pub heartbeat_every: u32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            heartbeat_every: 5,
        }
    }
}

/// Last known liveness of one supervised process.
#[derive(Debug, Clone)]
pub struct LivenessStatus {
    pub alive: bool,
    pub last_check: Option<DateTime<Local>>,
    pub last_change: Option<DateTime<Local>>,
    /// Ticks observed dead in a row.
    pub consecutive_dead: u32,
}

impl LivenessStatus {
    /// Processes are launched right before monitoring starts, so the
    /// baseline is "alive": a process already gone at the first tick is
    /// reported as a transition.
    fn launched() -> Self {
        Self {
            alive: true,
            last_check: None,
            last_change: None,
            consecutive_dead: 0,
        }
    }
}

/// A change of liveness detected on a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub name: String,
    pub alive: bool,
}

/// Everything observed during one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub observations: Vec<(String, bool)>,
    pub transitions: Vec<Transition>,
    pub heartbeat: bool,
}

/// Liveness monitor - polls supervised processes by name.
pub struct LivenessMonitor {
    targets: Vec<String>,
    probe: Arc<dyn LivenessProbe>,
    config: LivenessConfig,
    statuses: HashMap<String, LivenessStatus>,
    tick: u64,
    heartbeat_note: Option<HeartbeatNote>,
}

impl LivenessMonitor {
    /// Create a new liveness monitor for the named processes.
    pub fn new(targets: Vec<String>, probe: Arc<dyn LivenessProbe>, config: LivenessConfig) -> Self {
        let statuses = targets
            .iter()
            .map(|name| (name.clone(), LivenessStatus::launched()))
            .collect();
        Self {
            targets,
            probe,
            config,
            statuses,
            tick: 0,
            heartbeat_note: None,
        }
    }

    /// Set a callback whose text is appended to every heartbeat line.
    pub fn set_heartbeat_note<F>(&mut self, note: F)
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.heartbeat_note = Some(Arc::new(note));
    }

    /// Current status of a target.
    pub fn status(&self, name: &str) -> Option<&LivenessStatus> {
        self.statuses.get(name)
    }

    /// Run one round of checks.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let now = Local::now();
        let mut observations = Vec::with_capacity(self.targets.len());
        let mut transitions = Vec::new();

        for name in &self.targets {
            let alive = self.probe.is_alive(name);
            observations.push((name.clone(), alive));

            let status = self
                .statuses
                .entry(name.clone())
                .or_insert_with(LivenessStatus::launched);
            status.last_check = Some(now);
            status.consecutive_dead = if alive { 0 } else { status.consecutive_dead + 1 };

            if status.alive != alive {
                status.alive = alive;
                status.last_change = Some(now);
                transitions.push(Transition {
                    name: name.clone(),
                    alive,
                });

                if alive {
                    info!(process = %name, "Process '{}' is running again", name);
                } else {
                    warn!(process = %name, "Process '{}' is no longer running", name);
                }
            }
        }

        let heartbeat = self.tick % u64::from(self.config.heartbeat_every.max(1)) == 0;
        if heartbeat {
            let summary = observations
                .iter()
                .map(|(name, alive)| format!("{}={}", name, if *alive { "alive" } else { "dead" }))
                .collect::<Vec<_>>()
                .join(", ");
            let note = self
                .heartbeat_note
                .as_ref()
                .and_then(|note| note())
                .map(|n| format!(" ({})", n))
                .unwrap_or_default();
            info!("Heartbeat #{}: {}{}", self.tick, summary, note);
        } else {
            debug!("Liveness tick #{}: {:?}", self.tick, observations);
        }

        TickReport {
            tick: self.tick,
            observations,
            transitions,
            heartbeat,
        }
    }

    /// Run the monitor loop until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Liveness monitor started for {:?} (interval: {:?}, heartbeat every {} ticks)",
            self.targets, self.config.tick_interval, self.config.heartbeat_every
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Liveness monitor stopped after {} ticks", self.tick);
                    break;
                }
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }
    }

    /// Start the monitor loop as a background task.
    pub fn start(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
