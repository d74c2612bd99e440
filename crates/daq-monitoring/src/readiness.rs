//! Readiness Prober - waits for a usable graphical session
//!
//! The companion log viewer opens a window, so nothing is launched until a
//! display is reachable. The prober polls a [`SessionProbe`] at a fixed
//! interval until it reports ready or the timeout elapses.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info};

/// Result of a single session check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    /// No session handle (e.g. `DISPLAY`) is available.
    NoSession,
    /// A handle is set but querying the session failed.
    QueryFailed(String),
    /// The session answered.
    Ready,
}

impl SessionCheck {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionCheck::Ready)
    }
}

/// Checks whether an interactive session is reachable.
#[async_trait]
pub trait SessionProbe: Send + Sync {
    async fn check(&self) -> SessionCheck;
}

/// Probe for an X11 session: `DISPLAY` must be set and a basic query
/// (by default `xset q`) must succeed against it.
#[derive(Debug, Clone)]
pub struct DisplaySessionProbe {
    /// Display to use; falls back to the `DISPLAY` environment variable.
    pub display: Option<String>,
    /// Query command and arguments.
    pub query_command: Vec<String>,
    /// Upper bound for a single query.
    pub query_timeout: Duration,
}

impl DisplaySessionProbe {
    pub fn new(display: Option<String>, query_command: Vec<String>, query_timeout: Duration) -> Self {
        Self {
            display,
            query_command,
            query_timeout,
        }
    }

    fn resolve_display(&self) -> Option<String> {
        self.display
            .clone()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| std::env::var("DISPLAY").ok().filter(|d| !d.trim().is_empty()))
    }
}

#[async_trait]
impl SessionProbe for DisplaySessionProbe {
    async fn check(&self) -> SessionCheck {
        let Some(display) = self.resolve_display() else {
            return SessionCheck::NoSession;
        };

        let Some((program, args)) = self.query_command.split_first() else {
            return SessionCheck::QueryFailed("no session query command configured".to_string());
        };

        let status = tokio::process::Command::new(program)
            .args(args)
            .env("DISPLAY", &display)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.query_timeout, status).await {
            Ok(Ok(status)) if status.success() => SessionCheck::Ready,
            Ok(Ok(status)) => SessionCheck::QueryFailed(format!("{} exited with {}", program, status)),
            Ok(Err(e)) => SessionCheck::QueryFailed(format!("{} failed to run: {}", program, e)),
            Err(_) => SessionCheck::QueryFailed(format!(
                "{} did not answer within {:?}",
                program, self.query_timeout
            )),
        }
    }
}

/// Probe result of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    NotReady,
    Ready,
    TimedOut,
}

/// Transient state of one boot-time readiness wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessState {
    pub elapsed: Duration,
    pub timeout: Duration,
    pub result: ProbeResult,
    pub attempts: u32,
}

impl ReadinessState {
    fn new(timeout: Duration) -> Self {
        Self {
            elapsed: Duration::ZERO,
            timeout,
            result: ProbeResult::NotReady,
            attempts: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.result == ProbeResult::Ready
    }
}

/// Polls a session probe until ready or timed out.
pub struct ReadinessProber {
    probe: Arc<dyn SessionProbe>,
}

impl ReadinessProber {
    pub fn new(probe: Arc<dyn SessionProbe>) -> Self {
        Self { probe }
    }

    /// Wait until the session is reachable.
    ///
    /// Returns a state whose result is [`ProbeResult::Ready`] as soon as a
    /// check succeeds, or [`ProbeResult::TimedOut`] once `timeout` has
    /// elapsed. Each check is cut off at the deadline and counts as a
    /// failed attempt. Failed checks sleep `poll_interval` (never past the
    /// deadline) before retrying.
    pub async fn wait_until_ready(&self, timeout: Duration, poll_interval: Duration) -> ReadinessState {
        let started = Instant::now();
        let mut state = ReadinessState::new(timeout);

        info!("Waiting for graphical session (timeout: {:?}, poll: {:?})", timeout, poll_interval);

        loop {
            state.attempts += 1;
            let remaining = timeout.saturating_sub(started.elapsed());
            let check = match tokio::time::timeout(remaining, self.probe.check()).await {
                Ok(check) => check,
                Err(_) => SessionCheck::QueryFailed(format!(
                    "session check still running at the {:?} deadline",
                    timeout
                )),
            };
            state.elapsed = started.elapsed();

            if check.is_ready() {
                state.result = ProbeResult::Ready;
                info!(
                    "Session ready after {:?} ({} attempt(s))",
                    state.elapsed, state.attempts
                );
                return state;
            }

            if state.elapsed >= timeout {
                state.result = ProbeResult::TimedOut;
                error!(
                    "Session not reachable after {:?} ({} attempt(s)), last check: {:?}",
                    state.elapsed, state.attempts, check
                );
                return state;
            }

            debug!("Session not ready yet (attempt {}): {:?}", state.attempts, check);
            sleep(poll_interval.min(timeout.saturating_sub(state.elapsed))).await;
        }
    }
}
