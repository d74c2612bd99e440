//! In-memory registry of supervised processes, keyed by role.
//!
//! The registry holds the [`Child`] of every process this supervisor
//! launched and answers liveness from it directly (reaping the process when
//! it exits). Name matching against the process table is only a
//! best-effort reconciliation for processes the registry holds no live
//! handle for, e.g. after the supervisor itself was restarted or when a
//! primary was relaunched from the control panel.

use daq_common::{ProcessHandle, ProcessResult, ProcessRole};
use daq_monitoring::LivenessProbe;
use daq_process::{LaunchSpec, ProcessTable};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::process::Child;
use tracing::{debug, info, warn};

/// How a liveness answer was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    /// The registry's own child is running.
    Owned { pid: u32 },
    /// No live handle; found by name matching.
    Matched { pids: Vec<u32> },
    Dead,
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        !matches!(self, Liveness::Dead)
    }

    pub fn pids(&self) -> Vec<u32> {
        match self {
            Liveness::Owned { pid } => vec![*pid],
            Liveness::Matched { pids } => pids.clone(),
            Liveness::Dead => Vec::new(),
        }
    }
}

struct Slot {
    name: String,
    match_pattern: String,
    handle: Option<ProcessHandle>,
    child: Option<Child>,
    /// Last reported ambiguity, so it is logged once per change.
    ambiguous: bool,
}

/// Registry of supervised processes.
pub struct ProcessRegistry {
    slots: HashMap<ProcessRole, Slot>,
    table: Arc<dyn ProcessTable>,
}

impl ProcessRegistry {
    /// Create a registry that knows the name and match pattern of each role.
    pub fn new(table: Arc<dyn ProcessTable>, specs: &[(ProcessRole, &LaunchSpec)]) -> Self {
        let slots = specs
            .iter()
            .map(|(role, spec)| {
                (
                    *role,
                    Slot {
                        name: spec.name.clone(),
                        match_pattern: spec.match_pattern.clone(),
                        handle: None,
                        child: None,
                        ambiguous: false,
                    },
                )
            })
            .collect();
        Self { slots, table }
    }

    /// Record a launched process, replacing any previous handle for its role.
    pub fn register(&mut self, handle: ProcessHandle, child: Option<Child>) {
        let Some(slot) = self.slots.get_mut(&handle.role) else {
            warn!("No registry slot for role {}, handle {} not recorded", handle.role, handle);
            return;
        };
        debug!("Registered {}", handle);
        slot.handle = Some(handle);
        slot.child = child;
    }

    pub fn handle(&self, role: ProcessRole) -> Option<&ProcessHandle> {
        self.slots.get(&role).and_then(|slot| slot.handle.as_ref())
    }

    /// Role of the process with this name.
    pub fn role_of(&self, name: &str) -> Option<ProcessRole> {
        self.slots
            .iter()
            .find(|(_, slot)| slot.name == name)
            .map(|(role, _)| *role)
    }

    /// Names of every registered role, primary first.
    pub fn names(&self) -> Vec<String> {
        [ProcessRole::Primary, ProcessRole::Companion]
            .iter()
            .filter_map(|role| self.slots.get(role).map(|slot| slot.name.clone()))
            .collect()
    }

    /// Send a termination request to the process this registry launched in
    /// `role`. Returns its pid, or `None` when nothing was launched.
    pub fn terminate(&mut self, role: ProcessRole) -> ProcessResult<Option<u32>> {
        let Some(pid) = self.handle(role).map(|handle| handle.pid) else {
            return Ok(None);
        };
        self.table.terminate(pid)?;
        Ok(Some(pid))
    }

    /// Determine whether the process in `role` is running.
    ///
    /// Never signals, starts or stops anything; an exited child is reaped.
    pub fn liveness(&mut self, role: ProcessRole) -> Liveness {
        let table = self.table.clone();
        let Some(slot) = self.slots.get_mut(&role) else {
            return Liveness::Dead;
        };

        if let Some(child) = slot.child.as_mut() {
            match child.try_wait() {
                Ok(None) => {
                    if let Some(pid) = child.id() {
                        return Liveness::Owned { pid };
                    }
                }
                Ok(Some(status)) => {
                    info!("Process '{}' exited with {}", slot.name, status);
                    slot.child = None;
                }
                Err(e) => {
                    warn!("Could not poll process '{}': {}", slot.name, e);
                    slot.child = None;
                }
            }
        }

        let matches = table.find_matching(&slot.match_pattern);
        let ambiguous = matches.len() > 1;
        if ambiguous != slot.ambiguous {
            slot.ambiguous = ambiguous;
            if ambiguous {
                warn!(
                    "{} processes match '{}' ({}); identification is ambiguous",
                    matches.len(),
                    slot.match_pattern,
                    slot.name
                );
            }
        }

        if matches.is_empty() {
            Liveness::Dead
        } else {
            Liveness::Matched {
                pids: matches.iter().map(|m| m.pid).collect(),
            }
        }
    }
}

/// Registry shared between the orchestrator and the liveness monitor.
#[derive(Clone)]
pub struct SharedRegistry(Arc<Mutex<ProcessRegistry>>);

impl SharedRegistry {
    pub fn new(registry: ProcessRegistry) -> Self {
        Self(Arc::new(Mutex::new(registry)))
    }

    pub fn register(&self, handle: ProcessHandle, child: Option<Child>) {
        self.0.lock().register(handle, child);
    }

    pub fn liveness(&self, role: ProcessRole) -> Liveness {
        self.0.lock().liveness(role)
    }

    pub fn handle(&self, role: ProcessRole) -> Option<ProcessHandle> {
        self.0.lock().handle(role).cloned()
    }

    pub fn terminate(&self, role: ProcessRole) -> ProcessResult<Option<u32>> {
        self.0.lock().terminate(role)
    }

    pub fn names(&self) -> Vec<String> {
        self.0.lock().names()
    }
}

impl LivenessProbe for SharedRegistry {
    fn is_alive(&self, name: &str) -> bool {
        let mut registry = self.0.lock();
        match registry.role_of(name) {
            Some(role) => registry.liveness(role).is_alive(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use daq_common::ProcessResult;
    use daq_process::MatchedProcess;

    #[derive(Default)]
    struct FakeTable {
        running: Mutex<HashMap<String, Vec<u32>>>,
    }

    impl ProcessTable for FakeTable {
        fn find_matching(&self, pattern: &str) -> Vec<MatchedProcess> {
            self.running
                .lock()
                .get(pattern)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|pid| MatchedProcess {
                    pid,
                    command_line: pattern.to_string(),
                    started_at: None,
                })
                .collect()
        }

        fn terminate(&self, _pid: u32) -> ProcessResult<()> {
            Ok(())
        }
    }

    fn spec(name: &str, pattern: &str) -> LaunchSpec {
        LaunchSpec {
            name: name.to_string(),
            match_pattern: pattern.to_string(),
            script: "/bin/true".into(),
            args: Vec::new(),
            working_directory: None,
            environment: HashMap::new(),
            output_log: None,
        }
    }

    fn registry(table: Arc<FakeTable>) -> SharedRegistry {
        let primary = spec("acquisition", "daq.py");
        let companion = spec("log-viewer", "viewer.sh");
        SharedRegistry::new(ProcessRegistry::new(
            table,
            &[(ProcessRole::Primary, &primary), (ProcessRole::Companion, &companion)],
        ))
    }

    fn handle(role: ProcessRole, name: &str, pid: u32) -> ProcessHandle {
        ProcessHandle {
            name: name.to_string(),
            role,
            command: "test".to_string(),
            working_directory: None,
            started_at: Local::now(),
            pid,
        }
    }

    #[test]
    fn test_name_match_fallback_without_handle() {
        let table = Arc::new(FakeTable::default());
        let registry = registry(table.clone());

        assert!(!registry.is_alive("acquisition"));
        table.running.lock().insert("daq.py".to_string(), vec![42]);
        assert!(registry.is_alive("acquisition"));
        assert_eq!(
            registry.liveness(ProcessRole::Primary),
            Liveness::Matched { pids: vec![42] }
        );
        assert!(!registry.is_alive("unknown"));
        assert_eq!(registry.names(), vec!["acquisition", "log-viewer"]);
    }

    #[tokio::test]
    async fn test_owned_child_is_primary_source_and_reaped_on_exit() {
        let table = Arc::new(FakeTable::default());
        let registry = registry(table);

        let mut child = tokio::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id().unwrap();
        child.start_kill().unwrap();
        child.wait().await.unwrap();

        // Already reaped: the registry falls back to name matching
        registry.register(handle(ProcessRole::Primary, "acquisition", pid), Some(child));
        assert_eq!(registry.liveness(ProcessRole::Primary), Liveness::Dead);

        let child = tokio::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id().unwrap();
        registry.register(handle(ProcessRole::Primary, "acquisition", pid), Some(child));
        assert_eq!(registry.liveness(ProcessRole::Primary), Liveness::Owned { pid });
        assert_eq!(registry.handle(ProcessRole::Primary).unwrap().pid, pid);

        daq_process::terminate_gracefully(pid).unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while registry.is_alive("acquisition") && std::time::Instant::now() < deadline {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(!registry.is_alive("acquisition"));
        assert!(!daq_process::process_exists(pid).unwrap());
    }

    #[test]
    fn test_ambiguous_match_still_counts_as_alive() {
        let table = Arc::new(FakeTable::default());
        table.running.lock().insert("viewer.sh".to_string(), vec![7, 8]);
        let registry = registry(table);

        assert_eq!(registry.liveness(ProcessRole::Companion).pids(), vec![7, 8]);
        assert!(registry.is_alive("log-viewer"));
    }
}
