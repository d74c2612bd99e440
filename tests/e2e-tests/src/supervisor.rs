//! Running the supervisor binary against a throwaway station layout

use std::fs;
use std::io::Write;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wait_timeout::ChildExt;

/// A temporary station: measurement dir, remote dir, logs and config.
pub struct TestStation {
    root: TempDir,
}

impl TestStation {
    pub fn new() -> Self {
        let root = tempfile::Builder::new()
            .prefix("daq-e2e-")
            .tempdir()
            .expect("Failed to create test directory");
        let station = Self { root };
        fs::create_dir_all(station.measurements()).expect("Failed to create measurement dir");
        fs::create_dir_all(station.remote()).expect("Failed to create remote dir");
        station
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn measurements(&self) -> PathBuf {
        self.path().join("Mediciones")
    }

    pub fn remote(&self) -> PathBuf {
        self.path().join("remote")
    }

    pub fn autostart_log(&self) -> PathBuf {
        self.path().join("autostart.log")
    }

    pub fn sync_log(&self) -> PathBuf {
        self.path().join("sync.log")
    }

    pub fn live_log(&self) -> PathBuf {
        self.path().join("acquisition.log")
    }

    pub fn status_file(&self) -> PathBuf {
        self.path().join("last_sync.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.yaml")
    }

    /// Write a measurement file with the given content.
    pub fn add_measurement(&self, name: &str, content: &str) -> PathBuf {
        let path = self.measurements().join(name);
        fs::write(&path, content).expect("Failed to write measurement file");
        path
    }

    /// Write an executable shell script into the station root.
    pub fn add_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
        path
    }

    pub fn write_config(&self, config: &TestConfig) -> PathBuf {
        let path = self.config_path();
        fs::write(&path, config.to_yaml(self)).expect("Failed to write config");
        path
    }
}

impl Default for TestStation {
    fn default() -> Self {
        Self::new()
    }
}

/// Knobs of the generated configuration file.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub probe_address: String,
    pub readiness_command: Vec<String>,
    pub readiness_timeout: &'static str,
    pub primary_script: Option<PathBuf>,
    pub companion_script: Option<PathBuf>,
    pub inter_launch_delay: &'static str,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            probe_address: "127.0.0.1:9".to_string(),
            readiness_command: vec!["true".to_string()],
            readiness_timeout: "5s",
            primary_script: None,
            companion_script: None,
            inter_launch_delay: "500ms",
        }
    }
}

impl TestConfig {
    /// Probe address of a listener that accepts connections ("online").
    pub fn online(listener: &TcpListener) -> Self {
        let address = listener.local_addr().expect("Listener has no address");
        Self {
            probe_address: address.to_string(),
            ..Default::default()
        }
    }

    /// Probe address nothing listens on ("offline").
    pub fn offline() -> Self {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
            listener.local_addr().expect("Listener has no address")
        };
        Self {
            probe_address: address.to_string(),
            ..Default::default()
        }
    }

    fn to_yaml(&self, station: &TestStation) -> String {
        let quote = |p: &Path| format!("'{}'", p.display());
        let primary = self
            .primary_script
            .clone()
            .unwrap_or_else(|| station.path().join("start_acquisition.sh"));
        let companion = self
            .companion_script
            .clone()
            .unwrap_or_else(|| station.path().join("view_acquisition_log.sh"));
        let command = self
            .readiness_command
            .iter()
            .map(|c| format!("'{}'", c))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"supervisor:
  log_level: debug
  autostart_log: {autostart}
  sync_log: {sync_log}
readiness:
  display: ':0'
  query_command: [{command}]
  timeout: {readiness_timeout}
  poll_interval: 200ms
  query_timeout: 2s
processes:
  inter_launch_delay: {delay}
  primary:
    name: acquisition
    match_pattern: {primary}
    script: {primary}
    working_directory: {root}
    output_log: {live}
  companion:
    name: log-viewer
    match_pattern: {companion}
    script: {companion}
    working_directory: {root}
liveness:
  tick_interval: 1s
  heartbeat_every: 1
sync:
  local_dir: {local}
  remote_dest: {remote}
  backend: filesystem
  probe_address: '{probe}'
  probe_timeout: 2s
  transfer_timeout: 30s
  status_file: {status}
"#,
            autostart = quote(&station.autostart_log()),
            sync_log = quote(&station.sync_log()),
            command = command,
            readiness_timeout = self.readiness_timeout,
            delay = self.inter_launch_delay,
            primary = quote(&primary),
            companion = quote(&companion),
            root = quote(station.path()),
            live = quote(&station.live_log()),
            local = quote(&station.measurements()),
            remote = quote(&station.remote()),
            probe = self.probe_address,
            status = quote(&station.status_file()),
        )
    }
}

/// One invocation of the supervisor binary.
pub struct SupervisorRun {
    child: Option<Child>,
    stdout_path: PathBuf,
    stderr_path: PathBuf,
    status: Option<ExitStatus>,
}

impl SupervisorRun {
    /// Start `daq-supervisor --config <station config> <args...>`.
    pub fn start(binary: &Path, station: &TestStation, args: &[&str], stdin: Stdio) -> Self {
        let stdout_path = station.path().join("stdout.txt");
        let stderr_path = station.path().join("stderr.txt");
        let stdout = fs::File::create(&stdout_path).expect("Failed to create stdout capture");
        let stderr = fs::File::create(&stderr_path).expect("Failed to create stderr capture");

        println!("Starting {} {:?}", binary.display(), args);
        let child = Command::new(binary)
            .arg("--config")
            .arg(station.config_path())
            .args(args)
            .current_dir(station.path())
            .env_remove("RUST_LOG")
            .stdin(stdin)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .expect("Failed to spawn daq-supervisor");

        Self {
            child: Some(child),
            stdout_path,
            stderr_path,
            status: None,
        }
    }

    /// Run to completion and return the exit code.
    pub fn run(binary: &Path, station: &TestStation, args: &[&str], timeout: Duration) -> i32 {
        let mut run = Self::start(binary, station, args, Stdio::null());
        run.wait(timeout).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Run the control panel with `input` on stdin; returns (exit code, stdout).
    pub fn panel(binary: &Path, station: &TestStation, input: &str, timeout: Duration) -> (i32, String) {
        let mut run = Self::start(binary, station, &["panel"], Stdio::piped());
        if let Some(mut stdin) = run.child.as_mut().and_then(|c| c.stdin.take()) {
            stdin.write_all(input.as_bytes()).expect("Failed to write panel input");
        }
        let code = run.wait(timeout).unwrap_or_else(|e| panic!("Control panel: {}", e));
        (code, run.stdout())
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(|c| c.id())
    }

    /// Wait for exit and return the exit code.
    ///
    /// On timeout the process is killed and an error returned; so is an exit
    /// caused by a signal.
    pub fn wait(&mut self, timeout: Duration) -> Result<i32, String> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| "daq-supervisor was already waited for".to_string())?;

        match child.wait_timeout(timeout) {
            Ok(Some(status)) => {
                println!("daq-supervisor exited with status: {}", status);
                self.status = Some(status);
                status
                    .code()
                    .ok_or_else(|| format!("daq-supervisor killed by a signal ({})", status))
            }
            Ok(None) => {
                println!("daq-supervisor did not exit in time, forcing kill");
                child
                    .kill()
                    .map_err(|e| format!("Failed to force kill: {}", e))?;
                child.wait().ok();
                Err(format!(
                    "daq-supervisor did not exit within {:?}. stderr:\n{}",
                    timeout,
                    self.stderr()
                ))
            }
            Err(e) => Err(format!("Error waiting for daq-supervisor: {}", e)),
        }
    }

    /// Send SIGTERM.
    pub fn terminate(&self) {
        if let Some(pid) = self.pid() {
            crate::assertions::signal(pid, nix::sys::signal::Signal::SIGTERM);
        }
    }

    pub fn stdout(&self) -> String {
        fs::read_to_string(&self.stdout_path).unwrap_or_default()
    }

    pub fn stderr(&self) -> String {
        fs::read_to_string(&self.stderr_path).unwrap_or_default()
    }
}

impl Drop for SupervisorRun {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    condition()
}
