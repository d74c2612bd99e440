//! Boot entrypoint: readiness gate, ordered launch and detachment.

use e2e_tests::assertions::{assert_log_contains, is_alive, kill_group, read_pid};
use e2e_tests::supervisor::wait_until;
use e2e_tests::{get_supervisor_path, SupervisorRun, TestConfig, TestStation};
use std::process::Stdio;
use std::time::Duration;

/// Kills the launched process groups even when an assertion fails.
struct Launched(Vec<u32>);

impl Drop for Launched {
    fn drop(&mut self) {
        for pid in &self.0 {
            kill_group(*pid);
        }
    }
}

fn scripts(station: &TestStation) -> TestConfig {
    let primary = station.add_script(
        "start_acquisition.sh",
        "echo $$ > primary.pid\necho \"acquisition running\"\nwhile true; do sleep 1; done",
    );
    let companion = station.add_script(
        "view_acquisition_log.sh",
        "echo $$ > companion.pid\nwhile true; do sleep 1; done",
    );
    TestConfig {
        primary_script: Some(primary),
        companion_script: Some(companion),
        ..Default::default()
    }
}

#[test]
fn test_boot_without_session_launches_nothing() {
    let binary = get_supervisor_path();
    let station = TestStation::new();
    let config = TestConfig {
        readiness_command: vec!["false".to_string()],
        readiness_timeout: "1s",
        ..scripts(&station)
    };
    station.write_config(&config);

    let code = SupervisorRun::run(&binary, &station, &["boot"], Duration::from_secs(20));

    assert_eq!(code, 1);
    assert!(!station.path().join("primary.pid").exists());
    assert!(!station.path().join("companion.pid").exists());
    assert_log_contains(&station.autostart_log(), "nothing will be launched").unwrap();
}

#[test]
fn test_boot_launches_in_order_and_leaves_processes_running() {
    let binary = get_supervisor_path();
    let station = TestStation::new();
    station.write_config(&scripts(&station));
    let primary_pid = station.path().join("primary.pid");
    let companion_pid = station.path().join("companion.pid");

    let mut run = SupervisorRun::start(&binary, &station, &["boot"], Stdio::null());
    let mut launched = Launched(Vec::new());

    println!("Step 1: waiting for both processes");
    assert!(wait_until(Duration::from_secs(15), || read_pid(&companion_pid).is_some()));
    let primary = read_pid(&primary_pid).expect("Primary did not start");
    let companion = read_pid(&companion_pid).unwrap();
    launched.0.extend([primary, companion]);

    let primary_started = std::fs::metadata(&primary_pid).unwrap().modified().unwrap();
    let companion_started = std::fs::metadata(&companion_pid).unwrap().modified().unwrap();
    assert!(companion_started >= primary_started);

    println!("Step 2: primary output goes to the live log");
    assert!(wait_until(Duration::from_secs(5), || {
        std::fs::read_to_string(station.live_log())
            .map(|c| c.contains("acquisition running"))
            .unwrap_or(false)
    }));
    assert!(wait_until(Duration::from_secs(5), || {
        e2e_tests::LogParser::from_file(&station.autostart_log()).contains("Boot complete")
    }));

    println!("Step 3: stopping the supervisor leaves both running");
    run.terminate();
    assert_eq!(run.wait(Duration::from_secs(10)), Ok(0));
    assert!(is_alive(primary));
    assert!(is_alive(companion));
    assert_log_contains(&station.autostart_log(), "supervised processes are left running").unwrap();
}

#[test]
fn test_boot_refuses_while_primary_runs() {
    let binary = get_supervisor_path();
    let station = TestStation::new();
    station.write_config(&scripts(&station));
    let primary_pid = station.path().join("primary.pid");
    let companion_pid = station.path().join("companion.pid");

    let mut first = SupervisorRun::start(&binary, &station, &["boot"], Stdio::null());
    let mut launched = Launched(Vec::new());
    assert!(wait_until(Duration::from_secs(15), || read_pid(&companion_pid).is_some()));
    let primary = read_pid(&primary_pid).unwrap();
    launched.0.extend([primary, read_pid(&companion_pid).unwrap()]);
    first.terminate();
    assert_eq!(first.wait(Duration::from_secs(10)), Ok(0));

    std::fs::remove_file(&primary_pid).unwrap();
    let code = SupervisorRun::run(&binary, &station, &["boot"], Duration::from_secs(20));

    assert_eq!(code, 1);
    assert!(!primary_pid.exists());
    assert!(is_alive(primary));
    assert_log_contains(&station.autostart_log(), "already running").unwrap();
}
