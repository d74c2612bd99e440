//! Control panel driven over stdin.

use e2e_tests::assertions::{is_alive, kill_group, read_pid};
use e2e_tests::supervisor::wait_until;
use e2e_tests::{get_supervisor_path, SupervisorRun, TestConfig, TestStation};
use std::net::TcpListener;
use std::process::Stdio;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(20);

#[test]
fn test_panel_reports_stopped_station_and_exits() {
    let binary = get_supervisor_path();
    let station = TestStation::new();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    station.write_config(&TestConfig::online(&listener));
    station.add_measurement("data_20240501_060000.csv", "timestamp,irradiance\n1,800\n2,810\n");
    assert_eq!(SupervisorRun::run(&binary, &station, &["sync"], TIMEOUT), 0);

    let (code, output) = SupervisorRun::panel(&binary, &station, "4\n2\n7\n42\n9\n", TIMEOUT);
    println!("{}", output);

    assert_eq!(code, 0);
    assert!(output.contains("=== DAQ control panel ==="));
    assert!(output.contains("acquisition"));
    assert!(output.contains("STOPPED"));
    assert!(output.contains("newest data_20240501_060000.csv"));
    assert!(output.contains("DONE at"));
    assert!(output.contains("Live output not available yet"));
    assert!(output.contains("Acquisition was not running"));
    assert!(output.contains("Invalid option '42'"));
    assert!(output.contains("Control panel closed"));
}

#[test]
fn test_panel_closes_on_end_of_input() {
    let binary = get_supervisor_path();
    let station = TestStation::new();
    station.write_config(&TestConfig::offline());

    let (code, output) = SupervisorRun::panel(&binary, &station, "8\n", TIMEOUT);

    assert_eq!(code, 0);
    assert!(output.contains("Control panel closed; supervised processes keep running"));
}

#[test]
fn test_panel_stop_terminates_primary_only() {
    let binary = get_supervisor_path();
    let station = TestStation::new();
    let primary = station.add_script(
        "start_acquisition.sh",
        "echo $$ > primary.pid\nwhile true; do sleep 1; done",
    );
    let companion = station.add_script(
        "view_acquisition_log.sh",
        "echo $$ > companion.pid\nwhile true; do sleep 1; done",
    );
    station.write_config(&TestConfig {
        primary_script: Some(primary),
        companion_script: Some(companion),
        ..Default::default()
    });

    let mut boot = SupervisorRun::start(&binary, &station, &["boot"], Stdio::null());
    let companion_pid = station.path().join("companion.pid");
    assert!(wait_until(TIMEOUT, || read_pid(&companion_pid).is_some()));
    let primary = read_pid(&station.path().join("primary.pid")).unwrap();
    let companion = read_pid(&companion_pid).unwrap();
    boot.terminate();
    boot.wait(TIMEOUT).unwrap();

    let (code, output) = SupervisorRun::panel(&binary, &station, "8\n7\n9\n", TIMEOUT);
    let stopped = wait_until(Duration::from_secs(10), || !is_alive(primary));
    let companion_alive = is_alive(companion);
    kill_group(primary);
    kill_group(companion);

    assert_eq!(code, 0);
    assert!(output.contains("RUNNING (pid"));
    assert!(output.contains(&format!("Sent termination signal to pid(s) [{}]", primary)));
    assert!(stopped);
    assert!(companion_alive);
}
