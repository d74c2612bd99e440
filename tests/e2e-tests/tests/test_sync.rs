//! Sync watchdog through the `daq-supervisor sync` command, with a local
//! directory standing in for the remote destination.

use e2e_tests::assertions::{assert_log_contains, assert_log_format, assert_log_lacks};
use e2e_tests::{get_supervisor_path, SupervisorRun, TestConfig, TestStation};
use std::fs;
use std::net::TcpListener;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(30);

fn status(station: &TestStation) -> serde_json::Value {
    let content = fs::read_to_string(station.status_file()).expect("No sync status file");
    serde_json::from_str(&content).expect("Sync status is not JSON")
}

#[test]
fn test_sync_copies_new_files_and_converges() {
    let binary = get_supervisor_path();
    let station = TestStation::new();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    station.write_config(&TestConfig::online(&listener));

    station.add_measurement("data_20240501_060000.csv", "timestamp,irradiance\n1,800\n");
    station.add_measurement("data_20240502_060000.csv", "timestamp,irradiance\n1,750\n");
    fs::write(station.remote().join("only_remote.csv"), "kept").unwrap();

    println!("Step 1: first sync copies both files");
    assert_eq!(SupervisorRun::run(&binary, &station, &["sync"], TIMEOUT), 0);
    for name in ["data_20240501_060000.csv", "data_20240502_060000.csv"] {
        assert_eq!(
            fs::read_to_string(station.remote().join(name)).unwrap(),
            fs::read_to_string(station.measurements().join(name)).unwrap()
        );
    }
    assert_log_contains(&station.sync_log(), "Transferred: data_20240501_060000.csv").unwrap();
    assert_log_contains(&station.sync_log(), "2 file(s) transferred").unwrap();
    assert_eq!(status(&station)["outcome"], "done");
    assert_eq!(status(&station)["transferred"], 2);

    println!("Step 2: second sync has nothing to do");
    assert_eq!(SupervisorRun::run(&binary, &station, &["sync"], TIMEOUT), 0);
    assert_eq!(status(&station)["transferred"], 0);
    assert_log_contains(&station.sync_log(), "0 file(s) transferred").unwrap();

    println!("Step 3: a grown file is copied again");
    station.add_measurement("data_20240502_060000.csv", "timestamp,irradiance\n1,750\n2,760\n");
    assert_eq!(SupervisorRun::run(&binary, &station, &["sync"], TIMEOUT), 0);
    assert_eq!(status(&station)["transferred"], 1);
    assert!(fs::read_to_string(station.remote().join("data_20240502_060000.csv"))
        .unwrap()
        .contains("2,760"));

    // Nothing is ever deleted remotely
    assert_eq!(fs::read_to_string(station.remote().join("only_remote.csv")).unwrap(), "kept");
    assert_log_format(&station.sync_log()).unwrap();
}

#[test]
fn test_sync_offline_exits_2_without_touching_anything() {
    let binary = get_supervisor_path();
    let station = TestStation::new();
    station.write_config(&TestConfig::offline());
    station.add_measurement("data_20240501_060000.csv", "timestamp,irradiance\n");

    assert_eq!(SupervisorRun::run(&binary, &station, &["sync"], TIMEOUT), 2);

    assert!(fs::read_dir(station.remote()).unwrap().next().is_none());
    assert!(station.measurements().join("data_20240501_060000.csv").exists());
    assert_log_contains(&station.sync_log(), "OFFLINE").unwrap();
    assert_log_lacks(&station.sync_log(), "Transferred:").unwrap();
    assert_eq!(status(&station)["outcome"], "offline");
}

#[test]
fn test_sync_missing_local_dir_fails() {
    let binary = get_supervisor_path();
    let station = TestStation::new();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    station.write_config(&TestConfig::online(&listener));

    let absent = station.path().join("absent");
    let code = SupervisorRun::run(
        &binary,
        &station,
        &["sync", absent.to_str().unwrap()],
        TIMEOUT,
    );

    assert_eq!(code, 1);
    assert!(!absent.exists());
    assert_log_contains(&station.sync_log(), "Sync FAILED").unwrap();
    assert_eq!(status(&station)["outcome"], "failed");
}
