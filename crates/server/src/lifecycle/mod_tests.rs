// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn test_config(dir: &tempfile::TempDir) -> Config {
    Config {
        host: "127.0.0.1".into(),
        // Port 0 asks the OS for a free port, keeping tests parallel-safe.
        port: 0,
        data_dir: dir.path().join("data"),
        cache_root: dir.path().join("cache"),
        log_dir: dir.path().join("logs"),
        event_log: dir.path().join("events.log"),
        skip_lock: false,
    }
}

#[test]
fn pid_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.pid");
    write_pid_file(&path, "127.0.0.1", 5000, 4242).unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "127.0.0.1:5000\n4242\n"
    );
    assert_eq!(read_pid_file(&path), Some(("127.0.0.1".into(), 5000, 4242)));
}

#[test]
fn corrupt_pid_file_reads_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.pid");
    std::fs::write(&path, "garbage").unwrap();
    assert_eq!(read_pid_file(&path), None);
    std::fs::write(&path, "127.0.0.1:notaport\n12\n").unwrap();
    assert_eq!(read_pid_file(&path), None);
}

#[test]
fn own_pid_is_alive() {
    assert!(pid_alive(std::process::id() as i32));
    // PID 0 signals our own process group, so probe an unlikely PID.
    assert!(!pid_alive(i32::MAX - 1));
}

#[tokio::test]
async fn startup_binds_and_writes_pid_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    let bootstrap = startup(config.clone()).await.unwrap();
    let bound = bootstrap.listener.local_addr().unwrap();
    assert_eq!(read_pid_file(&config.pid_path()).map(|(_, _, pid)| pid),
        Some(std::process::id() as i32));
    assert!(config.lock_path().exists());
    assert!(bound.port() > 0);

    bootstrap.guard.shutdown();
    assert!(!config.pid_path().exists());
    assert!(!config.lock_path().exists());
}

#[tokio::test]
async fn second_start_sees_live_pid_and_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    let bootstrap = startup(config.clone()).await.unwrap();

    // A second start (skipping the lock, as a racing process would not
    // hold it forever) refuses because the PID file names a live pid.
    let mut second = config.clone();
    second.skip_lock = true;
    let err = startup(second).await.unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyRunning { .. }));

    // The refusal must not have deleted the live server's PID file.
    assert!(config.pid_path().exists());
    bootstrap.guard.shutdown();
}

#[tokio::test]
async fn fresh_lock_blocks_racing_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    std::fs::create_dir_all(&config.data_dir).unwrap();
    std::fs::write(config.lock_path(), b"999999\n").unwrap();

    let err = startup(config).await.unwrap_err();
    assert!(matches!(err, LifecycleError::LockBusy));
}

#[tokio::test]
async fn stale_lock_is_reclaimed() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    std::fs::create_dir_all(&config.data_dir).unwrap();
    std::fs::write(config.lock_path(), b"999999\n").unwrap();

    // Backdate the lock beyond the staleness threshold.
    let old = std::time::SystemTime::now() - Duration::from_secs(60);
    let file = std::fs::OpenOptions::new().write(true).open(config.lock_path()).unwrap();
    file.set_times(std::fs::FileTimes::new().set_modified(old)).unwrap();

    let bootstrap = startup(config).await.unwrap();
    bootstrap.guard.shutdown();
}

#[tokio::test]
async fn dead_pid_file_is_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    std::fs::create_dir_all(&config.data_dir).unwrap();
    write_pid_file(&config.pid_path(), "127.0.0.1", 5000, i32::MAX - 1).unwrap();

    let bootstrap = startup(config.clone()).await.unwrap();
    // The stale entry was replaced with ours.
    assert_eq!(
        read_pid_file(&config.pid_path()).map(|(_, _, pid)| pid),
        Some(std::process::id() as i32)
    );
    bootstrap.guard.shutdown();
}

#[tokio::test]
async fn bind_failure_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);

    // Occupy a port, then ask the server to bind it.
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    config.port = taken.local_addr().unwrap().port();

    let err = startup(config.clone()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::BindFailed { .. }));
    // Lock and PID file were not left behind.
    assert!(!config.lock_path().exists());
    assert!(!config.pid_path().exists());
}
