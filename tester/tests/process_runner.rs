//! Subprocess runner tests against real `sh` processes

#![cfg(unix)]

use assert_matches::assert_matches;
use shared::ProcessState;
use std::sync::Arc;
use std::time::Duration;
use tester::*;
use uuid::Uuid;

mod common;
use common::TestHelpers;

/// Test that a synchronous run returns stdout and stderr together
#[tokio::test]
async fn test_run_sync_combines_output() {
    // Arrange
    let runner = SystemProcessRunner::default();
    let spec = TestHelpers::sh("echo to-stdout; echo to-stderr >&2");

    // Act
    let output = runner.run_sync(&spec).await.unwrap();

    // Assert
    assert_eq!(output.exit_code, Some(0));
    assert!(output.output.contains("to-stdout"));
    assert!(output.output.contains("to-stderr"));
}

/// Test that a synchronous run honours the working directory
#[tokio::test]
async fn test_run_sync_uses_working_directory() {
    // Arrange
    let workdir = tempfile::tempdir().unwrap();
    let canonical = workdir.path().canonicalize().unwrap();
    let runner = SystemProcessRunner::default();
    let spec = TestHelpers::sh("pwd -P").current_dir(workdir.path());

    // Act
    let output = runner.run_sync(&spec).await.unwrap();

    // Assert
    assert_eq!(output.output.trim(), canonical.to_string_lossy());
}

/// Test that a non-zero exit is an error that still carries the output
#[tokio::test]
async fn test_run_sync_non_zero_exit_keeps_output() {
    // Arrange
    let runner = SystemProcessRunner::default();
    let spec = TestHelpers::sh("echo partial progress; exit 3");

    // Act
    let result = runner.run_sync(&spec).await;

    // Assert
    let err = result.unwrap_err();
    assert_matches!(&err, HarnessError::NonZeroExit { status, .. } if status.contains('3'));
    assert_eq!(err.kind(), ErrorKind::NonZeroExit);
    assert!(err.output().unwrap().contains("partial progress"));
}

/// Test that a missing executable is reported as a spawn failure
#[tokio::test]
async fn test_missing_executable_is_spawn_failure() {
    // Arrange
    let runner = SystemProcessRunner::default();
    let spec = CommandSpec::new("/nonexistent/e2e/run.sh");

    // Act & Assert
    assert_matches!(runner.run_sync(&spec).await, Err(HarnessError::SpawnFailure { .. }));
    assert_matches!(runner.run_background(&spec).await, Err(HarnessError::SpawnFailure { .. }));
}

/// Test the Running -> Stopped transition and that a second stop fails
#[tokio::test]
async fn test_background_stop_then_second_stop_fails() {
    // Arrange
    let runner = SystemProcessRunner::new(Duration::from_secs(5));
    let handle = runner
        .run_background(&TestHelpers::sh("echo ready; sleep 30"))
        .await
        .unwrap();
    assert!(handle.pid.is_some());
    assert!(TestHelpers::wait_for_output(&runner, &handle, "ready", Duration::from_secs(5)).await);
    assert_eq!(runner.status(&handle).await.unwrap(), ProcessState::Running);

    // Act
    let report = runner.stop(&handle).await.unwrap();

    // Assert
    assert!(report.output.contains("ready"));
    assert!(report.elapsed < Duration::from_secs(5));
    assert_eq!(runner.status(&handle).await.unwrap(), ProcessState::Stopped);
    assert_matches!(runner.stop(&handle).await, Err(HarnessError::ProcessNotRunning { .. }));
}

/// Test that a process ignoring SIGTERM is force killed and reported
#[tokio::test]
async fn test_stop_timeout_force_kills() {
    // Arrange
    let runner = SystemProcessRunner::new(Duration::from_millis(300));
    let handle = runner
        .run_background(&TestHelpers::sh("trap '' TERM; echo ready; sleep 30"))
        .await
        .unwrap();
    assert!(TestHelpers::wait_for_output(&runner, &handle, "ready", Duration::from_secs(5)).await);

    // Act
    let result = runner.stop(&handle).await;

    // Assert
    assert_matches!(result, Err(HarnessError::StopTimeout { grace, .. }) if grace == Duration::from_millis(300));
    assert_eq!(runner.status(&handle).await.unwrap(), ProcessState::Stopped);
}

/// Test that the Stopping state is observable while the process shuts down
#[tokio::test]
async fn test_stopping_state_is_observable() {
    // Arrange
    let runner = Arc::new(SystemProcessRunner::new(Duration::from_secs(10)));
    let handle = runner
        .run_background(&TestHelpers::sh(
            "trap 'sleep 1; exit 0' TERM; echo ready; while true; do sleep 0.1; done",
        ))
        .await
        .unwrap();
    assert!(TestHelpers::wait_for_output(&runner, &handle, "ready", Duration::from_secs(5)).await);
    let mut states = runner.subscribe(&handle).unwrap();

    // Act
    let stopper = {
        let runner = runner.clone();
        let handle = handle.clone();
        tokio::spawn(async move { runner.stop(&handle).await })
    };

    // Assert
    tokio::time::timeout(Duration::from_secs(5), states.wait_for(|state| *state == ProcessState::Stopping))
        .await
        .expect("never saw Stopping")
        .unwrap();
    assert_eq!(runner.status(&handle).await.unwrap(), ProcessState::Stopping);

    let report = stopper.await.unwrap().unwrap();
    assert_eq!(report.exit_code, Some(0));
    assert_eq!(runner.status(&handle).await.unwrap(), ProcessState::Stopped);
}

/// Test that a process exiting on its own is reported Stopped and cannot be stopped
#[tokio::test]
async fn test_self_exit_is_detected() {
    // Arrange
    let runner = SystemProcessRunner::default();
    let handle = runner.run_background(&TestHelpers::sh("echo done")).await.unwrap();

    // Act
    let stopped = TestHelpers::wait_for_state(&runner, &handle, ProcessState::Stopped, Duration::from_secs(5)).await;

    // Assert
    assert!(stopped);
    assert_matches!(runner.stop(&handle).await, Err(HarnessError::ProcessNotRunning { .. }));
}

/// Test that handles from elsewhere are rejected
#[tokio::test]
async fn test_unknown_handle_is_rejected() {
    // Arrange
    let runner = SystemProcessRunner::default();
    let stranger = ProcessHandle {
        id: Uuid::new_v4(),
        pid: None,
        label: "ghost".to_string(),
    };

    // Act & Assert
    assert_matches!(runner.status(&stranger).await, Err(HarnessError::UnknownProcess { .. }));
    assert_matches!(runner.stop(&stranger).await, Err(HarnessError::UnknownProcess { .. }));
    assert_matches!(runner.output(&stranger).await, Err(HarnessError::UnknownProcess { .. }));
}

/// Whether `pid` is a live (non-zombie) process
#[cfg(target_os = "linux")]
fn process_alive(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z" && state != "X"),
        Err(_) => false,
    }
}

/// Test that stopping a wrapper that already exited still terminates what it launched
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_stop_after_wrapper_exit_terminates_its_group() {
    // Arrange
    let workdir = tempfile::tempdir().unwrap();
    let pidfile = workdir.path().join("node.pid");
    let runner = SystemProcessRunner::new(Duration::from_secs(2));
    let script = format!(
        "sleep 30 >/dev/null 2>&1 & echo $! > {}; echo ready",
        pidfile.display()
    );
    let handle = runner.run_background(&TestHelpers::sh(&script)).await.unwrap();
    assert!(TestHelpers::wait_for_state(&runner, &handle, ProcessState::Stopped, Duration::from_secs(5)).await);
    let node_pid: i32 = std::fs::read_to_string(&pidfile).unwrap().trim().parse().unwrap();
    assert!(process_alive(node_pid));

    // Act
    let result = runner.stop(&handle).await;

    // Assert
    assert_matches!(result, Err(HarnessError::ProcessNotRunning { .. }));
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while process_alive(node_pid) && std::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!process_alive(node_pid), "process {node_pid} survived the stop");
}

/// Test that dropping the runner cleans up a group whose leader already exited
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_drop_after_wrapper_exit_kills_its_group() {
    // Arrange
    let workdir = tempfile::tempdir().unwrap();
    let pidfile = workdir.path().join("node.pid");
    let runner = SystemProcessRunner::new(Duration::from_secs(2));
    let script = format!(
        "trap '' TERM; sleep 30 >/dev/null 2>&1 & echo $! > {}; echo ready",
        pidfile.display()
    );
    let handle = runner.run_background(&TestHelpers::sh(&script)).await.unwrap();
    assert!(TestHelpers::wait_for_state(&runner, &handle, ProcessState::Stopped, Duration::from_secs(5)).await);
    let node_pid: i32 = std::fs::read_to_string(&pidfile).unwrap().trim().parse().unwrap();

    // Act
    drop(runner);

    // Assert
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while process_alive(node_pid) && std::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!process_alive(node_pid), "process {node_pid} survived the drop");
}

/// Test that a forgotten handle is released from the runner
#[tokio::test]
async fn test_forget_releases_stopped_process() {
    // Arrange
    let runner = SystemProcessRunner::default();
    let handle = runner.run_background(&TestHelpers::sh("echo done")).await.unwrap();
    assert!(TestHelpers::wait_for_state(&runner, &handle, ProcessState::Stopped, Duration::from_secs(5)).await);

    // Act
    runner.forget(&handle).unwrap();

    // Assert
    assert_matches!(runner.status(&handle).await, Err(HarnessError::UnknownProcess { .. }));
    assert_matches!(runner.forget(&handle), Err(HarnessError::UnknownProcess { .. }));
}
