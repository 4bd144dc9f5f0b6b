//! Integration tests for the calibration workflow
//!
//! These tests validate calibration across the public API with a real
//! directory-backed store:
//! - Offset computation with outlier rejection
//! - Persistence across engine restarts and the 24h expiry
//! - Corrupt records, timeouts and consumer exclusivity

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use slope_meter::analysis::OrientationSample;
use slope_meter::calibration::{CalibrationState, CalibrationStatus};
use slope_meter::config::AppConfig;
use slope_meter::engine::backend::{
    ChannelSensorSource, ConsumerKind, ManualClock, ManualModeProvider, RecordingRenderer,
};
use slope_meter::engine::{CalibrationToggle, Collaborators, EngineHandle, Timestamp};
use slope_meter::error::SensorError;
use slope_meter::persistence::{JsonFileStore, PersistentStore, CALIBRATION_KEY};

const START_MS: u64 = 1_700_000_000_000;
const DAY_MS: u64 = 24 * 60 * 60 * 1000;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "slope_meter_calibration_{}_{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    dir
}

struct Device {
    engine: EngineHandle,
    sensor: Arc<ChannelSensorSource>,
    clock: Arc<ManualClock>,
}

/// Boot an engine against the store directory, as if the app just launched
fn boot(dir: &Path, now_ms: u64) -> Device {
    let sensor = Arc::new(ChannelSensorSource::new());
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(now_ms)));
    let engine = EngineHandle::new(
        AppConfig::default(),
        Collaborators {
            sensor: sensor.clone(),
            orientation: Arc::new(ManualModeProvider::default()),
            renderer: Arc::new(RecordingRenderer::new()),
            store: Arc::new(JsonFileStore::new(dir)),
            clock: clock.clone(),
        },
    );
    Device {
        engine,
        sensor,
        clock,
    }
}

fn feed_betas(device: &mut Device, betas: &[f64]) {
    for beta in betas {
        device.clock.advance(Duration::from_millis(100));
        device.sensor.push(OrientationSample::portrait(*beta, 0.0));
        device.engine.pump();
    }
}

/// Test full calibration workflow with one outlier, then a restart
#[tokio::test]
async fn test_full_calibration_workflow() {
    let dir = scratch_dir("workflow");
    let mut device = boot(&dir, START_MS);
    assert_eq!(device.engine.offset(), 0.0);

    let toggle = device.engine.toggle_calibration().await.unwrap();
    assert_eq!(toggle, CalibrationToggle::Started);
    assert!(device.engine.is_calibrating());
    assert_eq!(device.sensor.listener_count(), 1);

    feed_betas(&mut device, &[2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 30.0]);

    assert!(!device.engine.is_calibrating());
    assert_eq!(device.sensor.listener_count(), 0);
    assert_eq!(device.engine.offset(), 2.0);
    assert_eq!(
        device.engine.status(),
        CalibrationStatus::Complete { offset_degrees: 2.0 }
    );
    assert!(dir.join(format!("{CALIBRATION_KEY}.json")).exists());

    // Restart an hour later: the offset comes back from disk
    let restarted = boot(&dir, START_MS + 60 * 60 * 1000);
    assert_eq!(restarted.engine.offset(), 2.0);

    let _ = fs::remove_dir_all(&dir);
}

/// Test that a stored offset older than a day is ignored
#[test]
fn test_expired_offset_is_ignored() {
    let dir = scratch_dir("expired");
    let store = JsonFileStore::new(&dir);
    let state = CalibrationState::new(3.0, Timestamp::from_millis(START_MS));
    store
        .save(CALIBRATION_KEY, &state.to_json().unwrap())
        .unwrap();

    assert_eq!(boot(&dir, START_MS + DAY_MS - 1).engine.offset(), 3.0);
    assert_eq!(boot(&dir, START_MS + DAY_MS).engine.offset(), 0.0);

    let _ = fs::remove_dir_all(&dir);
}

/// Test that a corrupt record yields zero offset and a telemetry event
#[test]
fn test_corrupt_record_falls_back_to_zero() {
    let dir = scratch_dir("corrupt");
    let store = JsonFileStore::new(&dir);
    store.save(CALIBRATION_KEY, "{not json").unwrap();

    let device = boot(&dir, START_MS);
    assert_eq!(device.engine.offset(), 0.0);
    assert_eq!(device.engine.telemetry().counters().persistence_failures, 1);

    let _ = fs::remove_dir_all(&dir);
}

/// Test that collection stops after the timeout with the old offset intact
#[test]
fn test_calibration_timeout_keeps_previous_offset() {
    let dir = scratch_dir("timeout");
    let store = JsonFileStore::new(&dir);
    let state = CalibrationState::new(1.0, Timestamp::from_millis(START_MS));
    store
        .save(CALIBRATION_KEY, &state.to_json().unwrap())
        .unwrap();

    let mut device = boot(&dir, START_MS);
    device.engine.start_calibration().unwrap();
    feed_betas(&mut device, &[4.0, 4.0, 4.0]);

    device.clock.advance(Duration::from_millis(10_000));
    let report = device.engine.poll_timers();
    assert!(report.calibration_timed_out);
    assert!(!device.engine.is_calibrating());
    assert_eq!(device.engine.status(), CalibrationStatus::TimedOut);
    assert_eq!(device.engine.offset(), 1.0);

    // The status message clears itself after two seconds
    device.clock.advance(Duration::from_millis(2_000));
    assert!(device.engine.poll_timers().status_cleared);
    assert_eq!(device.engine.status(), CalibrationStatus::Cleared);

    let _ = fs::remove_dir_all(&dir);
}

/// Test that pressing calibrate again finishes with the readings so far
#[tokio::test]
async fn test_second_press_forces_completion() {
    let dir = scratch_dir("forced");
    let mut device = boot(&dir, START_MS);

    device.engine.toggle_calibration().await.unwrap();
    let early = device.engine.toggle_calibration().await.unwrap();
    assert_eq!(early, CalibrationToggle::StillCollecting);
    assert!(device.engine.is_calibrating());

    feed_betas(&mut device, &[1.0, 3.0]);
    match device.engine.toggle_calibration().await.unwrap() {
        CalibrationToggle::Completed(outcome) => {
            assert!(outcome.forced);
            assert_eq!(outcome.offset_degrees, 2.0);
        }
        other => panic!("expected forced completion, got {other:?}"),
    }
    assert_eq!(device.engine.offset(), 2.0);

    let _ = fs::remove_dir_all(&dir);
}

/// Test that measurement and calibration never share the sensor
#[tokio::test]
async fn test_consumers_are_exclusive() {
    let dir = scratch_dir("exclusive");
    let mut device = boot(&dir, START_MS);

    device.engine.start_measuring().unwrap();
    assert_eq!(
        device.engine.toggle_calibration().await,
        Err(SensorError::ConsumerBusy {
            active: ConsumerKind::Measurement
        })
    );
    assert_eq!(device.sensor.listener_count(), 1);

    device.engine.stop_measuring();
    device.engine.start_calibration().unwrap();
    assert_eq!(
        device.engine.toggle_measurement().await,
        Err(SensorError::ConsumerBusy {
            active: ConsumerKind::Calibration
        })
    );
    assert_eq!(device.sensor.listener_count(), 1);

    let _ = fs::remove_dir_all(&dir);
}

/// Test that clearing drops both the in-memory and the persisted offset
#[test]
fn test_clear_calibration_removes_record() {
    let dir = scratch_dir("clear");
    let store = JsonFileStore::new(&dir);
    let state = CalibrationState::new(-2.5, Timestamp::from_millis(START_MS));
    store
        .save(CALIBRATION_KEY, &state.to_json().unwrap())
        .unwrap();

    let mut device = boot(&dir, START_MS);
    assert_eq!(device.engine.offset(), -2.5);

    device.engine.clear_calibration().unwrap();
    assert_eq!(device.engine.offset(), 0.0);
    assert_eq!(store.load(CALIBRATION_KEY).unwrap(), None);

    let _ = fs::remove_dir_all(&dir);
}
