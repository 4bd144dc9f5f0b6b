//! Metric event types published by the engine and exposed to the CLI.

use serde::{Deserialize, Serialize};

/// Engine lifecycle transitions worth recording.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    MeasurementStarted,
    MeasurementStopped,
    CalibrationStarted,
    CalibrationFinished,
    OrientationChanged,
    PermissionsGranted,
    PermissionsDenied,
}

/// Pipeline anomalies and state changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Sample produced a non-finite angle
    InvalidSample,
    /// Sample jumped further than the spike threshold
    SensorSpike { delta: f64 },
    /// No samples for longer than the silence threshold
    SensorSilence { silent_ms: u64 },
    /// Samples arrived again after a silence
    SensorResumed,
    CalibrationCompleted {
        offset_degrees: f64,
        kept: usize,
        discarded: usize,
        forced: bool,
    },
    CalibrationFailed { code: i32 },
    PersistenceFailure { context: String },
    Lifecycle { phase: LifecyclePhase },
}
