// Progress reporting for the calibration workflow
//
// CalibrationStatus is what the renderer shows under the calibrate button;
// CalibrationPhase is the engine's own view of where it is.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the calibration state machine currently sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPhase {
    Idle,
    /// Gathering readings toward the sample target
    Collecting,
    /// Target reached, offset being computed and persisted
    Completing,
}

/// Status line pushed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CalibrationStatus {
    /// Collection running
    Collecting { collected: usize, target: usize },
    /// New offset committed
    Complete { offset_degrees: f64 },
    /// Collection window elapsed
    TimedOut,
    /// Attempt aborted with the given error code
    Failed { code: i32 },
    /// Nothing to show
    Cleared,
}

impl CalibrationStatus {
    /// Outcome statuses; the engine schedules these for auto-clear
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CalibrationStatus::Complete { .. }
                | CalibrationStatus::TimedOut
                | CalibrationStatus::Failed { .. }
        )
    }

    /// Collection progress as a whole percentage (0-100)
    pub fn percentage(&self) -> Option<u8> {
        match self {
            CalibrationStatus::Collecting { collected, target } if *target > 0 => {
                let pct = (*collected.min(target) * 100) / *target;
                Some(pct as u8)
            }
            CalibrationStatus::Collecting { .. } => Some(0),
            _ => None,
        }
    }
}

impl fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationStatus::Collecting { .. } => f.write_str("Place device on level surface..."),
            CalibrationStatus::Complete { .. } => f.write_str("Calibration complete!"),
            CalibrationStatus::TimedOut => f.write_str("Calibration timed out"),
            CalibrationStatus::Failed { code } => write!(f, "Calibration failed (code {code})"),
            CalibrationStatus::Cleared => Ok(()),
        }
    }
}
