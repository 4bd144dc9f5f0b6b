// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2005
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Sample target not reached within the collection window
    pub const TIMEOUT: i32 = 2001;

    /// Every collected reading was discarded as an outlier
    pub const EMPTY: i32 = 2002;

    /// Calibration already in progress
    pub const ALREADY_IN_PROGRESS: i32 = 2003;

    /// Operation requires an active calibration
    pub const NOT_IN_PROGRESS: i32 = 2004;

    /// Not enough readings to compute an offset
    pub const INSUFFICIENT_SAMPLES: i32 = 2005;
}

/// Log a calibration error with structured context
///
/// This function logs calibration errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: The operation that failed
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// Any of these abort the current attempt; the previously committed offset
/// stays active.
///
/// Error code ranges: 2001-2005
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Collection window elapsed before reaching the target
    Timeout { collected: usize, required: usize },

    /// Outlier rejection left nothing to average
    Empty { collected: usize },

    /// Calibration already in progress
    AlreadyInProgress,

    /// No calibration is collecting
    NotInProgress,

    /// Offset requested from too few readings
    InsufficientSamples { required: usize, collected: usize },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::Timeout { .. } => CalibrationErrorCodes::TIMEOUT,
            CalibrationError::Empty { .. } => CalibrationErrorCodes::EMPTY,
            CalibrationError::AlreadyInProgress => CalibrationErrorCodes::ALREADY_IN_PROGRESS,
            CalibrationError::NotInProgress => CalibrationErrorCodes::NOT_IN_PROGRESS,
            CalibrationError::InsufficientSamples { .. } => {
                CalibrationErrorCodes::INSUFFICIENT_SAMPLES
            }
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::Timeout {
                collected,
                required,
            } => format!(
                "Calibration timed out: collected {} of {} samples",
                collected, required
            ),
            CalibrationError::Empty { collected } => format!(
                "All {} calibration samples were rejected as outliers",
                collected
            ),
            CalibrationError::AlreadyInProgress => "Calibration already in progress".to_string(),
            CalibrationError::NotInProgress => "Calibration not in progress".to_string(),
            CalibrationError::InsufficientSamples {
                required,
                collected,
            } => {
                format!("Insufficient samples: need {}, got {}", required, collected)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
