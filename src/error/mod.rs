// Error types for the slope meter core
//
// This module defines custom error types for sensor access, calibration and
// persistence, providing structured error handling with numeric codes the host
// UI can map to messages.

mod calibration;
mod persistence;
mod sensor;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use persistence::{log_persistence_error, PersistenceError, PersistenceErrorCodes};
pub use sensor::{log_sensor_error, SensorError, SensorErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the host boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
