// Sensor access error types and constants

use crate::engine::backend::ConsumerKind;
use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Sensor error code constants
///
/// Single source of truth for codes shared with the host UI.
///
/// Error code range: 1001-1005
pub struct SensorErrorCodes {}

impl SensorErrorCodes {
    /// Device has no orientation capability
    pub const UNSUPPORTED: i32 = 1001;

    /// User declined sensor access
    pub const PERMISSION_DENIED: i32 = 1002;

    /// Permission prompt could not be shown or errored
    pub const PERMISSION_REQUEST_FAILED: i32 = 1003;

    /// Sensor source refused the subscription
    pub const SUBSCRIBE_FAILED: i32 = 1004;

    /// Another consumer already owns the sensor stream
    pub const CONSUMER_BUSY: i32 = 1005;
}

/// Log a sensor error with structured context
///
/// This function logs sensor errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: The operation that failed
pub fn log_sensor_error(err: &SensorError, context: &str) {
    error!(
        "Sensor error in {}: code={}, component=SensorSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Sensor-related errors
///
/// These errors prevent a measurement or calibration from starting. None of
/// them are retried automatically.
///
/// Error code ranges: 1001-1005
#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    /// No orientation capability present
    Unsupported,

    /// User declined access; must retry manually
    PermissionDenied,

    /// Permission request itself failed
    PermissionRequestFailed { reason: String },

    /// Subscription to the sample stream failed
    SubscribeFailed { reason: String },

    /// The sensor stream is owned by another consumer
    ConsumerBusy { active: ConsumerKind },
}

impl ErrorCode for SensorError {
    fn code(&self) -> i32 {
        match self {
            SensorError::Unsupported => SensorErrorCodes::UNSUPPORTED,
            SensorError::PermissionDenied => SensorErrorCodes::PERMISSION_DENIED,
            SensorError::PermissionRequestFailed { .. } => {
                SensorErrorCodes::PERMISSION_REQUEST_FAILED
            }
            SensorError::SubscribeFailed { .. } => SensorErrorCodes::SUBSCRIBE_FAILED,
            SensorError::ConsumerBusy { .. } => SensorErrorCodes::CONSUMER_BUSY,
        }
    }

    fn message(&self) -> String {
        match self {
            SensorError::Unsupported => "Device orientation not supported".to_string(),
            SensorError::PermissionDenied => "Sensor permission denied".to_string(),
            SensorError::PermissionRequestFailed { reason } => {
                format!("Permission request failed: {}", reason)
            }
            SensorError::SubscribeFailed { reason } => {
                format!("Sensor subscription failed: {}", reason)
            }
            SensorError::ConsumerBusy { active } => {
                format!("Sensor stream busy: {} in progress", active.display_name())
            }
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SensorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SensorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_codes() {
        assert_eq!(SensorError::Unsupported.code(), SensorErrorCodes::UNSUPPORTED);
        assert_eq!(
            SensorError::PermissionDenied.code(),
            SensorErrorCodes::PERMISSION_DENIED
        );
        assert_eq!(
            SensorError::PermissionRequestFailed {
                reason: "test".to_string()
            }
            .code(),
            SensorErrorCodes::PERMISSION_REQUEST_FAILED
        );
        assert_eq!(
            SensorError::SubscribeFailed {
                reason: "test".to_string()
            }
            .code(),
            SensorErrorCodes::SUBSCRIBE_FAILED
        );
        assert_eq!(
            SensorError::ConsumerBusy {
                active: ConsumerKind::Calibration
            }
            .code(),
            SensorErrorCodes::CONSUMER_BUSY
        );
    }

    #[test]
    fn test_sensor_error_messages() {
        let err = SensorError::ConsumerBusy {
            active: ConsumerKind::Measurement,
        };
        assert_eq!(err.message(), "Sensor stream busy: measurement in progress");

        let err = SensorError::SubscribeFailed {
            reason: "listener limit".to_string(),
        };
        assert_eq!(err.message(), "Sensor subscription failed: listener limit");

        assert!(SensorError::Unsupported.message().contains("not supported"));
    }

    #[test]
    fn test_sensor_error_display() {
        let err = SensorError::PermissionDenied;
        let display = format!("{}", err);
        assert!(display.contains("SensorError"));
        assert!(display.contains("1002"));
    }
}
