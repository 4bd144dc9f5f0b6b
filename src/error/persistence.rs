// Persistence error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Persistence error code constants
///
/// Error code range: 3001-3003
pub struct PersistenceErrorCodes {}

impl PersistenceErrorCodes {
    /// Backing store could not be reached
    pub const UNAVAILABLE: i32 = 3001;

    /// Stored value could not be decoded
    pub const CORRUPT: i32 = 3002;

    /// Value could not be written
    pub const WRITE_FAILED: i32 = 3003;
}

/// Log a persistence error with structured context
///
/// Persistence failures never block measurement, so they are logged at warn
/// level rather than error.
pub fn log_persistence_error(err: &PersistenceError, context: &str) {
    warn!(
        "Persistence error in {}: code={}, component=PersistentStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Persistence-related errors
///
/// Error code ranges: 3001-3003
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// Store unavailable (I/O error, missing directory, ...)
    Unavailable { reason: String },

    /// Stored record is not valid
    Corrupt { reason: String },

    /// Write rejected by the store
    WriteFailed { reason: String },
}

impl ErrorCode for PersistenceError {
    fn code(&self) -> i32 {
        match self {
            PersistenceError::Unavailable { .. } => PersistenceErrorCodes::UNAVAILABLE,
            PersistenceError::Corrupt { .. } => PersistenceErrorCodes::CORRUPT,
            PersistenceError::WriteFailed { .. } => PersistenceErrorCodes::WRITE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            PersistenceError::Unavailable { reason } => format!("Store unavailable: {}", reason),
            PersistenceError::Corrupt { reason } => format!("Stored value corrupt: {}", reason),
            PersistenceError::WriteFailed { reason } => format!("Write failed: {}", reason),
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PersistenceError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PersistenceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_codes() {
        let reason = "x".to_string();
        assert_eq!(
            PersistenceError::Unavailable {
                reason: reason.clone()
            }
            .code(),
            3001
        );
        assert_eq!(
            PersistenceError::Corrupt {
                reason: reason.clone()
            }
            .code(),
            3002
        );
        assert_eq!(PersistenceError::WriteFailed { reason }.code(), 3003);
    }

    #[test]
    fn test_persistence_error_message() {
        let err = PersistenceError::Corrupt {
            reason: "expected value at line 1".to_string(),
        };
        assert_eq!(
            err.message(),
            "Stored value corrupt: expected value at line 1"
        );
    }
}
