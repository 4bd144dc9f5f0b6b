// CalibrationState - the committed zero offset
//
// Persisted as {"offsetDegrees": f64, "timestamp": millis}. A record older
// than the configured max age is treated as if it did not exist.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::backend::Timestamp;
use crate::error::PersistenceError;

/// Offset subtracted from every measured angle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationState {
    /// Degrees subtracted from each raw angle
    pub offset_degrees: f64,
    /// When the offset was computed
    #[serde(rename = "timestamp")]
    pub computed_at: Timestamp,
}

impl CalibrationState {
    pub fn new(offset_degrees: f64, computed_at: Timestamp) -> Self {
        Self {
            offset_degrees,
            computed_at,
        }
    }

    /// Uncalibrated state (offset 0)
    pub fn zero() -> Self {
        Self::new(0.0, Timestamp::default())
    }

    /// Age relative to `now`; a timestamp in the future counts as age zero
    pub fn age(&self, now: Timestamp) -> Duration {
        now.saturating_since(self.computed_at)
    }

    pub fn is_expired(&self, now: Timestamp, max_age: Duration) -> bool {
        self.age(now) >= max_age
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        serde_json::to_string(self).map_err(|err| PersistenceError::WriteFailed {
            reason: format!("serializing calibration: {err}"),
        })
    }

    /// Parse a stored record, rejecting non-finite offsets
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        let state: Self = serde_json::from_str(json).map_err(|err| PersistenceError::Corrupt {
            reason: err.to_string(),
        })?;

        if !state.offset_degrees.is_finite() {
            return Err(PersistenceError::Corrupt {
                reason: format!("offset {} is not finite", state.offset_degrees),
            });
        }

        Ok(state)
    }
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self::zero()
    }
}
