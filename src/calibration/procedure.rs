// CalibrationProcedure - one in-flight collection attempt
//
// Exists only while the engine is collecting. Holds the raw readings and the
// deadline after which the attempt times out.

use std::time::Duration;

use crate::calibration::statistics::{self, IqrFilter};
use crate::config::MAX_CALIBRATION_SAMPLES;
use crate::engine::backend::Timestamp;
use crate::error::CalibrationError;

/// Offset computed from a procedure's readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedOffset {
    pub offset_degrees: f64,
    pub kept: usize,
    pub discarded: usize,
}

/// Readings collected for a single calibration attempt
#[derive(Debug, Clone)]
pub struct CalibrationProcedure {
    readings: Vec<f64>,
    sample_target: usize,
    deadline: Timestamp,
}

impl CalibrationProcedure {
    /// Start a new attempt at `now` that expires after `timeout`
    pub fn new(sample_target: usize, now: Timestamp, timeout: Duration) -> Self {
        Self {
            readings: Vec::with_capacity(sample_target.min(MAX_CALIBRATION_SAMPLES)),
            sample_target: sample_target.max(1),
            deadline: now.saturating_add(timeout),
        }
    }

    /// Append a reading; returns true once the target is reached
    pub fn push(&mut self, angle: f64) -> bool {
        if self.readings.len() < self.sample_target {
            self.readings.push(angle);
        }
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.readings.len() >= self.sample_target
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.deadline
    }

    pub fn collected(&self) -> usize {
        self.readings.len()
    }

    pub fn sample_target(&self) -> usize {
        self.sample_target
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    /// Mean of the readings that survive the IQR fences
    pub fn robust_offset(&self, iqr_multiplier: f64) -> Result<ComputedOffset, CalibrationError> {
        if !self.is_full() {
            return Err(CalibrationError::InsufficientSamples {
                required: self.sample_target,
                collected: self.collected(),
            });
        }

        let IqrFilter {
            kept, discarded, ..
        } = statistics::iqr_filter(&self.readings, iqr_multiplier);

        let offset_degrees = statistics::mean(&kept).ok_or(CalibrationError::Empty {
            collected: self.collected(),
        })?;

        Ok(ComputedOffset {
            offset_degrees,
            kept: kept.len(),
            discarded,
        })
    }

    /// Plain mean of whatever has been collected, no outlier rejection
    pub fn plain_offset(&self) -> Result<ComputedOffset, CalibrationError> {
        let offset_degrees =
            statistics::mean(&self.readings).ok_or(CalibrationError::InsufficientSamples {
                required: 1,
                collected: 0,
            })?;

        Ok(ComputedOffset {
            offset_degrees,
            kept: self.collected(),
            discarded: 0,
        })
    }
}
