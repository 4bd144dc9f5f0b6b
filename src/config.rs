//! Configuration management for pipeline tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration without recompilation. Filter constants,
//! calibration windows, timer intervals and the upside-down handling rule
//! can all be adjusted via the config file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Config shipped with the crate
pub const BUNDLED_CONFIG_PATH: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/assets/slope_config.json");

/// Upper bound for `calibration.sample_target`
pub const MAX_CALIBRATION_SAMPLES: usize = 1_000;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub orientation: OrientationConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// How a portrait-held device that is upside down gets its angle corrected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipRule {
    /// angle -> -angle
    Negate,
    /// angle -> 180 - angle
    Supplement,
}

/// Axis selection and upside-down handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrientationConfig {
    /// Correction applied in portrait when |gamma| exceeds the flip threshold
    pub portrait_flip: FlipRule,
    /// Negate the gamma reading once more in secondary landscape
    pub landscape_secondary_inverts: bool,
    /// |beta| (landscape) or |gamma| (portrait) above this means the device is flipped
    pub flip_threshold_degrees: f64,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            portrait_flip: FlipRule::Negate,
            landscape_secondary_inverts: true,
            flip_threshold_degrees: 90.0,
        }
    }
}

/// Smoothing filter constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Weight of the previous accepted angle (0.0 - 1.0)
    pub smoothing: f64,
    /// Sample-to-sample jump treated as sensor noise (degrees)
    pub spike_threshold_degrees: f64,
    /// Output is clamped to +/- this value; also full bubble deflection
    pub max_angle_degrees: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.8,
            spike_threshold_degrees: 45.0,
            max_angle_degrees: 20.0,
        }
    }
}

/// Calibration procedure configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Raw readings collected before the offset is computed
    pub sample_target: usize,
    /// Collection window before the attempt is abandoned
    pub timeout_ms: u64,
    /// Persisted offsets older than this are ignored on startup (24h)
    pub max_age_ms: u64,
    /// How long the completion/failure status stays on screen
    pub status_display_ms: u64,
    /// Tukey fence multiplier for outlier rejection
    pub iqr_multiplier: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_target: 10,
            timeout_ms: 10_000,
            max_age_ms: 24 * 60 * 60 * 1000,
            status_display_ms: 2_000,
            iqr_multiplier: 1.5,
        }
    }
}

/// Measurement session timers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Period of the sensor liveness check
    pub liveness_interval_ms: u64,
    /// Silence longer than this flags the sensor as stalled
    pub silence_threshold_ms: u64,
    /// Paint cycle period used by the async driver (~60 fps)
    pub frame_interval_ms: u64,
    /// Granularity at which the async driver polls deadlines
    pub timer_resolution_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            liveness_interval_ms: 1_000,
            silence_threshold_ms: 1_000,
            frame_interval_ms: 16,
            timer_resolution_ms: 100,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid.
    /// Missing sections fall back to their own defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                        config
                    }
                    Err(reason) => {
                        log::warn!(
                            "[Config] Rejected config file {:?}: {}. Using defaults.",
                            path.as_ref(),
                            reason
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Check every value the pipeline relies on for its arithmetic
    ///
    /// # Returns
    /// * `Ok(())` - Configuration is usable as-is
    /// * `Err(String)` - First offending field and its value
    pub fn validate(&self) -> Result<(), String> {
        let filter = &self.filter;
        if !(filter.max_angle_degrees.is_finite() && filter.max_angle_degrees > 0.0) {
            return Err(format!(
                "filter.max_angle_degrees must be > 0, got {}",
                filter.max_angle_degrees
            ));
        }
        if !(0.0..=1.0).contains(&filter.smoothing) {
            return Err(format!(
                "filter.smoothing must be within [0, 1], got {}",
                filter.smoothing
            ));
        }
        if !(filter.spike_threshold_degrees.is_finite() && filter.spike_threshold_degrees > 0.0) {
            return Err(format!(
                "filter.spike_threshold_degrees must be > 0, got {}",
                filter.spike_threshold_degrees
            ));
        }

        let calibration = &self.calibration;
        if !(1..=MAX_CALIBRATION_SAMPLES).contains(&calibration.sample_target) {
            return Err(format!(
                "calibration.sample_target must be within [1, {}], got {}",
                MAX_CALIBRATION_SAMPLES, calibration.sample_target
            ));
        }
        if !(calibration.iqr_multiplier.is_finite() && calibration.iqr_multiplier >= 0.0) {
            return Err(format!(
                "calibration.iqr_multiplier must be >= 0, got {}",
                calibration.iqr_multiplier
            ));
        }

        if self.orientation.flip_threshold_degrees.is_nan() {
            return Err("orientation.flip_threshold_degrees is NaN".to_string());
        }
        Ok(())
    }

    /// Load configuration from the bundled assets directory
    pub fn load() -> Self {
        Self::load_from_file(BUNDLED_CONFIG_PATH)
    }
}
