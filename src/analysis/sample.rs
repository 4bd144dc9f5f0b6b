// Orientation sample types delivered by the sensor source

use serde::{Deserialize, Serialize};

/// Screen orientation the device reported when the sample was taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationMode {
    #[default]
    Portrait,
    Landscape,
    LandscapeSecondary,
}

impl OrientationMode {
    /// Both landscape variants read the gamma axis
    pub fn is_landscape(&self) -> bool {
        matches!(
            self,
            OrientationMode::Landscape | OrientationMode::LandscapeSecondary
        )
    }
}

/// One reading of device tilt
///
/// `beta` is front-back tilt, `gamma` is left-right tilt, both in degrees.
/// Either may be absent when the platform delivers a null reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub gamma: Option<f64>,
    #[serde(default)]
    pub mode: OrientationMode,
}

impl OrientationSample {
    pub fn new(beta: f64, gamma: f64, mode: OrientationMode) -> Self {
        Self {
            beta: Some(beta),
            gamma: Some(gamma),
            mode,
        }
    }

    pub fn portrait(beta: f64, gamma: f64) -> Self {
        Self::new(beta, gamma, OrientationMode::Portrait)
    }

    pub fn landscape(beta: f64, gamma: f64) -> Self {
        Self::new(beta, gamma, OrientationMode::Landscape)
    }
}

/// Why a sample produced no display update
///
/// Neither variant is surfaced to the user; both only feed diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleRejection {
    /// Relevant axis was not a finite number
    Invalid,
    /// Jump from the last accepted angle exceeded the spike threshold
    Spike { delta: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_is_landscape() {
        assert!(!OrientationMode::Portrait.is_landscape());
        assert!(OrientationMode::Landscape.is_landscape());
        assert!(OrientationMode::LandscapeSecondary.is_landscape());
    }

    #[test]
    fn test_sample_deserializes_null_axes() {
        let sample: OrientationSample =
            serde_json::from_str(r#"{ "beta": null, "gamma": 3.5, "mode": "landscape_secondary" }"#)
                .unwrap();
        assert_eq!(sample.beta, None);
        assert_eq!(sample.gamma, Some(3.5));
        assert_eq!(sample.mode, OrientationMode::LandscapeSecondary);
    }
}
