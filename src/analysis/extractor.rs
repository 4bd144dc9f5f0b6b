// AngleExtractor - raw tilt angle from one orientation sample
//
// Portrait reads beta (front-back tilt), landscape reads gamma (left-right
// tilt). Upside-down devices are detected from the *other* axis exceeding the
// flip threshold and corrected with a single configured rule.

use crate::analysis::sample::{OrientationMode, OrientationSample, SampleRejection};
use crate::config::{FlipRule, OrientationConfig};

/// Pure mapping from orientation samples to raw angles
#[derive(Debug, Clone)]
pub struct AngleExtractor {
    portrait_flip: FlipRule,
    landscape_secondary_inverts: bool,
    flip_threshold: f64,
}

impl AngleExtractor {
    pub fn new(config: &OrientationConfig) -> Self {
        Self {
            portrait_flip: config.portrait_flip,
            landscape_secondary_inverts: config.landscape_secondary_inverts,
            flip_threshold: config.flip_threshold_degrees,
        }
    }

    /// Derive the raw, unranged angle in degrees
    ///
    /// # Returns
    /// * `Ok(f64)` - Raw angle
    /// * `Err(SampleRejection::Invalid)` - Result is not a finite number
    pub fn extract(&self, sample: &OrientationSample) -> Result<f64, SampleRejection> {
        let beta = sample.beta.unwrap_or(0.0);
        let gamma = sample.gamma.unwrap_or(0.0);

        let angle = if sample.mode.is_landscape() {
            let mut angle = gamma;
            if beta.abs() > self.flip_threshold {
                angle = -angle;
            }
            if sample.mode == OrientationMode::LandscapeSecondary
                && self.landscape_secondary_inverts
            {
                angle = -angle;
            }
            angle
        } else {
            let angle = beta;
            if gamma.abs() > self.flip_threshold {
                match self.portrait_flip {
                    FlipRule::Negate => -angle,
                    FlipRule::Supplement => 180.0 - angle,
                }
            } else {
                angle
            }
        };

        if angle.is_finite() {
            Ok(angle)
        } else {
            Err(SampleRejection::Invalid)
        }
    }
}

impl Default for AngleExtractor {
    fn default() -> Self {
        Self::new(&OrientationConfig::default())
    }
}
