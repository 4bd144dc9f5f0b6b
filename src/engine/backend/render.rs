use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::{Reading, Unit};
use crate::calibration::CalibrationStatus;

/// Controls whose labels the core drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Measure,
    Calibrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonLabel {
    Start,
    Stop,
    Calibrate,
    SetZero,
}

impl fmt::Display for ButtonLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ButtonLabel::Start => "Start Measuring",
            ButtonLabel::Stop => "Stop",
            ButtonLabel::Calibrate => "Calibrate",
            ButtonLabel::SetZero => "Set Zero",
        };
        f.write_str(text)
    }
}

/// Trait implemented by the presentation layer.
///
/// Calls always happen from the engine's event loop, never from inside a
/// sensor callback.
pub trait Renderer: Send + Sync {
    fn show_angle(&self, value: f64, unit: Unit);

    /// Companion readout under the main value
    fn show_secondary(&self, _value: f64, _unit: Unit) {}

    fn show_bubble(&self, displacement_percent: f64, off_level: bool);

    fn show_calibration_status(&self, status: &CalibrationStatus);

    fn show_button_label(&self, button: Button, label: ButtonLabel);
}

/// Push a full reading through the renderer's individual hooks
pub fn render_reading(renderer: &dyn Renderer, reading: &Reading) {
    renderer.show_angle(reading.primary.value, reading.primary.unit);
    renderer.show_secondary(reading.secondary.value, reading.secondary.unit);
    renderer.show_bubble(
        reading.bubble.displacement_percent,
        reading.bubble.off_level,
    );
}
