// UnitConverter - angle to display values and bubble position

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Run length used for the slope ratio (inches of rise per 12-inch run)
const SLOPE_RUN: f64 = 12.0;

/// Bubble travel from centre to either end, as a percentage of the vial
const BUBBLE_HALF_TRAVEL: f64 = 50.0;

/// Within this many degrees the bubble counts as level
const LEVEL_TOLERANCE_DEGREES: f64 = 0.5;

/// Display unit for the primary readout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Degree,
    SlopeRatio,
    Percent,
}

impl Unit {
    /// Next unit in the toggle cycle: degree -> slope ratio -> percent -> degree
    pub fn next(&self) -> Unit {
        match self {
            Unit::Degree => Unit::SlopeRatio,
            Unit::SlopeRatio => Unit::Percent,
            Unit::Percent => Unit::Degree,
        }
    }

    /// Unit shown in the secondary readout alongside this one
    pub fn companion(&self) -> Unit {
        match self {
            Unit::Degree => Unit::SlopeRatio,
            Unit::SlopeRatio | Unit::Percent => Unit::Degree,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Degree => "°",
            Unit::SlopeRatio => "in/ft",
            Unit::Percent => "%",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Round to one decimal place, folding negative zero into zero
fn round_tenth(value: f64) -> f64 {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Convert a calibrated angle (degrees) to the requested unit, 1 decimal
pub fn convert(angle_degrees: f64, unit: Unit) -> f64 {
    match unit {
        Unit::Degree => round_tenth(angle_degrees),
        Unit::SlopeRatio => round_tenth((angle_degrees * PI / 180.0).tan() * SLOPE_RUN),
        Unit::Percent => round_tenth((angle_degrees * PI / 180.0).tan() * 100.0),
    }
}

/// Bubble placement relative to the vial centre
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BubblePosition {
    /// -50 (full left) to 50 (full right)
    pub displacement_percent: f64,
    pub off_level: bool,
}

impl BubblePosition {
    pub fn from_angle(angle_degrees: f64, max_angle: f64) -> Self {
        let displacement = (angle_degrees / max_angle * BUBBLE_HALF_TRAVEL)
            .clamp(-BUBBLE_HALF_TRAVEL, BUBBLE_HALF_TRAVEL);
        Self {
            displacement_percent: displacement,
            off_level: angle_degrees.abs() > LEVEL_TOLERANCE_DEGREES,
        }
    }

    pub fn centered() -> Self {
        Self {
            displacement_percent: 0.0,
            off_level: false,
        }
    }
}

/// One value with its unit, ready for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayValue {
    pub value: f64,
    pub unit: Unit,
}

impl DisplayValue {
    pub fn new(angle_degrees: f64, unit: Unit) -> Self {
        Self {
            value: convert(angle_degrees, unit),
            unit,
        }
    }
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub angle_degrees: f64,
    pub primary: DisplayValue,
    pub secondary: DisplayValue,
    pub bubble: BubblePosition,
}

impl Reading {
    pub fn from_angle(angle_degrees: f64, unit: Unit, max_angle: f64) -> Self {
        Self {
            angle_degrees,
            primary: DisplayValue::new(angle_degrees, unit),
            secondary: DisplayValue::new(angle_degrees, unit.companion()),
            bubble: BubblePosition::from_angle(angle_degrees, max_angle),
        }
    }

    /// Level, centred reading shown when measurement is idle
    pub fn neutral(unit: Unit) -> Self {
        Self {
            angle_degrees: 0.0,
            primary: DisplayValue::new(0.0, unit),
            secondary: DisplayValue::new(0.0, unit.companion()),
            bubble: BubblePosition::centered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_rounding() {
        assert_eq!(convert(12.34, Unit::Degree), 12.3);
        assert_eq!(convert(-3.96, Unit::Degree), -4.0);
        assert_eq!(convert(-0.04, Unit::Degree).to_bits(), 0.0_f64.to_bits());
    }

    #[test]
    fn test_slope_ratio_at_45_degrees() {
        assert_eq!(convert(45.0, Unit::SlopeRatio), 12.0);
    }

    #[test]
    fn test_percent_conversion() {
        assert_eq!(convert(45.0, Unit::Percent), 100.0);
        assert_eq!(convert(-10.0, Unit::Percent), -17.6);
        assert_eq!(convert(0.0, Unit::Percent), 0.0);
    }

    #[test]
    fn test_bubble_full_deflection() {
        assert_eq!(BubblePosition::from_angle(20.0, 20.0).displacement_percent, 50.0);
        assert_eq!(BubblePosition::from_angle(-20.0, 20.0).displacement_percent, -50.0);
        assert_eq!(BubblePosition::from_angle(35.0, 20.0).displacement_percent, 50.0);
        assert_eq!(BubblePosition::from_angle(5.0, 20.0).displacement_percent, 12.5);
    }

    #[test]
    fn test_off_level_tolerance() {
        assert!(!BubblePosition::from_angle(0.5, 20.0).off_level);
        assert!(BubblePosition::from_angle(0.51, 20.0).off_level);
        assert!(BubblePosition::from_angle(-2.0, 20.0).off_level);
    }

    #[test]
    fn test_unit_cycle() {
        assert_eq!(Unit::Degree.next(), Unit::SlopeRatio);
        assert_eq!(Unit::SlopeRatio.next(), Unit::Percent);
        assert_eq!(Unit::Percent.next(), Unit::Degree);
    }

    #[test]
    fn test_reading_secondary_unit() {
        let reading = Reading::from_angle(45.0, Unit::Degree, 20.0);
        assert_eq!(reading.primary.value, 45.0);
        assert_eq!(reading.secondary.unit, Unit::SlopeRatio);
        assert_eq!(reading.secondary.value, 12.0);

        let reading = Reading::from_angle(45.0, Unit::Percent, 20.0);
        assert_eq!(reading.primary.value, 100.0);
        assert_eq!(reading.secondary.unit, Unit::Degree);
    }

    #[test]
    fn test_neutral_reading() {
        let reading = Reading::neutral(Unit::SlopeRatio);
        assert_eq!(reading.primary.value, 0.0);
        assert!(!reading.bubble.off_level);
        assert_eq!(reading.bubble.displacement_percent, 0.0);
    }
}
