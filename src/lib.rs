// Slope Meter Core - tilt sensor signal pipeline
// Orientation samples -> calibrated, smoothed, unit-converted angle readings

// Module declarations
pub mod analysis;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod persistence;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::{OrientationMode, OrientationSample, Reading, Unit};
pub use calibration::{CalibrationEngine, CalibrationState};
pub use config::AppConfig;
pub use engine::{EngineDriver, EngineHandle};

use log::info;

/// Install the global tracing subscriber.
///
/// `log` records are bridged into tracing, so both macro families end up in the
/// same output. Safe to call more than once; later calls are ignored.
pub fn init_logging(level: tracing::Level) {
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        info!("[SlopeMeter] Logging initialized at {}", level);
    }
}
