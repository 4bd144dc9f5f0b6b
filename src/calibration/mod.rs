// Calibration module - zero-offset workflow and persistence
//
// 1. CalibrationEngine::start opens a collection window
// 2. Raw angles are recorded until the sample target is reached
// 3. Outliers are rejected by IQR fences and the survivors averaged
// 4. The resulting CalibrationState is persisted and restored on startup

pub mod engine;
pub mod procedure;
pub mod progress;
pub mod state;
pub mod statistics;

pub use engine::{CalibrationEngine, CalibrationOutcome, CalibrationStep, RestoreOutcome};
pub use procedure::CalibrationProcedure;
pub use progress::{CalibrationPhase, CalibrationStatus};
pub use state::CalibrationState;
