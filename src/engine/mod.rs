//! Engine module housing the slope-meter core.
//!
//! `backend` holds the collaborator traits and desktop stubs, `session` the
//! per-run measurement state, `core` the `EngineHandle` orchestration layer
//! and `driver` the async event loop around it.

pub mod backend;
pub mod core;
pub mod driver;
pub mod session;

pub use backend::{
    Clock, ManualClock, OrientationModeProvider, Renderer, SensorSource, SystemClock, Timestamp,
};
pub use core::{
    ActiveConsumer, CalibrationToggle, Collaborators, EngineHandle, SampleDisposition,
    TimerReport,
};
pub use driver::{EngineCommand, EngineDriver};
pub use session::MeasurementSession;
