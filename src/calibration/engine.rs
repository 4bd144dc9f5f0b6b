// CalibrationEngine - compute, persist and restore the zero offset
//
// Idle -> Collecting -> Completing -> Idle. Timeout and errors drop the
// attempt and return to Idle with the previously committed offset intact.
// The engine never touches the sensor; its owner feeds it readings and
// releases the subscription whenever `is_collecting()` turns false.

use std::sync::Arc;
use std::time::Duration;

use crate::analysis::SampleRejection;
use crate::calibration::procedure::{CalibrationProcedure, ComputedOffset};
use crate::calibration::progress::{CalibrationPhase, CalibrationStatus};
use crate::calibration::state::CalibrationState;
use crate::config::CalibrationConfig;
use crate::engine::backend::Timestamp;
use crate::error::{
    log_calibration_error, log_persistence_error, CalibrationError, PersistenceError,
};
use crate::persistence::{PersistentStore, CALIBRATION_KEY};

/// A successfully committed offset
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    pub offset_degrees: f64,
    /// Readings that contributed to the mean
    pub kept: usize,
    /// Readings rejected as outliers
    pub discarded: usize,
    /// Finished by an explicit force-complete rather than reaching the target
    pub forced: bool,
    /// Set when the offset could only be kept in memory
    pub save_error: Option<PersistenceError>,
}

/// What happened to one reading handed to [`CalibrationEngine::record`]
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationStep {
    /// Engine is not collecting
    Ignored,
    /// Invalid sample, not counted
    Skipped(SampleRejection),
    /// Reading stored, target not yet reached
    Progress { collected: usize, target: usize },
    Completed(CalibrationOutcome),
    Failed(CalibrationError),
}

/// Result of loading the persisted record
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    Restored(CalibrationState),
    /// Record exists but is older than the max age
    Expired(CalibrationState),
    Missing,
    Failed(PersistenceError),
}

pub struct CalibrationEngine {
    config: CalibrationConfig,
    store: Arc<dyn PersistentStore>,
    committed: CalibrationState,
    procedure: Option<CalibrationProcedure>,
    phase: CalibrationPhase,
}

impl CalibrationEngine {
    pub fn new(config: CalibrationConfig, store: Arc<dyn PersistentStore>) -> Self {
        Self {
            config,
            store,
            committed: CalibrationState::zero(),
            procedure: None,
            phase: CalibrationPhase::Idle,
        }
    }

    /// Offset currently subtracted from measured angles
    pub fn offset(&self) -> f64 {
        self.committed.offset_degrees
    }

    pub fn state(&self) -> CalibrationState {
        self.committed
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn is_collecting(&self) -> bool {
        self.phase == CalibrationPhase::Collecting
    }

    pub fn collected(&self) -> usize {
        self.procedure.as_ref().map_or(0, |p| p.collected())
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.procedure.as_ref().map(|p| p.deadline())
    }

    /// Status line describing the in-flight attempt, if any
    pub fn progress(&self) -> Option<CalibrationStatus> {
        self.procedure
            .as_ref()
            .map(|p| CalibrationStatus::Collecting {
                collected: p.collected(),
                target: p.sample_target(),
            })
    }

    /// Begin a new collection window at `now`
    pub fn start(&mut self, now: Timestamp) -> Result<(), CalibrationError> {
        if self.is_collecting() {
            return Err(CalibrationError::AlreadyInProgress);
        }

        self.procedure = Some(CalibrationProcedure::new(
            self.config.sample_target,
            now,
            Duration::from_millis(self.config.timeout_ms),
        ));
        self.phase = CalibrationPhase::Collecting;
        log::info!(
            "[CalibrationEngine] Collecting {} samples (timeout {} ms)",
            self.config.sample_target,
            self.config.timeout_ms
        );
        Ok(())
    }

    /// Feed one extracted angle (or its rejection) into the active attempt
    pub fn record(
        &mut self,
        sample: Result<f64, SampleRejection>,
        now: Timestamp,
    ) -> CalibrationStep {
        if !self.is_collecting() {
            return CalibrationStep::Ignored;
        }

        if let Some(err) = self.poll_timeout(now) {
            return CalibrationStep::Failed(err);
        }

        let angle = match sample {
            Ok(angle) if angle.is_finite() => angle,
            Ok(_) => return CalibrationStep::Skipped(SampleRejection::Invalid),
            Err(rejection) => return CalibrationStep::Skipped(rejection),
        };

        let Some(procedure) = self.procedure.as_mut() else {
            return CalibrationStep::Ignored;
        };

        let full = procedure.push(angle);
        let collected = procedure.collected();
        let target = procedure.sample_target();
        tracing::debug!(collected, target, angle, "calibration sample");

        if !full {
            return CalibrationStep::Progress { collected, target };
        }

        self.phase = CalibrationPhase::Completing;
        let computed = procedure.robust_offset(self.config.iqr_multiplier);
        match computed {
            Ok(computed) => CalibrationStep::Completed(self.commit(computed, false, now)),
            Err(err) => {
                self.abandon();
                log_calibration_error(&err, "record");
                CalibrationStep::Failed(err)
            }
        }
    }

    /// Abort the attempt if its window has elapsed
    pub fn poll_timeout(&mut self, now: Timestamp) -> Option<CalibrationError> {
        let procedure = self.procedure.as_ref()?;
        if !procedure.is_expired(now) {
            return None;
        }

        let err = CalibrationError::Timeout {
            collected: procedure.collected(),
            required: procedure.sample_target(),
        };
        self.abandon();
        log_calibration_error(&err, "poll_timeout");
        Some(err)
    }

    /// Finish early using the plain mean of what has been collected.
    ///
    /// With nothing collected yet this is a no-op (`Ok(None)`) and the
    /// engine keeps collecting.
    pub fn force_complete(
        &mut self,
        now: Timestamp,
    ) -> Result<Option<CalibrationOutcome>, CalibrationError> {
        let procedure = self
            .procedure
            .as_ref()
            .ok_or(CalibrationError::NotInProgress)?;

        match procedure.plain_offset() {
            Ok(computed) => {
                self.phase = CalibrationPhase::Completing;
                Ok(Some(self.commit(computed, true, now)))
            }
            Err(CalibrationError::InsufficientSamples { .. }) => {
                log::debug!("[CalibrationEngine] Force-complete ignored: no samples yet");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Drop the in-flight attempt without touching the committed offset
    pub fn abort(&mut self) -> bool {
        let was_collecting = self.procedure.is_some();
        if was_collecting {
            log::info!("[CalibrationEngine] Calibration aborted");
        }
        self.abandon();
        was_collecting
    }

    /// Adopt the persisted offset if it is younger than the max age
    pub fn restore(&mut self, now: Timestamp) -> RestoreOutcome {
        let max_age = Duration::from_millis(self.config.max_age_ms);

        let loaded = self
            .store
            .load(CALIBRATION_KEY)
            .and_then(|raw| raw.map(|json| CalibrationState::from_json(&json)).transpose());

        let outcome = match loaded {
            Ok(Some(state)) if state.is_expired(now, max_age) => {
                log::info!(
                    "[CalibrationEngine] Stored offset expired (age {} ms)",
                    state.age(now).as_millis()
                );
                RestoreOutcome::Expired(state)
            }
            Ok(Some(state)) => RestoreOutcome::Restored(state),
            Ok(None) => RestoreOutcome::Missing,
            Err(err) => {
                log_persistence_error(&err, "restore");
                RestoreOutcome::Failed(err)
            }
        };

        self.committed = match &outcome {
            RestoreOutcome::Restored(state) => {
                log::info!(
                    "[CalibrationEngine] Restored offset {:.3} deg",
                    state.offset_degrees
                );
                *state
            }
            _ => CalibrationState::zero(),
        };
        outcome
    }

    /// Reset the offset to zero and delete the persisted record
    pub fn clear(&mut self) -> Result<(), PersistenceError> {
        self.committed = CalibrationState::zero();
        self.store.remove(CALIBRATION_KEY).inspect_err(|err| {
            log_persistence_error(err, "clear");
        })
    }

    fn commit(
        &mut self,
        computed: ComputedOffset,
        forced: bool,
        now: Timestamp,
    ) -> CalibrationOutcome {
        let state = CalibrationState::new(computed.offset_degrees, now);
        self.committed = state;
        self.abandon();

        let save_error = state
            .to_json()
            .and_then(|json| self.store.save(CALIBRATION_KEY, &json))
            .err();
        if let Some(err) = &save_error {
            log_persistence_error(err, "save calibration");
        }

        log::info!(
            "[CalibrationEngine] Offset {:.3} deg committed (kept {}, discarded {}, forced {})",
            computed.offset_degrees,
            computed.kept,
            computed.discarded,
            forced
        );

        CalibrationOutcome {
            offset_degrees: computed.offset_degrees,
            kept: computed.kept,
            discarded: computed.discarded,
            forced,
            save_error,
        }
    }

    fn abandon(&mut self) {
        self.procedure = None;
        self.phase = CalibrationPhase::Idle;
    }
}
