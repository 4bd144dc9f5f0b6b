//! EngineHandle: the measurement/calibration orchestration layer.
//!
//! Owns the single active sensor consumer slot and drives every sample
//! through extract -> offset -> filter -> pending frame. Rendering happens
//! only in `render_frame`, and every timer is a deadline compared against the
//! injected clock in `poll_timers`, so the whole core is deterministic under
//! a manual clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crate::analysis::{
    AngleExtractor, FilterOutcome, OrientationMode, OrientationSample, Reading, SampleRejection,
    Unit,
};
use crate::calibration::{
    CalibrationEngine, CalibrationOutcome, CalibrationStatus, CalibrationStep, RestoreOutcome,
};
use crate::config::AppConfig;
use crate::engine::backend::{
    render_reading, Button, ButtonLabel, Clock, ConsumerKind, OrientationModeProvider,
    PermissionState, Renderer, SensorCapability, SensorSource, SensorSubscription, Timestamp,
};
use crate::engine::session::{Liveness, MeasurementSession};
use crate::error::{
    log_calibration_error, log_sensor_error, CalibrationError, ErrorCode, PersistenceError,
    SensorError,
};
use crate::persistence::PersistentStore;
use crate::telemetry::{LifecyclePhase, MetricEvent, TelemetryCollector};

/// External services the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub sensor: Arc<dyn SensorSource>,
    pub orientation: Arc<dyn OrientationModeProvider>,
    pub renderer: Arc<dyn Renderer>,
    pub store: Arc<dyn PersistentStore>,
    pub clock: Arc<dyn Clock>,
}

/// Which consumer currently owns the sensor stream.
#[derive(Debug)]
pub enum ActiveConsumer {
    Idle,
    Measuring(MeasurementSession),
    Calibrating(SensorSubscription),
}

impl ActiveConsumer {
    pub fn kind(&self) -> Option<ConsumerKind> {
        match self {
            ActiveConsumer::Idle => None,
            ActiveConsumer::Measuring(_) => Some(ConsumerKind::Measurement),
            ActiveConsumer::Calibrating(_) => Some(ConsumerKind::Calibration),
        }
    }
}

/// What the engine did with one sensor sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleDisposition {
    /// No consumer active
    Ignored,
    Invalid,
    Spike { delta: f64 },
    /// Accepted and queued for the next paint
    Pending(f64),
    Calibration(CalibrationStep),
}

/// Result of pressing the calibrate button.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationToggle {
    Started,
    /// Second press finished early with the readings gathered so far
    Completed(CalibrationOutcome),
    /// Second press before any reading arrived; still collecting
    StillCollecting,
}

/// Timers that fired during one `poll_timers` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerReport {
    pub silence: Option<Duration>,
    pub calibration_timed_out: bool,
    pub status_cleared: bool,
}

/// EngineHandle orchestrates the sensor pipeline for one device.
pub struct EngineHandle {
    config: AppConfig,
    sensor: Arc<dyn SensorSource>,
    orientation: Arc<dyn OrientationModeProvider>,
    renderer: Arc<dyn Renderer>,
    clock: Arc<dyn Clock>,
    extractor: AngleExtractor,
    calibration: CalibrationEngine,
    consumer: ActiveConsumer,
    mode: OrientationMode,
    unit: Unit,
    displayed_angle: f64,
    status: CalibrationStatus,
    status_clear_at: Option<Timestamp>,
    telemetry: Arc<TelemetryCollector>,
}

impl EngineHandle {
    /// Build the engine and restore any cached calibration offset.
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            sensor,
            orientation,
            renderer,
            store,
            clock,
        } = collaborators;

        let mut engine = Self {
            extractor: AngleExtractor::new(&config.orientation),
            calibration: CalibrationEngine::new(config.calibration.clone(), store),
            mode: orientation.current(),
            config,
            sensor,
            orientation,
            renderer,
            clock,
            consumer: ActiveConsumer::Idle,
            unit: Unit::default(),
            displayed_angle: 0.0,
            status: CalibrationStatus::Cleared,
            status_clear_at: None,
            telemetry: Arc::new(TelemetryCollector::default()),
        };
        engine.restore_calibration();
        engine
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn restore_calibration(&mut self) {
        let now = self.now();
        if let RestoreOutcome::Failed(err) = self.calibration.restore(now) {
            self.telemetry.publish(MetricEvent::PersistenceFailure {
                context: format!("restore: {}", err.message()),
            });
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn active_consumer(&self) -> Option<ConsumerKind> {
        self.consumer.kind()
    }

    pub fn is_measuring(&self) -> bool {
        matches!(self.consumer, ActiveConsumer::Measuring(_))
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.consumer, ActiveConsumer::Calibrating(_))
    }

    pub fn offset(&self) -> f64 {
        self.calibration.offset()
    }

    pub fn calibration(&self) -> &CalibrationEngine {
        &self.calibration
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn mode(&self) -> OrientationMode {
        self.mode
    }

    /// Angle last pushed to the renderer
    pub fn displayed_angle(&self) -> f64 {
        self.displayed_angle
    }

    pub fn status(&self) -> CalibrationStatus {
        self.status
    }

    pub fn telemetry(&self) -> Arc<TelemetryCollector> {
        Arc::clone(&self.telemetry)
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<MetricEvent> {
        self.telemetry.subscribe()
    }

    pub fn watch_orientation(&self) -> watch::Receiver<OrientationMode> {
        self.orientation.watch()
    }

    // ========================================================================
    // MEASUREMENT
    // ========================================================================

    /// Start/stop button. Returns whether measurement is running afterwards.
    pub async fn toggle_measurement(&mut self) -> Result<bool, SensorError> {
        if self.is_measuring() {
            self.stop_measuring();
            return Ok(false);
        }
        if self.is_calibrating() {
            return Err(busy(ConsumerKind::Calibration, "toggle_measurement"));
        }

        self.ensure_access().await?;
        self.start_measuring()?;
        Ok(true)
    }

    /// Subscribe and begin a fresh measurement session.
    pub fn start_measuring(&mut self) -> Result<(), SensorError> {
        match self.consumer {
            ActiveConsumer::Measuring(_) => return Ok(()),
            ActiveConsumer::Calibrating(_) => {
                return Err(busy(ConsumerKind::Calibration, "start_measuring"));
            }
            ActiveConsumer::Idle => {}
        }

        let subscription = self.sensor.subscribe().inspect_err(|err| {
            log_sensor_error(err, "start_measuring");
        })?;
        let now = self.now();
        let session = MeasurementSession::new(
            subscription,
            &self.config.filter,
            &self.config.session,
            now,
        );
        log::info!(
            "[EngineHandle] Measurement started (subscription {})",
            session.subscription_id()
        );
        self.consumer = ActiveConsumer::Measuring(session);

        self.renderer
            .show_button_label(Button::Measure, ButtonLabel::Stop);
        self.telemetry
            .record_lifecycle(LifecyclePhase::MeasurementStarted);
        Ok(())
    }

    /// Unsubscribe, discard filter state and show the neutral reading.
    ///
    /// Returns false if measurement was not running.
    pub fn stop_measuring(&mut self) -> bool {
        if !self.is_measuring() {
            return false;
        }

        self.consumer = ActiveConsumer::Idle;
        self.show_angle_now(0.0);
        self.renderer
            .show_button_label(Button::Measure, ButtonLabel::Start);
        self.telemetry
            .record_lifecycle(LifecyclePhase::MeasurementStopped);
        log::info!("[EngineHandle] Measurement stopped");
        true
    }

    async fn ensure_access(&mut self) -> Result<(), SensorError> {
        match self.sensor.capability() {
            SensorCapability::Supported => Ok(()),
            SensorCapability::Unsupported => {
                let err = SensorError::Unsupported;
                log_sensor_error(&err, "ensure_access");
                Err(err)
            }
            SensorCapability::PermissionRequired => {
                let answer = self.sensor.request_access().await.inspect_err(|err| {
                    log_sensor_error(err, "request_access");
                })?;
                match answer {
                    PermissionState::Granted => {
                        self.telemetry
                            .record_lifecycle(LifecyclePhase::PermissionsGranted);
                        Ok(())
                    }
                    PermissionState::Denied => {
                        self.telemetry
                            .record_lifecycle(LifecyclePhase::PermissionsDenied);
                        let err = SensorError::PermissionDenied;
                        log_sensor_error(&err, "request_access");
                        Err(err)
                    }
                }
            }
        }
    }

    // ========================================================================
    // CALIBRATION
    // ========================================================================

    /// Calibrate button: start collecting, or force-complete if already collecting.
    pub async fn toggle_calibration(&mut self) -> Result<CalibrationToggle, SensorError> {
        if self.is_calibrating() {
            return Ok(match self.force_complete_calibration() {
                Some(outcome) => CalibrationToggle::Completed(outcome),
                None => CalibrationToggle::StillCollecting,
            });
        }
        if self.is_measuring() {
            return Err(busy(ConsumerKind::Measurement, "toggle_calibration"));
        }

        self.ensure_access().await?;
        self.start_calibration()?;
        Ok(CalibrationToggle::Started)
    }

    /// Claim the sensor stream for calibration.
    pub fn start_calibration(&mut self) -> Result<(), SensorError> {
        match self.consumer {
            ActiveConsumer::Calibrating(_) => return Ok(()),
            ActiveConsumer::Measuring(_) => {
                return Err(busy(ConsumerKind::Measurement, "start_calibration"));
            }
            ActiveConsumer::Idle => {}
        }

        let subscription = self.sensor.subscribe().inspect_err(|err| {
            log_sensor_error(err, "start_calibration");
        })?;

        let now = self.now();
        if let Err(err) = self.calibration.start(now) {
            // Dropping `subscription` here releases the listener again
            log_calibration_error(&err, "start_calibration");
            return Err(busy(ConsumerKind::Calibration, "start_calibration"));
        }

        self.consumer = ActiveConsumer::Calibrating(subscription);
        self.renderer
            .show_button_label(Button::Calibrate, ButtonLabel::SetZero);
        if let Some(progress) = self.calibration.progress() {
            self.set_status(progress, None);
        }
        self.telemetry
            .record_lifecycle(LifecyclePhase::CalibrationStarted);
        Ok(())
    }

    /// Finish now with the plain mean of the readings so far.
    ///
    /// Returns `None` when not calibrating or nothing has been collected.
    pub fn force_complete_calibration(&mut self) -> Option<CalibrationOutcome> {
        let now = self.now();
        match self.calibration.force_complete(now) {
            Ok(Some(outcome)) => {
                self.finish_calibration(Ok(outcome.clone()));
                Some(outcome)
            }
            Ok(None) => None,
            Err(err) => {
                log_calibration_error(&err, "force_complete");
                if self.is_calibrating() {
                    self.release_calibration();
                }
                None
            }
        }
    }

    /// Abandon the running calibration, keeping the previous offset.
    pub fn cancel_calibration(&mut self) -> bool {
        if !self.is_calibrating() {
            return false;
        }
        self.calibration.abort();
        self.release_calibration();
        self.set_status(CalibrationStatus::Cleared, None);
        self.telemetry
            .record_lifecycle(LifecyclePhase::CalibrationFinished);
        true
    }

    /// Reset the offset to zero and drop the persisted record.
    pub fn clear_calibration(&mut self) -> Result<(), PersistenceError> {
        let result = self.calibration.clear();
        if let Err(err) = &result {
            self.telemetry.publish(MetricEvent::PersistenceFailure {
                context: format!("clear: {}", err.message()),
            });
        }
        result
    }

    fn release_calibration(&mut self) {
        if self.is_calibrating() {
            self.consumer = ActiveConsumer::Idle;
        }
        self.renderer
            .show_button_label(Button::Calibrate, ButtonLabel::Calibrate);
    }

    fn finish_calibration(&mut self, result: Result<CalibrationOutcome, CalibrationError>) {
        self.release_calibration();

        let status = match result {
            Ok(outcome) => {
                self.telemetry.publish(MetricEvent::CalibrationCompleted {
                    offset_degrees: outcome.offset_degrees,
                    kept: outcome.kept,
                    discarded: outcome.discarded,
                    forced: outcome.forced,
                });
                if let Some(err) = &outcome.save_error {
                    self.telemetry.publish(MetricEvent::PersistenceFailure {
                        context: format!("save: {}", err.message()),
                    });
                }
                CalibrationStatus::Complete {
                    offset_degrees: outcome.offset_degrees,
                }
            }
            Err(err) => {
                self.telemetry
                    .publish(MetricEvent::CalibrationFailed { code: err.code() });
                match err {
                    CalibrationError::Timeout { .. } => CalibrationStatus::TimedOut,
                    other => CalibrationStatus::Failed { code: other.code() },
                }
            }
        };

        let display_for = Duration::from_millis(self.config.calibration.status_display_ms);
        let clear_at = status
            .is_transient()
            .then(|| self.now().saturating_add(display_for));
        self.set_status(status, clear_at);
        self.telemetry
            .record_lifecycle(LifecyclePhase::CalibrationFinished);
    }

    fn set_status(&mut self, status: CalibrationStatus, clear_at: Option<Timestamp>) {
        self.status = status;
        self.status_clear_at = clear_at;
        self.renderer.show_calibration_status(&status);
    }

    // ========================================================================
    // SAMPLE PIPELINE
    // ========================================================================

    /// Route one sample to whichever consumer owns the stream.
    ///
    /// The orientation provider owns the current mode. A sample stamped with
    /// any other mode was taken before the last rotation and is dropped.
    pub fn handle_sample(&mut self, sample: OrientationSample) -> SampleDisposition {
        if matches!(self.consumer, ActiveConsumer::Idle) {
            return SampleDisposition::Ignored;
        }
        if sample.mode != self.mode {
            tracing::debug!(
                sample_mode = ?sample.mode,
                mode = ?self.mode,
                "stale orientation sample dropped"
            );
            self.telemetry.publish(MetricEvent::InvalidSample);
            return SampleDisposition::Invalid;
        }

        let now = self.now();
        let extracted = self.extractor.extract(&sample);

        match &mut self.consumer {
            ActiveConsumer::Idle => SampleDisposition::Ignored,
            ActiveConsumer::Measuring(session) => {
                if session.note_sample(now) {
                    tracing::info!("sensor resumed");
                    self.telemetry.publish(MetricEvent::SensorResumed);
                }

                let raw = match extracted {
                    Ok(raw) => raw,
                    Err(_) => {
                        tracing::trace!(?sample, "invalid sample skipped");
                        self.telemetry.publish(MetricEvent::InvalidSample);
                        return SampleDisposition::Invalid;
                    }
                };

                match session.filter(raw - self.calibration.offset()) {
                    FilterOutcome::Accepted(angle) => {
                        session.set_pending(angle);
                        SampleDisposition::Pending(angle)
                    }
                    FilterOutcome::Rejected(SampleRejection::Spike { delta }) => {
                        tracing::debug!(delta, "spike rejected");
                        self.telemetry.publish(MetricEvent::SensorSpike { delta });
                        SampleDisposition::Spike { delta }
                    }
                    FilterOutcome::Rejected(SampleRejection::Invalid) => {
                        self.telemetry.publish(MetricEvent::InvalidSample);
                        SampleDisposition::Invalid
                    }
                }
            }
            ActiveConsumer::Calibrating(_) => {
                let step = self.calibration.record(extracted, now);
                match &step {
                    CalibrationStep::Progress { collected, target } => {
                        let progress = CalibrationStatus::Collecting {
                            collected: *collected,
                            target: *target,
                        };
                        tracing::debug!(percent = ?progress.percentage(), "calibration progress");
                        self.set_status(progress, None);
                    }
                    CalibrationStep::Skipped(_) => {
                        self.telemetry.publish(MetricEvent::InvalidSample);
                    }
                    CalibrationStep::Completed(outcome) => {
                        self.finish_calibration(Ok(outcome.clone()));
                    }
                    CalibrationStep::Failed(err) => {
                        self.finish_calibration(Err(err.clone()));
                    }
                    CalibrationStep::Ignored => {
                        // Engine stopped collecting without us noticing
                        self.release_calibration();
                    }
                }
                SampleDisposition::Calibration(step)
            }
        }
    }

    fn try_next_sample(&mut self) -> Option<OrientationSample> {
        match &mut self.consumer {
            ActiveConsumer::Idle => None,
            ActiveConsumer::Measuring(session) => session.try_next_sample(),
            ActiveConsumer::Calibrating(subscription) => subscription.try_next(),
        }
    }

    /// Process every sample already delivered to the active subscription.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Some(sample) = self.try_next_sample() {
            self.handle_sample(sample);
            processed += 1;
        }
        processed
    }

    /// Wait for the next sample on the active subscription.
    ///
    /// Pends forever while idle. `None` means the source closed the stream.
    pub async fn next_sample(&mut self) -> Option<OrientationSample> {
        match &mut self.consumer {
            ActiveConsumer::Idle => futures::future::pending().await,
            ActiveConsumer::Measuring(session) => session.next_sample().await,
            ActiveConsumer::Calibrating(subscription) => subscription.next().await,
        }
    }

    /// The sensor source dropped the active stream
    pub fn on_sensor_closed(&mut self) {
        log::warn!(
            "[EngineHandle] Sensor stream closed while {:?} was active",
            self.consumer.kind()
        );
        if self.is_measuring() {
            self.stop_measuring();
        } else if self.is_calibrating() {
            self.cancel_calibration();
        }
    }

    // ========================================================================
    // PAINT + TIMERS
    // ========================================================================

    /// Paint-cycle hook: draw the latest pending angle, if any.
    pub fn render_frame(&mut self) -> Option<f64> {
        let angle = match &mut self.consumer {
            ActiveConsumer::Measuring(session) => session.take_pending()?,
            _ => return None,
        };
        self.show_angle_now(angle);
        Some(angle)
    }

    /// Fire every deadline that has passed.
    pub fn poll_timers(&mut self) -> TimerReport {
        let now = self.now();
        let mut report = TimerReport::default();

        if let ActiveConsumer::Measuring(session) = &mut self.consumer {
            if let Liveness::Silent { silent_for } = session.check_liveness(now) {
                let silent_ms = u64::try_from(silent_for.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(silent_ms, "no orientation samples received");
                self.telemetry
                    .publish(MetricEvent::SensorSilence { silent_ms });
                report.silence = Some(silent_for);
            }
        }

        if self.is_calibrating() {
            if let Some(err) = self.calibration.poll_timeout(now) {
                self.finish_calibration(Err(err));
                report.calibration_timed_out = true;
            }
        }

        if let Some(clear_at) = self.status_clear_at {
            if now >= clear_at {
                self.set_status(CalibrationStatus::Cleared, None);
                report.status_cleared = true;
            }
        }

        report
    }

    /// Handle a screen-orientation change.
    ///
    /// Returns false when `mode` is the mode already in effect.
    pub fn on_orientation_change(&mut self, mode: OrientationMode) -> bool {
        if mode == self.mode {
            return false;
        }

        log::info!(
            "[EngineHandle] Orientation changed {:?} -> {:?}",
            self.mode,
            mode
        );
        self.mode = mode;
        self.telemetry
            .record_lifecycle(LifecyclePhase::OrientationChanged);

        if let ActiveConsumer::Measuring(session) = &mut self.consumer {
            session.reset();
            self.show_angle_now(0.0);
        }
        true
    }

    // ========================================================================
    // DISPLAY
    // ========================================================================

    /// Advance to the next display unit and redraw the last angle.
    pub fn cycle_unit(&mut self) -> Unit {
        self.set_unit(self.unit.next());
        self.unit
    }

    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = unit;
        self.show_angle_now(self.displayed_angle);
    }

    /// Redraw everything the renderer shows.
    pub fn refresh(&mut self) {
        self.show_angle_now(self.displayed_angle);
        let measure_label = if self.is_measuring() {
            ButtonLabel::Stop
        } else {
            ButtonLabel::Start
        };
        let calibrate_label = if self.is_calibrating() {
            ButtonLabel::SetZero
        } else {
            ButtonLabel::Calibrate
        };
        self.renderer
            .show_button_label(Button::Measure, measure_label);
        self.renderer
            .show_button_label(Button::Calibrate, calibrate_label);
        self.renderer.show_calibration_status(&self.status);
    }

    fn show_angle_now(&mut self, angle: f64) {
        self.displayed_angle = angle;
        let reading = Reading::from_angle(angle, self.unit, self.config.filter.max_angle_degrees);
        render_reading(self.renderer.as_ref(), &reading);
    }
}

fn busy(active: ConsumerKind, context: &str) -> SensorError {
    let err = SensorError::ConsumerBusy { active };
    log_sensor_error(&err, context);
    err
}
