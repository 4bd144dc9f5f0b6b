//! Per-run measurement state.
//!
//! A `MeasurementSession` exists exactly while measurement is running. It
//! owns the sensor subscription, so dropping the session unsubscribes.

use std::time::Duration;

use crate::analysis::{FilterOutcome, OrientationSample, SignalFilter};
use crate::config::{FilterConfig, SessionConfig};
use crate::engine::backend::{SensorSubscription, Timestamp};

/// Liveness bookkeeping result for one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Check not due yet
    NotDue,
    Alive,
    /// No samples for `silent_for`; reported once per silent stretch
    Silent { silent_for: Duration },
    /// Still silent, already reported
    StillSilent,
}

#[derive(Debug)]
pub struct MeasurementSession {
    subscription: SensorSubscription,
    filter: SignalFilter,
    pending_frame: Option<f64>,
    last_sample_at: Timestamp,
    next_liveness_check: Timestamp,
    liveness_interval: Duration,
    silence_threshold: Duration,
    silent: bool,
}

impl MeasurementSession {
    pub fn new(
        subscription: SensorSubscription,
        filter: &FilterConfig,
        session: &SessionConfig,
        now: Timestamp,
    ) -> Self {
        let liveness_interval = Duration::from_millis(session.liveness_interval_ms);
        Self {
            subscription,
            filter: SignalFilter::new(filter),
            pending_frame: None,
            last_sample_at: now,
            next_liveness_check: now.saturating_add(liveness_interval),
            liveness_interval,
            silence_threshold: Duration::from_millis(session.silence_threshold_ms),
            silent: false,
        }
    }

    pub fn subscription_id(&self) -> u64 {
        self.subscription.id()
    }

    pub fn try_next_sample(&mut self) -> Option<OrientationSample> {
        self.subscription.try_next()
    }

    pub async fn next_sample(&mut self) -> Option<OrientationSample> {
        self.subscription.next().await
    }

    /// Record sample arrival; returns true if this ends a reported silence
    pub fn note_sample(&mut self, now: Timestamp) -> bool {
        self.last_sample_at = now;
        std::mem::replace(&mut self.silent, false)
    }

    /// Run the calibrated angle through the session's filter
    pub fn filter(&mut self, angle: f64) -> FilterOutcome {
        self.filter.accept(angle)
    }

    pub fn set_pending(&mut self, angle: f64) {
        self.pending_frame = Some(angle);
    }

    /// Latest angle waiting for the next paint, consumed once
    pub fn take_pending(&mut self) -> Option<f64> {
        self.pending_frame.take()
    }

    /// Forget filter history and any undrawn frame
    pub fn reset(&mut self) {
        self.filter.reset();
        self.pending_frame = None;
    }

    pub fn last_accepted(&self) -> Option<f64> {
        self.filter.last_accepted()
    }

    /// Periodic check re-armed every liveness interval
    pub fn check_liveness(&mut self, now: Timestamp) -> Liveness {
        if now < self.next_liveness_check {
            return Liveness::NotDue;
        }
        self.next_liveness_check = now.saturating_add(self.liveness_interval);

        let silent_for = now.saturating_since(self.last_sample_at);
        if silent_for <= self.silence_threshold {
            return Liveness::Alive;
        }
        if self.silent {
            return Liveness::StillSilent;
        }
        self.silent = true;
        Liveness::Silent { silent_for }
    }
}
