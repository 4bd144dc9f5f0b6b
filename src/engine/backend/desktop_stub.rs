use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::analysis::{OrientationMode, OrientationSample, Unit};
use crate::calibration::CalibrationStatus;
use crate::error::SensorError;

use super::{
    Button, ButtonLabel, Clock, OrientationModeProvider, PermissionState, Renderer,
    SensorCapability, SensorSource, SensorSubscription, Timestamp,
};

type Listeners = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<OrientationSample>>>>;

/// Desktop sensor source fed by explicit `push` calls.
///
/// Used for deterministic tests, fixture replay and CLI tooling. Any number
/// of listeners may be registered; each receives every pushed sample.
pub struct ChannelSensorSource {
    capability: SensorCapability,
    permission: PermissionState,
    listeners: Listeners,
    next_id: AtomicU64,
}

impl ChannelSensorSource {
    pub fn new() -> Self {
        Self::with_capability(SensorCapability::Supported, PermissionState::Granted)
    }

    pub fn with_capability(capability: SensorCapability, permission: PermissionState) -> Self {
        Self {
            capability,
            permission,
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Deliver a sample to every registered listener; returns how many got it
    pub fn push(&self, sample: OrientationSample) -> usize {
        let mut listeners = match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.retain(|_, tx| !tx.is_closed());
        listeners
            .values()
            .filter(|tx| tx.send(sample).is_ok())
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl Default for ChannelSensorSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for ChannelSensorSource {
    fn capability(&self) -> SensorCapability {
        self.capability
    }

    fn request_access(&self) -> BoxFuture<'static, Result<PermissionState, SensorError>> {
        Box::pin(future::ready(Ok(self.permission)))
    }

    fn subscribe(&self) -> Result<SensorSubscription, SensorError> {
        if self.capability == SensorCapability::Unsupported {
            return Err(SensorError::Unsupported);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .map_err(|_| SensorError::SubscribeFailed {
                reason: "listener registry poisoned".to_string(),
            })?
            .insert(id, tx);

        let listeners = Arc::clone(&self.listeners);
        Ok(SensorSubscription::new(id, rx, move || {
            if let Ok(mut guard) = listeners.lock() {
                guard.remove(&id);
            }
        }))
    }
}

/// Deterministic clock for desktop runs and tests.
///
/// Time only moves when `advance` or `set` is called.
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now_ms: AtomicU64::new(start.as_millis()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        let _ = self
            .now_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(millis))
            });
    }

    pub fn set(&self, to: Timestamp) {
        self.now_ms.store(to.as_millis(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Timestamp::from_millis(0))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.now_ms.load(Ordering::SeqCst))
    }
}

/// Orientation provider whose mode is set by hand.
pub struct ManualModeProvider {
    tx: watch::Sender<OrientationMode>,
}

impl ManualModeProvider {
    pub fn new(initial: OrientationMode) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn set(&self, mode: OrientationMode) {
        self.tx.send_replace(mode);
    }
}

impl Default for ManualModeProvider {
    fn default() -> Self {
        Self::new(OrientationMode::Portrait)
    }
}

impl OrientationModeProvider for ManualModeProvider {
    fn current(&self) -> OrientationMode {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<OrientationMode> {
        self.tx.subscribe()
    }
}

/// One renderer call captured by [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum RenderCall {
    Angle { value: f64, unit: Unit },
    Secondary { value: f64, unit: Unit },
    Bubble { displacement_percent: f64, off_level: bool },
    CalibrationStatus { status: CalibrationStatus },
    ButtonLabel { button: Button, label: ButtonLabel },
}

/// Renderer that records every call for later inspection.
#[derive(Default)]
pub struct RecordingRenderer {
    calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: RenderCall) {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn take_calls(&self) -> Vec<RenderCall> {
        self.calls
            .lock()
            .map(|mut calls| std::mem::take(&mut *calls))
            .unwrap_or_default()
    }

    /// Most recent primary readout
    pub fn last_angle(&self) -> Option<(f64, Unit)> {
        self.calls().into_iter().rev().find_map(|call| match call {
            RenderCall::Angle { value, unit } => Some((value, unit)),
            _ => None,
        })
    }

    pub fn last_bubble(&self) -> Option<(f64, bool)> {
        self.calls().into_iter().rev().find_map(|call| match call {
            RenderCall::Bubble {
                displacement_percent,
                off_level,
            } => Some((displacement_percent, off_level)),
            _ => None,
        })
    }

    pub fn last_status(&self) -> Option<CalibrationStatus> {
        self.calls().into_iter().rev().find_map(|call| match call {
            RenderCall::CalibrationStatus { status } => Some(status),
            _ => None,
        })
    }

    pub fn last_label(&self, button: Button) -> Option<ButtonLabel> {
        self.calls().into_iter().rev().find_map(|call| match call {
            RenderCall::ButtonLabel { button: b, label } if b == button => Some(label),
            _ => None,
        })
    }

    pub fn angle_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RenderCall::Angle { .. }))
            .count()
    }
}

impl Renderer for RecordingRenderer {
    fn show_angle(&self, value: f64, unit: Unit) {
        self.record(RenderCall::Angle { value, unit });
    }

    fn show_secondary(&self, value: f64, unit: Unit) {
        self.record(RenderCall::Secondary { value, unit });
    }

    fn show_bubble(&self, displacement_percent: f64, off_level: bool) {
        self.record(RenderCall::Bubble {
            displacement_percent,
            off_level,
        });
    }

    fn show_calibration_status(&self, status: &CalibrationStatus) {
        self.record(RenderCall::CalibrationStatus { status: *status });
    }

    fn show_button_label(&self, button: Button, label: ButtonLabel) {
        self.record(RenderCall::ButtonLabel { button, label });
    }
}
