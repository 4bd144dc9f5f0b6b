use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::analysis::{OrientationMode, OrientationSample};
use crate::error::SensorError;

/// What the platform offers before any subscription is attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorCapability {
    Supported,
    /// Supported, but `request_access` must be granted first
    PermissionRequired,
    Unsupported,
}

/// Answer to a permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
}

/// The two consumers allowed to own the sensor stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerKind {
    Measurement,
    Calibration,
}

impl ConsumerKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ConsumerKind::Measurement => "measurement",
            ConsumerKind::Calibration => "calibration",
        }
    }
}

/// Live registration on a sensor source.
///
/// Samples arrive on the wrapped channel. Dropping the subscription runs the
/// release hook, which deregisters the listener from the source, so every
/// owner releases it on every exit path without explicit cleanup calls.
pub struct SensorSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<OrientationSample>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SensorSubscription {
    pub fn new(
        id: u64,
        receiver: mpsc::UnboundedReceiver<OrientationSample>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            receiver,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next already-delivered sample, without waiting
    pub fn try_next(&mut self) -> Option<OrientationSample> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next sample; `None` once the source has gone away
    pub async fn next(&mut self) -> Option<OrientationSample> {
        self.receiver.recv().await
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for SensorSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Trait implemented by platform orientation sensors.
pub trait SensorSource: Send + Sync {
    fn capability(&self) -> SensorCapability;

    /// Show the platform permission prompt (only needed for `PermissionRequired`)
    fn request_access(&self) -> BoxFuture<'static, Result<PermissionState, SensorError>>;

    fn subscribe(&self) -> Result<SensorSubscription, SensorError>;
}

/// Trait implemented by the screen-orientation source.
pub trait OrientationModeProvider: Send + Sync {
    fn current(&self) -> OrientationMode;

    /// Change listener; the receiver sees every subsequent mode
    fn watch(&self) -> watch::Receiver<OrientationMode>;
}
