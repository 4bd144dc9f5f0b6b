//! Diagnostics telemetry collector.
//!
//! The collector multiplexes sample rejections, sensor liveness, calibration
//! results and lifecycle events into a bounded history plus async broadcast
//! stream. Each engine owns its own collector.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

pub mod events;

pub use events::{LifecyclePhase, MetricEvent};

/// Per-kind totals since the collector was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryCounters {
    pub invalid_samples: u64,
    pub spikes: u64,
    pub silences: u64,
    pub calibrations_completed: u64,
    pub calibrations_failed: u64,
    pub persistence_failures: u64,
}

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub counters: TelemetryCounters,
}

#[derive(Default)]
struct Counters {
    invalid_samples: AtomicU64,
    spikes: AtomicU64,
    silences: AtomicU64,
    calibrations_completed: AtomicU64,
    calibrations_failed: AtomicU64,
    persistence_failures: AtomicU64,
}

impl Counters {
    fn bump(&self, event: &MetricEvent) {
        let counter = match event {
            MetricEvent::InvalidSample => &self.invalid_samples,
            MetricEvent::SensorSpike { .. } => &self.spikes,
            MetricEvent::SensorSilence { .. } => &self.silences,
            MetricEvent::CalibrationCompleted { .. } => &self.calibrations_completed,
            MetricEvent::CalibrationFailed { .. } => &self.calibrations_failed,
            MetricEvent::PersistenceFailure { .. } => &self.persistence_failures,
            MetricEvent::SensorResumed | MetricEvent::Lifecycle { .. } => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn load(&self) -> TelemetryCounters {
        TelemetryCounters {
            invalid_samples: self.invalid_samples.load(Ordering::Relaxed),
            spikes: self.spikes.load(Ordering::Relaxed),
            silences: self.silences.load(Ordering::Relaxed),
            calibrations_completed: self.calibrations_completed.load(Ordering::Relaxed),
            calibrations_failed: self.calibrations_failed.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
    counters: Counters,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity: history_capacity.max(1),
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<MetricEvent>> {
        match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        self.counters.bump(&event);
        {
            let mut history = self.history();
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.publish(MetricEvent::Lifecycle { phase });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    /// Event stream that silently skips over events lost to lag
    pub fn stream(&self) -> impl Stream<Item = MetricEvent> {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|event| event.ok())
    }

    pub fn counters(&self) -> TelemetryCounters {
        self.counters.load()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history();
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
            counters: self.counters.load(),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}
