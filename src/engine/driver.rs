//! Async event loop around an [`EngineHandle`].
//!
//! One `tokio::select!` serialises host commands, sensor samples,
//! orientation changes, paint frames and timer ticks, so the handle itself
//! never needs a lock.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};

use crate::analysis::{OrientationMode, OrientationSample, Unit};
use crate::engine::core::EngineHandle;
use crate::error::{log_persistence_error, log_sensor_error};

/// Commands a host UI sends to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    ToggleMeasurement,
    ToggleCalibration,
    CancelCalibration,
    CycleUnit,
    SetUnit(Unit),
    ClearCalibration,
    Refresh,
    Shutdown,
}

enum DriverEvent {
    Command(Option<EngineCommand>),
    Sample(Option<OrientationSample>),
    /// false once the provider has gone away
    Orientation(bool),
    Frame,
    Timer,
}

pub struct EngineDriver {
    handle: EngineHandle,
    commands: mpsc::Receiver<EngineCommand>,
    orientation: watch::Receiver<OrientationMode>,
    frame_interval: Duration,
    timer_resolution: Duration,
}

impl EngineDriver {
    /// Wrap `handle`; the returned sender feeds the loop.
    pub fn new(handle: EngineHandle) -> (Self, mpsc::Sender<EngineCommand>) {
        let (tx, commands) = mpsc::channel(32);
        let session = &handle.config().session;
        let frame_interval = Duration::from_millis(session.frame_interval_ms.max(1));
        let timer_resolution = Duration::from_millis(session.timer_resolution_ms.max(1));
        let orientation = handle.watch_orientation();

        let driver = Self {
            handle,
            commands,
            orientation,
            frame_interval,
            timer_resolution,
        };
        (driver, tx)
    }

    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    /// Run until `Shutdown` arrives or every command sender is dropped.
    ///
    /// Hands the engine back so callers can inspect its final state.
    pub async fn run(mut self) -> EngineHandle {
        let mut frames = time::interval(self.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timers = time::interval(self.timer_resolution);
        timers.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut orientation_open = true;

        log::info!("[EngineDriver] Event loop started");
        self.handle.refresh();

        loop {
            let event = tokio::select! {
                command = self.commands.recv() => DriverEvent::Command(command),
                sample = self.handle.next_sample() => DriverEvent::Sample(sample),
                changed = self.orientation.changed(), if orientation_open => {
                    DriverEvent::Orientation(changed.is_ok())
                }
                _ = frames.tick() => DriverEvent::Frame,
                _ = timers.tick() => DriverEvent::Timer,
            };

            match event {
                DriverEvent::Command(None | Some(EngineCommand::Shutdown)) => break,
                DriverEvent::Command(Some(command)) => self.apply(command).await,
                DriverEvent::Sample(Some(sample)) => {
                    self.handle.handle_sample(sample);
                }
                DriverEvent::Sample(None) => self.handle.on_sensor_closed(),
                DriverEvent::Orientation(true) => {
                    let mode = *self.orientation.borrow_and_update();
                    self.handle.on_orientation_change(mode);
                }
                DriverEvent::Orientation(false) => {
                    log::debug!("[EngineDriver] Orientation provider closed");
                    orientation_open = false;
                }
                DriverEvent::Frame => {
                    self.handle.render_frame();
                }
                DriverEvent::Timer => {
                    self.handle.poll_timers();
                }
            }
        }

        log::info!("[EngineDriver] Event loop stopped");
        self.handle
    }

    async fn apply(&mut self, command: EngineCommand) {
        tracing::debug!(?command, "engine command");
        match command {
            EngineCommand::ToggleMeasurement => {
                if let Err(err) = self.handle.toggle_measurement().await {
                    log_sensor_error(&err, "toggle_measurement");
                }
            }
            EngineCommand::ToggleCalibration => {
                if let Err(err) = self.handle.toggle_calibration().await {
                    log_sensor_error(&err, "toggle_calibration");
                }
            }
            EngineCommand::CancelCalibration => {
                self.handle.cancel_calibration();
            }
            EngineCommand::CycleUnit => {
                self.handle.cycle_unit();
            }
            EngineCommand::SetUnit(unit) => self.handle.set_unit(unit),
            EngineCommand::ClearCalibration => {
                if let Err(err) = self.handle.clear_calibration() {
                    log_persistence_error(&err, "clear_calibration");
                }
            }
            EngineCommand::Refresh => self.handle.refresh(),
            EngineCommand::Shutdown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::AppConfig;
    use crate::engine::backend::{
        ChannelSensorSource, ManualClock, ManualModeProvider, RecordingRenderer, Timestamp,
    };
    use crate::engine::core::Collaborators;
    use crate::persistence::MemoryStore;

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within 1s");
    }

    #[tokio::test]
    async fn driver_measures_and_shuts_down() {
        let sensor = Arc::new(ChannelSensorSource::new());
        let renderer = Arc::new(RecordingRenderer::new());
        let modes = Arc::new(ManualModeProvider::default());
        let handle = EngineHandle::new(
            AppConfig::default(),
            Collaborators {
                sensor: sensor.clone(),
                orientation: modes.clone(),
                renderer: renderer.clone(),
                store: Arc::new(MemoryStore::new()),
                clock: Arc::new(ManualClock::new(Timestamp::from_millis(1_000))),
            },
        );

        let (driver, commands) = EngineDriver::new(handle);
        let task = tokio::spawn(driver.run());

        commands.send(EngineCommand::ToggleMeasurement).await.unwrap();
        wait_until(|| sensor.listener_count() == 1).await;

        sensor.push(OrientationSample::portrait(4.0, 0.0));
        wait_until(|| renderer.last_angle() == Some((4.0, Unit::Degree))).await;

        modes.set(OrientationMode::Landscape);
        wait_until(|| renderer.last_angle() == Some((0.0, Unit::Degree))).await;

        commands.send(EngineCommand::Shutdown).await.unwrap();
        let handle = task.await.unwrap();
        assert!(handle.is_measuring());
        assert_eq!(handle.mode(), OrientationMode::Landscape);
    }

    #[tokio::test]
    async fn driver_stops_when_senders_drop() {
        let handle = EngineHandle::new(
            AppConfig::default(),
            Collaborators {
                sensor: Arc::new(ChannelSensorSource::new()),
                orientation: Arc::new(ManualModeProvider::default()),
                renderer: Arc::new(RecordingRenderer::new()),
                store: Arc::new(MemoryStore::new()),
                clock: Arc::new(ManualClock::default()),
            },
        );
        let (driver, commands) = EngineDriver::new(handle);
        drop(commands);

        let handle = driver.run().await;
        assert!(!handle.is_measuring());
    }
}
