//! Fixture utilities for the deterministic CLI harness.
//!
//! A fixture is a JSON recording of orientation samples with their arrival
//! times, plus optional expectations. The replayer drives a real
//! `EngineHandle` over desktop stubs and a manual clock, so a replay gives the
//! same frames on every run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::{OrientationMode, OrientationSample, Reading, Unit};
use crate::calibration::{CalibrationState, CalibrationStatus};
use crate::config::AppConfig;
use crate::engine::backend::{
    ChannelSensorSource, ManualClock, ManualModeProvider, RecordingRenderer, Timestamp,
};
use crate::engine::{Collaborators, EngineHandle};
use crate::persistence::{MemoryStore, PersistentStore, CALIBRATION_KEY};
use crate::telemetry::TelemetryCounters;

/// Default location for fixture recordings.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// Wall-clock time the replay clock starts at
const REPLAY_EPOCH_MS: u64 = 1_700_000_000_000;

/// One recorded sensor event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedSample {
    /// Arrival time relative to the start of the recording
    pub at_ms: u64,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub gamma: Option<f64>,
    #[serde(default)]
    pub mode: OrientationMode,
}

impl RecordedSample {
    pub fn sample(&self) -> OrientationSample {
        OrientationSample {
            beta: self.beta,
            gamma: self.gamma,
            mode: self.mode,
        }
    }
}

/// Expected replay results; every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureExpectations {
    #[serde(default)]
    pub final_angle_degrees: Option<f64>,
    #[serde(default)]
    pub offset_degrees: Option<f64>,
    #[serde(default)]
    pub spikes: Option<u64>,
    #[serde(default)]
    pub invalid_samples: Option<u64>,
    #[serde(default = "default_tolerance")]
    pub tolerance_degrees: f64,
}

fn default_tolerance() -> f64 {
    0.05
}

impl Default for FixtureExpectations {
    fn default() -> Self {
        Self {
            final_angle_degrees: None,
            offset_degrees: None,
            spikes: None,
            invalid_samples: None,
            tolerance_degrees: default_tolerance(),
        }
    }
}

impl FixtureExpectations {
    pub fn verify(&self, report: &ReplayReport) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        let mut check_angle = |field: &'static str, expected: Option<f64>, actual: Option<f64>| {
            if let Some(expected) = expected {
                let ok = actual
                    .map(|actual| (actual - expected).abs() <= self.tolerance_degrees)
                    .unwrap_or(false);
                if !ok {
                    failures.push(ExpectationFailure {
                        field,
                        expected: serde_json::json!(expected),
                        actual: serde_json::json!(actual),
                    });
                }
            }
        };
        check_angle(
            "final_angle_degrees",
            self.final_angle_degrees,
            report.final_angle_degrees,
        );
        check_angle(
            "offset_degrees",
            self.offset_degrees,
            Some(report.offset_degrees),
        );

        let mut check_count = |field: &'static str, expected: Option<u64>, actual: u64| {
            if let Some(expected) = expected {
                if expected != actual {
                    failures.push(ExpectationFailure {
                        field,
                        expected: serde_json::json!(expected),
                        actual: serde_json::json!(actual),
                    });
                }
            }
        };
        check_count("spikes", self.spikes, report.counters.spikes);
        check_count(
            "invalid_samples",
            self.invalid_samples,
            report.counters.invalid_samples,
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Outcome of comparing a replay with expectations.
#[derive(Debug, Serialize)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

/// Detailed diff entry for a single failure.
#[derive(Debug, Serialize)]
pub struct ExpectationFailure {
    pub field: &'static str,
    pub expected: serde_json::Value,
    pub actual: serde_json::Value,
}

/// A recording loaded from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub samples: Vec<RecordedSample>,
    #[serde(default)]
    pub expect: Option<FixtureExpectations>,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;
        if fixture
            .samples
            .windows(2)
            .any(|pair| pair[1].at_ms < pair[0].at_ms)
        {
            return Err(anyhow!(
                "Fixture '{}' has samples out of time order",
                fixture.name
            ));
        }
        Ok(fixture)
    }

    pub fn duration_ms(&self) -> u64 {
        self.samples.last().map_or(0, |sample| sample.at_ms)
    }
}

/// Metadata describing an available fixture.
#[derive(Clone, Debug, Serialize)]
pub struct FixtureMetadata {
    pub name: String,
    pub path: PathBuf,
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                fixtures.push(FixtureMetadata {
                    name: path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default()
                        .to_string(),
                    path,
                });
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load a fixture by name or by path.
    pub fn load(&self, fixture: &str) -> Result<Fixture> {
        let path = self.resolve_fixture_path(fixture)?;
        let json =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        Fixture::from_json(&json).with_context(|| format!("parsing {}", path.display()))
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}.json"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

/// Which consumer a replay feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    Measure,
    Calibrate,
}

/// One painted frame.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayFrame {
    pub at_ms: u64,
    pub reading: Reading,
}

/// Everything a replay produced.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub fixture: String,
    pub mode: ReplayMode,
    pub sample_count: usize,
    pub frames: Vec<ReplayFrame>,
    pub final_angle_degrees: Option<f64>,
    pub offset_degrees: f64,
    pub calibration_status: CalibrationStatus,
    pub counters: TelemetryCounters,
}

/// Replays fixtures through an `EngineHandle` backed by desktop stubs.
pub struct FixtureReplayer {
    config: AppConfig,
    unit: Unit,
    initial_offset: Option<f64>,
}

impl FixtureReplayer {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            unit: Unit::Degree,
            initial_offset: None,
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// Start from a freshly persisted calibration offset
    pub fn with_offset(mut self, offset_degrees: f64) -> Self {
        self.initial_offset = Some(offset_degrees);
        self
    }

    pub fn run(&self, fixture: &Fixture, mode: ReplayMode) -> Result<ReplayReport> {
        let start = Timestamp::from_millis(REPLAY_EPOCH_MS);
        let sensor = Arc::new(ChannelSensorSource::new());
        let clock = Arc::new(ManualClock::new(start));
        let renderer = Arc::new(RecordingRenderer::new());
        let store = Arc::new(MemoryStore::new());
        let initial_mode = fixture
            .samples
            .first()
            .map(|sample| sample.mode)
            .unwrap_or_default();
        let modes = Arc::new(ManualModeProvider::new(initial_mode));

        if let Some(offset) = self.initial_offset {
            let json = CalibrationState::new(offset, start).to_json()?;
            store.save(CALIBRATION_KEY, &json)?;
        }

        let mut engine = EngineHandle::new(
            self.config.clone(),
            Collaborators {
                sensor: sensor.clone(),
                orientation: modes.clone(),
                renderer: renderer.clone(),
                store,
                clock: clock.clone(),
            },
        );
        engine.set_unit(self.unit);

        match mode {
            ReplayMode::Measure => engine.start_measuring()?,
            ReplayMode::Calibrate => engine.start_calibration()?,
        }

        let mut frames = Vec::new();
        for recorded in &fixture.samples {
            clock.set(Timestamp::from_millis(REPLAY_EPOCH_MS + recorded.at_ms));
            engine.poll_timers();
            // A recording carries the screen mode it was taken in
            if recorded.mode != engine.mode() {
                modes.set(recorded.mode);
                engine.on_orientation_change(recorded.mode);
            }
            sensor.push(recorded.sample());
            engine.pump();

            if let Some(angle) = engine.render_frame() {
                frames.push(ReplayFrame {
                    at_ms: recorded.at_ms,
                    reading: Reading::from_angle(
                        angle,
                        self.unit,
                        self.config.filter.max_angle_degrees,
                    ),
                });
            }
        }

        if mode == ReplayMode::Calibrate && engine.is_calibrating() {
            // Recording ended early: let the collection window run out
            clock.advance(Duration::from_millis(self.config.calibration.timeout_ms));
            engine.poll_timers();
        }

        tracing::debug!(
            fixture = %fixture.name,
            frames = frames.len(),
            "fixture replay finished"
        );

        Ok(ReplayReport {
            fixture: fixture.name.clone(),
            mode,
            sample_count: fixture.samples.len(),
            final_angle_degrees: frames.last().map(|frame| frame.reading.angle_degrees),
            frames,
            offset_degrees: engine.offset(),
            calibration_status: engine.status(),
            counters: engine.telemetry().counters(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(samples: Vec<RecordedSample>) -> Fixture {
        Fixture {
            name: "inline".to_string(),
            notes: None,
            samples,
            expect: None,
        }
    }

    fn portrait(at_ms: u64, beta: f64) -> RecordedSample {
        RecordedSample {
            at_ms,
            beta: Some(beta),
            gamma: Some(0.0),
            mode: OrientationMode::Portrait,
        }
    }

    #[test]
    fn test_from_json_rejects_unordered_samples() {
        let json = r#"{"name":"bad","samples":[{"at_ms":20,"beta":1.0},{"at_ms":10,"beta":1.0}]}"#;
        assert!(Fixture::from_json(json).is_err());
    }

    #[test]
    fn test_recorded_sample_defaults() {
        let json = r#"{"name":"sparse","samples":[{"at_ms":0}]}"#;
        let fixture = Fixture::from_json(json).unwrap();
        assert_eq!(fixture.samples[0].beta, None);
        assert_eq!(fixture.samples[0].mode, OrientationMode::Portrait);
    }

    #[test]
    fn test_measure_replay_produces_frames() {
        let replay = FixtureReplayer::new(AppConfig::default())
            .run(
                &fixture(vec![portrait(0, 5.0), portrait(50, 60.0), portrait(100, 5.0)]),
                ReplayMode::Measure,
            )
            .unwrap();

        assert_eq!(replay.frames.len(), 2);
        assert_eq!(replay.counters.spikes, 1);
        assert_eq!(replay.final_angle_degrees, Some(5.0));
    }

    #[test]
    fn test_replay_follows_recorded_rotation() {
        let landscape = RecordedSample {
            at_ms: 100,
            beta: Some(0.0),
            gamma: Some(-4.0),
            mode: OrientationMode::Landscape,
        };
        let replay = FixtureReplayer::new(AppConfig::default())
            .run(
                &fixture(vec![portrait(0, 10.0), portrait(50, 10.0), landscape]),
                ReplayMode::Measure,
            )
            .unwrap();

        assert_eq!(replay.final_angle_degrees, Some(-4.0));
        assert_eq!(replay.counters.invalid_samples, 0);
    }

    #[test]
    fn test_replay_with_offset() {
        let replay = FixtureReplayer::new(AppConfig::default())
            .with_offset(2.0)
            .run(&fixture(vec![portrait(0, 5.0)]), ReplayMode::Measure)
            .unwrap();
        assert_eq!(replay.final_angle_degrees, Some(3.0));
        assert_eq!(replay.offset_degrees, 2.0);
    }

    #[test]
    fn test_short_calibration_replay_times_out() {
        let replay = FixtureReplayer::new(AppConfig::default())
            .run(
                &fixture(vec![portrait(0, 1.0), portrait(50, 1.0)]),
                ReplayMode::Calibrate,
            )
            .unwrap();
        assert_eq!(replay.calibration_status, CalibrationStatus::TimedOut);
        assert_eq!(replay.offset_degrees, 0.0);
    }

    #[test]
    fn test_expectations_report_mismatches() {
        let replay = FixtureReplayer::new(AppConfig::default())
            .run(&fixture(vec![portrait(0, 5.0)]), ReplayMode::Measure)
            .unwrap();

        let pass = FixtureExpectations {
            final_angle_degrees: Some(5.02),
            spikes: Some(0),
            ..FixtureExpectations::default()
        };
        assert!(pass.verify(&replay).is_ok());

        let fail = FixtureExpectations {
            final_angle_degrees: Some(4.0),
            offset_degrees: Some(1.0),
            tolerance_degrees: 0.05,
            ..FixtureExpectations::default()
        };
        let diff = fail.verify(&replay).unwrap_err();
        assert_eq!(diff.failures.len(), 2);
        assert_eq!(diff.failures[0].field, "final_angle_degrees");
    }

    #[test]
    fn test_catalog_ships_fixtures() {
        let catalog = FixtureCatalog::default();
        let fixtures = catalog.discover().unwrap();
        assert!(fixtures.iter().any(|meta| meta.name == "level_desk"));
        assert!(catalog.load("level_desk").is_ok());
        assert!(catalog.load("missing_fixture").is_err());
    }
}
