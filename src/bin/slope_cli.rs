use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use slope_meter::analysis::{convert, BubblePosition, Unit};
use slope_meter::config::AppConfig;
use slope_meter::fixtures::{
    ExpectationDiff, FixtureCatalog, FixtureExpectations, FixtureReplayer, ReplayMode,
    ReplayReport,
};

#[derive(Parser, Debug)]
#[command(
    name = "slope_cli",
    about = "Deterministic fixture harness for the slope meter pipeline"
)]
struct Cli {
    /// Override directory containing fixture recordings (defaults to ./fixtures)
    #[arg(long)]
    fixtures_dir: Option<PathBuf>,
    /// Load pipeline settings from this JSON file instead of the bundled config
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit debug logging to stderr
    #[arg(long, short)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recording through the measurement pipeline
    Replay {
        #[arg(long)]
        fixture: String,
        #[arg(long, value_enum, default_value_t = UnitArg::Degree)]
        unit: UnitArg,
        /// Pretend this calibration offset was already stored
        #[arg(long, allow_negative_numbers = true)]
        offset: Option<f64>,
        /// Expectations file overriding the ones embedded in the fixture
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay a recording as a calibration run and print the resulting offset
    Calibrate {
        #[arg(long)]
        fixture: String,
    },
    /// Convert a single angle to every display unit
    Convert {
        #[arg(long, allow_negative_numbers = true)]
        angle: f64,
    },
    /// List available fixtures on disk
    DumpFixtures,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum UnitArg {
    Degree,
    SlopeRatio,
    Percent,
}

impl From<UnitArg> for Unit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Degree => Unit::Degree,
            UnitArg::SlopeRatio => Unit::SlopeRatio,
            UnitArg::Percent => Unit::Percent,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.verbose {
        slope_meter::init_logging(tracing::Level::DEBUG);
    }

    let config = cli
        .config
        .map(AppConfig::load_from_file)
        .unwrap_or_else(AppConfig::load);
    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_default();

    match cli.command {
        Commands::Replay {
            fixture,
            unit,
            offset,
            expect,
            output,
        } => run_replay(
            &catalog,
            config,
            &fixture,
            ReplayOptions {
                unit: unit.into(),
                offset,
                expect,
                output,
            },
        ),
        Commands::Calibrate { fixture } => run_calibrate(&catalog, config, &fixture),
        Commands::Convert { angle } => run_convert(&config, angle),
        Commands::DumpFixtures => run_dump(&catalog),
    }
}

struct ReplayOptions {
    unit: Unit,
    offset: Option<f64>,
    expect: Option<PathBuf>,
    output: Option<PathBuf>,
}

fn run_replay(
    catalog: &FixtureCatalog,
    config: AppConfig,
    fixture: &str,
    options: ReplayOptions,
) -> Result<ExitCode> {
    let data = catalog.load(fixture)?;
    let mut replayer = FixtureReplayer::new(config).with_unit(options.unit);
    if let Some(offset) = options.offset {
        replayer = replayer.with_offset(offset);
    }
    let report = replayer
        .run(&data, ReplayMode::Measure)
        .with_context(|| format!("replaying fixture {fixture}"))?;

    emit_report(&report, options.output)?;

    let expectations = match options.expect {
        Some(path) => Some(load_expectations(&path)?),
        None => data.expect.clone(),
    };
    verify(&expectations, &report)
}

fn load_expectations(path: &Path) -> Result<FixtureExpectations> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading expectations {}", path.display()))?;
    let expectations = serde_json::from_str(&json)
        .with_context(|| format!("parsing expectations {}", path.display()))?;
    Ok(expectations)
}

fn run_calibrate(catalog: &FixtureCatalog, config: AppConfig, fixture: &str) -> Result<ExitCode> {
    let data = catalog.load(fixture)?;
    let report = FixtureReplayer::new(config)
        .run(&data, ReplayMode::Calibrate)
        .with_context(|| format!("calibrating with fixture {fixture}"))?;

    let summary = CalibrationSummary {
        fixture: &report.fixture,
        sample_count: report.sample_count,
        offset_degrees: report.offset_degrees,
        status: report.calibration_status.to_string(),
        completed: report.counters.calibrations_completed > 0,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    verify(&data.expect, &report)
}

fn run_convert(config: &AppConfig, angle: f64) -> Result<ExitCode> {
    let payload = ConversionPayload {
        angle_degrees: angle,
        degree: convert(angle, Unit::Degree),
        slope_ratio: convert(angle, Unit::SlopeRatio),
        percent: convert(angle, Unit::Percent),
        bubble: BubblePosition::from_angle(angle, config.filter.max_angle_degrees),
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(ExitCode::from(0))
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        let fixture = catalog.load(&metadata.name)?;
        println!(
            "{} ({} samples, {} ms)",
            metadata.name,
            fixture.samples.len(),
            fixture.duration_ms()
        );
    }
    Ok(ExitCode::from(0))
}

fn verify(
    expectations: &Option<FixtureExpectations>,
    report: &ReplayReport,
) -> Result<ExitCode> {
    match expectations {
        Some(expectations) => match expectations.verify(report) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&diff)?;
                Ok(ExitCode::from(2))
            }
        },
        None => Ok(ExitCode::from(0)),
    }
}

fn emit_report(report: &ReplayReport, output_path: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(diff)?;
    eprintln!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct CalibrationSummary<'a> {
    fixture: &'a str,
    sample_count: usize,
    offset_degrees: f64,
    status: String,
    completed: bool,
}

#[derive(Serialize)]
struct ConversionPayload {
    angle_degrees: f64,
    degree: f64,
    slope_ratio: f64,
    percent: f64,
    bubble: BubblePosition,
}
