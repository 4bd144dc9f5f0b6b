use super::*;
use crate::config::AppConfig;

/// Run samples through extractor -> offset -> filter the way a session does
fn run_pipeline(samples: &[OrientationSample], offset: f64) -> Vec<Option<f64>> {
    let config = AppConfig::default();
    let extractor = AngleExtractor::new(&config.orientation);
    let mut filter = SignalFilter::new(&config.filter);

    samples
        .iter()
        .map(|sample| {
            let raw = extractor.extract(sample).ok()?;
            filter.accept(raw - offset).accepted()
        })
        .collect()
}

#[test]
fn test_pipeline_converges_toward_steady_tilt() {
    let samples = vec![OrientationSample::portrait(5.0, 0.0); 30];
    let outputs = run_pipeline(&samples, 0.0);

    let last = outputs.last().copied().flatten().unwrap();
    assert!((last - 5.0).abs() < 1e-6);
}

#[test]
fn test_pipeline_applies_calibration_offset() {
    let samples = vec![OrientationSample::portrait(3.0, 0.0); 5];
    let outputs = run_pipeline(&samples, 3.0);

    for output in outputs {
        assert_eq!(output, Some(0.0));
    }
}

#[test]
fn test_pipeline_skips_invalid_and_spikes() {
    let samples = vec![
        OrientationSample::portrait(1.0, 0.0),
        OrientationSample::portrait(f64::NAN, 0.0),
        OrientationSample::portrait(80.0, 0.0),
        OrientationSample::portrait(1.0, 0.0),
    ];
    let outputs = run_pipeline(&samples, 0.0);

    assert_eq!(outputs[0], Some(1.0));
    assert_eq!(outputs[1], None);
    assert_eq!(outputs[2], None);
    assert_eq!(outputs[3], Some(1.0));
}

#[test]
fn test_pipeline_reading_for_steep_tilt() {
    let samples = vec![OrientationSample::landscape(0.0, 60.0)];
    let outputs = run_pipeline(&samples, 0.0);
    let angle = outputs[0].unwrap();

    let reading = Reading::from_angle(angle, Unit::Degree, 20.0);
    assert_eq!(reading.primary.value, 20.0);
    assert_eq!(reading.bubble.displacement_percent, 50.0);
    assert!(reading.bubble.off_level);
}
