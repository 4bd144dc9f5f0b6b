// SignalFilter - spike rejection, exponential smoothing and clamping
//
// The only state is the last accepted angle. The first sample after a reset is
// taken as-is (clamped); every later sample is compared against it, rejected
// if it jumps further than the spike threshold, and otherwise blended in.

use crate::analysis::sample::SampleRejection;
use crate::config::FilterConfig;

/// Result of feeding one candidate angle into the filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOutcome {
    /// Smoothed, clamped angle to display
    Accepted(f64),
    /// Candidate dropped, state untouched
    Rejected(SampleRejection),
}

impl FilterOutcome {
    pub fn accepted(&self) -> Option<f64> {
        match self {
            FilterOutcome::Accepted(angle) => Some(*angle),
            FilterOutcome::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalFilter {
    smoothing: f64,
    spike_threshold: f64,
    max_angle: f64,
    last_accepted: Option<f64>,
}

impl SignalFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            smoothing: config.smoothing,
            spike_threshold: config.spike_threshold_degrees,
            max_angle: config.max_angle_degrees,
            last_accepted: None,
        }
    }

    /// Feed a calibrated candidate angle
    pub fn accept(&mut self, candidate: f64) -> FilterOutcome {
        if !candidate.is_finite() {
            return FilterOutcome::Rejected(SampleRejection::Invalid);
        }

        let blended = match self.last_accepted {
            None => candidate,
            Some(last) => {
                let delta = (candidate - last).abs();
                if delta > self.spike_threshold {
                    return FilterOutcome::Rejected(SampleRejection::Spike { delta });
                }
                last * self.smoothing + candidate * (1.0 - self.smoothing)
            }
        };

        let clamped = blended.clamp(-self.max_angle, self.max_angle);
        self.last_accepted = Some(clamped);
        FilterOutcome::Accepted(clamped)
    }

    /// Forget the last accepted angle (session start, axis change)
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    pub fn last_accepted(&self) -> Option<f64> {
        self.last_accepted
    }

    pub fn max_angle(&self) -> f64 {
        self.max_angle
    }
}

impl Default for SignalFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_accepted_unconditionally() {
        let mut filter = SignalFilter::default();
        assert_eq!(filter.accept(7.0), FilterOutcome::Accepted(7.0));
        assert_eq!(filter.last_accepted(), Some(7.0));
    }

    #[test]
    fn test_first_sample_is_clamped() {
        let mut filter = SignalFilter::default();
        assert_eq!(filter.accept(35.0), FilterOutcome::Accepted(20.0));
        assert_eq!(filter.accept(-80.0).accepted(), None);
    }

    #[test]
    fn test_smoothing_blend() {
        let mut filter = SignalFilter::default();
        filter.accept(10.0);
        let outcome = filter.accept(0.0);
        let angle = outcome.accepted().unwrap();
        assert!((angle - 8.0).abs() < 1e-9);
        assert!((filter.last_accepted().unwrap() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_spike_rejected_without_state_change() {
        let mut filter = SignalFilter::default();
        filter.accept(0.0);

        match filter.accept(50.0) {
            FilterOutcome::Rejected(SampleRejection::Spike { delta }) => {
                assert_eq!(delta, 50.0);
            }
            other => panic!("Expected spike rejection, got {:?}", other),
        }
        assert_eq!(filter.last_accepted(), Some(0.0));
    }

    #[test]
    fn test_spike_threshold_is_exclusive() {
        let mut filter = SignalFilter::default();
        filter.accept(0.0);
        assert!(filter.accept(45.0).accepted().is_some());
    }

    #[test]
    fn test_output_never_leaves_range() {
        let mut filter = SignalFilter::default();
        let inputs = [
            0.0, 19.0, 40.0, 60.0, 80.0, 100.0, 60.0, 20.0, -20.0, -60.0, -90.0, -95.0, 44.0,
            -1.0, 179.0, 180.0, -180.0, 0.5,
        ];
        for input in inputs {
            if let FilterOutcome::Accepted(angle) = filter.accept(input) {
                assert!((-20.0..=20.0).contains(&angle), "{} out of range", angle);
            }
        }
    }

    #[test]
    fn test_reset_matches_fresh_filter() {
        let mut used = SignalFilter::default();
        used.accept(3.0);
        used.accept(6.0);
        used.reset();

        let mut fresh = SignalFilter::default();

        let used_outputs = [used.accept(12.0), used.accept(12.0)];
        let fresh_outputs = [fresh.accept(12.0), fresh.accept(12.0)];
        assert_eq!(used_outputs, fresh_outputs);
    }

    #[test]
    fn test_non_finite_candidate_is_invalid() {
        let mut filter = SignalFilter::default();
        filter.accept(1.0);
        assert_eq!(
            filter.accept(f64::NAN),
            FilterOutcome::Rejected(SampleRejection::Invalid)
        );
        assert_eq!(filter.last_accepted(), Some(1.0));
    }
}
