// Order statistics used to reject calibration outliers

/// Quantile of an ascending slice using linear interpolation between the
/// closest ranks (h = (n - 1) * q).
///
/// Returns `None` for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let h = last as f64 * q.clamp(0.0, 1.0);
    let lower = h.floor() as usize;
    let upper = h.ceil() as usize;
    let weight = h - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Arithmetic mean, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Result of an interquartile-range filter pass
#[derive(Debug, Clone, PartialEq)]
pub struct IqrFilter {
    pub kept: Vec<f64>,
    pub discarded: usize,
    pub lower_fence: f64,
    pub upper_fence: f64,
}

/// Keep values inside [Q1 - k*IQR, Q3 + k*IQR].
///
/// Order of the kept values follows the input. Empty input yields an empty
/// result with NaN fences.
pub fn iqr_filter(values: &[f64], multiplier: f64) -> IqrFilter {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let (q1, q3) = match (quantile(&sorted, 0.25), quantile(&sorted, 0.75)) {
        (Some(q1), Some(q3)) => (q1, q3),
        _ => {
            return IqrFilter {
                kept: Vec::new(),
                discarded: 0,
                lower_fence: f64::NAN,
                upper_fence: f64::NAN,
            }
        }
    };

    let iqr = q3 - q1;
    let lower_fence = q1 - multiplier * iqr;
    let upper_fence = q3 + multiplier * iqr;

    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| *v >= lower_fence && *v <= upper_fence)
        .collect();

    IqrFilter {
        discarded: values.len() - kept.len(),
        kept,
        lower_fence,
        upper_fence,
    }
}
