//! Small numeric helpers shared across the analyzers
//!
//! Every denominator that could reach zero is padded with [`EPSILON`] so
//! normalizations and ratios stay finite on silent or degenerate input.

/// Guard value for ratios and normalizations
pub const EPSILON: f32 = 1e-10;

/// Arithmetic mean, 0.0 for an empty slice
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Population standard deviation, 0.0 for fewer than two values
pub fn stddev(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / values.len() as f32;
    var.sqrt()
}

/// Median by sorting a copy, 0.0 for an empty slice
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Maximum value, 0.0 for an empty slice
pub fn max(values: &[f32]) -> f32 {
    values.iter().copied().fold(0.0f32, f32::max)
}

/// Scale a curve so its maximum is 1.0; silent curves stay all-zero
pub fn normalize_to_peak(values: &mut [f32]) {
    let peak = max(values);
    if peak > EPSILON {
        for v in values.iter_mut() {
            *v /= peak;
        }
    }
}

/// Clamp a value into [0, 1]
pub fn unit_clamp(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_stddev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-6);
        assert!((stddev(&values) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert!((median(&[3.0, 1.0, 2.0]) - 2.0).abs() < 1e-6);
        assert!((median(&[4.0, 1.0, 3.0, 2.0]) - 2.5).abs() < 1e-6);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_normalize_to_peak() {
        let mut values = vec![1.0, 2.0, 4.0];
        normalize_to_peak(&mut values);
        assert!((values[2] - 1.0).abs() < 1e-6);
        assert!((values[0] - 0.25).abs() < 1e-6);

        let mut silent = vec![0.0, 0.0];
        normalize_to_peak(&mut silent);
        assert_eq!(silent, vec![0.0, 0.0]);
    }

    #[test]
    fn test_empty_slices() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(stddev(&[1.0]), 0.0);
        assert_eq!(max(&[]), 0.0);
    }
}
