//! Context-aware peak picking over novelty curves
//!
//! A frame is a peak when it dominates a local max window, clears the local
//! average by `delta`, and sits at least `wait` frames after the previous
//! accepted peak. Windows are clipped at the curve edges.

/// Peak-picking context, in frames
#[derive(Debug, Clone, Copy)]
pub struct PeakPickParams {
    /// Frames inspected on each side for the local maximum test
    pub max_window: usize,
    /// Frames averaged on each side for the baseline
    pub avg_window: usize,
    /// Offset above the local average a peak must reach
    pub delta: f32,
    /// Minimum frames between accepted peaks
    pub wait: usize,
}

/// Detected peak with its curve value
#[derive(Debug, Clone, Copy)]
pub struct Peak {
    pub frame: usize,
    pub value: f32,
}

/// Pick peaks from a curve, earliest first
pub fn pick_peaks(curve: &[f32], params: &PeakPickParams) -> Vec<Peak> {
    if curve.len() < 3 {
        return Vec::new();
    }

    let mut peaks: Vec<Peak> = Vec::new();

    for i in 0..curve.len() {
        let value = curve[i];

        let max_lo = i.saturating_sub(params.max_window);
        let max_hi = (i + params.max_window + 1).min(curve.len());
        let local_max = curve[max_lo..max_hi]
            .iter()
            .copied()
            .fold(f32::MIN, f32::max);
        if value < local_max {
            continue;
        }

        let avg_lo = i.saturating_sub(params.avg_window);
        let avg_hi = (i + params.avg_window + 1).min(curve.len());
        let local_avg =
            curve[avg_lo..avg_hi].iter().sum::<f32>() / (avg_hi - avg_lo) as f32;
        if value < local_avg + params.delta {
            continue;
        }

        if let Some(last) = peaks.last() {
            if i - last.frame < params.wait {
                continue;
            }
        }

        peaks.push(Peak { frame: i, value });
    }

    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PeakPickParams {
        PeakPickParams {
            max_window: 3,
            avg_window: 10,
            delta: 0.1,
            wait: 3,
        }
    }

    #[test]
    fn test_single_peak() {
        let mut curve = vec![0.0f32; 50];
        curve[25] = 1.0;
        let peaks = pick_peaks(&curve, &params());
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].frame, 25);
    }

    #[test]
    fn test_wait_suppresses_close_peaks() {
        let mut curve = vec![0.0f32; 50];
        curve[20] = 1.0;
        curve[22] = 0.9;
        let peaks = pick_peaks(&curve, &params());
        // 22 is within the wait window of 20 and below its max window
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].frame, 20);
    }

    #[test]
    fn test_flat_curve_no_peaks() {
        let curve = vec![0.5f32; 50];
        let peaks = pick_peaks(&curve, &params());
        assert!(peaks.is_empty());
    }

    #[test]
    fn test_peaks_sorted_by_frame() {
        let mut curve = vec![0.0f32; 100];
        curve[10] = 0.8;
        curve[40] = 1.0;
        curve[70] = 0.9;
        let peaks = pick_peaks(&curve, &params());
        assert_eq!(peaks.len(), 3);
        for pair in peaks.windows(2) {
            assert!(pair[0].frame < pair[1].frame);
        }
    }

    #[test]
    fn test_too_short_curve() {
        assert!(pick_peaks(&[1.0, 0.5], &params()).is_empty());
    }
}
