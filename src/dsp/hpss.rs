//! Harmonic/percussive separation by median filtering
//!
//! Harmonic content is sustained across time, percussive content is broadband
//! within a frame, so median filtering the magnitude spectrogram along time
//! vs. frequency yields the two enhanced spectrograms. Soft Wiener-style
//! masks split the original magnitudes without losing energy.

use crate::dsp::stats::EPSILON;

/// Median filter kernel length used along both axes
const KERNEL: usize = 17;

/// Harmonic and percussive magnitude spectrograms
pub struct HpssResult {
    pub harmonic: Vec<Vec<f32>>,
    pub percussive: Vec<Vec<f32>>,
}

impl HpssResult {
    /// Ratio of percussive to harmonic energy, epsilon-guarded
    pub fn percussive_ratio(&self) -> f32 {
        let percussive: f32 = self
            .percussive
            .iter()
            .flat_map(|f| f.iter())
            .map(|&m| m * m)
            .sum();
        let harmonic: f32 = self
            .harmonic
            .iter()
            .flat_map(|f| f.iter())
            .map(|&m| m * m)
            .sum();
        percussive / (harmonic + EPSILON)
    }
}

/// Decompose a magnitude spectrogram into harmonic and percussive parts
pub fn decompose(magnitude: &[Vec<f32>]) -> HpssResult {
    if magnitude.is_empty() {
        return HpssResult {
            harmonic: Vec::new(),
            percussive: Vec::new(),
        };
    }

    let n_frames = magnitude.len();
    let n_bins = magnitude[0].len();

    // Harmonic enhancement: median across time, per bin
    let mut harmonic_med = vec![vec![0.0f32; n_bins]; n_frames];
    let mut column = vec![0.0f32; n_frames];
    for bin in 0..n_bins {
        for (t, frame) in magnitude.iter().enumerate() {
            column[t] = frame[bin];
        }
        for t in 0..n_frames {
            harmonic_med[t][bin] = windowed_median(&column, t);
        }
    }

    // Percussive enhancement: median across frequency, per frame
    let mut percussive_med = vec![vec![0.0f32; n_bins]; n_frames];
    for (t, frame) in magnitude.iter().enumerate() {
        for bin in 0..n_bins {
            percussive_med[t][bin] = windowed_median(frame, bin);
        }
    }

    // Soft masks from the squared enhanced magnitudes
    let mut harmonic = vec![vec![0.0f32; n_bins]; n_frames];
    let mut percussive = vec![vec![0.0f32; n_bins]; n_frames];
    for t in 0..n_frames {
        for bin in 0..n_bins {
            let h2 = harmonic_med[t][bin] * harmonic_med[t][bin];
            let p2 = percussive_med[t][bin] * percussive_med[t][bin];
            let total = h2 + p2 + EPSILON;
            harmonic[t][bin] = magnitude[t][bin] * (h2 / total);
            percussive[t][bin] = magnitude[t][bin] * (p2 / total);
        }
    }

    HpssResult {
        harmonic,
        percussive,
    }
}

/// Median of a centered window clipped to the slice bounds
fn windowed_median(values: &[f32], center: usize) -> f32 {
    let half = KERNEL / 2;
    let lo = center.saturating_sub(half);
    let hi = (center + half + 1).min(values.len());

    let mut window: Vec<f32> = values[lo..hi].to_vec();
    window.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    window[window.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_spectrogram() {
        let result = decompose(&[]);
        assert!(result.harmonic.is_empty());
        assert!(result.percussive.is_empty());
    }

    #[test]
    fn test_sustained_tone_is_harmonic() {
        // One bin active across all frames: a sustained tone
        let n_frames = 50;
        let mut magnitude = vec![vec![0.0f32; 64]; n_frames];
        for frame in magnitude.iter_mut() {
            frame[10] = 1.0;
        }

        let result = decompose(&magnitude);
        let h: f32 = result.harmonic.iter().map(|f| f[10]).sum();
        let p: f32 = result.percussive.iter().map(|f| f[10]).sum();
        assert!(h > p, "sustained tone should land in the harmonic part");
        assert!(result.percussive_ratio() < 0.5);
    }

    #[test]
    fn test_broadband_click_is_percussive() {
        // One frame active across all bins: a click
        let mut magnitude = vec![vec![0.0f32; 64]; 50];
        for bin in magnitude[25].iter_mut() {
            *bin = 1.0;
        }

        let result = decompose(&magnitude);
        let h: f32 = result.harmonic[25].iter().sum();
        let p: f32 = result.percussive[25].iter().sum();
        assert!(p > h, "click should land in the percussive part");
        assert!(result.percussive_ratio() > 0.5);
    }

    #[test]
    fn test_masks_conserve_magnitude() {
        let mut magnitude = vec![vec![0.1f32; 32]; 20];
        magnitude[5][3] = 0.9;

        let result = decompose(&magnitude);
        for t in 0..20 {
            for bin in 0..32 {
                let sum = result.harmonic[t][bin] + result.percussive[t][bin];
                assert!(sum <= magnitude[t][bin] + 1e-5);
            }
        }
    }
}
