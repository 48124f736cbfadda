//! Frame-level spectral descriptors shared by the analyzers

use crate::dsp::stats::{self, EPSILON};
use crate::dsp::Stft;

/// Number of log-spaced bands used for spectral contrast
const CONTRAST_BANDS: usize = 6;

/// Spectral centroid of one magnitude frame, in Hz
pub fn centroid(frame: &[f32], stft: &Stft, sample_rate: u32) -> f32 {
    let total: f32 = frame.iter().sum();
    let weighted: f32 = frame
        .iter()
        .enumerate()
        .map(|(bin, &m)| stft.bin_frequency(bin, sample_rate) * m)
        .sum();
    weighted / (total + EPSILON)
}

/// Mean spectral centroid across frames, in Hz
pub fn mean_centroid(magnitude: &[Vec<f32>], stft: &Stft, sample_rate: u32) -> f32 {
    let centroids: Vec<f32> = magnitude
        .iter()
        .map(|f| centroid(f, stft, sample_rate))
        .collect();
    stats::mean(&centroids)
}

/// Frequency below which 85% of one frame's energy sits, in Hz
pub fn rolloff(frame: &[f32], stft: &Stft, sample_rate: u32) -> f32 {
    let total: f32 = frame.iter().sum();
    let target = total * 0.85;

    let mut cumulative = 0.0;
    for (bin, &m) in frame.iter().enumerate() {
        cumulative += m;
        if cumulative >= target {
            return stft.bin_frequency(bin, sample_rate);
        }
    }
    stft.bin_frequency(frame.len().saturating_sub(1), sample_rate)
}

/// Mean spectral rolloff across frames, in Hz
pub fn mean_rolloff(magnitude: &[Vec<f32>], stft: &Stft, sample_rate: u32) -> f32 {
    let rolloffs: Vec<f32> = magnitude
        .iter()
        .map(|f| rolloff(f, stft, sample_rate))
        .collect();
    stats::mean(&rolloffs)
}

/// Peak-to-valley contrast of one frame in dB, averaged over octave bands
pub fn frame_contrast(frame: &[f32]) -> f32 {
    let n = frame.len();
    if n < CONTRAST_BANDS * 4 {
        return 0.0;
    }

    let mut band_contrasts = Vec::with_capacity(CONTRAST_BANDS);
    let mut lo = 1usize;
    for band in 0..CONTRAST_BANDS {
        // Each band twice as wide as the previous
        let hi = if band == CONTRAST_BANDS - 1 {
            n
        } else {
            (lo * 2).min(n)
        };
        let mut values: Vec<f32> = frame[lo..hi].to_vec();
        if values.len() < 2 {
            lo = hi;
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let quantile = (values.len() / 5).max(1);
        let valley: f32 = values[..quantile].iter().sum::<f32>() / quantile as f32;
        let peak: f32 = values[values.len() - quantile..].iter().sum::<f32>() / quantile as f32;
        band_contrasts.push(10.0 * ((peak + EPSILON) / (valley + EPSILON)).log10());
        lo = hi;
    }

    stats::mean(&band_contrasts)
}

/// Mean frame contrast over a frame range, clamped to the spectrogram
pub fn mean_contrast(magnitude: &[Vec<f32>], lo_frame: usize, hi_frame: usize) -> f32 {
    let hi = hi_frame.min(magnitude.len());
    let lo = lo_frame.min(hi);
    let contrasts: Vec<f32> = magnitude[lo..hi].iter().map(|f| frame_contrast(f)).collect();
    stats::mean(&contrasts)
}

/// Spectral flatness of one frame: geometric over arithmetic mean, in [0, 1]
pub fn flatness(frame: &[f32]) -> f32 {
    let arithmetic = stats::mean(frame);
    let log_mean = frame.iter().map(|&m| (m + EPSILON).ln()).sum::<f32>() / frame.len() as f32;
    (log_mean.exp() / (arithmetic + EPSILON)).min(1.0)
}

/// Mean spectral flatness across frames
pub fn mean_flatness(magnitude: &[Vec<f32>]) -> f32 {
    let values: Vec<f32> = magnitude.iter().map(|f| flatness(f)).collect();
    stats::mean(&values)
}

/// Fraction of sample pairs that cross zero
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f32 / samples.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid_tracks_energy_location() {
        let stft = Stft::new(1024, 512);
        let mut low = vec![0.0f32; 513];
        low[20] = 1.0;
        let mut high = vec![0.0f32; 513];
        high[400] = 1.0;

        assert!(centroid(&low, &stft, 44100) < centroid(&high, &stft, 44100));
    }

    #[test]
    fn test_rolloff_below_nyquist() {
        let stft = Stft::new(1024, 512);
        let frame = vec![1.0f32; 513];
        let r = rolloff(&frame, &stft, 44100);
        assert!(r > 0.0 && r <= 22050.0);
    }

    #[test]
    fn test_tone_has_low_flatness_noise_high() {
        let mut tonal = vec![0.0f32; 513];
        tonal[50] = 1.0;
        let noisy = vec![0.5f32; 513];

        assert!(flatness(&tonal) < 0.1);
        assert!(flatness(&noisy) > 0.9);
    }

    #[test]
    fn test_peaked_frame_has_more_contrast_than_flat() {
        let mut peaked = vec![0.01f32; 513];
        for i in (0..513).step_by(40) {
            peaked[i] = 1.0;
        }
        let flat = vec![0.5f32; 513];

        assert!(frame_contrast(&peaked) > frame_contrast(&flat));
    }

    #[test]
    fn test_zero_crossing_rate() {
        let alternating: Vec<f32> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(zero_crossing_rate(&alternating) > 0.9);

        let constant = vec![1.0f32; 100];
        assert_eq!(zero_crossing_rate(&constant), 0.0);
    }
}
