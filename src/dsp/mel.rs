use crate::dsp::stats::EPSILON;

/// Convert a frequency in Hz to the mel scale
fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Convert a mel value back to Hz
fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank applied to magnitude spectra
pub struct MelFilterBank {
    filters: Vec<Vec<(usize, f32)>>,
}

impl MelFilterBank {
    /// Build `n_filters` triangular filters over `n_bins` linear bins
    pub fn new(n_filters: usize, n_bins: usize, sample_rate: u32) -> Self {
        let f_min = 0.0f32;
        let f_max = sample_rate as f32 / 2.0;
        let mel_min = hz_to_mel(f_min);
        let mel_max = hz_to_mel(f_max);

        // n_filters + 2 evenly spaced mel points define the triangle corners
        let mel_points: Vec<f32> = (0..n_filters + 2)
            .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_filters + 1) as f32)
            .collect();
        let bin_points: Vec<f32> = mel_points
            .iter()
            .map(|&m| mel_to_hz(m) / f_max * (n_bins - 1) as f32)
            .collect();

        let mut filters = Vec::with_capacity(n_filters);
        for f in 0..n_filters {
            let (left, center, right) = (bin_points[f], bin_points[f + 1], bin_points[f + 2]);
            let mut taps = Vec::new();

            let lo = left.floor().max(0.0) as usize;
            let hi = (right.ceil() as usize).min(n_bins - 1);
            for bin in lo..=hi {
                let b = bin as f32;
                let weight = if b < center {
                    (b - left) / (center - left + EPSILON)
                } else {
                    (right - b) / (right - center + EPSILON)
                };
                if weight > 0.0 {
                    taps.push((bin, weight));
                }
            }
            filters.push(taps);
        }

        Self { filters }
    }

    /// Number of mel bands
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True when the bank holds no filters
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Apply the bank to one magnitude frame
    pub fn apply(&self, magnitude_frame: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|taps| {
                taps.iter()
                    .map(|&(bin, weight)| magnitude_frame.get(bin).copied().unwrap_or(0.0) * weight)
                    .sum()
            })
            .collect()
    }

    /// Apply the bank to every frame of a spectrogram
    pub fn apply_all(&self, frames: &[Vec<f32>]) -> Vec<Vec<f32>> {
        frames.iter().map(|f| self.apply(f)).collect()
    }
}

/// Convert a mel (or any) energy value to decibels, floored at -80 dB
pub fn energy_to_db(energy: f32) -> f32 {
    (10.0 * (energy + EPSILON).log10()).max(-80.0)
}

/// Mel-frequency cepstral coefficients
///
/// Spectrogram frames go through the mel bank, log compression, then a
/// DCT-II over the log energies; the first `n_coeffs` coefficients form the
/// timbre vector of each frame.
pub fn mfcc(
    frames: &[Vec<f32>],
    bank: &MelFilterBank,
    n_coeffs: usize,
) -> Vec<Vec<f32>> {
    let n_filters = bank.len();
    if n_filters == 0 {
        return Vec::new();
    }

    // DCT-II basis, computed once per call
    let mut dct_basis = vec![vec![0.0f32; n_filters]; n_coeffs];
    for (k, row) in dct_basis.iter_mut().enumerate() {
        for (n, value) in row.iter_mut().enumerate() {
            *value = (std::f32::consts::PI * k as f32 * (n as f32 + 0.5) / n_filters as f32).cos();
        }
    }

    frames
        .iter()
        .map(|frame| {
            let log_energies: Vec<f32> = bank
                .apply(frame)
                .iter()
                .map(|&e| (e + EPSILON).ln())
                .collect();

            dct_basis
                .iter()
                .map(|row| {
                    row.iter()
                        .zip(log_energies.iter())
                        .map(|(b, e)| b * e)
                        .sum()
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_roundtrip() {
        for hz in [100.0, 440.0, 4000.0, 10000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() / hz < 1e-3);
        }
    }

    #[test]
    fn test_filterbank_shape() {
        let bank = MelFilterBank::new(40, 513, 44100);
        assert_eq!(bank.len(), 40);

        let frame = vec![1.0f32; 513];
        let mel = bank.apply(&frame);
        assert_eq!(mel.len(), 40);
        assert!(mel.iter().all(|&e| e >= 0.0));
    }

    #[test]
    fn test_mfcc_shape() {
        let bank = MelFilterBank::new(40, 513, 44100);
        let frames = vec![vec![0.5f32; 513]; 10];
        let coeffs = mfcc(&frames, &bank, 13);
        assert_eq!(coeffs.len(), 10);
        assert_eq!(coeffs[0].len(), 13);
    }

    #[test]
    fn test_mfcc_distinguishes_spectra() {
        let bank = MelFilterBank::new(40, 513, 44100);

        let mut low = vec![0.0f32; 513];
        low[10] = 1.0;
        let mut high = vec![0.0f32; 513];
        high[400] = 1.0;

        let coeffs = mfcc(&[low, high], &bank, 13);
        let diff: f32 = coeffs[0]
            .iter()
            .zip(coeffs[1].iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(diff > 1.0, "MFCCs should separate low and high spectra");
    }

    #[test]
    fn test_energy_to_db_floor() {
        assert_eq!(energy_to_db(0.0), -80.0);
        assert!((energy_to_db(1.0) - 0.0).abs() < 1e-4);
    }
}
