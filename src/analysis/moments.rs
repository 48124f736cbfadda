use crate::config::AnalysisConfig;
use crate::dsp::mel::{self, MelFilterBank};
use crate::dsp::peaks::{pick_peaks, PeakPickParams};
use crate::dsp::recurrence;
use crate::dsp::stats;
use crate::dsp::{hpss, onset, Stft};
use crate::error::Result;
use crate::signal::AudioSignal;

/// Cepstral coefficients used for the timbral-change curve
const TIMBRE_COEFFS: usize = 13;

/// Mel bands behind both the cepstral and structural representations
const MEL_BANDS: usize = 40;

/// Frame budget for the structural recurrence analysis
const STRUCTURE_FRAMES: usize = 200;

/// Finds salient transition timestamps for effect triggers
///
/// Three novelty curves (full onset, percussive onset, timbral change)
/// blend into one composite; adaptive peak picking plus recurrence-derived
/// structural boundaries yield candidate moments, filtered down to a sparse,
/// well-spaced set.
pub struct KeyMomentDetector {
    config: AnalysisConfig,
}

/// Candidate moment with the strength used for filtering
#[derive(Debug, Clone, Copy)]
struct Moment {
    time: f64,
    strength: f32,
}

impl KeyMomentDetector {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Detect key moments, sorted and spaced at least the configured gap
    pub fn detect(&self, signal: &AudioSignal<'_>) -> Result<Vec<f64>> {
        let stft = Stft::new(self.config.window_size, self.config.hop_size);
        let magnitude = stft.magnitude_spectrogram(signal.samples())?;
        if magnitude.len() < 8 {
            return Ok(Vec::new());
        }

        let separation = hpss::decompose(&magnitude);
        let onset_full = onset::strength_envelope(&magnitude);
        let onset_percussive = onset::strength_envelope(&separation.percussive);

        if stats::max(&onset_full) < stats::EPSILON {
            tracing::debug!("Flat onset envelope, no key moments");
            return Ok(Vec::new());
        }

        let bank = MelFilterBank::new(MEL_BANDS, magnitude[0].len(), signal.sample_rate());
        let cepstra = mel::mfcc(&magnitude, &bank, TIMBRE_COEFFS);
        let timbral = timbral_change(&cepstra);

        let cfg = &self.config.key_moments;
        let n = onset_full
            .len()
            .min(onset_percussive.len())
            .min(timbral.len());
        let composite: Vec<f32> = (0..n)
            .map(|i| {
                cfg.onset_weight * onset_full[i]
                    + cfg.percussive_weight * onset_percussive[i]
                    + cfg.timbral_weight * timbral[i]
            })
            .collect();

        // Adaptive absolute threshold over the context-window peak picker
        let threshold = stats::median(&composite) + 1.5 * stats::stddev(&composite);
        let params = PeakPickParams {
            max_window: cfg.peak_window,
            avg_window: cfg.average_window,
            delta: 0.0,
            wait: cfg.wait_frames,
        };
        let mut moments: Vec<Moment> = pick_peaks(&composite, &params)
            .into_iter()
            .filter(|p| p.value >= threshold)
            .map(|p| Moment {
                time: stft.frame_to_time(p.frame, signal.sample_rate()),
                strength: p.value,
            })
            .collect();

        // Structural boundaries are trusted even without local novelty
        if signal.duration() > cfg.min_structural_duration {
            let boundaries = self.structural_boundaries(&magnitude, &bank, &stft, signal);
            for time in boundaries {
                let is_new = moments
                    .iter()
                    .all(|m| (m.time - time).abs() > cfg.min_spacing);
                if is_new {
                    moments.push(Moment {
                        time,
                        strength: cfg.structural_strength,
                    });
                }
            }
            moments.sort_by(|a, b| {
                a.time
                    .partial_cmp(&b.time)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let filtered = self.filter_moments(moments);
        tracing::debug!(count = filtered.len(), "Key moment detection complete");
        Ok(filtered)
    }

    /// Boundaries from clustering the path-enhanced recurrence structure
    fn structural_boundaries(
        &self,
        magnitude: &[Vec<f32>],
        bank: &MelFilterBank,
        stft: &Stft,
        signal: &AudioSignal<'_>,
    ) -> Vec<f64> {
        let cfg = &self.config.key_moments;

        let mel_db: Vec<Vec<f32>> = bank
            .apply_all(magnitude)
            .into_iter()
            .map(|frame| frame.into_iter().map(mel::energy_to_db).collect())
            .collect();
        let (pooled, block) = recurrence::pool_features(&mel_db, STRUCTURE_FRAMES);
        if pooled.len() < 4 {
            return Vec::new();
        }

        let affinity = recurrence::knn_affinity(
            &pooled,
            self.config.segments.recurrence_neighbors,
            self.config.segments.recurrence_width,
        );
        let enhanced = recurrence::path_enhance(&affinity, 3);

        // One boundary per ~10 seconds, capped
        let wanted = ((signal.duration() / 10.0) as usize)
            .clamp(1, cfg.max_structural_boundaries);
        let boundaries = recurrence::agglomerative_boundaries(&enhanced, wanted + 1);

        boundaries
            .into_iter()
            .map(|b| stft.frame_to_time(b * block, signal.sample_rate()))
            .collect()
    }

    /// Adaptive strength cutoff, then greedy earliest-first spacing
    fn filter_moments(&self, moments: Vec<Moment>) -> Vec<f64> {
        if moments.is_empty() {
            return Vec::new();
        }

        let strengths: Vec<f32> = moments.iter().map(|m| m.strength).collect();
        let cutoff = (stats::mean(&strengths) - 0.5 * stats::stddev(&strengths)).max(0.5);

        let mut result: Vec<f64> = Vec::new();
        for moment in moments.iter().filter(|m| m.strength >= cutoff) {
            let spaced = result
                .last()
                .map(|&last| moment.time - last >= self.config.key_moments.min_spacing)
                .unwrap_or(true);
            if spaced {
                result.push(moment.time);
            }
        }
        result
    }
}

/// Sum of absolute first differences of the cepstral coefficients,
/// normalized to a 1.0 peak
fn timbral_change(cepstra: &[Vec<f32>]) -> Vec<f32> {
    if cepstra.is_empty() {
        return Vec::new();
    }

    let mut curve = Vec::with_capacity(cepstra.len());
    curve.push(0.0);
    for pair in cepstra.windows(2) {
        let change: f32 = pair[1]
            .iter()
            .zip(pair[0].iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        curve.push(change);
    }

    stats::normalize_to_peak(&mut curve);
    curve
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Quiet tone for the first half, loud broadband noise for the second
    fn two_part_signal(sample_rate: u32, half: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * half * 2.0) as usize;
        let split = n / 2;
        (0..n)
            .map(|i| {
                if i < split {
                    (2.0 * std::f32::consts::PI * 220.0 * i as f32 / sample_rate as f32).sin()
                        * 0.1
                } else {
                    ((i as f32 * 12.9898).sin() * 43758.547).fract() * 0.8
                }
            })
            .collect()
    }

    #[test]
    fn test_transition_is_detected() {
        let samples = two_part_signal(22050, 15.0);
        let signal = AudioSignal::new(&samples, 22050).unwrap();
        let detector = KeyMomentDetector::new(&AnalysisConfig::default());

        let moments = detector.detect(&signal).unwrap();
        assert!(
            moments.iter().any(|&t| (13.0..=17.0).contains(&t)),
            "no key moment near the 15s transition: {:?}",
            moments
        );
    }

    #[test]
    fn test_minimum_spacing() {
        let samples = two_part_signal(22050, 15.0);
        let signal = AudioSignal::new(&samples, 22050).unwrap();
        let detector = KeyMomentDetector::new(&AnalysisConfig::default());

        let moments = detector.detect(&signal).unwrap();
        for pair in moments.windows(2) {
            assert!(pair[1] - pair[0] >= 2.0, "moments too close: {:?}", pair);
        }
    }

    #[test]
    fn test_silence_yields_no_moments() {
        let samples = vec![0.0f32; 22050 * 12];
        let signal = AudioSignal::new(&samples, 22050).unwrap();
        let detector = KeyMomentDetector::new(&AnalysisConfig::default());

        let moments = detector.detect(&signal).unwrap();
        assert!(moments.is_empty());
    }

    #[test]
    fn test_short_signal_yields_no_moments() {
        let samples = vec![0.1f32; 512];
        let signal = AudioSignal::new(&samples, 22050).unwrap();
        let detector = KeyMomentDetector::new(&AnalysisConfig::default());
        assert!(detector.detect(&signal).unwrap().is_empty());
    }

    #[test]
    fn test_timbral_change_flags_spectrum_shift() {
        let mut cepstra = vec![vec![1.0f32; 13]; 20];
        for frame in cepstra.iter_mut().skip(10) {
            for c in frame.iter_mut() {
                *c = -1.0;
            }
        }
        let curve = timbral_change(&cepstra);
        assert_eq!(curve.len(), 20);
        assert!((curve[10] - 1.0).abs() < 1e-6);
        assert!(curve[5] < 1e-6);
    }
}
