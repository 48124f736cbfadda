use crate::analysis::tempo::tempo_from_envelope;
use crate::analysis::types::EnergyLevel;
use crate::config::AnalysisConfig;
use crate::dsp::mel::{energy_to_db, MelFilterBank};
use crate::dsp::stats::{self, unit_clamp, EPSILON};
use crate::dsp::{hpss, onset, spectral, Stft};
use crate::error::Result;
use crate::signal::AudioSignal;

/// RMS value treated as full scale when normalizing loudness
const RMS_FULL_SCALE: f32 = 0.25;

/// Spectral centroid ceiling in Hz for the brightness sub-feature
const BRIGHTNESS_CEILING_HZ: f32 = 5000.0;

/// Spectral contrast ceiling in dB
const CONTRAST_CEILING_DB: f32 = 40.0;

/// Onset density ceiling in onsets per second
const ONSET_DENSITY_CEILING: f32 = 5.0;

/// dB range mapped onto [0, 1] for perceptual loudness
const PERCEPTUAL_DB_RANGE: f32 = 60.0;

/// Number of mel bands for the perceptual loudness estimate
const MEL_BANDS: usize = 40;

/// Scores overall perceptual energy and buckets it into a category
///
/// Eight independently normalized sub-features combine through fixed weights
/// into one composite score; adaptive thresholds keep heavily compressed
/// masters from all reading as high-energy. Fully deterministic.
pub struct EnergyClassifier {
    config: AnalysisConfig,
}

impl EnergyClassifier {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Classify the signal's overall energy
    pub fn classify(&self, signal: &AudioSignal<'_>) -> Result<EnergyLevel> {
        Ok(self.classify_with_score(signal)?.0)
    }

    /// Classify and also expose the composite score
    pub fn classify_with_score(&self, signal: &AudioSignal<'_>) -> Result<(EnergyLevel, f32)> {
        if signal.is_empty() {
            return Ok((EnergyLevel::Low, 0.0));
        }

        let stft = Stft::new(self.config.window_size, self.config.hop_size);
        let magnitude = stft.magnitude_spectrogram(signal.samples())?;
        if magnitude.is_empty() {
            return Ok((EnergyLevel::Low, 0.0));
        }

        let fps = signal.sample_rate() as f32 / self.config.hop_size as f32;
        let separation = hpss::decompose(&magnitude);
        let envelope = onset::strength_envelope(&magnitude);
        let frame_rms = frame_rms(signal);

        let loudness = unit_clamp(stats::mean(&frame_rms) / RMS_FULL_SCALE);
        let brightness = unit_clamp(
            spectral::mean_centroid(&magnitude, &stft, signal.sample_rate())
                / BRIGHTNESS_CEILING_HZ,
        );
        let contrast = unit_clamp(
            spectral::mean_contrast(&magnitude, 0, magnitude.len()) / CONTRAST_CEILING_DB,
        );
        let tonality = unit_clamp(1.0 - spectral::mean_flatness(&magnitude));
        let onset_density = unit_clamp(
            onset::count_onsets(&envelope, 0.5, (fps * 0.1) as usize) as f32
                / signal.duration().max(0.1) as f32
                / ONSET_DENSITY_CEILING,
        );
        let percussive_ratio = separation.percussive_ratio();
        let percussive = percussive_ratio / (1.0 + percussive_ratio);
        let tempo = unit_clamp(
            tempo_from_envelope(&envelope, fps, self.config.min_bpm, self.config.max_bpm)
                .unwrap_or(self.config.fallback_bpm)
                / self.config.energy.tempo_ceiling_bpm,
        );
        let perceptual = perceptual_loudness(&magnitude, signal.sample_rate());

        let sub_features = [
            loudness,
            brightness,
            contrast,
            tonality,
            onset_density,
            percussive,
            tempo,
            perceptual,
        ];
        let score: f32 = sub_features
            .iter()
            .zip(self.config.energy.weights.iter())
            .map(|(f, w)| f * w)
            .sum();

        let (low, high) = self.adaptive_thresholds(&frame_rms);
        let level = if score < low {
            EnergyLevel::Low
        } else if score > high {
            EnergyLevel::High
        } else {
            EnergyLevel::Medium
        };

        tracing::debug!(score, low, high, ?level, "Energy classification");
        Ok((level, score))
    }

    /// Shift both thresholds upward for compressed masters
    ///
    /// Heavily limited audio has peak RMS close to median RMS, which pushes
    /// every loudness-correlated sub-feature up; the shift compensates so
    /// such masters are not all classified High.
    fn adaptive_thresholds(&self, frame_rms: &[f32]) -> (f32, f32) {
        let peak = stats::max(frame_rms);
        let median = stats::median(frame_rms);
        let ratio = peak / (median + EPSILON);
        let compression = unit_clamp(2.0 - ratio);

        let shift = self.config.energy.max_threshold_shift * compression;
        (
            self.config.energy.low_threshold + shift,
            self.config.energy.high_threshold + shift,
        )
    }
}

/// RMS per 100 ms window with 50% overlap
fn frame_rms(signal: &AudioSignal<'_>) -> Vec<f32> {
    let window = (signal.sample_rate() as usize / 10).max(1);
    let hop = (window / 2).max(1);
    let samples = signal.samples();

    if samples.len() < window {
        return vec![signal.rms()];
    }

    samples
        .windows(window)
        .step_by(hop)
        .map(|w| (w.iter().map(|&x| x * x).sum::<f32>() / w.len() as f32).sqrt())
        .collect()
}

/// Mean of per-frame peak mel energy, dB-rescaled onto [0, 1]
fn perceptual_loudness(magnitude: &[Vec<f32>], sample_rate: u32) -> f32 {
    if magnitude.is_empty() {
        return 0.0;
    }
    let bank = MelFilterBank::new(MEL_BANDS, magnitude[0].len(), sample_rate);
    let peak_dbs: Vec<f32> = magnitude
        .iter()
        .map(|frame| energy_to_db(stats::max(&bank.apply(frame))))
        .collect();
    unit_clamp((stats::mean(&peak_dbs) + PERCEPTUAL_DB_RANGE) / PERCEPTUAL_DB_RANGE)
}
