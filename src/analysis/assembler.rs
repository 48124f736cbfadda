use std::collections::BTreeMap;

use crate::analysis::energy::EnergyClassifier;
use crate::analysis::moments::KeyMomentDetector;
use crate::analysis::segments::{self, whole_track_segment, SegmentDetector};
use crate::analysis::tempo::TempoBeatEstimator;
use crate::analysis::types::{
    AnalysisOutcome, AnalysisResult, EnergyLevel, TempoEstimate, WaveformData,
};
use crate::analysis::waveform::WaveformSummarizer;
use crate::config::AnalysisConfig;
use crate::dsp::{onset, spectral, Stft};
use crate::error::Result;
use crate::signal::AudioSignal;

/// Duration below which a signal is treated as insufficient, seconds
const MIN_ANALYZABLE_DURATION: f64 = 0.5;

/// RMS below which a signal is treated as silent
const SILENCE_RMS: f32 = 1e-4;

/// Orchestrates the four analyzers over a shared immutable sample buffer
///
/// The analyzers are mutually independent, so they run data-parallel and
/// join here. A failing analyzer is replaced by documented defaults and the
/// outcome is tagged degraded; the caller always receives a schema-valid
/// result for a valid input.
pub struct AudioAnalyzer {
    config: AnalysisConfig,
}

impl AudioAnalyzer {
    /// Create an analyzer with default configuration
    pub fn new() -> Self {
        Self::with_config(AnalysisConfig::default())
    }

    /// Create an analyzer with custom configuration
    pub fn with_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Analyze one track
    pub fn analyze(&self, track_id: &str, signal: &AudioSignal<'_>) -> Result<AnalysisOutcome> {
        self.config.validate()?;

        tracing::info!(
            track_id,
            duration = signal.duration(),
            sample_rate = signal.sample_rate(),
            "Starting audio analysis"
        );

        let waveform =
            WaveformSummarizer::new(self.config.waveform_points).summarize(signal);

        if signal.is_near_silent(MIN_ANALYZABLE_DURATION, SILENCE_RMS) {
            tracing::info!(track_id, "Insufficient signal, returning defaults");
            return Ok(self.insufficient_signal_outcome(track_id, signal, waveform));
        }

        let tempo_estimator = TempoBeatEstimator::new(&self.config);
        let energy_classifier = EnergyClassifier::new(&self.config);
        let moment_detector = KeyMomentDetector::new(&self.config);
        let segment_detector = SegmentDetector::new(&self.config);

        // The four analyzers only read the shared buffer, so they fan out
        let ((tempo_res, energy_res), (moments_res, segments_res)) = rayon::join(
            || {
                rayon::join(
                    || tempo_estimator.estimate(signal),
                    || energy_classifier.classify_with_score(signal),
                )
            },
            || {
                rayon::join(
                    || moment_detector.detect(signal),
                    || segment_detector.detect(signal),
                )
            },
        );

        let mut features: BTreeMap<String, f32> = BTreeMap::new();
        let mut degraded: Vec<String> = Vec::new();

        let tempo = tempo_res.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Tempo analyzer degraded");
            degraded.push(format!("tempo: {}", e));
            features.insert("degraded_tempo".to_string(), 1.0);
            TempoEstimate {
                bpm: self.config.fallback_bpm,
                beats: Vec::new(),
                strengths: Vec::new(),
            }
        });

        let (energy_level, energy_score) = energy_res.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Energy analyzer degraded");
            degraded.push(format!("energy: {}", e));
            features.insert("degraded_energy".to_string(), 1.0);
            (EnergyLevel::Medium, 0.5)
        });

        let key_moments = moments_res.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Key moment analyzer degraded");
            degraded.push(format!("key_moments: {}", e));
            features.insert("degraded_key_moments".to_string(), 1.0);
            Vec::new()
        });

        let mut track_segments = segments_res.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Segment analyzer degraded");
            degraded.push(format!("segments: {}", e));
            features.insert("degraded_segments".to_string(), 1.0);
            vec![whole_track_segment(signal)]
        });

        segments::align_to_beats(
            &mut track_segments,
            &tempo.beats,
            self.config.segments.beat_snap_tolerance,
        );

        features.insert("energy_score".to_string(), energy_score);
        self.attach_spectral_features(signal, &mut features);

        tracing::info!(
            track_id,
            bpm = tempo.bpm,
            beats = tempo.beats.len(),
            segments = track_segments.len(),
            key_moments = key_moments.len(),
            "Analysis complete"
        );

        let result = AnalysisResult {
            track_id: track_id.to_string(),
            bpm: tempo.bpm,
            energy_level,
            beat_markers: tempo.beats,
            beat_strengths: tempo.strengths,
            key_moments,
            waveform_data: waveform,
            segments: track_segments,
            features: {
                if !degraded.is_empty() {
                    features.insert("degraded".to_string(), 1.0);
                }
                features
            },
        };

        if degraded.is_empty() {
            Ok(AnalysisOutcome::Full(result))
        } else {
            Ok(AnalysisOutcome::Degraded {
                result,
                reason: degraded.join("; "),
            })
        }
    }

    /// Low-confidence defaults for silence or very short input
    fn insufficient_signal_outcome(
        &self,
        track_id: &str,
        signal: &AudioSignal<'_>,
        waveform: WaveformData,
    ) -> AnalysisOutcome {
        let mut features = BTreeMap::new();
        features.insert("degraded".to_string(), 1.0);
        features.insert("insufficient_signal".to_string(), 1.0);
        features.insert("energy_score".to_string(), 0.0);

        AnalysisOutcome::Degraded {
            result: AnalysisResult {
                track_id: track_id.to_string(),
                bpm: self.config.fallback_bpm,
                energy_level: EnergyLevel::Low,
                beat_markers: Vec::new(),
                beat_strengths: Vec::new(),
                key_moments: Vec::new(),
                waveform_data: waveform,
                segments: vec![whole_track_segment(signal)],
                features,
            },
            reason: "insufficient signal: silence or very short input".to_string(),
        }
    }

    /// Auxiliary scalar features alongside the main result
    fn attach_spectral_features(
        &self,
        signal: &AudioSignal<'_>,
        features: &mut BTreeMap<String, f32>,
    ) {
        let stft = Stft::new(self.config.window_size, self.config.hop_size);
        let magnitude = match stft.magnitude_spectrogram(signal.samples()) {
            Ok(m) if !m.is_empty() => m,
            _ => return,
        };
        let fps = signal.sample_rate() as f32 / self.config.hop_size as f32;
        let envelope = onset::strength_envelope(&magnitude);

        features.insert(
            "spectral_centroid_mean".to_string(),
            spectral::mean_centroid(&magnitude, &stft, signal.sample_rate()),
        );
        features.insert(
            "spectral_rolloff_mean".to_string(),
            spectral::mean_rolloff(&magnitude, &stft, signal.sample_rate()),
        );
        features.insert(
            "zero_crossing_rate_mean".to_string(),
            spectral::zero_crossing_rate(signal.samples()),
        );
        features.insert(
            "onset_count".to_string(),
            onset::count_onsets(&envelope, 0.5, (fps * 0.1) as usize) as f32,
        );
        features.insert("duration".to_string(), signal.duration() as f32);
    }
}

impl Default for AudioAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(bpm: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        let mut samples = vec![0.0f32; n];
        let period = (60.0 / bpm * sample_rate as f32) as usize;
        let click_len = sample_rate as usize / 100;

        let mut pos = 0;
        while pos < n {
            for i in 0..click_len.min(n - pos) {
                samples[pos + i] = (1.0 - i as f32 / click_len as f32)
                    * (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate as f32).sin();
            }
            pos += period;
        }
        samples
    }

    fn assert_schema_valid(result: &AnalysisResult) {
        let duration = result.duration();

        assert_eq!(result.beat_markers.len(), result.beat_strengths.len());
        for pair in result.beat_markers.windows(2) {
            assert!(pair[0] < pair[1], "beat markers must strictly increase");
        }
        assert!(result
            .beat_markers
            .iter()
            .all(|&t| (0.0..=duration + 1e-6).contains(&t)));
        assert!(result
            .beat_strengths
            .iter()
            .all(|&s| (0.3..=1.0 + 1e-6).contains(&s)));

        assert!(!result.segments.is_empty());
        assert!(result.segments[0].start.abs() < 1e-6);
        assert!((result.segments.last().unwrap().end - duration).abs() < 1e-6);
        for pair in result.segments.windows(2) {
            assert!((pair[0].end - pair[1].start).abs() < 1e-9);
        }

        for pair in result.key_moments.windows(2) {
            assert!(pair[1] - pair[0] >= 2.0);
        }

        assert!(result.waveform_data.data.len() <= 1000);
    }

    #[test]
    fn test_click_track_analysis() {
        let samples = click_track(120.0, 22050, 30.0);
        let signal = AudioSignal::new(&samples, 22050).unwrap();
        let analyzer = AudioAnalyzer::new();

        let outcome = analyzer.analyze("click-120", &signal).unwrap();
        let result = outcome.result();

        assert!((result.bpm - 120.0).abs() <= 3.0, "bpm {}", result.bpm);
        assert_schema_valid(result);
        assert!(result.features.contains_key("spectral_centroid_mean"));
        assert!(result.features.contains_key("energy_score"));
    }

    #[test]
    fn test_silent_track_degrades() {
        let samples = vec![0.0f32; 22050 * 10];
        let signal = AudioSignal::new(&samples, 22050).unwrap();
        let analyzer = AudioAnalyzer::new();

        let outcome = analyzer.analyze("silence", &signal).unwrap();
        assert!(outcome.is_degraded());

        let result = outcome.result();
        assert_eq!(result.energy_level, EnergyLevel::Low);
        assert!(result.beat_markers.is_empty());
        assert!(result.key_moments.is_empty());
        assert_eq!(result.segments.len(), 1);
        assert!((result.segments[0].end - 10.0).abs() < 1e-6);
        assert_eq!(result.features.get("insufficient_signal"), Some(&1.0));
        assert_schema_valid(result);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let samples = click_track(96.0, 22050, 12.0);
        let signal = AudioSignal::new(&samples, 22050).unwrap();
        let analyzer = AudioAnalyzer::new();

        let first = analyzer.analyze("repeat", &signal).unwrap().into_result();
        let second = analyzer.analyze("repeat", &signal).unwrap().into_result();

        assert_eq!(first.bpm, second.bpm);
        assert_eq!(first.energy_level, second.energy_level);
        assert_eq!(first.beat_markers, second.beat_markers);
        assert_eq!(
            first.segments.iter().map(|s| s.end).collect::<Vec<_>>(),
            second.segments.iter().map(|s| s.end).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_track_id_passthrough() {
        let samples = click_track(120.0, 22050, 6.0);
        let signal = AudioSignal::new(&samples, 22050).unwrap();
        let analyzer = AudioAnalyzer::new();

        let outcome = analyzer.analyze("opaque/id#42", &signal).unwrap();
        assert_eq!(outcome.result().track_id, "opaque/id#42");
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut config = AnalysisConfig::default();
        config.window_size = 1000; // Not a power of two
        let analyzer = AudioAnalyzer::with_config(config);

        let samples = click_track(120.0, 22050, 2.0);
        let signal = AudioSignal::new(&samples, 22050).unwrap();
        assert!(analyzer.analyze("bad-config", &signal).is_err());
    }

    #[test]
    fn test_short_clip_single_segment() {
        let samples = click_track(120.0, 22050, 4.0);
        let signal = AudioSignal::new(&samples, 22050).unwrap();
        let analyzer = AudioAnalyzer::new();

        let outcome = analyzer.analyze("short", &signal).unwrap();
        let result = outcome.result();
        assert_eq!(result.segments.len(), 1);
        assert!((result.segments[0].end - 4.0).abs() < 1e-6);
        assert_schema_valid(result);
    }
}
