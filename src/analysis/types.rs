use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Overall perceptual energy bucket of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

/// Downsampled amplitude sequence for visualization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveformData {
    /// Block-averaged amplitudes, at most the configured point count
    pub data: Vec<f32>,

    /// Sample rate of the source signal in Hz
    pub sample_rate: u32,

    /// Source duration in seconds
    pub duration: f64,
}

/// Contiguous structural section of a track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    /// Length in seconds
    pub duration: f64,

    /// RMS energy of the section
    pub energy: f32,

    /// Mean spectral contrast of the section, when computed
    pub contrast: Option<f32>,

    /// Local tempo of the section, only for sections long enough to carry one
    pub tempo: Option<f32>,
}

/// Tempo and beat output of the tempo/beat estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Global tempo in BPM
    pub bpm: f32,

    /// Beat timestamps in seconds, strictly increasing
    pub beats: Vec<f64>,

    /// Per-beat strengths parallel to `beats`, floored at the configured minimum
    pub strengths: Vec<f32>,
}

/// Complete analysis of one track
///
/// Immutable once constructed; ownership transfers entirely to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Caller-supplied identifier, never interpreted
    pub track_id: String,

    /// Global tempo estimate in BPM
    pub bpm: f32,

    /// Overall energy bucket
    pub energy_level: EnergyLevel,

    /// Beat timestamps in seconds, strictly increasing, within [0, duration]
    pub beat_markers: Vec<f64>,

    /// Per-beat strengths parallel to `beat_markers`
    pub beat_strengths: Vec<f32>,

    /// Salient transition timestamps, sorted, spaced at least the configured gap
    pub key_moments: Vec<f64>,

    /// Downsampled waveform for visualization
    pub waveform_data: WaveformData,

    /// Structural sections covering [0, duration] contiguously
    pub segments: Vec<Segment>,

    /// Auxiliary scalar features, extensible without breaking the schema
    pub features: BTreeMap<String, f32>,
}

impl AnalysisResult {
    /// Track duration in seconds
    pub fn duration(&self) -> f64 {
        self.waveform_data.duration
    }

    /// Beat markers within a time range
    pub fn beats_in_range(&self, start: f64, end: f64) -> Vec<f64> {
        self.beat_markers
            .iter()
            .copied()
            .filter(|&t| t >= start && t <= end)
            .collect()
    }

    /// First beat marker after a given time
    pub fn next_beat_after(&self, time: f64) -> Option<f64> {
        self.beat_markers.iter().copied().find(|&t| t > time)
    }

    /// The segment containing a given time
    pub fn segment_at(&self, time: f64) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| time >= s.start && time < s.end)
            .or_else(|| self.segments.last().filter(|s| (time - s.end).abs() < 1e-9))
    }
}

/// Tagged outcome of one analysis call
///
/// Callers that care whether defaults were substituted inspect the tag;
/// callers that only want a usable result call [`AnalysisOutcome::into_result`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnalysisOutcome {
    /// Every analyzer succeeded
    Full(AnalysisResult),

    /// At least one analyzer was replaced by documented defaults
    Degraded {
        result: AnalysisResult,
        reason: String,
    },
}

impl AnalysisOutcome {
    /// The result, regardless of confidence
    pub fn result(&self) -> &AnalysisResult {
        match self {
            Self::Full(result) => result,
            Self::Degraded { result, .. } => result,
        }
    }

    /// Consume the outcome, discarding the confidence tag
    pub fn into_result(self) -> AnalysisResult {
        match self {
            Self::Full(result) => result,
            Self::Degraded { result, .. } => result,
        }
    }

    /// True when defaults were substituted anywhere
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Degradation reason, when present
    pub fn degradation_reason(&self) -> Option<&str> {
        match self {
            Self::Full(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            track_id: "track-1".to_string(),
            bpm: 120.0,
            energy_level: EnergyLevel::Medium,
            beat_markers: vec![0.5, 1.0, 1.5, 2.0],
            beat_strengths: vec![0.9, 0.4, 0.8, 0.3],
            key_moments: vec![1.5],
            waveform_data: WaveformData {
                data: vec![0.1; 100],
                sample_rate: 44100,
                duration: 3.0,
            },
            segments: vec![
                Segment {
                    start: 0.0,
                    end: 1.5,
                    duration: 1.5,
                    energy: 0.2,
                    contrast: None,
                    tempo: None,
                },
                Segment {
                    start: 1.5,
                    end: 3.0,
                    duration: 1.5,
                    energy: 0.6,
                    contrast: Some(0.4),
                    tempo: Some(120.0),
                },
            ],
            features: BTreeMap::new(),
        }
    }

    #[test]
    fn test_beats_in_range() {
        let result = sample_result();
        assert_eq!(result.beats_in_range(0.75, 1.6), vec![1.0, 1.5]);
    }

    #[test]
    fn test_next_beat_after() {
        let result = sample_result();
        assert_eq!(result.next_beat_after(1.0), Some(1.5));
        assert_eq!(result.next_beat_after(2.0), None);
    }

    #[test]
    fn test_segment_at() {
        let result = sample_result();
        assert_eq!(result.segment_at(0.7).unwrap().start, 0.0);
        assert_eq!(result.segment_at(1.5).unwrap().start, 1.5);
        // Exact track end belongs to the final segment
        assert_eq!(result.segment_at(3.0).unwrap().start, 1.5);
    }

    #[test]
    fn test_outcome_tagging() {
        let full = AnalysisOutcome::Full(sample_result());
        assert!(!full.is_degraded());
        assert!(full.degradation_reason().is_none());

        let degraded = AnalysisOutcome::Degraded {
            result: sample_result(),
            reason: "tempo analyzer failed".to_string(),
        };
        assert!(degraded.is_degraded());
        assert_eq!(degraded.result().bpm, 120.0);
    }

    #[test]
    fn test_result_serializes() {
        let result = sample_result();
        let encoded = toml::to_string(&result);
        assert!(encoded.is_ok());
    }
}
