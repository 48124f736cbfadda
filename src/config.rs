use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for audio analysis
///
/// All numeric defaults are hand-tuned for typical pop/electronic material;
/// they are exposed here rather than hard-coded so callers can retune them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Window size for FFT analysis (must be a power of two)
    pub window_size: usize,

    /// Hop size between analysis frames
    pub hop_size: usize,

    /// Minimum BPM to consider during tempo estimation
    pub min_bpm: f32,

    /// Maximum BPM to consider during tempo estimation
    pub max_bpm: f32,

    /// Tempo reported when the signal carries no usable rhythm
    pub fallback_bpm: f32,

    /// Tempo and beat tracking settings
    pub tempo: TempoConfig,

    /// Energy classification settings
    pub energy: EnergyConfig,

    /// Key moment detection settings
    pub key_moments: KeyMomentConfig,

    /// Structural segmentation settings
    pub segments: SegmentConfig,

    /// Maximum number of points in the downsampled waveform
    pub waveform_points: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            hop_size: 512,
            min_bpm: 60.0,
            max_bpm: 200.0,
            fallback_bpm: 120.0,
            tempo: TempoConfig::default(),
            energy: EnergyConfig::default(),
            key_moments: KeyMomentConfig::default(),
            segments: SegmentConfig::default(),
            waveform_points: 1000,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: AnalysisConfig =
            toml::from_str(&content).map_err(|_| ConfigError::ParseFailed {
                path: path.display().to_string(),
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|_| ConfigError::WriteFailed {
            path: path.display().to_string(),
        })?;

        std::fs::write(path, content).map_err(|_| ConfigError::WriteFailed {
            path: path.display().to_string(),
        })?;
        Ok(())
    }

    /// Create a fast analysis config (lower spectral resolution, fewer candidates)
    pub fn fast() -> Self {
        Self {
            window_size: 1024,
            hop_size: 512,
            segments: SegmentConfig {
                max_segments: 6,
                ..SegmentConfig::default()
            },
            ..Default::default()
        }
    }

    /// Create a high-quality analysis config (slower but more accurate)
    pub fn high_quality() -> Self {
        Self {
            window_size: 4096,
            hop_size: 256,
            ..Default::default()
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || !self.window_size.is_power_of_two() {
            return Err(ConfigError::InvalidValue {
                key: "window_size".to_string(),
                value: self.window_size.to_string(),
            }
            .into());
        }

        if self.hop_size == 0 || self.hop_size > self.window_size {
            return Err(ConfigError::InvalidValue {
                key: "hop_size".to_string(),
                value: self.hop_size.to_string(),
            }
            .into());
        }

        if self.min_bpm <= 0.0 || self.min_bpm >= self.max_bpm {
            return Err(ConfigError::InvalidValue {
                key: "bpm_range".to_string(),
                value: format!("{}-{}", self.min_bpm, self.max_bpm),
            }
            .into());
        }

        if self.waveform_points == 0 {
            return Err(ConfigError::InvalidValue {
                key: "waveform_points".to_string(),
                value: self.waveform_points.to_string(),
            }
            .into());
        }

        self.tempo.validate()?;
        self.energy.validate()?;
        self.key_moments.validate()?;
        self.segments.validate()?;
        Ok(())
    }
}

/// Tempo estimation and beat tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoConfig {
    /// Blend weight of the full-signal onset envelope during beat tracking
    /// (the percussive envelope gets the remainder)
    pub full_envelope_weight: f32,

    /// Percussive-to-harmonic energy ratio above which a diverging
    /// percussive tempo estimate wins the tie-break
    pub percussive_ratio_threshold: f32,

    /// BPM divergence that triggers the percussive tie-break
    pub percussive_divergence_bpm: f32,

    /// Inter-beat consistency ratio below which beats are re-tracked
    /// with the high-tightness dynamic-programming pass
    pub consistency_threshold: f32,

    /// Transition tightness of the initial beat tracking pass
    pub tightness: f32,

    /// Transition tightness of the consistency re-track
    pub strict_tightness: f32,

    /// Weight of the full-signal onset strength in beat strengths
    /// (percussive strength gets the remainder)
    pub strength_full_weight: f32,

    /// Minimum reported beat strength
    pub strength_floor: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            full_envelope_weight: 0.7,
            percussive_ratio_threshold: 0.5,
            percussive_divergence_bpm: 10.0,
            consistency_threshold: 0.6,
            tightness: 100.0,
            strict_tightness: 400.0,
            strength_full_weight: 0.6,
            strength_floor: 0.3,
        }
    }
}

impl TempoConfig {
    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("tempo.full_envelope_weight", self.full_envelope_weight),
            ("tempo.strength_full_weight", self.strength_full_weight),
            ("tempo.consistency_threshold", self.consistency_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                }
                .into());
            }
        }

        if !(0.0..1.0).contains(&self.strength_floor) {
            return Err(ConfigError::InvalidValue {
                key: "tempo.strength_floor".to_string(),
                value: self.strength_floor.to_string(),
            }
            .into());
        }

        if self.tightness <= 0.0 || self.strict_tightness < self.tightness {
            return Err(ConfigError::InvalidValue {
                key: "tempo.tightness".to_string(),
                value: format!("{}/{}", self.tightness, self.strict_tightness),
            }
            .into());
        }

        Ok(())
    }
}

/// Energy classification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyConfig {
    /// Weights of the eight sub-features, in order: loudness, brightness,
    /// spectral contrast, tonality, onset density, percussive ratio,
    /// tempo, perceptual loudness. Should sum to roughly 1.0.
    pub weights: [f32; 8],

    /// Base threshold below which the composite score classifies as Low
    pub low_threshold: f32,

    /// Base threshold above which the composite score classifies as High
    pub high_threshold: f32,

    /// Maximum upward shift applied to both thresholds for compressed masters
    pub max_threshold_shift: f32,

    /// Tempo ceiling used to normalize the tempo sub-feature
    pub tempo_ceiling_bpm: f32,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            weights: [0.25, 0.15, 0.10, 0.05, 0.15, 0.15, 0.05, 0.10],
            low_threshold: 0.30,
            high_threshold: 0.65,
            max_threshold_shift: 0.10,
            tempo_ceiling_bpm: 180.0,
        }
    }
}

impl EnergyConfig {
    fn validate(&self) -> Result<()> {
        if self.weights.iter().any(|w| *w < 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "energy.weights".to_string(),
                value: format!("{:?}", self.weights),
            }
            .into());
        }

        if self.low_threshold >= self.high_threshold {
            return Err(ConfigError::InvalidValue {
                key: "energy.thresholds".to_string(),
                value: format!("{}-{}", self.low_threshold, self.high_threshold),
            }
            .into());
        }

        if self.max_threshold_shift < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "energy.max_threshold_shift".to_string(),
                value: self.max_threshold_shift.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Key moment detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMomentConfig {
    /// Weight of the full-signal onset envelope in the composite novelty
    pub onset_weight: f32,

    /// Weight of the percussive onset envelope in the composite novelty
    pub percussive_weight: f32,

    /// Weight of the timbral-change curve in the composite novelty
    pub timbral_weight: f32,

    /// Frames a peak must dominate on each side
    pub peak_window: usize,

    /// Frames averaged on each side for the local baseline
    pub average_window: usize,

    /// Minimum frames between successive peaks
    pub wait_frames: usize,

    /// Track duration below which structural boundaries are not attempted
    pub min_structural_duration: f64,

    /// Maximum number of recurrence boundaries merged into the peak set
    pub max_structural_boundaries: usize,

    /// Strength assigned to boundaries that lack local novelty support
    pub structural_strength: f32,

    /// Minimum spacing between reported key moments, in seconds
    pub min_spacing: f64,
}

impl Default for KeyMomentConfig {
    fn default() -> Self {
        Self {
            onset_weight: 0.5,
            percussive_weight: 0.3,
            timbral_weight: 0.2,
            peak_window: 30,
            average_window: 100,
            wait_frames: 30,
            min_structural_duration: 10.0,
            max_structural_boundaries: 10,
            structural_strength: 0.8,
            min_spacing: 2.0,
        }
    }
}

impl KeyMomentConfig {
    fn validate(&self) -> Result<()> {
        if self.min_spacing <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "key_moments.min_spacing".to_string(),
                value: self.min_spacing.to_string(),
            }
            .into());
        }

        if self.peak_window == 0 || self.average_window == 0 {
            return Err(ConfigError::InvalidValue {
                key: "key_moments.windows".to_string(),
                value: format!("{}/{}", self.peak_window, self.average_window),
            }
            .into());
        }

        Ok(())
    }
}

/// Structural segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Track duration below which the whole clip becomes a single segment
    pub min_track_duration: f64,

    /// Hard cap on the number of segments searched
    pub max_segments: usize,

    /// Nearest neighbors kept per frame in the recurrence matrix
    pub recurrence_neighbors: usize,

    /// Local window (frames) excluded around the diagonal
    pub recurrence_width: usize,

    /// Weight of duration consistency in candidate scoring
    pub duration_weight: f32,

    /// Weight of adjacent energy contrast in candidate scoring
    pub contrast_weight: f32,

    /// Minimum segment length eligible for a local tempo estimate, seconds
    pub min_tempo_duration: f64,

    /// Approximate segment length of the uniform fallback, seconds
    pub fallback_segment_duration: f64,

    /// Maximum distance between a boundary and a beat for snapping, seconds
    pub beat_snap_tolerance: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_track_duration: 5.0,
            max_segments: 10,
            recurrence_neighbors: 5,
            recurrence_width: 3,
            duration_weight: 0.7,
            contrast_weight: 0.3,
            min_tempo_duration: 3.0,
            fallback_segment_duration: 10.0,
            beat_snap_tolerance: 1.0,
        }
    }
}

impl SegmentConfig {
    fn validate(&self) -> Result<()> {
        if self.max_segments < 2 {
            return Err(ConfigError::InvalidValue {
                key: "segments.max_segments".to_string(),
                value: self.max_segments.to_string(),
            }
            .into());
        }

        if self.recurrence_neighbors == 0 {
            return Err(ConfigError::InvalidValue {
                key: "segments.recurrence_neighbors".to_string(),
                value: self.recurrence_neighbors.to_string(),
            }
            .into());
        }

        if self.beat_snap_tolerance < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "segments.beat_snap_tolerance".to_string(),
                value: self.beat_snap_tolerance.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(AnalysisConfig::fast().validate().is_ok());
        assert!(AnalysisConfig::high_quality().validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("analysis.toml");

        let original = AnalysisConfig::high_quality();
        original.save_to_file(&file_path).unwrap();
        let loaded = AnalysisConfig::from_file(&file_path).unwrap();

        assert_eq!(original.window_size, loaded.window_size);
        assert_eq!(original.energy.weights, loaded.energy.weights);
        assert_eq!(
            original.key_moments.min_spacing,
            loaded.key_moments.min_spacing
        );
    }

    #[test]
    fn test_invalid_window_size() {
        let config = AnalysisConfig {
            window_size: 1000, // Not a power of two
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_bpm_range() {
        let config = AnalysisConfig {
            min_bpm: 150.0,
            max_bpm: 100.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_energy_thresholds() {
        let mut config = AnalysisConfig::default();
        config.energy.low_threshold = 0.8;
        config.energy.high_threshold = 0.4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = AnalysisConfig::from_file("/nonexistent/analysis.toml");
        assert!(result.is_err());
    }
}
