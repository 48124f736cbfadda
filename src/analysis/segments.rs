use crate::analysis::tempo::tempo_from_envelope;
use crate::analysis::types::Segment;
use crate::config::AnalysisConfig;
use crate::dsp::mel::{self, MelFilterBank};
use crate::dsp::recurrence;
use crate::dsp::stats::{self, EPSILON};
use crate::dsp::{onset, spectral, Stft};
use crate::error::Result;
use crate::signal::AudioSignal;

/// Cepstral coefficients in the segmentation feature vector (doubled by deltas)
const FEATURE_COEFFS: usize = 13;

/// Mel bands behind the cepstral representation
const MEL_BANDS: usize = 40;

/// Frame budget for the recurrence analysis
const STRUCTURE_FRAMES: usize = 250;

/// Partitions the track into contiguous structural sections
///
/// Candidate segmentations over a path-enhanced recurrence structure are
/// scored by duration consistency and adjacent energy contrast; the winner
/// covers [0, duration] exactly. Boundaries are snapped to nearby beats by
/// the assembler afterwards, keeping this analyzer independent of the
/// tempo estimator.
pub struct SegmentDetector {
    config: AnalysisConfig,
}

impl SegmentDetector {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Detect structural segments covering [0, duration]
    pub fn detect(&self, signal: &AudioSignal<'_>) -> Result<Vec<Segment>> {
        let duration = signal.duration();
        let cfg = &self.config.segments;

        if duration < cfg.min_track_duration {
            tracing::debug!(duration, "Short clip, single segment");
            return Ok(vec![whole_track_segment(signal)]);
        }

        let stft = Stft::new(self.config.window_size, self.config.hop_size);
        let magnitude = stft.magnitude_spectrogram(signal.samples())?;
        if magnitude.len() < 8 {
            return Ok(vec![whole_track_segment(signal)]);
        }

        let fps = signal.sample_rate() as f32 / self.config.hop_size as f32;
        let envelope = onset::strength_envelope(&magnitude);

        // MFCC plus first derivative, z-scored across time
        let bank = MelFilterBank::new(MEL_BANDS, magnitude[0].len(), signal.sample_rate());
        let features = delta_augment(&mel::mfcc(&magnitude, &bank, FEATURE_COEFFS));
        let features = zscore_columns(features);
        let (pooled, block) = recurrence::pool_features(&features, STRUCTURE_FRAMES);

        // Affinity recurrence with sharpened block structure
        let mut affinity =
            recurrence::knn_affinity(&pooled, cfg.recurrence_neighbors, cfg.recurrence_width);
        recurrence::reinforce_diagonal(&mut affinity, 1.0);
        let enhanced = recurrence::path_enhance(&affinity, 3);

        let lo = ((duration / 10.0) as usize).max(2);
        let hi = ((duration / 5.0) as usize).min(cfg.max_segments);

        let mut best: Option<(f32, Vec<Segment>)> = None;
        for count in lo..=hi.max(lo) {
            let boundaries = recurrence::agglomerative_boundaries(&enhanced, count);
            if boundaries.is_empty() {
                continue;
            }
            let times: Vec<f64> = boundaries
                .iter()
                .map(|&b| stft.frame_to_time(b * block, signal.sample_rate()))
                .collect();
            let segments =
                self.build_segments(signal, &magnitude, &envelope, &stft, fps, &times);
            if segments.len() < 2 {
                continue;
            }

            let score = self.score_candidate(&segments);
            tracing::debug!(count, score, "Segmentation candidate");
            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((score, segments));
            }
        }

        let segments = match best {
            Some((_, segments)) => segments,
            None => {
                tracing::debug!("No segmentation candidate succeeded, uniform fallback");
                self.uniform_fallback(signal, &magnitude, &envelope, &stft, fps)
            }
        };

        tracing::debug!(count = segments.len(), "Segment detection complete");
        Ok(segments)
    }

    /// Materialize segments from internal boundary times
    fn build_segments(
        &self,
        signal: &AudioSignal<'_>,
        magnitude: &[Vec<f32>],
        envelope: &[f32],
        stft: &Stft,
        fps: f32,
        boundary_times: &[f64],
    ) -> Vec<Segment> {
        let duration = signal.duration();

        let mut edges = vec![0.0];
        for &t in boundary_times {
            if t > *edges.last().unwrap() + f64::EPSILON && t < duration {
                edges.push(t);
            }
        }
        edges.push(duration);

        edges
            .windows(2)
            .map(|w| {
                let (start, end) = (w[0], w[1]);
                let lo_frame = stft.time_to_frame(start, signal.sample_rate());
                let hi_frame = stft.time_to_frame(end, signal.sample_rate());

                let tempo = if end - start >= self.config.segments.min_tempo_duration {
                    let slice =
                        &envelope[lo_frame.min(envelope.len())..hi_frame.min(envelope.len())];
                    tempo_from_envelope(slice, fps, self.config.min_bpm, self.config.max_bpm)
                } else {
                    None
                };

                Segment {
                    start,
                    end,
                    duration: end - start,
                    energy: signal.rms_in_range(start, end),
                    contrast: Some(spectral::mean_contrast(magnitude, lo_frame, hi_frame)),
                    tempo,
                }
            })
            .collect()
    }

    /// Score a candidate: even durations plus strong adjacent energy contrast
    fn score_candidate(&self, segments: &[Segment]) -> f32 {
        let durations: Vec<f32> = segments.iter().map(|s| s.duration as f32).collect();
        let duration_consistency = 1.0 / (1.0 + stats::stddev(&durations));

        let contrasts: Vec<f32> = segments
            .windows(2)
            .map(|w| (w[1].energy - w[0].energy).abs())
            .collect();
        let avg_contrast = stats::mean(&contrasts);

        self.config.segments.duration_weight * duration_consistency
            + self.config.segments.contrast_weight * 10.0 * avg_contrast
    }

    /// Uniform ~10-second segments when structure discovery fails
    fn uniform_fallback(
        &self,
        signal: &AudioSignal<'_>,
        magnitude: &[Vec<f32>],
        envelope: &[f32],
        stft: &Stft,
        fps: f32,
    ) -> Vec<Segment> {
        let duration = signal.duration();
        let count = ((duration / self.config.segments.fallback_segment_duration).round() as usize)
            .clamp(2, 5);

        let step = duration / count as f64;
        let times: Vec<f64> = (1..count).map(|i| i as f64 * step).collect();
        self.build_segments(signal, magnitude, envelope, stft, fps, &times)
    }
}

/// Single segment spanning the whole clip
pub(crate) fn whole_track_segment(signal: &AudioSignal<'_>) -> Segment {
    let duration = signal.duration();
    Segment {
        start: 0.0,
        end: duration,
        duration,
        energy: signal.rms(),
        contrast: None,
        tempo: None,
    }
}

/// Snap internal boundaries to beats within the tolerance
///
/// Runs at the assembler after both analyzers finish. Each shared boundary
/// moves at most once and only while both adjoining segments keep positive
/// length, so the partition invariants survive.
pub fn align_to_beats(segments: &mut [Segment], beats: &[f64], tolerance: f64) {
    if beats.is_empty() || segments.len() < 2 {
        return;
    }

    for i in 0..segments.len() - 1 {
        let boundary = segments[i].end;
        let nearest = beats
            .iter()
            .copied()
            .min_by(|a, b| {
                (a - boundary)
                    .abs()
                    .partial_cmp(&(b - boundary).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(boundary);

        let within_tolerance = (nearest - boundary).abs() <= tolerance;
        let keeps_order = nearest > segments[i].start && nearest < segments[i + 1].end;
        if within_tolerance && keeps_order {
            segments[i].end = nearest;
            segments[i].duration = segments[i].end - segments[i].start;
            segments[i + 1].start = nearest;
            segments[i + 1].duration = segments[i + 1].end - segments[i + 1].start;
        }
    }
}

/// Append first differences to each feature frame
fn delta_augment(features: &[Vec<f32>]) -> Vec<Vec<f32>> {
    features
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let mut augmented = frame.clone();
            if i == 0 {
                augmented.extend(std::iter::repeat(0.0).take(frame.len()));
            } else {
                augmented.extend(
                    frame
                        .iter()
                        .zip(features[i - 1].iter())
                        .map(|(cur, prev)| cur - prev),
                );
            }
            augmented
        })
        .collect()
}

/// Z-score each feature dimension across time
fn zscore_columns(mut features: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
    if features.is_empty() {
        return features;
    }
    let dims = features[0].len();

    for dim in 0..dims {
        let column: Vec<f32> = features.iter().map(|f| f[dim]).collect();
        let mean = stats::mean(&column);
        let std = stats::stddev(&column);
        for frame in features.iter_mut() {
            frame[dim] = (frame[dim] - mean) / (std + EPSILON);
        }
    }
    features
}
