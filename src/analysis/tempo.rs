use crate::analysis::types::TempoEstimate;
use crate::config::AnalysisConfig;
use crate::dsp::stats::{self, EPSILON};
use crate::dsp::{hpss, onset, Stft};
use crate::error::Result;
use crate::signal::AudioSignal;

/// Estimates global tempo and per-beat timestamps/strengths
///
/// Tempo comes from autocorrelation of the full-signal onset envelope with a
/// percussive-only second opinion for rhythm-heavy tracks; beats come from a
/// dynamic-programming tracker over a blend of the two envelopes.
pub struct TempoBeatEstimator {
    config: AnalysisConfig,
}

/// A tempo hypothesis with its autocorrelation confidence
#[derive(Debug, Clone, Copy)]
struct TempoCandidate {
    bpm: f32,
    confidence: f32,
}

impl TempoBeatEstimator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Estimate tempo, beats and beat strengths
    ///
    /// A silent or too-short signal degrades to the fallback tempo with an
    /// empty beat list; it never fails.
    pub fn estimate(&self, signal: &AudioSignal<'_>) -> Result<TempoEstimate> {
        let stft = Stft::new(self.config.window_size, self.config.hop_size);
        let magnitude = stft.magnitude_spectrogram(signal.samples())?;
        let fps = signal.sample_rate() as f32 / self.config.hop_size as f32;

        if magnitude.len() < 4 {
            tracing::debug!("Signal too short for tempo analysis, using fallback");
            return Ok(self.fallback());
        }

        let separation = hpss::decompose(&magnitude);
        let onset_full = onset::strength_envelope(&magnitude);
        let onset_percussive = onset::strength_envelope(&separation.percussive);

        if stats::max(&onset_full) < EPSILON {
            tracing::debug!("Flat onset envelope, using fallback tempo");
            return Ok(self.fallback());
        }

        // Tempo candidates from the full envelope, best percussive hypothesis
        let candidates =
            tempo_candidates(&onset_full, fps, self.config.min_bpm, self.config.max_bpm);
        let full_tempo = candidates.first().copied();
        let percussive_tempo = tempo_candidates(
            &onset_percussive,
            fps,
            self.config.min_bpm,
            self.config.max_bpm,
        )
        .first()
        .copied();

        let bpm = self.resolve_tempo(full_tempo, percussive_tempo, separation.percussive_ratio());

        // Beat tracking over the blended envelope
        let w = self.config.tempo.full_envelope_weight;
        let blended: Vec<f32> = onset_full
            .iter()
            .zip(onset_percussive.iter())
            .map(|(&f, &p)| w * f + (1.0 - w) * p)
            .collect();

        let mut beat_frames = track_beats(&blended, fps, bpm, self.config.tempo.tightness);

        let consistency = interval_consistency(&beat_frames, fps);
        if consistency < self.config.tempo.consistency_threshold {
            tracing::debug!(
                consistency,
                "Inconsistent inter-beat intervals, re-tracking with strict tightness"
            );
            beat_frames = track_beats(&blended, fps, bpm, self.config.tempo.strict_tightness);
        }

        let beats: Vec<f64> = beat_frames
            .iter()
            .map(|&f| stft.frame_to_time(f, signal.sample_rate()))
            .collect();
        let strengths = self.beat_strengths(&beat_frames, &onset_full, &onset_percussive);

        tracing::debug!(bpm, beats = beats.len(), "Tempo estimation complete");
        Ok(TempoEstimate {
            bpm,
            beats,
            strengths,
        })
    }

    /// Pick between the full-signal and percussive tempo hypotheses
    ///
    /// Rhythm-heavy tracks (high percussive ratio) with a diverging
    /// percussive estimate are better served by the percussive tempo.
    fn resolve_tempo(
        &self,
        full: Option<TempoCandidate>,
        percussive: Option<TempoCandidate>,
        percussive_ratio: f32,
    ) -> f32 {
        let fallback = self.config.fallback_bpm;
        match (full, percussive) {
            (Some(f), Some(p)) => {
                let diverges = (f.bpm - p.bpm).abs() > self.config.tempo.percussive_divergence_bpm;
                if percussive_ratio > self.config.tempo.percussive_ratio_threshold && diverges {
                    tracing::debug!(
                        full = f.bpm,
                        percussive = p.bpm,
                        percussive_ratio,
                        "Preferring percussive tempo"
                    );
                    p.bpm
                } else {
                    f.bpm
                }
            }
            (Some(f), None) => f.bpm,
            (None, Some(p)) => p.bpm,
            (None, None) => fallback,
        }
    }

    /// Combine full and percussive onset strength at each beat frame,
    /// normalize across beats, floor at the configured minimum
    fn beat_strengths(
        &self,
        beat_frames: &[usize],
        onset_full: &[f32],
        onset_percussive: &[f32],
    ) -> Vec<f32> {
        let w = self.config.tempo.strength_full_weight;
        let raw: Vec<f32> = beat_frames
            .iter()
            .map(|&f| {
                let full = onset_full.get(f).copied().unwrap_or(0.0);
                let perc = onset_percussive.get(f).copied().unwrap_or(0.0);
                w * full + (1.0 - w) * perc
            })
            .collect();

        let peak = stats::max(&raw);
        let floor = self.config.tempo.strength_floor;
        raw.iter()
            .map(|&s| (s / (peak + EPSILON)).max(floor))
            .collect()
    }

    fn fallback(&self) -> TempoEstimate {
        TempoEstimate {
            bpm: self.config.fallback_bpm,
            beats: Vec::new(),
            strengths: Vec::new(),
        }
    }
}

/// Center of the log-normal tempo prior, BPM
const TEMPO_PRIOR_BPM: f32 = 120.0;

/// Width of the tempo prior, in octaves
const TEMPO_PRIOR_OCTAVES: f32 = 0.7;

/// Tempo hypotheses from autocorrelation of an onset envelope
///
/// Local maxima of the normalized autocorrelation within the BPM range,
/// weighted by a log-normal prior so octave-doubled lags do not outvote the
/// perceived tempo, sorted by confidence (highest first).
fn tempo_candidates(envelope: &[f32], fps: f32, min_bpm: f32, max_bpm: f32) -> Vec<TempoCandidate> {
    let lag_min = ((60.0 / max_bpm) * fps).floor().max(1.0) as usize;
    let lag_max = ((60.0 / min_bpm) * fps).ceil() as usize;
    if envelope.len() <= lag_min + 1 {
        return Vec::new();
    }
    let lag_max = lag_max.min(envelope.len() - 1);

    // Normalized autocorrelation over the lag range
    let zero_lag: f32 = envelope.iter().map(|&v| v * v).sum::<f32>() + EPSILON;
    let autocorr: Vec<f32> = (0..=lag_max)
        .map(|lag| {
            envelope
                .iter()
                .zip(envelope.iter().skip(lag))
                .map(|(&a, &b)| a * b)
                .sum::<f32>()
                / zero_lag
        })
        .collect();

    let mut candidates = Vec::new();
    for lag in lag_min.max(1)..lag_max {
        if autocorr[lag] > autocorr[lag - 1] && autocorr[lag] >= autocorr[lag + 1] {
            let bpm = 60.0 * fps / lag as f32;
            let octaves = (bpm / TEMPO_PRIOR_BPM).log2() / TEMPO_PRIOR_OCTAVES;
            let prior = (-0.5 * octaves * octaves).exp();
            candidates.push(TempoCandidate {
                bpm,
                confidence: autocorr[lag] * prior,
            });
        }
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}

/// Single best tempo hypothesis for a (partial) envelope
///
/// Shared with the energy classifier and the per-segment tempo estimates.
pub(crate) fn tempo_from_envelope(
    envelope: &[f32],
    fps: f32,
    min_bpm: f32,
    max_bpm: f32,
) -> Option<f32> {
    tempo_candidates(envelope, fps, min_bpm, max_bpm)
        .first()
        .map(|c| c.bpm)
}

/// Dynamic-programming beat tracker
///
/// Each frame accumulates the best predecessor score one beat period back,
/// with deviations from the target period punished by `tightness` on a log
/// scale; the beat sequence is read off by backtracking from the best-scoring
/// final frame.
fn track_beats(envelope: &[f32], fps: f32, bpm: f32, tightness: f32) -> Vec<usize> {
    let n = envelope.len();
    let period = fps * 60.0 / bpm.max(1.0);
    if n < 2 || period < 1.0 {
        return Vec::new();
    }

    let window_lo = (period * 0.5).round() as usize;
    let window_hi = (period * 2.0).round() as usize;

    let mut cumscore = vec![0.0f32; n];
    let mut backlink: Vec<isize> = vec![-1; n];

    for i in 0..n {
        let mut best_score = 0.0f32;
        let mut best_prev: isize = -1;

        if i >= window_lo {
            let lo = i.saturating_sub(window_hi);
            let hi = i - window_lo;
            for prev in lo..=hi {
                let interval = (i - prev) as f32;
                let deviation = (interval / period).ln();
                let score = cumscore[prev] - tightness * deviation * deviation;
                if score > best_score {
                    best_score = score;
                    best_prev = prev as isize;
                }
            }
        }

        cumscore[i] = envelope[i] + best_score;
        backlink[i] = best_prev;
    }

    // Start backtracking from the best score in the final beat period
    let tail_start = n.saturating_sub(period.round() as usize + 1);
    let mut current = (tail_start..n)
        .max_by(|&a, &b| {
            cumscore[a]
                .partial_cmp(&cumscore[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(n - 1) as isize;

    let mut beats = Vec::new();
    while current >= 0 {
        beats.push(current as usize);
        current = backlink[current as usize];
    }
    beats.reverse();

    // A single backtracked frame is a degenerate track, not a beat grid
    if beats.len() < 2 {
        return Vec::new();
    }
    beats
}

/// Inter-beat interval consistency in (0, 1]
///
/// `1 / (1 + cv)` where cv is the coefficient of variation of the intervals;
/// a perfectly even grid scores 1.0.
fn interval_consistency(beat_frames: &[usize], _fps: f32) -> f32 {
    if beat_frames.len() < 3 {
        return 1.0;
    }
    let intervals: Vec<f32> = beat_frames
        .windows(2)
        .map(|w| (w[1] - w[0]) as f32)
        .collect();
    let mean = stats::mean(&intervals);
    if mean < EPSILON {
        return 1.0;
    }
    let cv = stats::stddev(&intervals) / mean;
    1.0 / (1.0 + cv)
}
