use crate::dsp::stats;

/// Onset-strength envelope from a magnitude spectrogram
///
/// Per-frame sum of positive first differences (spectral flux) with log
/// compression, normalized to a 1.0 peak. The first frame has no
/// predecessor and reads as zero.
pub fn strength_envelope(magnitude: &[Vec<f32>]) -> Vec<f32> {
    if magnitude.is_empty() {
        return Vec::new();
    }

    let mut envelope = Vec::with_capacity(magnitude.len());
    envelope.push(0.0);

    for pair in magnitude.windows(2) {
        let flux: f32 = pair[1]
            .iter()
            .zip(pair[0].iter())
            .map(|(&curr, &prev)| (curr - prev).max(0.0))
            .sum();
        envelope.push((1.0 + flux).ln());
    }

    stats::normalize_to_peak(&mut envelope);
    envelope
}

/// Count onsets in an envelope: local maxima above an adaptive threshold
///
/// The threshold is mean + sensitivity * (max - mean) over the whole curve,
/// with a small refractory gap so one percussive hit counts once.
pub fn count_onsets(envelope: &[f32], sensitivity: f32, min_gap_frames: usize) -> usize {
    if envelope.len() < 3 {
        return 0;
    }

    let mean = stats::mean(envelope);
    let max = stats::max(envelope);
    let threshold = mean + sensitivity * (max - mean);

    let mut count = 0;
    let mut last_onset: Option<usize> = None;

    for i in 1..envelope.len() - 1 {
        let v = envelope[i];
        if v >= threshold && v > envelope[i - 1] && v >= envelope[i + 1] {
            if let Some(last) = last_onset {
                if i - last < min_gap_frames {
                    continue;
                }
            }
            count += 1;
            last_onset = Some(i);
        }
    }

    count
}
