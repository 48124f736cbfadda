use crate::analysis::types::WaveformData;
use crate::signal::AudioSignal;

/// Downsamples raw samples for visualization
///
/// Block-averages absolute amplitudes down to at most the configured point
/// count. Never used for analysis.
pub struct WaveformSummarizer {
    max_points: usize,
}

impl WaveformSummarizer {
    pub fn new(max_points: usize) -> Self {
        Self { max_points }
    }

    /// Produce the downsampled waveform
    pub fn summarize(&self, signal: &AudioSignal<'_>) -> WaveformData {
        let samples = signal.samples();
        let data = if samples.len() <= self.max_points {
            samples.iter().map(|x| x.abs()).collect()
        } else {
            let block = samples.len().div_ceil(self.max_points);
            samples
                .chunks(block)
                .map(|chunk| chunk.iter().map(|x| x.abs()).sum::<f32>() / chunk.len() as f32)
                .collect()
        };

        WaveformData {
            data,
            sample_rate: signal.sample_rate(),
            duration: signal.duration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_input_capped() {
        let samples = vec![0.5f32; 44100 * 30];
        let signal = AudioSignal::new(&samples, 44100).unwrap();
        let waveform = WaveformSummarizer::new(1000).summarize(&signal);

        assert!(waveform.data.len() <= 1000);
        assert_eq!(waveform.sample_rate, 44100);
        assert!((waveform.duration - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_input_passthrough() {
        let samples = vec![-0.25f32; 500];
        let signal = AudioSignal::new(&samples, 44100).unwrap();
        let waveform = WaveformSummarizer::new(1000).summarize(&signal);

        assert_eq!(waveform.data.len(), 500);
        assert!(waveform.data.iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_block_average_value() {
        // 2000 samples averaged into <= 10 points
        let samples: Vec<f32> = (0..2000).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }).collect();
        let signal = AudioSignal::new(&samples, 1000).unwrap();
        let waveform = WaveformSummarizer::new(10).summarize(&signal);

        assert!(waveform.data.len() <= 10);
        assert!(waveform.data.iter().all(|&v| (v - 0.5).abs() < 1e-3));
    }

    #[test]
    fn test_empty_input() {
        let samples: Vec<f32> = Vec::new();
        let signal = AudioSignal::new(&samples, 44100).unwrap();
        let waveform = WaveformSummarizer::new(1000).summarize(&signal);
        assert!(waveform.data.is_empty());
        assert_eq!(waveform.duration, 0.0);
    }
}
