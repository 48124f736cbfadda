use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::Arc;

use crate::error::{AnalysisError, Result};

/// Hann-windowed short-time Fourier transform producing magnitude frames
///
/// Frames are row-major: `frames[t][bin]` with `window_size / 2 + 1` bins.
pub struct Stft {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    window_size: usize,
    hop_size: usize,
}

impl Stft {
    /// Plan an STFT for the given window and hop sizes
    pub fn new(window_size: usize, hop_size: usize) -> Self {
        let mut planner = RealFftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);

        // Hann window
        let window: Vec<f32> = (0..window_size)
            .map(|i| {
                0.5 * (1.0
                    - (2.0 * std::f32::consts::PI * i as f32 / (window_size - 1) as f32).cos())
            })
            .collect();

        Self {
            fft,
            window,
            window_size,
            hop_size,
        }
    }

    /// Number of frequency bins per frame
    pub fn bins(&self) -> usize {
        self.window_size / 2 + 1
    }

    /// Hop size in samples
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Convert a frame index to a timestamp in seconds
    pub fn frame_to_time(&self, frame: usize, sample_rate: u32) -> f64 {
        (frame * self.hop_size) as f64 / sample_rate as f64
    }

    /// Convert a timestamp in seconds to the nearest frame index
    pub fn time_to_frame(&self, time: f64, sample_rate: u32) -> usize {
        ((time * sample_rate as f64) / self.hop_size as f64).round() as usize
    }

    /// Frequency in Hz of a given bin
    pub fn bin_frequency(&self, bin: usize, sample_rate: u32) -> f32 {
        bin as f32 * sample_rate as f32 / self.window_size as f32
    }

    /// Compute the magnitude spectrogram of a sample buffer
    ///
    /// Buffers shorter than one window are zero-padded into a single frame,
    /// so every non-empty input yields at least one frame.
    pub fn magnitude_spectrogram(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let mut input_buffer = self.fft.make_input_vec();
        let mut spectrum_buffer = self.fft.make_output_vec();
        let mut frames = Vec::new();

        let mut start = 0;
        loop {
            let end = (start + self.window_size).min(samples.len());
            let chunk = &samples[start..end];

            for (i, value) in input_buffer.iter_mut().enumerate() {
                *value = if i < chunk.len() {
                    chunk[i] * self.window[i]
                } else {
                    0.0
                };
            }

            self.fft
                .process(&mut input_buffer, &mut spectrum_buffer)
                .map_err(|_| AnalysisError::internal("stft", "FFT processing failed"))?;

            frames.push(spectrum_buffer.iter().map(|c| c.norm()).collect());

            start += self.hop_size;
            if start + self.window_size > samples.len() {
                break;
            }
        }

        Ok(frames)
    }
}
