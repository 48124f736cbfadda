//! # Beatscape
//!
//! Extract tempo, beats, energy and structure from decoded audio to drive
//! beat-synchronized video effects.
//!
//! Beatscape is a pure computation boundary: it takes an already-decoded
//! sample buffer, runs four independent analyzers over it, and returns one
//! immutable analysis result. It performs no file I/O and no network access;
//! decoding, caching and the downstream effect timing all live with the
//! caller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beatscape::{analyze, AnalysisConfig, AudioSignal};
//!
//! # fn main() -> beatscape::Result<()> {
//! // Decoded mono samples, normalized to [-1.0, 1.0]
//! let samples: Vec<f32> = vec![0.0; 44100 * 30];
//!
//! let outcome = analyze("track-1", &samples, 44100, AnalysisConfig::default())?;
//!
//! let result = outcome.result();
//! println!("BPM: {:.1}", result.bpm);
//! println!("Energy: {:?}", result.energy_level);
//! println!("{} beats, {} segments", result.beat_markers.len(), result.segments.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`analysis`] - The analyzers and the assembling [`AudioAnalyzer`]
//! - [`dsp`] - Shared signal-processing primitives (STFT, mel/MFCC, HPSS,
//!   onset envelopes, peak picking, recurrence clustering)
//! - [`config`] - Tunable analysis parameters with TOML load/save
//! - [`signal`] - The borrowed [`AudioSignal`] input view
//!
//! ## Degraded results
//!
//! Silence, very short input, or an unexpected analyzer failure never halt
//! the pipeline: the assembler substitutes documented defaults and tags the
//! outcome [`AnalysisOutcome::Degraded`], with per-analyzer flags in the
//! result's `features` map.

pub mod analysis;
pub mod config;
pub mod dsp;
pub mod error;
pub mod signal;

// Re-export commonly used types for convenience
pub use crate::{
    analysis::{
        AnalysisOutcome, AnalysisResult, AudioAnalyzer, EnergyLevel, Segment, TempoEstimate,
        WaveformData,
    },
    config::AnalysisConfig,
    error::{AnalysisError, Result},
    signal::AudioSignal,
};

/// Analyze a decoded sample buffer in one call
///
/// Convenience wrapper that builds the signal view and an [`AudioAnalyzer`]
/// for the given configuration.
pub fn analyze(
    track_id: &str,
    samples: &[f32],
    sample_rate: u32,
    config: AnalysisConfig,
) -> Result<AnalysisOutcome> {
    let signal = AudioSignal::new(samples, sample_rate)?;
    AudioAnalyzer::with_config(config).analyze(track_id, &signal)
}
