//! # Audio Analysis Module
//!
//! Extracts the structural musical features that drive beat-synchronized
//! video effects: global tempo and per-beat timestamps, an overall energy
//! bucket, structural segments, and key-moment transition points, plus a
//! downsampled waveform for visualization.
//!
//! The four analyzers are independent read-only passes over the same sample
//! buffer; [`AudioAnalyzer`] fans them out in parallel and merges their
//! outputs into one immutable [`AnalysisResult`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use beatscape::{AudioAnalyzer, AudioSignal};
//!
//! # fn main() -> beatscape::Result<()> {
//! let samples: Vec<f32> = vec![0.0; 44100]; // decoded mono audio
//! let signal = AudioSignal::new(&samples, 44100)?;
//!
//! let analyzer = AudioAnalyzer::new();
//! let outcome = analyzer.analyze("track-1", &signal)?;
//!
//! let result = outcome.result();
//! println!("BPM: {:.1}", result.bpm);
//! println!("Found {} beats", result.beat_markers.len());
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod energy;
pub mod moments;
pub mod segments;
pub mod tempo;
pub mod types;
pub mod waveform;

pub use assembler::AudioAnalyzer;
pub use energy::EnergyClassifier;
pub use moments::KeyMomentDetector;
pub use segments::SegmentDetector;
pub use tempo::TempoBeatEstimator;
pub use types::{
    AnalysisOutcome, AnalysisResult, EnergyLevel, Segment, TempoEstimate, WaveformData,
};
pub use waveform::WaveformSummarizer;
