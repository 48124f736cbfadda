//! Shared signal-processing primitives
//!
//! The analyzers in [`crate::analysis`] are composed from these pieces:
//! an STFT front end, mel/MFCC timbre features, harmonic/percussive
//! separation, onset-strength envelopes, peak picking, and recurrence
//! clustering. Everything here is pure computation over slices.

pub mod hpss;
pub mod mel;
pub mod onset;
pub mod peaks;
pub mod recurrence;
pub mod spectral;
pub mod stats;
pub mod stft;

pub use stft::Stft;
