//! Spectral decomposition into timescale bands.
//!
//! ```text
//!  BandSet ──frequency_cuts──▶ [FrequencyCut]
//!                                   │
//!  channel ──de-mean──▶ FFT ──mask per cut──▶ inverse FFT ──▶ band series
//! ```

pub mod bands;
pub mod engine;

pub use bands::{BandSet, BandingStrategy, DurationBand, FrequencyCut, UpperBound, RAW_DATA, SPECTRUM_TAG};
pub use engine::{decompose, DecompositionConfig};
