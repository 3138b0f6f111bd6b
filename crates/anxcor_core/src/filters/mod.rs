//! Filter and taper library.
//!
//! Everything here operates along the last axis of a labeled array and
//! returns a new array; inputs are never modified.

pub mod butterworth;
pub mod domain;
pub mod reflect;
pub mod spectral;
pub mod taper;

use crate::models::ArrayError;

pub use butterworth::{
    bandpass, bandpass_in_frequency_domain, butter_sos, lowpass, sos_response, sosfiltfilt, BandpassParams,
    FilterBand, LowpassParams, Padding, SpectralBandpassParams,
};
pub use domain::{freq_to_time, freq_to_time_xcorr, time_to_freq};
pub use reflect::{center_extract, center_slice, reflect_pad, triple_by_reflection};
pub use taper::{taper, taper_toward, taper_weights, TaperObjective, TaperParams, WindowType};

/// Errors from filter design and application.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Filter order must be at least 1, got {0}")]
    InvalidOrder(usize),

    #[error("Invalid sample rate {0}")]
    InvalidSampleRate(f64),

    #[error("Invalid corner frequency {corner} Hz: {reason}")]
    InvalidCorner { corner: f64, reason: String },

    #[error("Filter design failed: {0}")]
    Design(String),

    #[error("Taper fraction must be within [0, 1], got {0}")]
    InvalidTaper(f64),

    #[error("Pad fraction must be within [0, 1], got {0}")]
    InvalidPadFraction(f64),

    #[error("Shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error(transparent)]
    Array(#[from] ArrayError),
}

/// Result type for filter operations.
pub type FilterResult<T> = Result<T, FilterError>;
