//! Error types for temperature-from-bias processing

use shared::algo::stats::StatsError;
use thiserror::Error;

use crate::calibration::CameraId;

/// Errors that abort temperature estimation for one exposure.
///
/// Every variant names the offending field and value so the caller can decide
/// whether to retry with an override.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TempFromBiasError {
    #[error("Insufficient reads: NSAMP={count}, at least 2 reads are needed to estimate the temperature")]
    InsufficientReads { count: usize },

    #[error("Unknown camera {0}: expected 1, 2 or 3")]
    UnknownCamera(i64),

    #[error("Unsupported filter '{filter}' for a 2-read exposure: only '{required}' is supported, cannot determine the temperature from the bias")]
    UnsupportedFilter { filter: String, required: String },

    #[error("Invalid value '{0}' specified for the forced algorithm: expected 0, 1, 2 or 3")]
    InvalidForcedAlgorithm(String),

    #[error("All {count} {coefficient} coefficients lie outside [{lower:e}, {upper:e}], no in-bounds median available")]
    CoefficientsOutOfBounds {
        coefficient: &'static str,
        count: usize,
        lower: f64,
        upper: f64,
    },

    #[error("Border of {border} px leaves an empty quadrant in a {rows}x{cols} frame")]
    BorderTooLarge {
        border: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Read count mismatch: header reports NSAMP={nsamp} but {supplied} reads were supplied")]
    ReadCountMismatch { nsamp: usize, supplied: usize },

    #[error("Invalid calibration for {camera}: {reason}")]
    InvalidCalibration { camera: CameraId, reason: String },

    #[error("Invalid read timing: {0}")]
    InvalidReadTiming(String),

    #[error("Image must be in MULTIACCUM mode, OBSMODE is '{obsmode}'")]
    NotMultiAccum { obsmode: String },

    #[error("ZOFFCORR has already been performed on this image (ZOFFDONE='{marker}'), no temperature information left")]
    CorrectionAlreadyApplied { marker: String },

    #[error("Statistics error: {0}")]
    Statistics(#[from] StatsError),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TempFromBiasError>;
