//! Detector temperature from the bias level of multi-read infrared exposures
//!
//! The bias accumulated in the zeroth read of a MULTIACCUM exposure tracks the
//! focal-plane temperature. This crate removes the signal the zeroth read
//! collected, averages the cleaned frame per quadrant, and maps the quadrant
//! levels to a temperature with several empirical algorithms, returning the
//! one with the smallest uncertainty or the one the caller forces.
//!
//! File access is left to the caller: the pipeline works on frames and
//! header values that have already been read.

pub mod calibration;
pub mod cascade;
pub mod config;
pub mod error;
pub mod estimators;
pub mod exposure;
pub mod header;
pub mod nonlinearity;
pub mod pipeline;
pub mod quadrants;

pub use calibration::{CameraCalibration, CameraId};
pub use cascade::{select, CascadeEstimates, TemperatureResult};
pub use config::PipelineConfig;
pub use error::{Result, TempFromBiasError};
pub use estimators::{parse_forced_algorithm, AlgorithmEstimate, AlgorithmId};
pub use exposure::{ExposureReads, Read};
pub use header::{ExposureHeader, HeaderCard};
pub use nonlinearity::{CoefficientBounds, NonlinearityModel};
pub use pipeline::{CleaningMethod, TemperatureFromBias, TemperatureReport, TemperatureRequest};
pub use quadrants::{quadrant_means, Quadrant, QuadrantMeans};
