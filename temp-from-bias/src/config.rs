//! Pipeline configuration
//!
//! Every constant of the cleaning and quadrant stages lives here with its
//! calibrated default, so a partial serialized config only needs to name what
//! it overrides.

use serde::{Deserialize, Serialize};

use crate::nonlinearity::{CoefficientBounds, DEFAULT_ITERATIONS};

/// Tunable parameters of the temperature pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pixels excluded around the perimeter of each quadrant
    pub border: usize,
    /// Refinement passes of the nonlinearity solve
    pub iterations: usize,
    /// Integration time of the zeroth read in seconds (headers report 0)
    pub zeroth_read_time: f64,
    /// Time between the two reads of a 2-read exposure in seconds
    pub two_read_interval: f64,
    /// Median zeroth-read signal (DN) above which a 2-read exposure is shading corrected
    pub signal_threshold: f64,
    /// Filter name for which 2-read exposures are supported
    pub blank_filter: String,
    /// Plausible range of the quadratic nonlinearity coefficient
    pub c2_bounds: CoefficientBounds,
    /// Plausible range of the cubic nonlinearity coefficient
    pub c3_bounds: CoefficientBounds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            border: 5,
            iterations: DEFAULT_ITERATIONS,
            zeroth_read_time: 0.203,
            two_read_interval: 0.302328,
            signal_threshold: 10.0,
            blank_filter: "BLANK".to_string(),
            c2_bounds: CoefficientBounds::new(-3.6678544e-07, 3.6218723e-06),
            c3_bounds: CoefficientBounds::new(-4.1401650e-11, 9.0923490e-11),
        }
    }
}
