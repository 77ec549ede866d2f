//! Detector nonlinearity model, coefficient sanitizing and signal inversion
//!
//! The detector response is modelled per pixel as
//! `observed = true / (1 + c2 * true + c3 * true²)`. Estimating the signal that
//! accumulated in the zeroth read requires inverting this relation for a rate
//! that is itself only known through nonlinear reads, so the corrector runs a
//! fixed number of fixed-point passes rather than a closed-form solve.

use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TempFromBiasError};

/// Default number of refinement passes for the zeroth-read signal estimate
pub const DEFAULT_ITERATIONS: usize = 9;

/// Closed interval of plausible values for one coefficient array
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientBounds {
    pub lower: f64,
    pub upper: f64,
}

impl CoefficientBounds {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// NaN is never in bounds
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Replace every coefficient outside `bounds` with the median of the in-bounds ones.
///
/// An array with no out-of-bounds values is returned unchanged.
///
/// # Errors
/// `CoefficientsOutOfBounds` if no value lies inside `bounds`.
pub fn sanitize(
    coefficients: ArrayView2<f64>,
    bounds: CoefficientBounds,
    name: &'static str,
) -> Result<Array2<f64>> {
    let outliers = coefficients.iter().filter(|&&v| !bounds.contains(v)).count();
    if outliers == 0 {
        return Ok(coefficients.to_owned());
    }
    if outliers == coefficients.len() {
        return Err(TempFromBiasError::CoefficientsOutOfBounds {
            coefficient: name,
            count: outliers,
            lower: bounds.lower,
            upper: bounds.upper,
        });
    }

    let replacement = shared::algo::stats::median(
        coefficients.iter().copied().filter(|&v| bounds.contains(v)),
    )?;
    log::debug!(
        "Clipping {outliers} of {} {name} coefficients outside [{:e}, {:e}] to median {replacement:e}",
        coefficients.len(),
        bounds.lower,
        bounds.upper
    );

    Ok(coefficients.mapv(|v| if bounds.contains(v) { v } else { replacement }))
}

/// Per-pixel quadratic nonlinearity coefficients
#[derive(Debug, Clone, PartialEq)]
pub struct NonlinearityModel {
    c2: Array2<f64>,
    c3: Array2<f64>,
}

impl NonlinearityModel {
    /// # Errors
    /// `ShapeMismatch` if `c2` and `c3` differ in shape.
    pub fn new(c2: Array2<f64>, c3: Array2<f64>) -> Result<Self> {
        if c2.dim() != c3.dim() {
            return Err(TempFromBiasError::ShapeMismatch {
                what: "c3 coefficients",
                expected: c2.dim(),
                actual: c3.dim(),
            });
        }
        Ok(Self { c2, c3 })
    }

    /// Model with no nonlinearity at all
    pub fn linear(shape: (usize, usize)) -> Self {
        Self {
            c2: Array2::zeros(shape),
            c3: Array2::zeros(shape),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.c2.dim()
    }

    pub fn c2(&self) -> ArrayView2<f64> {
        self.c2.view()
    }

    pub fn c3(&self) -> ArrayView2<f64> {
        self.c3.view()
    }

    /// Copy of the model with implausible coefficients clipped
    pub fn sanitized(&self, c2_bounds: CoefficientBounds, c3_bounds: CoefficientBounds) -> Result<Self> {
        Ok(Self {
            c2: sanitize(self.c2.view(), c2_bounds, "c2")?,
            c3: sanitize(self.c3.view(), c3_bounds, "c3")?,
        })
    }
}

/// Integration intervals (seconds) of the first three reads
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadTiming {
    /// Integration time of the zeroth read itself
    pub zeroth: f64,
    /// Time between the zeroth and first reads
    pub first: f64,
    /// Time between the first and second reads
    pub second: f64,
}

impl ReadTiming {
    /// # Errors
    /// `InvalidReadTiming` if the last interval is not positive, any interval is
    /// negative, or the first read lands at reset time.
    pub fn new(zeroth: f64, first: f64, second: f64) -> Result<Self> {
        if !(second > 0.0) {
            return Err(TempFromBiasError::InvalidReadTiming(format!(
                "interval between first and second reads must be positive, got {second} s"
            )));
        }
        if !(zeroth >= 0.0 && first >= 0.0) {
            return Err(TempFromBiasError::InvalidReadTiming(format!(
                "read intervals must be non-negative, got zeroth={zeroth} s, first={first} s"
            )));
        }
        if !(zeroth + first > 0.0) {
            return Err(TempFromBiasError::InvalidReadTiming(format!(
                "time from reset to the first read must be positive, got zeroth={zeroth} s, first={first} s"
            )));
        }
        Ok(Self {
            zeroth,
            first,
            second,
        })
    }

    /// Time from reset to the first read
    fn to_first(&self) -> f64 {
        self.zeroth + self.first
    }

    fn total(&self) -> f64 {
        self.zeroth + self.first + self.second
    }
}

/// Apply the nonlinear response to a true signal
#[inline]
fn apply_nonlinearity(signal: f64, c2: f64, c3: f64) -> f64 {
    signal / (1.0 + c2 * signal + c3 * signal * signal)
}

/// Recover the true signal from an observed one, to first order
#[inline]
fn linearize(signal: f64, c2: f64, c3: f64) -> f64 {
    signal * (1.0 + c2 * signal + c3 * signal * signal)
}

/// Fixed-point estimator of the signal contained in the zeroth read.
///
/// The iteration count is fixed; no convergence test is made, so the output is
/// the state after `iterations` passes rather than a guaranteed-converged value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonlinearityCorrector {
    iterations: usize,
}

impl Default for NonlinearityCorrector {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl NonlinearityCorrector {
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Signal accumulated in the zeroth read, for one pixel.
    ///
    /// `diff` is the count difference between the second and first reads.
    pub fn zeroth_read_signal_pixel(&self, diff: f64, c2: f64, c3: f64, timing: &ReadTiming) -> f64 {
        let to_first = timing.to_first();
        let total = timing.total();

        // Linear extrapolation of the counts back to reset
        let raw = diff + (diff / timing.second) * to_first;
        let mut rate = linearize(raw, c2, c3) / total;

        for _ in 0..self.iterations {
            let first_rate = apply_nonlinearity(rate * to_first, c2, c3) / to_first;
            let raw = diff + first_rate * to_first;
            rate = linearize(raw, c2, c3) / total;
        }

        apply_nonlinearity(rate * timing.zeroth, c2, c3)
    }

    /// Signal accumulated in the zeroth read, for every pixel.
    ///
    /// # Errors
    /// `ShapeMismatch` if `diff` does not match the model shape.
    pub fn zeroth_read_signal(
        &self,
        diff: ArrayView2<f64>,
        model: &NonlinearityModel,
        timing: &ReadTiming,
    ) -> Result<Array2<f64>> {
        if diff.dim() != model.dim() {
            return Err(TempFromBiasError::ShapeMismatch {
                what: "read difference",
                expected: model.dim(),
                actual: diff.dim(),
            });
        }

        Ok(Zip::from(&diff)
            .and(&model.c2)
            .and(&model.c3)
            .map_collect(|&d, &c2, &c3| self.zeroth_read_signal_pixel(d, c2, c3, timing)))
    }
}
