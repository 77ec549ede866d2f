//! Quadrant mean aggregation for detector frames
//!
//! The frame is split along its horizontal and vertical midlines into four
//! quadrants numbered in the standard detector data layout, with row 0 at the
//! bottom of the array:
//!
//! ```text
//!     |------|------|
//!     |  Q4  |  Q3  |
//!     |------|------|
//!     |  Q1  |  Q2  |
//!     |------|------|
//! ```
//!
//! For odd dimensions the midline is `len / 2`, so the upper and right-hand
//! quadrants receive the extra row/column. A border of `border` pixels is
//! excluded from every edge of every quadrant before averaging.

use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};
use std::ops::Index;

use crate::error::{Result, TempFromBiasError};

/// Detector quadrant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    /// Bottom-left
    Q1,
    /// Bottom-right
    Q2,
    /// Top-right
    Q3,
    /// Top-left
    Q4,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [Quadrant::Q1, Quadrant::Q2, Quadrant::Q3, Quadrant::Q4];

    /// Zero-based position in quadrant-ordered tables
    pub fn index(self) -> usize {
        match self {
            Quadrant::Q1 => 0,
            Quadrant::Q2 => 1,
            Quadrant::Q3 => 2,
            Quadrant::Q4 => 3,
        }
    }
}

/// Mean bias level of each quadrant, in DN
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadrantMeans(pub [f64; 4]);

impl QuadrantMeans {
    pub fn as_array(&self) -> &[f64; 4] {
        &self.0
    }
}

impl Index<Quadrant> for QuadrantMeans {
    type Output = f64;

    fn index(&self, quadrant: Quadrant) -> &f64 {
        &self.0[quadrant.index()]
    }
}

/// Compute the mean of each quadrant of `frame`, excluding `border` pixels
/// around the perimeter of each quadrant.
///
/// # Errors
/// `BorderTooLarge` if the border leaves any quadrant without pixels.
pub fn quadrant_means(frame: ArrayView2<f64>, border: usize) -> Result<QuadrantMeans> {
    let (rows, cols) = frame.dim();
    let too_large = || TempFromBiasError::BorderTooLarge { border, rows, cols };

    let (lower_rows, upper_rows) = half_ranges(rows, border).ok_or_else(too_large)?;
    let (left_cols, right_cols) = half_ranges(cols, border).ok_or_else(too_large)?;

    let mean_of = |r: (usize, usize), c: (usize, usize)| {
        frame
            .slice(s![r.0..r.1, c.0..c.1])
            .mean()
            .ok_or_else(too_large)
    };

    Ok(QuadrantMeans([
        mean_of(lower_rows, left_cols)?,
        mean_of(lower_rows, right_cols)?,
        mean_of(upper_rows, right_cols)?,
        mean_of(upper_rows, left_cols)?,
    ]))
}

/// Half-open index ranges of the two halves of an axis after trimming the border,
/// or `None` if either half is empty.
fn half_ranges(len: usize, border: usize) -> Option<((usize, usize), (usize, usize))> {
    let mid = len / 2;
    let low = (border, mid.checked_sub(border)?);
    let high = (mid + border, len.checked_sub(border)?);
    if low.0 >= low.1 || high.0 >= high.1 {
        return None;
    }
    Some((low, high))
}
