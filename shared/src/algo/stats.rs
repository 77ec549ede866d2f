//! Robust summary statistics for detector frames and calibration arrays

use thiserror::Error;

/// Errors raised when a statistic has no data to work with
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Insufficient data points to compute {statistic}: {total} total values, 0 valid (all NaN)")]
    NoValidValues {
        statistic: &'static str,
        total: usize,
    },
}

/// Calculate the median of a sequence of f64 values
///
/// NaN values are ignored, infinite values are kept. For an even number of
/// valid values the two middle values are averaged, matching the usual
/// numerical convention for array medians.
///
/// # Returns
///
/// * `Ok(median)` - The median value
/// * `Err(StatsError::NoValidValues)` - If nothing remains after dropping NaN
pub fn median<I>(values: I) -> Result<f64, StatsError>
where
    I: IntoIterator<Item = f64>,
{
    let mut total = 0usize;
    let mut valid: Vec<f64> = values
        .into_iter()
        .inspect(|_| total += 1)
        .filter(|v| !v.is_nan())
        .collect();

    if valid.is_empty() {
        return Err(StatsError::NoValidValues {
            statistic: "median",
            total,
        });
    }

    valid.sort_by(f64::total_cmp);

    let mid = valid.len() / 2;
    let median_value = if valid.len() % 2 == 0 {
        (valid[mid - 1] + valid[mid]) / 2.0
    } else {
        valid[mid]
    };

    Ok(median_value)
}

/// Arithmetic mean of a sequence of f64 values, ignoring NaN
pub fn mean<I>(values: I) -> Result<f64, StatsError>
where
    I: IntoIterator<Item = f64>,
{
    let mut total = 0usize;
    let mut count = 0usize;
    let mut sum = 0.0;
    for v in values {
        total += 1;
        if !v.is_nan() {
            count += 1;
            sum += v;
        }
    }

    if count == 0 {
        return Err(StatsError::NoValidValues {
            statistic: "mean",
            total,
        });
    }

    Ok(sum / count as f64)
}
