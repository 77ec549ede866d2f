//! Multi-read exposure data handed to the pipeline

use ndarray::Array2;

use crate::error::{Result, TempFromBiasError};

/// One non-destructive read of the detector
#[derive(Debug, Clone, PartialEq)]
pub struct Read {
    pub frame: Array2<f64>,
    /// Accumulated time since the start of the exposure, in seconds
    pub time: f64,
}

impl Read {
    pub fn new(frame: Array2<f64>, time: f64) -> Self {
        Self { frame, time }
    }
}

/// All reads of an exposure in chronological order, zeroth read first.
///
/// Exposure files store reads newest first, so the reads the pipeline works
/// with (the zeroth, first and second) are the last entries of the file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureReads {
    reads: Vec<Read>,
}

impl ExposureReads {
    /// # Errors
    /// `ShapeMismatch` if the frames differ in shape.
    pub fn new(reads: Vec<Read>) -> Result<Self> {
        if let Some(first) = reads.first() {
            let expected = first.frame.dim();
            if let Some(bad) = reads.iter().find(|r| r.frame.dim() != expected) {
                return Err(TempFromBiasError::ShapeMismatch {
                    what: "read frame",
                    expected,
                    actual: bad.frame.dim(),
                });
            }
        }
        Ok(Self { reads })
    }

    /// Build from reads in file order (newest first)
    pub fn from_newest_first(mut reads: Vec<Read>) -> Result<Self> {
        reads.reverse();
        Self::new(reads)
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// Shape of the frames, `None` for an empty exposure
    pub fn dim(&self) -> Option<(usize, usize)> {
        self.reads.first().map(|r| r.frame.dim())
    }

    /// Read `index` counted from the zeroth read
    pub fn get(&self, index: usize) -> Option<&Read> {
        self.reads.get(index)
    }
}
