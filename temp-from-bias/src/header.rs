//! Exposure header preconditions and the keyword records written back
//!
//! Reading and writing the files is left to the caller; this module only
//! checks the header values the caller extracted and formats the values the
//! caller persists.

use serde::{Deserialize, Serialize};

use crate::calibration::CameraId;
use crate::cascade::TemperatureResult;
use crate::error::{Result, TempFromBiasError};

const MULTIACCUM: &str = "MULTIACCUM";
const PERFORMED: &str = "PERFORMED";
const NREF_PREFIX: &str = "nref$";

/// Header keyword carrying the selected algorithm number
pub const ALGORITHM_KEY: &str = "NUMMETH";

/// Header values the pipeline depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureHeader {
    /// OBSMODE
    pub obsmode: String,
    /// NSAMP, the number of reads
    pub nsamp: usize,
    /// CAMERA
    pub camera: i64,
    /// ZOFFDONE, the zeroth-read subtraction marker
    pub zoffdone: String,
    /// FILTER
    pub filter: String,
    /// NLINFILE, e.g. `nref$abc1234_lin.fits`
    pub nlinfile: String,
}

impl ExposureHeader {
    /// Check that the exposure still carries bias temperature information.
    ///
    /// # Errors
    /// `NotMultiAccum` unless OBSMODE is MULTIACCUM, `CorrectionAlreadyApplied`
    /// if ZOFFDONE is PERFORMED.
    pub fn validate(&self) -> Result<()> {
        let obsmode = self.obsmode.trim();
        if obsmode != MULTIACCUM {
            return Err(TempFromBiasError::NotMultiAccum {
                obsmode: obsmode.to_string(),
            });
        }

        let zoffdone = self.zoffdone.trim();
        if zoffdone == PERFORMED {
            return Err(TempFromBiasError::CorrectionAlreadyApplied {
                marker: zoffdone.to_string(),
            });
        }
        Ok(())
    }

    pub fn camera_id(&self) -> Result<CameraId> {
        CameraId::try_from(self.camera)
    }

    pub fn filter(&self) -> &str {
        self.filter.trim()
    }

    /// File name of the nonlinearity reference, relative to the reference directory
    pub fn nonlinearity_reference_name(&self) -> &str {
        let name = self.nlinfile.trim();
        match name.split_once(NREF_PREFIX) {
            Some((_, file)) => file,
            None => name,
        }
    }
}

/// A keyword record to persist into an exposure header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderCard {
    pub key: String,
    pub value: HeaderValue,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeaderValue {
    Float(f64),
    Text(String),
}

impl TemperatureResult {
    /// Records storing this result under `key` plus the algorithm number
    pub fn header_cards(&self, key: &str) -> Vec<HeaderCard> {
        vec![
            HeaderCard {
                key: key.to_string(),
                value: HeaderValue::Float(self.temperature),
                comment: format!("Temp from bias, sigma={} (K)", self.sigma),
            },
            HeaderCard {
                key: ALGORITHM_KEY.to_string(),
                value: HeaderValue::Text(self.algorithm.number().to_string()),
                comment: "Algorithm method used".to_string(),
            },
        ]
    }
}
