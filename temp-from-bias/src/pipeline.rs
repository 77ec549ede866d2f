//! Temperature-from-bias pipeline
//!
//! Cleans the zeroth read of the signal it accumulated, reduces it to quadrant
//! means, runs every estimator and selects the result. The cleaning path is
//! chosen by the number of reads:
//!
//! - one read or none: no estimate is possible
//! - two reads: a single differential rate estimates the zeroth-read signal,
//!   only for blank-filter exposures
//! - three or more reads: the first three reads drive the iterative
//!   nonlinearity solve

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::calibration::{CameraCalibration, CameraId};
use crate::cascade::{select, CascadeEstimates, TemperatureResult};
use crate::config::PipelineConfig;
use crate::error::{Result, TempFromBiasError};
use crate::estimators::{
    AlgorithmEstimate, AlgorithmId, BlindCorrectionEstimator, EstimateDetail,
    QuietestQuadEstimator, StateFinding, TemperatureEstimator,
};
use crate::exposure::ExposureReads;
use crate::header::ExposureHeader;
use crate::nonlinearity::{NonlinearityCorrector, NonlinearityModel, ReadTiming};
use crate::quadrants::{quadrant_means, QuadrantMeans};

/// Everything needed to estimate the temperature of one exposure
#[derive(Debug, Clone)]
pub struct TemperatureRequest {
    pub reads: ExposureReads,
    pub nonlinearity: NonlinearityModel,
    pub camera: CameraId,
    pub filter: String,
    /// Use the zeroth read without removing its accumulated signal
    pub no_clean: bool,
    /// Return this algorithm's estimate regardless of sigma
    pub forced: Option<AlgorithmId>,
    /// Overrides the configured 2-read signal threshold
    pub signal_threshold: Option<f64>,
}

impl TemperatureRequest {
    pub fn new(reads: ExposureReads, nonlinearity: NonlinearityModel, camera: CameraId) -> Self {
        Self {
            reads,
            nonlinearity,
            camera,
            filter: String::new(),
            no_clean: false,
            forced: None,
            signal_threshold: None,
        }
    }

    /// Build a request from validated header values.
    ///
    /// # Errors
    /// Header precondition failures, an unknown camera, NSAMP below 2, or an
    /// NSAMP that disagrees with the number of reads supplied.
    pub fn from_header(
        header: &ExposureHeader,
        reads: ExposureReads,
        nonlinearity: NonlinearityModel,
    ) -> Result<Self> {
        header.validate()?;
        if header.nsamp <= 1 {
            return Err(TempFromBiasError::InsufficientReads {
                count: header.nsamp,
            });
        }
        if header.nsamp != reads.len() {
            return Err(TempFromBiasError::ReadCountMismatch {
                nsamp: header.nsamp,
                supplied: reads.len(),
            });
        }
        let camera = header.camera_id()?;
        Ok(Self::new(reads, nonlinearity, camera).with_filter(header.filter()))
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_no_clean(mut self, no_clean: bool) -> Self {
        self.no_clean = no_clean;
        self
    }

    pub fn with_forced(mut self, forced: Option<AlgorithmId>) -> Self {
        self.forced = forced;
        self
    }

    pub fn with_signal_threshold(mut self, threshold: f64) -> Self {
        self.signal_threshold = Some(threshold);
        self
    }
}

/// How the zeroth read was cleaned before quadrant averaging
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CleaningMethod {
    /// Signal removed using the iterative nonlinearity solve over three reads
    NonlinearityCorrected,
    /// Signal removed using the 2-read differential rate
    ShadingSubtracted { median_signal: f64 },
    /// 2-read signal below threshold, zeroth read used as is
    BelowThreshold { median_signal: f64 },
    /// Cleaning disabled by the caller
    Disabled,
}

/// The cleaned zeroth read
#[derive(Debug, Clone, PartialEq)]
pub struct CleanFrame {
    pub data: Array2<f64>,
    pub method: CleaningMethod,
}

/// Full account of one temperature estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReport {
    pub camera: CameraId,
    pub cleaning: CleaningMethod,
    pub quadrants: QuadrantMeans,
    pub estimates: CascadeEstimates,
    pub result: TemperatureResult,
}

/// Temperature-from-bias calculator
#[derive(Debug, Clone, Default)]
pub struct TemperatureFromBias {
    config: PipelineConfig,
}

impl TemperatureFromBias {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Temperature, sigma and selected algorithm for the exposure
    pub fn compute(&self, request: &TemperatureRequest) -> Result<TemperatureResult> {
        self.compute_report(request).map(|report| report.result)
    }

    /// Like [`compute`](Self::compute), keeping every intermediate result
    pub fn compute_report(&self, request: &TemperatureRequest) -> Result<TemperatureReport> {
        let calibration = CameraCalibration::for_camera(request.camera);
        let clean = self.clean_frame(request)?;
        let quadrants = quadrant_means(clean.data.view(), self.config.border)?;
        let estimates = estimate_all(&quadrants, calibration)?;

        log_estimates(request.camera, &quadrants, &estimates);

        let result = select(&estimates, request.forced);
        log::debug!(
            "{}: selected algorithm {} -> {:.4} K +/- {}",
            request.camera,
            result.algorithm,
            result.temperature,
            result.sigma
        );

        Ok(TemperatureReport {
            camera: request.camera,
            cleaning: clean.method,
            quadrants,
            estimates,
            result,
        })
    }

    /// Zeroth read with the signal accumulated during it removed.
    ///
    /// # Errors
    /// Fewer than two reads, a shape mismatch between reads and coefficients,
    /// coefficient arrays with nothing in bounds, invalid read times, or a
    /// 2-read exposure taken through a filter other than the blank one.
    pub fn clean_frame(&self, request: &TemperatureRequest) -> Result<CleanFrame> {
        let reads = &request.reads;
        if reads.len() <= 1 {
            return Err(TempFromBiasError::InsufficientReads { count: reads.len() });
        }

        let shape = reads.dim().unwrap_or((0, 0));
        if request.nonlinearity.dim() != shape {
            return Err(TempFromBiasError::ShapeMismatch {
                what: "nonlinearity coefficients",
                expected: shape,
                actual: request.nonlinearity.dim(),
            });
        }

        // A coefficient file with nothing in bounds is rejected for every
        // exposure, including those whose cleaning path never reads it.
        let model = request
            .nonlinearity
            .sanitized(self.config.c2_bounds, self.config.c3_bounds)?;

        if reads.len() == 2 {
            self.clean_two_reads(request)
        } else {
            self.clean_three_reads(request, &model)
        }
    }

    fn clean_three_reads(
        &self,
        request: &TemperatureRequest,
        model: &NonlinearityModel,
    ) -> Result<CleanFrame> {
        let reads = &request.reads;
        let (Some(read0), Some(read1), Some(read2)) = (reads.get(0), reads.get(1), reads.get(2))
        else {
            return Err(TempFromBiasError::InsufficientReads { count: reads.len() });
        };

        if request.no_clean {
            return Ok(CleanFrame {
                data: read0.frame.clone(),
                method: CleaningMethod::Disabled,
            });
        }

        let timing = ReadTiming::new(
            self.config.zeroth_read_time,
            read1.time - read0.time,
            read2.time - read1.time,
        )?;
        let diff = &read2.frame - &read1.frame;
        let corrector = NonlinearityCorrector::new(self.config.iterations);
        let signal = corrector.zeroth_read_signal(diff.view(), model, &timing)?;

        Ok(CleanFrame {
            data: &read0.frame - &signal,
            method: CleaningMethod::NonlinearityCorrected,
        })
    }

    fn clean_two_reads(&self, request: &TemperatureRequest) -> Result<CleanFrame> {
        // The two-read model has only been validated for blank-filter exposures
        let filter = request.filter.trim();
        if filter != self.config.blank_filter {
            return Err(TempFromBiasError::UnsupportedFilter {
                filter: filter.to_string(),
                required: self.config.blank_filter.clone(),
            });
        }

        let reads = &request.reads;
        let (Some(read0), Some(read1)) = (reads.get(0), reads.get(1)) else {
            return Err(TempFromBiasError::InsufficientReads { count: reads.len() });
        };

        if request.no_clean {
            return Ok(CleanFrame {
                data: read0.frame.clone(),
                method: CleaningMethod::Disabled,
            });
        }

        // The subtraction leaves a shading imprint whose amplitude is temperature
        // dependent, so it is only worth applying to a strong enough signal.
        let zeroth_time = self.config.zeroth_read_time;
        let rate = (&read1.frame - &read0.frame) / self.config.two_read_interval;
        let zeroth_signal = rate * zeroth_time;
        let median_signal = shared::algo::stats::median(zeroth_signal.iter().copied())?;
        let threshold = request
            .signal_threshold
            .unwrap_or(self.config.signal_threshold);

        if median_signal > threshold {
            log::debug!(
                "2-read median signal {median_signal:.3} DN above threshold {threshold}, subtracting"
            );
            Ok(CleanFrame {
                data: &read0.frame - &zeroth_signal,
                method: CleaningMethod::ShadingSubtracted { median_signal },
            })
        } else {
            log::debug!(
                "2-read median signal {median_signal:.3} DN at or below threshold {threshold}, using zeroth read"
            );
            Ok(CleanFrame {
                data: read0.frame.clone(),
                method: CleaningMethod::BelowThreshold { median_signal },
            })
        }
    }
}

/// Run every estimator on the quadrant means
///
/// # Errors
/// The first estimator error, if any.
pub fn estimate_all(
    quadrants: &QuadrantMeans,
    calibration: &CameraCalibration,
) -> Result<CascadeEstimates> {
    Ok(CascadeEstimates {
        state_finding: StateFinding.estimate(quadrants, calibration)?,
        blind_correction: BlindCorrectionEstimator.estimate(quadrants, calibration)?,
        quietest_quad: QuietestQuadEstimator.estimate(quadrants, calibration)?,
    })
}

fn log_estimates(camera: CameraId, quadrants: &QuadrantMeans, estimates: &CascadeEstimates) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let [q1, q2, q3, q4] = *quadrants.as_array();
    log::debug!("{camera}: quadrant means Q1={q1:.3} Q2={q2:.3} Q3={q3:.3} Q4={q4:.3}");
    for id in AlgorithmId::ALL {
        let AlgorithmEstimate {
            temperature,
            sigma,
            detail,
            ..
        } = estimates.get(id);
        match detail {
            EstimateDetail::StateFinding {
                quadrant_temperatures,
                states,
            } => log::debug!("  state per quadrant {states:?}, temps {quadrant_temperatures:?}"),
            EstimateDetail::BlindCorrection {
                corrected_quadrant,
                corrected_value,
            } => log::debug!("  corrected {corrected_quadrant:?} = {corrected_value:.3}"),
            EstimateDetail::QuietestQuad {
                quadrant_temperatures,
            } => log::debug!("  per-quadrant temps {quadrant_temperatures:?}"),
        }
        log::debug!("  algorithm {id}: {temperature:.4} K +/- {sigma} (sigma)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::Read;
    use approx::assert_relative_eq;

    const SHAPE: (usize, usize) = (32, 32);

    fn exposure(levels: &[(f64, f64)]) -> ExposureReads {
        ExposureReads::new(
            levels
                .iter()
                .map(|&(level, time)| Read::new(Array2::from_elem(SHAPE, level), time))
                .collect(),
        )
        .unwrap()
    }

    fn three_read_request(camera: CameraId) -> TemperatureRequest {
        TemperatureRequest::new(
            exposure(&[(-3000.0, 0.0), (-2990.0, 0.3), (-2980.0, 0.6)]),
            NonlinearityModel::linear(SHAPE),
            camera,
        )
    }

    #[test]
    fn test_single_read_is_insufficient() {
        let request = TemperatureRequest::new(
            exposure(&[(-3000.0, 0.0)]),
            NonlinearityModel::linear(SHAPE),
            CameraId::Camera3,
        );
        let err = TemperatureFromBias::default().compute(&request).unwrap_err();
        assert_eq!(err, TempFromBiasError::InsufficientReads { count: 1 });
    }

    #[test]
    fn test_three_read_clean_subtracts_extrapolated_signal() {
        let pipeline = TemperatureFromBias::default();
        let clean = pipeline.clean_frame(&three_read_request(CameraId::Camera3)).unwrap();
        assert_eq!(clean.method, CleaningMethod::NonlinearityCorrected);

        // 10 DN over 0.3 s, extrapolated over the 0.203 s zeroth read
        let expected = -3000.0 - 10.0 / 0.3 * 0.203;
        for &v in clean.data.iter() {
            assert_relative_eq!(v, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_no_clean_uses_zeroth_read() {
        let pipeline = TemperatureFromBias::default();
        let request = three_read_request(CameraId::Camera1).with_no_clean(true);
        let clean = pipeline.clean_frame(&request).unwrap();
        assert_eq!(clean.method, CleaningMethod::Disabled);
        assert_eq!(clean.data, request.reads.get(0).unwrap().frame);
    }

    #[test]
    fn test_coefficient_shape_must_match_reads() {
        let request = TemperatureRequest::new(
            exposure(&[(0.0, 0.0), (1.0, 0.3), (2.0, 0.6)]),
            NonlinearityModel::linear((16, 16)),
            CameraId::Camera2,
        );
        let err = TemperatureFromBias::default().compute(&request).unwrap_err();
        assert!(matches!(err, TempFromBiasError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_non_increasing_read_times_rejected() {
        let request = TemperatureRequest::new(
            exposure(&[(0.0, 0.0), (1.0, 0.3), (2.0, 0.3)]),
            NonlinearityModel::linear(SHAPE),
            CameraId::Camera3,
        );
        let err = TemperatureFromBias::default().compute(&request).unwrap_err();
        assert!(matches!(err, TempFromBiasError::InvalidReadTiming(_)));
    }

    #[test]
    fn test_two_read_strong_signal_is_subtracted() {
        let pipeline = TemperatureFromBias::default();
        // 100 DN over the read interval -> ~67 DN in the zeroth read, above threshold
        let request = TemperatureRequest::new(
            exposure(&[(-3000.0, 0.0), (-2900.0, 0.302328)]),
            NonlinearityModel::linear(SHAPE),
            CameraId::Camera3,
        )
        .with_filter("BLANK");
        let clean = pipeline.clean_frame(&request).unwrap();

        let signal = 100.0 / 0.302328 * 0.203;
        match clean.method {
            CleaningMethod::ShadingSubtracted { median_signal } => {
                assert_relative_eq!(median_signal, signal, epsilon = 1e-9)
            }
            other => panic!("unexpected cleaning {other:?}"),
        }
        assert_relative_eq!(clean.data[[0, 0]], -3000.0 - signal, epsilon = 1e-9);
    }

    #[test]
    fn test_two_read_threshold_override() {
        let pipeline = TemperatureFromBias::default();
        let request = TemperatureRequest::new(
            exposure(&[(-3000.0, 0.0), (-2900.0, 0.302328)]),
            NonlinearityModel::linear(SHAPE),
            CameraId::Camera3,
        )
        .with_filter("BLANK")
        .with_signal_threshold(1000.0);
        let clean = pipeline.clean_frame(&request).unwrap();
        assert!(matches!(clean.method, CleaningMethod::BelowThreshold { .. }));
        assert_eq!(clean.data, request.reads.get(0).unwrap().frame);
    }

    #[test]
    fn test_two_read_filter_is_checked_before_no_clean() {
        let request = TemperatureRequest::new(
            exposure(&[(-3000.0, 0.0), (-2900.0, 0.3)]),
            NonlinearityModel::linear(SHAPE),
            CameraId::Camera3,
        )
        .with_filter("F110W")
        .with_no_clean(true);
        let err = TemperatureFromBias::default().compute(&request).unwrap_err();
        assert_eq!(
            err,
            TempFromBiasError::UnsupportedFilter {
                filter: "F110W".to_string(),
                required: "BLANK".to_string()
            }
        );
    }

    #[test]
    fn test_all_bad_coefficients_are_fatal() {
        let model = NonlinearityModel::new(
            Array2::from_elem(SHAPE, 1.0),
            Array2::zeros(SHAPE),
        )
        .unwrap();
        let request = TemperatureRequest::new(
            exposure(&[(0.0, 0.0), (1.0, 0.3), (2.0, 0.6)]),
            model,
            CameraId::Camera3,
        );
        let err = TemperatureFromBias::default().compute(&request).unwrap_err();
        assert!(matches!(
            err,
            TempFromBiasError::CoefficientsOutOfBounds {
                coefficient: "c2",
                ..
            }
        ));
    }

    #[test]
    fn test_border_too_large_for_frame() {
        let pipeline = TemperatureFromBias::new(PipelineConfig {
            border: 8,
            ..PipelineConfig::default()
        });
        let err = pipeline.compute(&three_read_request(CameraId::Camera3)).unwrap_err();
        assert!(matches!(err, TempFromBiasError::BorderTooLarge { border: 8, .. }));
    }

    #[test]
    fn test_report_matches_result() {
        let pipeline = TemperatureFromBias::default();
        let request = three_read_request(CameraId::Camera1);
        let report = pipeline.compute_report(&request).unwrap();
        assert_eq!(report.camera, CameraId::Camera1);
        assert_eq!(report.result, pipeline.compute(&request).unwrap());
        assert_eq!(report.result.algorithm, AlgorithmId::QuietestQuad);
        assert_eq!(
            report.result.temperature,
            report.estimates.quietest_quad.temperature
        );
    }

    #[test]
    fn test_request_from_header() {
        let header = ExposureHeader {
            obsmode: "MULTIACCUM".to_string(),
            nsamp: 3,
            camera: 2,
            zoffdone: "OMIT".to_string(),
            filter: " BLANK ".to_string(),
            nlinfile: "nref$x_lin.fits".to_string(),
        };
        let request = TemperatureRequest::from_header(
            &header,
            exposure(&[(0.0, 0.0), (1.0, 0.3), (2.0, 0.6)]),
            NonlinearityModel::linear(SHAPE),
        )
        .unwrap();
        assert_eq!(request.camera, CameraId::Camera2);
        assert_eq!(request.filter, "BLANK");

        let single = ExposureHeader { nsamp: 1, ..header };
        let err = TemperatureRequest::from_header(
            &single,
            exposure(&[(0.0, 0.0)]),
            NonlinearityModel::linear(SHAPE),
        )
        .unwrap_err();
        assert_eq!(err, TempFromBiasError::InsufficientReads { count: 1 });
    }

    #[test]
    fn test_header_read_count_must_match_reads() {
        let header = ExposureHeader {
            obsmode: "MULTIACCUM".to_string(),
            nsamp: 3,
            camera: 3,
            zoffdone: "OMIT".to_string(),
            filter: "BLANK".to_string(),
            nlinfile: "nref$x_lin.fits".to_string(),
        };
        let err = TemperatureRequest::from_header(
            &header,
            exposure(&[(-3000.0, 0.0), (-2900.0, 0.3)]),
            NonlinearityModel::linear(SHAPE),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TempFromBiasError::ReadCountMismatch {
                nsamp: 3,
                supplied: 2
            }
        );
    }

    #[test]
    fn test_zero_time_to_first_read_rejected() {
        let pipeline = TemperatureFromBias::new(PipelineConfig {
            zeroth_read_time: 0.0,
            ..PipelineConfig::default()
        });
        let request = TemperatureRequest::new(
            exposure(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.3)]),
            NonlinearityModel::linear(SHAPE),
            CameraId::Camera3,
        );
        let err = pipeline.compute(&request).unwrap_err();
        assert!(matches!(err, TempFromBiasError::InvalidReadTiming(_)));
    }

    #[test]
    fn test_all_bad_coefficients_are_fatal_for_two_reads() {
        let model = NonlinearityModel::new(
            Array2::from_elem(SHAPE, 1.0),
            Array2::zeros(SHAPE),
        )
        .unwrap();
        let request = TemperatureRequest::new(
            exposure(&[(-3000.0, 0.0), (-2900.0, 0.3)]),
            model,
            CameraId::Camera3,
        )
        .with_filter("BLANK")
        .with_no_clean(true);
        let err = TemperatureFromBias::default().compute(&request).unwrap_err();
        assert!(matches!(err, TempFromBiasError::CoefficientsOutOfBounds { .. }));
    }
}
