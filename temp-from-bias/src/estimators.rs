//! Temperature estimators mapping quadrant bias levels to a temperature
//!
//! Three independent algorithms are available. Each returns a temperature (K)
//! with an empirical sigma that is used only to rank the algorithms against
//! each other; the sigma is a per-camera constant, not derived from the data.

use serde::{Deserialize, Serialize};
use shared::algo::stats::mean;
use std::fmt;
use std::str::FromStr;

use crate::calibration::{BlindCorrection, CameraCalibration};
use crate::error::{Result, TempFromBiasError};
use crate::quadrants::{Quadrant, QuadrantMeans};

/// Marker value reported by the state-finding algorithm while it is disabled
pub const STATE_FINDING_INVALID: f64 = -1.0;

/// Sigma reported by the state-finding algorithm while it is disabled
pub const STATE_FINDING_SIGMA: f64 = 1.0e6;

/// Temperature algorithm identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmId {
    StateFinding,
    BlindCorrection,
    QuietestQuad,
}

impl AlgorithmId {
    pub const ALL: [AlgorithmId; 3] = [
        AlgorithmId::StateFinding,
        AlgorithmId::BlindCorrection,
        AlgorithmId::QuietestQuad,
    ];

    /// Algorithm number as recorded in the NUMMETH header keyword
    pub fn number(self) -> u8 {
        match self {
            AlgorithmId::StateFinding => 1,
            AlgorithmId::BlindCorrection => 2,
            AlgorithmId::QuietestQuad => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AlgorithmId::StateFinding => "state-finding",
            AlgorithmId::BlindCorrection => "blind-correction",
            AlgorithmId::QuietestQuad => "quietest-quad",
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.name())
    }
}

impl TryFrom<u8> for AlgorithmId {
    type Error = TempFromBiasError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(AlgorithmId::StateFinding),
            2 => Ok(AlgorithmId::BlindCorrection),
            3 => Ok(AlgorithmId::QuietestQuad),
            other => Err(TempFromBiasError::InvalidForcedAlgorithm(other.to_string())),
        }
    }
}

impl FromStr for AlgorithmId {
    type Err = TempFromBiasError;

    /// Accepts the algorithm number or its name
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<u8>() {
            return AlgorithmId::try_from(number)
                .map_err(|_| TempFromBiasError::InvalidForcedAlgorithm(s.to_string()));
        }
        AlgorithmId::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| TempFromBiasError::InvalidForcedAlgorithm(s.to_string()))
    }
}

/// Parse a forced-algorithm request where `0` or an empty string means no override
pub fn parse_forced_algorithm(s: &str) -> Result<Option<AlgorithmId>> {
    match s.trim() {
        "" | "0" => Ok(None),
        other => other.parse().map(Some),
    }
}

/// Intermediate values behind an estimate, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EstimateDetail {
    StateFinding {
        quadrant_temperatures: [f64; 4],
        states: [i32; 4],
    },
    BlindCorrection {
        corrected_quadrant: Quadrant,
        corrected_value: f64,
    },
    QuietestQuad {
        quadrant_temperatures: Vec<(Quadrant, f64)>,
    },
}

/// One algorithm's temperature estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmEstimate {
    pub algorithm: AlgorithmId,
    /// Temperature in Kelvin
    pub temperature: f64,
    /// Empirical uncertainty in Kelvin, used to rank algorithms
    pub sigma: f64,
    pub detail: EstimateDetail,
}

/// A temperature algorithm driven by quadrant means and camera calibration
pub trait TemperatureEstimator {
    fn algorithm(&self) -> AlgorithmId;

    /// # Errors
    /// `InvalidCalibration` or `Statistics` when the calibration record cannot
    /// produce a temperature.
    fn estimate(&self, quads: &QuadrantMeans, calibration: &CameraCalibration) -> Result<AlgorithmEstimate>;
}

/// State-finding estimator.
///
/// Disabled: it always reports the invalid marker for every quadrant with a
/// huge sigma, so it is only ever selected when forced.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateFinding;

impl TemperatureEstimator for StateFinding {
    fn algorithm(&self) -> AlgorithmId {
        AlgorithmId::StateFinding
    }

    fn estimate(&self, _quads: &QuadrantMeans, _calibration: &CameraCalibration) -> Result<AlgorithmEstimate> {
        let quadrant_temperatures = [STATE_FINDING_INVALID; 4];
        let temperature = quadrant_temperatures.iter().sum::<f64>() / 4.0;
        Ok(AlgorithmEstimate {
            algorithm: AlgorithmId::StateFinding,
            temperature,
            sigma: STATE_FINDING_SIGMA,
            detail: EstimateDetail::StateFinding {
                quadrant_temperatures,
                states: [-1; 4],
            },
        })
    }
}

/// Blind-correction estimator
#[derive(Debug, Clone, Copy, Default)]
pub struct BlindCorrectionEstimator;

impl TemperatureEstimator for BlindCorrectionEstimator {
    fn algorithm(&self) -> AlgorithmId {
        AlgorithmId::BlindCorrection
    }

    fn estimate(&self, quads: &QuadrantMeans, calibration: &CameraCalibration) -> Result<AlgorithmEstimate> {
        let (corrected_quadrant, corrected_value, temperature, sigma) = match &calibration.blind {
            BlindCorrection::CrossQuadrant {
                target,
                reference,
                fit,
                gain,
                temperature_fit,
                offset,
                sigma,
            } => {
                let corrected = quads[*target] + (quads[*reference] - fit.eval(quads[*target])) * gain;
                (*target, corrected, temperature_fit.eval(corrected) + offset, *sigma)
            }
            BlindCorrection::Residual {
                target,
                reference,
                fit,
                dn_per_kelvin,
                offset,
                sigma,
            } => {
                let residual = fit.eval(quads[*reference]) - quads[*target];
                (*target, residual, residual / dn_per_kelvin + offset, *sigma)
            }
        };

        Ok(AlgorithmEstimate {
            algorithm: AlgorithmId::BlindCorrection,
            temperature,
            sigma,
            detail: EstimateDetail::BlindCorrection {
                corrected_quadrant,
                corrected_value,
            },
        })
    }
}

/// Quietest-quadrant estimator
#[derive(Debug, Clone, Copy, Default)]
pub struct QuietestQuadEstimator;

impl QuietestQuadEstimator {
    /// Temperature shift from the mean electronic state to state 0.
    ///
    /// Mean state offset of the member quadrants (DN) divided by their mean
    /// DN-per-Kelvin.
    fn state_zero_correction(calibration: &CameraCalibration) -> Result<f64> {
        let quietest = &calibration.quietest;
        if !quietest.correct_to_state_zero {
            return Ok(0.0);
        }

        let offsets = quietest
            .members
            .iter()
            .flat_map(|(q, _)| calibration.state_offsets(*q).iter().copied());
        let dn_per_kelvin = quietest.members.iter().map(|(_, fit)| 1.0 / fit.slope);

        Ok(mean(offsets)? / mean(dn_per_kelvin)?)
    }
}

impl TemperatureEstimator for QuietestQuadEstimator {
    fn algorithm(&self) -> AlgorithmId {
        AlgorithmId::QuietestQuad
    }

    fn estimate(&self, quads: &QuadrantMeans, calibration: &CameraCalibration) -> Result<AlgorithmEstimate> {
        if calibration.quietest.members.is_empty() {
            return Err(TempFromBiasError::InvalidCalibration {
                camera: calibration.camera,
                reason: "quietest-quad recipe has no member quadrants".to_string(),
            });
        }

        let correction = Self::state_zero_correction(calibration)?;
        let quadrant_temperatures: Vec<(Quadrant, f64)> = calibration
            .quietest
            .members
            .iter()
            .map(|(q, fit)| (*q, fit.eval(quads[*q]) + correction))
            .collect();

        let temperature = mean(quadrant_temperatures.iter().map(|(_, t)| *t))?;

        Ok(AlgorithmEstimate {
            algorithm: AlgorithmId::QuietestQuad,
            temperature,
            sigma: calibration.quietest.sigma,
            detail: EstimateDetail::QuietestQuad {
                quadrant_temperatures,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CameraId;
    use approx::assert_relative_eq;

    fn cal(camera: CameraId) -> &'static CameraCalibration {
        CameraCalibration::for_camera(camera)
    }

    fn quads() -> QuadrantMeans {
        QuadrantMeans([-3000.0, -2500.0, -2000.0, -1500.0])
    }

    #[test]
    fn test_algorithm_numbers_round_trip() {
        for id in AlgorithmId::ALL {
            assert_eq!(AlgorithmId::try_from(id.number()).unwrap(), id);
        }
        assert!(AlgorithmId::try_from(0).is_err());
        assert!(AlgorithmId::try_from(4).is_err());
    }

    #[test]
    fn test_parse_forced_algorithm() {
        assert_eq!(parse_forced_algorithm("0").unwrap(), None);
        assert_eq!(parse_forced_algorithm("").unwrap(), None);
        assert_eq!(
            parse_forced_algorithm("1").unwrap(),
            Some(AlgorithmId::StateFinding)
        );
        assert_eq!(
            parse_forced_algorithm(" 3 ").unwrap(),
            Some(AlgorithmId::QuietestQuad)
        );
        assert_eq!(
            parse_forced_algorithm("blind-correction").unwrap(),
            Some(AlgorithmId::BlindCorrection)
        );
        let err = parse_forced_algorithm("7").unwrap_err();
        assert_eq!(err, TempFromBiasError::InvalidForcedAlgorithm("7".into()));
        assert!(parse_forced_algorithm("fastest").is_err());
    }

    #[test]
    fn test_state_finding_is_sentinel() {
        for camera in [CameraId::Camera1, CameraId::Camera2, CameraId::Camera3] {
            let est = StateFinding.estimate(&quads(), cal(camera)).unwrap();
            assert_eq!(est.algorithm, AlgorithmId::StateFinding);
            assert_eq!(est.temperature, -1.0);
            assert_eq!(est.sigma, 1.0e6);
        }
    }

    #[test]
    fn test_blind_correction_camera_1() {
        let q = quads();
        let est = BlindCorrectionEstimator.estimate(&q, cal(CameraId::Camera1)).unwrap();
        let corrected = q.0[0] + (q.0[2] - (-2158.3193 + 0.96696346 * q.0[0])) * 1.49;
        let expected = 145.11 + 0.003442 * corrected + 0.793;
        assert_relative_eq!(est.temperature, expected, epsilon = 1e-9);
        assert_eq!(est.sigma, 1.0e6);
    }

    #[test]
    fn test_blind_correction_camera_2_subtracts() {
        let q = quads();
        let est = BlindCorrectionEstimator.estimate(&q, cal(CameraId::Camera2)).unwrap();
        let corrected = q.0[0] - (q.0[2] - (2327.9074 + 1.0269492 * q.0[0]));
        let expected = 152.62181 + 0.0035212949 * corrected - 0.343593;
        assert_relative_eq!(est.temperature, expected, epsilon = 1e-9);
        assert_eq!(est.sigma, 1.0e6);
    }

    #[test]
    fn test_blind_correction_camera_3() {
        let q = quads();
        let est = BlindCorrectionEstimator.estimate(&q, cal(CameraId::Camera3)).unwrap();
        let residual = -(q.0[3] - (4037.6680 + 1.1533126 * q.0[0]));
        assert_relative_eq!(est.temperature, residual / 37.0 + 75.15, epsilon = 1e-9);
        assert_eq!(est.sigma, 0.10);
        match est.detail {
            EstimateDetail::BlindCorrection {
                corrected_quadrant,
                corrected_value,
            } => {
                assert_eq!(corrected_quadrant, Quadrant::Q4);
                assert_relative_eq!(corrected_value, residual, epsilon = 1e-9);
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_quietest_quad_camera_1_averages_q3_q4() {
        let q = quads();
        let est = QuietestQuadEstimator.estimate(&q, cal(CameraId::Camera1)).unwrap();

        let c = cal(CameraId::Camera1);
        let offsets: Vec<f64> = c.state_offsets[2].iter().chain(&c.state_offsets[3]).copied().collect();
        let mean_offset = offsets.iter().sum::<f64>() / offsets.len() as f64;
        let mean_dn_per_k = (1.0 / 0.0035567496 + 1.0 / 0.0033898134) / 2.0;
        let correction = mean_offset / mean_dn_per_k;
        let t3 = 153.27612 + 0.0035567496 * q.0[2] + correction;
        let t4 = 139.89991 + 0.0033898134 * q.0[3] + correction;

        assert_relative_eq!(est.temperature, (t3 + t4) / 2.0, epsilon = 1e-9);
        assert_eq!(est.sigma, 0.14);
    }

    #[test]
    fn test_quietest_quad_camera_2_uses_q4_only() {
        let q = quads();
        let est = QuietestQuadEstimator.estimate(&q, cal(CameraId::Camera2)).unwrap();
        let offsets = [0.0, 20.0, -40.0, -5.0, -68.0, -50.0, -68.0];
        let correction = (offsets.iter().sum::<f64>() / 7.0) * 0.003343;
        let expected = 138.44286 + 0.003343 * q.0[3] + correction;
        assert_relative_eq!(est.temperature, expected, epsilon = 1e-9);
        assert_eq!(est.sigma, 0.14);
    }

    #[test]
    fn test_quietest_quad_camera_3_has_no_state_correction() {
        let q = quads();
        let est = QuietestQuadEstimator.estimate(&q, cal(CameraId::Camera3)).unwrap();
        let t2 = 153.25747 + 0.0037115404 * q.0[1];
        let t3 = 151.03888 + 0.0036755942 * q.0[2];
        assert_relative_eq!(est.temperature, (t2 + t3) / 2.0, epsilon = 1e-9);
        assert_eq!(est.sigma, 0.25);
    }

    #[test]
    fn test_quietest_quad_without_members_is_an_error() {
        let mut calibration = cal(CameraId::Camera1).clone();
        calibration.quietest.members.clear();
        calibration.quietest.sigma = 0.01;

        let err = QuietestQuadEstimator.estimate(&quads(), &calibration).unwrap_err();
        assert!(matches!(
            err,
            TempFromBiasError::InvalidCalibration {
                camera: CameraId::Camera1,
                ..
            }
        ));
    }

    #[test]
    fn test_quietest_quad_with_empty_state_offsets_is_an_error() {
        let mut calibration = cal(CameraId::Camera2).clone();
        calibration.state_offsets[Quadrant::Q4.index()].clear();

        let err = QuietestQuadEstimator.estimate(&quads(), &calibration).unwrap_err();
        assert!(matches!(err, TempFromBiasError::Statistics(_)));
    }

    #[test]
    fn test_estimators_report_their_identity() {
        let estimators: [&dyn TemperatureEstimator; 3] =
            [&StateFinding, &BlindCorrectionEstimator, &QuietestQuadEstimator];
        for (estimator, id) in estimators.iter().zip(AlgorithmId::ALL) {
            assert_eq!(estimator.algorithm(), id);
            assert_eq!(estimator.estimate(&quads(), cal(CameraId::Camera3)).unwrap().algorithm, id);
        }
    }
}
