//! Per-camera calibration constants for bias-derived temperatures
//!
//! Each of the three cameras carries its own empirical fits relating quadrant
//! bias levels (DN) to focal-plane temperature (K). The records are built once
//! on first use and shared read-only for the life of the process.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TempFromBiasError;
use crate::quadrants::Quadrant;

/// Camera identity as reported in the exposure header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraId {
    Camera1,
    Camera2,
    Camera3,
}

impl CameraId {
    /// Header number of the camera (1, 2 or 3)
    pub fn number(self) -> u8 {
        match self {
            CameraId::Camera1 => 1,
            CameraId::Camera2 => 2,
            CameraId::Camera3 => 3,
        }
    }
}

impl TryFrom<i64> for CameraId {
    type Error = TempFromBiasError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CameraId::Camera1),
            2 => Ok(CameraId::Camera2),
            3 => Ok(CameraId::Camera3),
            other => Err(TempFromBiasError::UnknownCamera(other)),
        }
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera {}", self.number())
    }
}

/// Linear fit `intercept + slope * x`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearFit {
    pub const fn new(intercept: f64, slope: f64) -> Self {
        Self { intercept, slope }
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fits predicting one quadrant's bias from another's, one per quadrant pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossQuadrantFits {
    pub q1_q2: LinearFit,
    pub q1_q3: LinearFit,
    pub q1_q4: LinearFit,
    pub q2_q3: LinearFit,
    pub q2_q4: LinearFit,
    pub q3_q4: LinearFit,
}

/// Recipe for the blind-correction estimator.
///
/// Both forms remove the shared electronic bias pattern by comparing one
/// quadrant against a fit predicted from another quadrant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlindCorrection {
    /// `corrected = Q[target] + gain * (Q[reference] - fit(Q[target]))`,
    /// `T = temperature_fit(corrected) + offset`
    CrossQuadrant {
        target: Quadrant,
        reference: Quadrant,
        fit: LinearFit,
        gain: f64,
        temperature_fit: LinearFit,
        offset: f64,
        sigma: f64,
    },
    /// `residual = fit(Q[reference]) - Q[target]`,
    /// `T = residual / dn_per_kelvin + offset`
    Residual {
        target: Quadrant,
        reference: Quadrant,
        fit: LinearFit,
        dn_per_kelvin: f64,
        offset: f64,
        sigma: f64,
    },
}

impl BlindCorrection {
    pub fn sigma(&self) -> f64 {
        match self {
            BlindCorrection::CrossQuadrant { sigma, .. } => *sigma,
            BlindCorrection::Residual { sigma, .. } => *sigma,
        }
    }
}

/// Quadrants with the smallest readout-electronics noise and their fits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuietestQuadrants {
    pub members: Vec<(Quadrant, LinearFit)>,
    /// Apply the mean state-zero offset of the members to move from the mean state to state 0
    pub correct_to_state_zero: bool,
    pub sigma: f64,
}

/// Complete calibration record for one camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub camera: CameraId,
    pub cross_quadrant: CrossQuadrantFits,
    /// Bias-to-temperature fit per quadrant, indexed Q1..Q4
    pub quadrant_fits: [LinearFit; 4],
    /// Bias offsets (DN) of each electronic state relative to state 0, indexed Q1..Q4
    pub state_offsets: [Vec<f64>; 4],
    pub blind: BlindCorrection,
    pub quietest: QuietestQuadrants,
}

impl CameraCalibration {
    /// Static calibration for the given camera
    pub fn for_camera(camera: CameraId) -> &'static CameraCalibration {
        match camera {
            CameraId::Camera1 => &models::CAMERA_1,
            CameraId::Camera2 => &models::CAMERA_2,
            CameraId::Camera3 => &models::CAMERA_3,
        }
    }

    pub fn quadrant_fit(&self, quadrant: Quadrant) -> &LinearFit {
        &self.quadrant_fits[quadrant.index()]
    }

    pub fn state_offsets(&self, quadrant: Quadrant) -> &[f64] {
        &self.state_offsets[quadrant.index()]
    }
}

/// Calibration records for the three cameras, derived from end-of-life data
pub mod models {
    use super::*;
    use crate::quadrants::Quadrant::*;

    pub static CAMERA_1: Lazy<CameraCalibration> = Lazy::new(|| {
        let cross_quadrant = CrossQuadrantFits {
            q1_q2: LinearFit::new(-957.67548, 0.98115373),
            q1_q3: LinearFit::new(-2158.3193, 0.96696346),
            q1_q4: LinearFit::new(1712.0793, 1.0157240),
            q2_q3: LinearFit::new(-1211.0413, 0.98569588),
            q2_q4: LinearFit::new(2708.0526, 1.0354436),
            q3_q4: LinearFit::new(3979.5255, 1.0504393),
        };
        let quadrant_fits = [
            LinearFit::new(145.11, 0.003442),
            LinearFit::new(148.66098, 0.0035080553),
            LinearFit::new(153.27612, 0.0035567496),
            LinearFit::new(139.89991, 0.0033898134),
        ];
        CameraCalibration {
            camera: CameraId::Camera1,
            blind: BlindCorrection::CrossQuadrant {
                target: Q1,
                reference: Q3,
                fit: cross_quadrant.q1_q3,
                gain: 1.49,
                temperature_fit: quadrant_fits[0],
                offset: 0.793,
                sigma: 1.0e6,
            },
            quietest: QuietestQuadrants {
                members: vec![(Q3, quadrant_fits[2]), (Q4, quadrant_fits[3])],
                correct_to_state_zero: true,
                sigma: 0.14,
            },
            cross_quadrant,
            quadrant_fits,
            state_offsets: [
                vec![
                    0.0, 45.0, 75.0, 130.0, 180.0, 240.0, 315.0, 360.0, 420.0, 550.0, 510.0,
                    520.0, 450.0,
                ],
                vec![
                    0.0, 0.0, 80.0, 45.0, 180.0, 125.0, 265.0, 205.0, 355.0, 410.0, 395.0, 355.0,
                    290.0,
                ],
                vec![
                    0.0, 10.0, 20.0, 25.0, 50.0, 62.0, 90.0, 95.0, 124.0, 164.0, 155.0, 155.0,
                    128.0,
                ],
                vec![
                    0.0, -10.0, 35.0, 10.0, 70.0, 35.0, 125.0, 70.0, 145.0, 155.0, 167.0, 145.0,
                    105.0,
                ],
            ],
        }
    });

    pub static CAMERA_2: Lazy<CameraCalibration> = Lazy::new(|| {
        let cross_quadrant = CrossQuadrantFits {
            q1_q2: LinearFit::new(-1673.1728, 0.98142379),
            q1_q3: LinearFit::new(2327.9074, 1.0269492),
            q1_q4: LinearFit::new(4164.0788, 1.0531190),
            q2_q3: LinearFit::new(4068.4664, 1.0459572),
            q2_q4: LinearFit::new(5923.8728, 1.0715554),
            q3_q4: LinearFit::new(1764.3628, 1.0248831),
        };
        let quadrant_fits = [
            LinearFit::new(152.62181, 0.0035212949),
            LinearFit::new(159.01768, 0.0035824134),
            LinearFit::new(144.86, 0.003425),
            LinearFit::new(138.44286, 0.003343),
        ];
        CameraCalibration {
            camera: CameraId::Camera2,
            blind: BlindCorrection::CrossQuadrant {
                target: Q1,
                reference: Q3,
                fit: cross_quadrant.q1_q3,
                gain: -1.00,
                temperature_fit: quadrant_fits[0],
                offset: -0.343593,
                sigma: 1.0e6,
            },
            quietest: QuietestQuadrants {
                members: vec![(Q4, quadrant_fits[3])],
                correct_to_state_zero: true,
                sigma: 0.14,
            },
            cross_quadrant,
            quadrant_fits,
            state_offsets: [
                vec![0.0, -5.0, -60.0, -80.0, -155.0, -185.0, -198.0],
                vec![0.0, -65.0, -115.0, -273.0, -343.0, -487.0, -500.0],
                vec![0.0, -25.0, -115.0, -180.0, -293.0, -365.0, -405.0],
                vec![0.0, 20.0, -40.0, -5.0, -68.0, -50.0, -68.0],
            ],
        }
    });

    pub static CAMERA_3: Lazy<CameraCalibration> = Lazy::new(|| CameraCalibration {
        camera: CameraId::Camera3,
        cross_quadrant: CrossQuadrantFits {
            q1_q2: LinearFit::new(324.85806, 1.0075),
            q1_q3: LinearFit::new(492.06438, 1.0050437),
            q1_q4: LinearFit::new(835.68030, 1.0096758),
            q2_q3: LinearFit::new(215.15678, 0.99948693),
            q2_q4: LinearFit::new(539.35265, 1.0032465),
            q3_q4: LinearFit::new(327.12712, 1.0039380),
        },
        quadrant_fits: [
            LinearFit::new(147.63, 0.003495),
            LinearFit::new(146.92948, 0.0034619325),
            LinearFit::new(146.21557, 0.0034699612),
            LinearFit::new(144.51, 0.003455),
        ],
        state_offsets: [
            vec![
                0.0, 0.0, 110.0, 110.0, 265.0, 240.0, 320.0, 320.0, 200.0, 340.0, 85.0, 225.0, 90.0,
            ],
            vec![
                0.0, -70.0, 45.0, -105.0, 40.0, -75.0, -5.0, 0.0, -45.0, 80.0, -50.0, 105.0, 75.0,
            ],
            vec![
                0.0, -55.0, 65.0, -60.0, 90.0, -7.0, 68.0, 60.0, 0.0, 130.0, -35.0, 128.0, 68.0,
            ],
            vec![
                0.0, 10.0, 125.0, 137.0, 300.0, 285.0, 375.0, 380.0, 255.0, 410.0, 105.0, 270.0,
                100.0,
            ],
        ],
        // Only camera 3's blind correction has been validated against end-of-life data
        blind: BlindCorrection::Residual {
            target: Q4,
            reference: Q1,
            fit: LinearFit::new(4037.6680, 1.1533126),
            dn_per_kelvin: 37.0,
            offset: 75.15,
            sigma: 0.10,
        },
        quietest: QuietestQuadrants {
            members: vec![
                (Q2, LinearFit::new(153.25747, 0.0037115404)),
                (Q3, LinearFit::new(151.03888, 0.0036755942)),
            ],
            correct_to_state_zero: false,
            sigma: 0.25,
        },
    });
}
