//! Selection of the final temperature among the algorithm estimates
//!
//! The cascade starts from the state-finding estimate and replaces it only with
//! an estimate whose sigma is strictly lower than both of the others. Any tie
//! at the minimum therefore leaves state-finding selected, including the case
//! where blind-correction and quietest-quad tie below it.
//!
//! That last case does not return the global minimum: sigmas of
//! `(1e6, 0.2, 0.2)` select state-finding with sigma `1e6`. Callers that need
//! the lowest-sigma estimate under a tie should force the algorithm.

use serde::{Deserialize, Serialize};

use crate::estimators::{AlgorithmEstimate, AlgorithmId};

/// The three algorithm estimates for one exposure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeEstimates {
    pub state_finding: AlgorithmEstimate,
    pub blind_correction: AlgorithmEstimate,
    pub quietest_quad: AlgorithmEstimate,
}

impl CascadeEstimates {
    pub fn get(&self, algorithm: AlgorithmId) -> &AlgorithmEstimate {
        match algorithm {
            AlgorithmId::StateFinding => &self.state_finding,
            AlgorithmId::BlindCorrection => &self.blind_correction,
            AlgorithmId::QuietestQuad => &self.quietest_quad,
        }
    }

    /// Algorithm with the lowest sigma, under the cascade's tie rule.
    ///
    /// When blind-correction and quietest-quad tie below state-finding the
    /// result is state-finding, not the minimum.
    pub fn best(&self) -> AlgorithmId {
        let s1 = self.state_finding.sigma;
        let s2 = self.blind_correction.sigma;
        let s3 = self.quietest_quad.sigma;

        let mut winner = AlgorithmId::StateFinding;
        if s2 < s1 && s2 < s3 {
            winner = AlgorithmId::BlindCorrection;
        }
        if s3 < s2 && s3 < s1 {
            winner = AlgorithmId::QuietestQuad;
        }
        winner
    }
}

/// Final temperature for an exposure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureResult {
    /// Temperature in Kelvin
    pub temperature: f64,
    pub sigma: f64,
    pub algorithm: AlgorithmId,
    /// True when the algorithm was chosen by the caller rather than by sigma
    pub forced: bool,
}

/// Pick the result from `estimates`, honoring `forced` when given
pub fn select(estimates: &CascadeEstimates, forced: Option<AlgorithmId>) -> TemperatureResult {
    let best = estimates.best();
    let algorithm = forced.unwrap_or(best);
    let chosen = estimates.get(algorithm);

    if let Some(forced) = forced {
        log::info!(
            "Forcing algorithm {forced} result (lowest sigma was {best}): temp = {:.4} K, sigma = {}",
            chosen.temperature,
            chosen.sigma
        );
    }

    TemperatureResult {
        temperature: chosen.temperature,
        sigma: chosen.sigma,
        algorithm,
        forced: forced.is_some(),
    }
}
