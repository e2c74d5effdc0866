//! Tunable consensus policy
//!
//! Every constant the engine uses lives here so it can be recalibrated
//! against accuracy data from the `[consensus]` table of the service TOML.
//! Missing fields take the defaults below.

use super::AgreementLevel;
use serde::{Deserialize, Serialize};

/// Consensus policy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusPolicy {
    /// Outlier threshold in multiples of the median absolute deviation
    pub outlier_mad_multiplier: f64,
    /// Below this many estimates no outlier is removed
    pub min_estimates_for_outlier_filter: usize,

    /// Coefficient of variation at or below which agreement is high
    pub high_agreement_max_cv: f64,
    /// Coefficient of variation at or below which agreement is medium
    pub medium_agreement_max_cv: f64,
    /// Winning vote share at or above which categorical agreement is medium
    pub medium_agreement_min_vote_share: f64,
    /// |final value| below this uses the absolute standard deviation
    pub near_zero_epsilon: f64,

    pub high_multiplier: f64,
    pub medium_multiplier: f64,
    pub low_multiplier: f64,

    /// Points added when enough analyzers corroborate each other
    pub corroboration_bonus: f64,
    pub corroboration_min_analyzers: usize,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            outlier_mad_multiplier: 2.5,
            min_estimates_for_outlier_filter: 3,
            high_agreement_max_cv: 0.03,
            medium_agreement_max_cv: 0.10,
            medium_agreement_min_vote_share: 0.60,
            near_zero_epsilon: 1e-9,
            high_multiplier: 1.0,
            medium_multiplier: 0.85,
            low_multiplier: 0.6,
            corroboration_bonus: 5.0,
            corroboration_min_analyzers: 2,
        }
    }
}

/// Rejected policy
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid consensus policy: {0}")]
pub struct PolicyError(pub String);

impl ConsensusPolicy {
    /// Multiplier applied to the base confidence for an agreement level
    ///
    /// `None` never reaches the scorer; it maps to zero.
    pub fn multiplier_for(&self, level: AgreementLevel) -> f64 {
        match level {
            AgreementLevel::High => self.high_multiplier,
            AgreementLevel::Medium => self.medium_multiplier,
            AgreementLevel::Low => self.low_multiplier,
            AgreementLevel::None => 0.0,
        }
    }

    /// Check ranges and orderings
    ///
    /// Multipliers must be non-increasing from high to low so that better
    /// agreement can never lower the score.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let finite = [
            self.outlier_mad_multiplier,
            self.high_agreement_max_cv,
            self.medium_agreement_max_cv,
            self.medium_agreement_min_vote_share,
            self.near_zero_epsilon,
            self.high_multiplier,
            self.medium_multiplier,
            self.low_multiplier,
            self.corroboration_bonus,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(PolicyError("all numeric fields must be finite".to_string()));
        }
        if self.outlier_mad_multiplier <= 0.0 {
            return Err(PolicyError(format!(
                "outlier_mad_multiplier must be > 0 (got {})",
                self.outlier_mad_multiplier
            )));
        }
        if self.min_estimates_for_outlier_filter < 3 {
            return Err(PolicyError(format!(
                "min_estimates_for_outlier_filter must be >= 3 (got {})",
                self.min_estimates_for_outlier_filter
            )));
        }
        if self.high_agreement_max_cv < 0.0
            || self.high_agreement_max_cv > self.medium_agreement_max_cv
        {
            return Err(PolicyError(format!(
                "expected 0 <= high_agreement_max_cv ({}) <= medium_agreement_max_cv ({})",
                self.high_agreement_max_cv, self.medium_agreement_max_cv
            )));
        }
        if self.medium_agreement_min_vote_share <= 0.0
            || self.medium_agreement_min_vote_share > 1.0
        {
            return Err(PolicyError(format!(
                "medium_agreement_min_vote_share must be in (0, 1] (got {})",
                self.medium_agreement_min_vote_share
            )));
        }
        if self.near_zero_epsilon < 0.0 {
            return Err(PolicyError("near_zero_epsilon must be >= 0".to_string()));
        }
        for (name, m) in [
            ("high_multiplier", self.high_multiplier),
            ("medium_multiplier", self.medium_multiplier),
            ("low_multiplier", self.low_multiplier),
        ] {
            if !(0.0..=1.0).contains(&m) {
                return Err(PolicyError(format!("{} must be in [0, 1] (got {})", name, m)));
            }
        }
        if self.high_multiplier < self.medium_multiplier
            || self.medium_multiplier < self.low_multiplier
        {
            return Err(PolicyError(format!(
                "multipliers must satisfy high ({}) >= medium ({}) >= low ({})",
                self.high_multiplier, self.medium_multiplier, self.low_multiplier
            )));
        }
        if self.corroboration_bonus < 0.0 {
            return Err(PolicyError(format!(
                "corroboration_bonus must be >= 0 (got {})",
                self.corroboration_bonus
            )));
        }
        if self.corroboration_min_analyzers < 2 {
            return Err(PolicyError(format!(
                "corroboration_min_analyzers must be >= 2 (got {})",
                self.corroboration_min_analyzers
            )));
        }
        Ok(())
    }
}
