// Agreement Classifier - how tightly the surviving estimates clustered

use super::aggregator::{magnitude_scale, VoteTally};
use super::ConsensusPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualitative agreement between surviving estimates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementLevel {
    High,
    Medium,
    Low,
    /// No analyzer produced a surviving estimate
    None,
}

impl AgreementLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AgreementLevel::High => "high",
            AgreementLevel::Medium => "medium",
            AgreementLevel::Low => "low",
            AgreementLevel::None => "none",
        }
    }
}

impl fmt::Display for AgreementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgreementLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(AgreementLevel::High),
            "medium" => Ok(AgreementLevel::Medium),
            "low" => Ok(AgreementLevel::Low),
            "none" => Ok(AgreementLevel::None),
            other => Err(format!("Unknown agreement level: {}", other)),
        }
    }
}

/// Level plus the statistic it was derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Agreement {
    pub level: AgreementLevel,
    /// Coefficient of variation (numeric) or winning vote share (categorical);
    /// `None` for a single survivor
    pub metric: Option<f64>,
}

impl Agreement {
    /// One analyzer cannot corroborate itself, but no disagreement was seen
    pub fn single_survivor() -> Self {
        Self {
            level: AgreementLevel::Medium,
            metric: None,
        }
    }
}

/// Population standard deviation of `values` around their own mean
fn population_std_dev(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let scale = magnitude_scale(&sorted);
    for v in sorted.iter_mut() {
        *v /= scale;
    }
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() * scale
}

/// Coefficient of variation of `kept` relative to `final_value`
///
/// Uses the absolute standard deviation when `final_value` is within
/// `near_zero_epsilon` of zero. Saturates at `f64::MAX`.
pub fn coefficient_of_variation(kept: &[f64], final_value: f64, policy: &ConsensusPolicy) -> f64 {
    let std_dev = population_std_dev(kept);
    let cv = if final_value.abs() < policy.near_zero_epsilon {
        std_dev
    } else {
        std_dev / final_value.abs()
    };
    cv.min(f64::MAX)
}

/// Classify numeric agreement
pub fn classify_numeric(kept: &[f64], final_value: f64, policy: &ConsensusPolicy) -> Agreement {
    if kept.len() <= 1 {
        return Agreement::single_survivor();
    }

    let cv = coefficient_of_variation(kept, final_value, policy);
    let level = if cv <= policy.high_agreement_max_cv {
        AgreementLevel::High
    } else if cv <= policy.medium_agreement_max_cv {
        AgreementLevel::Medium
    } else {
        AgreementLevel::Low
    };

    Agreement {
        level,
        metric: Some(cv),
    }
}

/// Classify categorical agreement from the vote tally over `survivors` ballots
pub fn classify_categorical(
    tally: &VoteTally,
    survivors: usize,
    policy: &ConsensusPolicy,
) -> Agreement {
    if survivors <= 1 {
        return Agreement::single_survivor();
    }

    let share = tally.winner_share();
    let level = if tally.distinct_labels == 1 {
        AgreementLevel::High
    } else if share >= policy.medium_agreement_min_vote_share {
        AgreementLevel::Medium
    } else {
        AgreementLevel::Low
    };

    Agreement {
        level,
        metric: Some(share),
    }
}
