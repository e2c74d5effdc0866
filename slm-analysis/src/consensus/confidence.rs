//! Confidence Scorer
//!
//! Converts surviving self-confidences, the agreement level and the number of
//! contributing analyzers into one integer score on 0-100:
//!
//! ```text
//! score = clamp(mean(self_confidence) × 100 × multiplier(level) + bonus, 0, 100)
//! bonus = corroboration_bonus if survivors >= corroboration_min_analyzers else 0
//! ```
//!
//! A single confident analyzer scores visibly lower than two analyzers that
//! agree, and a score never exceeds what the mean confidence and agreement
//! pattern justify plus the bonus.

use super::{AgreementLevel, ConsensusPolicy};

/// Breakdown of one score, kept for logging and tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// mean(self_confidence) × 100
    pub base: f64,
    pub multiplier: f64,
    pub bonus: f64,
    /// Final clamped, rounded score
    pub score: u8,
}

/// Score the surviving estimates' confidences
///
/// `confidences` holds one entry per contributing analyzer and must be
/// non-empty; an empty slice scores zero.
pub fn score(confidences: &[f64], level: AgreementLevel, policy: &ConsensusPolicy) -> ScoreBreakdown {
    if confidences.is_empty() {
        return ScoreBreakdown {
            base: 0.0,
            multiplier: 0.0,
            bonus: 0.0,
            score: 0,
        };
    }

    let mut sorted = confidences.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;

    let base = mean * 100.0;
    let multiplier = policy.multiplier_for(level);
    let bonus = if confidences.len() >= policy.corroboration_min_analyzers {
        policy.corroboration_bonus
    } else {
        0.0
    };

    let raw = base * multiplier + bonus;
    let score = raw.clamp(0.0, 100.0).round() as u8;

    ScoreBreakdown {
        base,
        multiplier,
        bonus,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_analyzer_has_no_bonus() {
        let breakdown = score(&[0.8], AgreementLevel::Medium, &ConsensusPolicy::default());
        assert_eq!(breakdown.bonus, 0.0);
        assert_eq!(breakdown.score, 68);
    }

    #[test]
    fn test_perfect_agreement_with_bonus() {
        let breakdown = score(&[0.9, 0.85, 0.95], AgreementLevel::High, &ConsensusPolicy::default());
        assert_eq!(breakdown.score, 95);
    }

    #[test]
    fn test_capped_at_100() {
        let breakdown = score(&[1.0, 1.0], AgreementLevel::High, &ConsensusPolicy::default());
        assert_eq!(breakdown.score, 100);
    }

    #[test]
    fn test_low_agreement_multiplier() {
        // 70 × 0.6 + 5 = 47
        let breakdown = score(&[0.7, 0.7, 0.7], AgreementLevel::Low, &ConsensusPolicy::default());
        assert_eq!(breakdown.score, 47);
    }

    #[test]
    fn test_all_zero_confidence_still_gets_bonus() {
        let breakdown = score(&[0.0, 0.0], AgreementLevel::High, &ConsensusPolicy::default());
        assert_eq!(breakdown.score, 5);
    }

    #[test]
    fn test_monotonic_in_agreement() {
        let policy = ConsensusPolicy::default();
        let confidences = [0.55, 0.72, 0.9];
        let high = score(&confidences, AgreementLevel::High, &policy).score;
        let medium = score(&confidences, AgreementLevel::Medium, &policy).score;
        let low = score(&confidences, AgreementLevel::Low, &policy).score;
        assert!(high >= medium && medium >= low);
    }
}
