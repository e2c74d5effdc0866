// Consensus Aggregator - Confidence-Weighted Mean and Weighted Vote
//
// Sums run in a canonical (sorted) order so that shuffling the input cannot
// change the floating-point result.

/// Sum in ascending order
fn canonical_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    values.into_iter().sum()
}

/// Largest power of two not above the largest magnitude in `values`
///
/// 1.0 when every magnitude is at most 1. Dividing by a power of two is
/// exact, so sums of scaled values round exactly like the unscaled sums but
/// cannot overflow near `f64::MAX`.
pub(crate) fn magnitude_scale(values: &[f64]) -> f64 {
    let largest = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if largest > 1.0 && largest.is_finite() {
        // Exponent bits only
        f64::from_bits(largest.to_bits() & 0x7ff0_0000_0000_0000)
    } else {
        1.0
    }
}

/// Confidence-weighted mean of `(value, weight)` pairs
///
/// Falls back to the unweighted mean when every weight is zero (total
/// distrust carries no preference between estimates). Returns `None` only for
/// an empty input, which callers must never pass. Finite inputs always give
/// a finite mean.
pub fn weighted_mean(samples: &[(f64, f64)]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut ordered = samples.to_vec();
    ordered.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let values: Vec<f64> = ordered.iter().map(|(v, _)| *v).collect();
    let scale = magnitude_scale(&values);

    let total_weight: f64 = ordered.iter().map(|(_, w)| w).sum();
    if total_weight > 0.0 {
        let weighted: f64 = ordered.iter().map(|(v, w)| (v / scale) * w).sum();
        Some(weighted / total_weight * scale)
    } else {
        let sum: f64 = values.iter().map(|v| v / scale).sum();
        Some(sum / ordered.len() as f64 * scale)
    }
}

/// Outcome of a categorical weighted vote
#[derive(Debug, Clone, PartialEq)]
pub struct VoteTally {
    pub winner: String,
    /// Weight (or vote count, when unweighted) behind the winner
    pub winner_weight: f64,
    pub total_weight: f64,
    pub distinct_labels: usize,
    /// False when every weight was zero and one-vote-per-estimate was used
    pub weighted: bool,
}

impl VoteTally {
    /// Winner's share of the total, 0.0-1.0
    pub fn winner_share(&self) -> f64 {
        if self.total_weight > 0.0 {
            self.winner_weight / self.total_weight
        } else {
            0.0
        }
    }
}

/// Weighted vote over `(label, weight)` pairs given in arrival order
///
/// Highest total wins; exact ties go to the label that arrived first.
/// Returns `None` only for an empty input.
pub fn weighted_vote(ballots: &[(&str, f64)]) -> Option<VoteTally> {
    if ballots.is_empty() {
        return None;
    }

    let weighted = ballots.iter().any(|(_, w)| *w > 0.0);

    // Labels in first-arrival order, each with every weight cast for it
    let mut labels: Vec<(&str, Vec<f64>)> = Vec::new();
    for &(label, weight) in ballots {
        let vote = if weighted { weight } else { 1.0 };
        match labels.iter_mut().find(|(l, _)| *l == label) {
            Some((_, votes)) => votes.push(vote),
            None => labels.push((label, vec![vote])),
        }
    }

    let totals: Vec<(&str, f64)> = labels
        .into_iter()
        .map(|(label, votes)| (label, canonical_sum(votes)))
        .collect();

    let mut winner = 0;
    for (i, (_, total)) in totals.iter().enumerate() {
        // Strictly greater: earlier arrival keeps exact ties
        if *total > totals[winner].1 {
            winner = i;
        }
    }

    let total_weight = canonical_sum(totals.iter().map(|(_, t)| *t).collect());

    Some(VoteTally {
        winner: totals[winner].0.to_string(),
        winner_weight: totals[winner].1,
        total_weight,
        distinct_labels: totals.len(),
        weighted,
    })
}
