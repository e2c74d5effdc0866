// Outlier Filter - Median Absolute Deviation rejection
//
// Numeric properties only. Categorical estimates are never filtered; the
// categorical strategy keeps everything before aggregation.

use super::aggregator::magnitude_scale;
use super::ConsensusPolicy;
use serde::{Deserialize, Serialize};

/// Which rule removed an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierRule {
    /// Deviation from the median exceeded k × MAD
    MadThreshold,
    /// The threshold would have removed everything; only the furthest went
    FurthestFromMedian,
}

/// Why one estimate was excluded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReason {
    pub rule: OutlierRule,
    /// |value - median|
    pub deviation: f64,
    pub median: f64,
    pub mad: f64,
    /// k × MAD
    pub threshold: f64,
}

/// Result of filtering: indices into the input, both halves in input order
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierPartition {
    pub kept: Vec<usize>,
    pub removed: Vec<(usize, OutlierReason)>,
}

impl OutlierPartition {
    /// Partition that keeps every one of `len` estimates
    pub fn keep_all(len: usize) -> Self {
        Self {
            kept: (0..len).collect(),
            removed: Vec::new(),
        }
    }
}

/// Median of a slice (mean of the two middle values for even lengths)
///
/// Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(sorted[mid - 1] / 2.0 + sorted[mid] / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Flag values statistically inconsistent with the group
///
/// Never fails. Fewer than `min_estimates_for_outlier_filter` values, or a
/// zero MAD, keeps everything. At least one value always survives.
///
/// Work happens on values divided by their magnitude scale so deviations of
/// huge opposite-signed values cannot overflow; reason fields are scaled
/// back and saturate at `f64::MAX`.
pub fn filter_outliers(values: &[f64], policy: &ConsensusPolicy) -> OutlierPartition {
    if values.len() < policy.min_estimates_for_outlier_filter {
        return OutlierPartition::keep_all(values.len());
    }

    let scale = magnitude_scale(values);
    let scaled: Vec<f64> = values.iter().map(|v| v / scale).collect();

    let Some(center) = median(&scaled) else {
        return OutlierPartition::keep_all(values.len());
    };
    let deviations: Vec<f64> = scaled.iter().map(|v| (v - center).abs()).collect();
    let mad = median(&deviations).unwrap_or(0.0);

    if mad <= 0.0 {
        return OutlierPartition::keep_all(values.len());
    }

    let threshold = policy.outlier_mad_multiplier * mad;
    let unscale = |x: f64| (x * scale).clamp(-f64::MAX, f64::MAX);
    let reason = |rule, deviation: f64| OutlierReason {
        rule,
        deviation: unscale(deviation),
        median: unscale(center),
        mad: unscale(mad),
        threshold: unscale(threshold),
    };

    let flagged: Vec<bool> = deviations.iter().map(|d| *d > threshold).collect();

    if flagged.iter().all(|f| *f) {
        // Maximally divergent set: drop only the furthest (first on ties)
        let mut furthest = 0;
        for (i, d) in deviations.iter().enumerate() {
            if *d > deviations[furthest] {
                furthest = i;
            }
        }
        tracing::debug!(
            median = unscale(center),
            mad = unscale(mad),
            "Every estimate exceeded the outlier threshold; removing only index {}",
            furthest
        );
        return OutlierPartition {
            kept: (0..values.len()).filter(|i| *i != furthest).collect(),
            removed: vec![(
                furthest,
                reason(OutlierRule::FurthestFromMedian, deviations[furthest]),
            )],
        };
    }

    let mut partition = OutlierPartition {
        kept: Vec::with_capacity(values.len()),
        removed: Vec::new(),
    };
    for (i, is_outlier) in flagged.into_iter().enumerate() {
        if is_outlier {
            partition
                .removed
                .push((i, reason(OutlierRule::MadThreshold, deviations[i])));
        } else {
            partition.kept.push(i);
        }
    }
    partition
}
