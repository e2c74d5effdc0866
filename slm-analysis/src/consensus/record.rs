// Analysis Record Builder
//
// Deterministic assembly of the filter, aggregator, classifier and scorer
// outputs into one auditable record. The builder computes nothing new; it
// only checks the record invariants before the record leaves the engine.

use super::agreement::{Agreement, AgreementLevel};
use super::outlier::{OutlierPartition, OutlierReason};
use super::validation::ConsensusError;
use super::{Estimate, EstimateValue, Property};
use serde::{Deserialize, Serialize};

/// An estimate excluded from aggregation, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedOutlier {
    /// Index into `all_estimates`
    pub position: usize,
    pub estimate: Estimate,
    pub reason: OutlierReason,
}

/// Consensus result for one property of one sample
///
/// Contains no sample id or timestamp: building it is a pure function of the
/// estimates and the policy. Persistence wraps it with both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub property: Property,
    /// `None` when no analyzer produced an estimate
    pub final_value: Option<EstimateValue>,
    /// 0-100; `None` when no analyzer produced an estimate
    pub confidence: Option<u8>,
    pub agreement_level: AgreementLevel,
    /// Coefficient of variation or winning vote share behind `agreement_level`
    pub agreement_metric: Option<f64>,
    /// Every estimate considered, in analyzer invocation order
    pub all_estimates: Vec<Estimate>,
    pub outliers_removed: Vec<RemovedOutlier>,
    pub num_contributing_analyzers: usize,
}

impl AnalysisRecord {
    /// Valid "not analyzed" record: no backend produced an estimate
    pub fn not_analyzed(property: Property) -> Self {
        Self {
            property,
            final_value: None,
            confidence: None,
            agreement_level: AgreementLevel::None,
            agreement_metric: None,
            all_estimates: Vec::new(),
            outliers_removed: Vec::new(),
            num_contributing_analyzers: 0,
        }
    }

    pub fn is_analyzed(&self) -> bool {
        self.agreement_level != AgreementLevel::None
    }

    /// Estimates that contributed to `final_value`, in arrival order
    pub fn surviving_estimates(&self) -> Vec<&Estimate> {
        self.all_estimates
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.outliers_removed.iter().any(|r| r.position == *i))
            .map(|(_, e)| e)
            .collect()
    }

    /// Check the record invariants
    pub fn check_invariants(&self) -> Result<(), ConsensusError> {
        let violation = |msg: String| Err(ConsensusError::InvariantViolation(msg));

        for removed in &self.outliers_removed {
            match self.all_estimates.get(removed.position) {
                Some(estimate) if *estimate == removed.estimate => {}
                _ => {
                    return violation(format!(
                        "outlier at position {} from '{}' is not in all_estimates",
                        removed.position, removed.estimate.source_id
                    ))
                }
            }
        }

        let mut positions: Vec<usize> = self.outliers_removed.iter().map(|r| r.position).collect();
        positions.sort_unstable();
        positions.dedup();
        if positions.len() != self.outliers_removed.len() {
            return violation("an estimate was removed twice".to_string());
        }

        let survivors = self.all_estimates.len() - self.outliers_removed.len();
        if survivors != self.num_contributing_analyzers {
            return violation(format!(
                "num_contributing_analyzers is {} but {} estimates survived",
                self.num_contributing_analyzers, survivors
            ));
        }
        if !self.all_estimates.is_empty() && survivors == 0 {
            return violation("every estimate was removed".to_string());
        }

        let none = self.agreement_level == AgreementLevel::None;
        if none != (self.num_contributing_analyzers == 0) {
            return violation(format!(
                "agreement_level {} with {} contributing analyzers",
                self.agreement_level, self.num_contributing_analyzers
            ));
        }
        if self.confidence.is_none() != self.all_estimates.is_empty() {
            return violation("confidence must be null exactly when no estimate exists".to_string());
        }
        if self.final_value.is_none() != self.all_estimates.is_empty() {
            return violation("final_value must be null exactly when no estimate exists".to_string());
        }
        if let Some(confidence) = self.confidence {
            if confidence > 100 {
                return violation(format!("confidence {} exceeds 100", confidence));
            }
        }

        // Non-finite floats serialize as null and would not survive storage
        if let Some(EstimateValue::Number(n)) = &self.final_value {
            if !n.is_finite() {
                return violation(format!("final_value {} is not finite", n));
            }
        }
        if let Some(metric) = self.agreement_metric {
            if !metric.is_finite() {
                return violation(format!("agreement_metric {} is not finite", metric));
            }
        }
        for removed in &self.outliers_removed {
            let r = &removed.reason;
            if ![r.deviation, r.median, r.mad, r.threshold].iter().all(|x| x.is_finite()) {
                return violation(format!(
                    "outlier reason at position {} is not finite",
                    removed.position
                ));
            }
        }
        Ok(())
    }
}

/// Assemble an analyzed record and verify it
pub fn assemble(
    property: Property,
    estimates: Vec<Estimate>,
    partition: OutlierPartition,
    final_value: EstimateValue,
    agreement: Agreement,
    confidence: u8,
) -> Result<AnalysisRecord, ConsensusError> {
    let outliers_removed = partition
        .removed
        .into_iter()
        .map(|(position, reason)| {
            estimates
                .get(position)
                .cloned()
                .map(|estimate| RemovedOutlier {
                    position,
                    estimate,
                    reason,
                })
                .ok_or_else(|| {
                    ConsensusError::InvariantViolation(format!(
                        "outlier position {} out of range",
                        position
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let record = AnalysisRecord {
        property,
        final_value: Some(final_value),
        confidence: Some(confidence),
        agreement_level: agreement.level,
        agreement_metric: agreement.metric,
        num_contributing_analyzers: partition.kept.len(),
        all_estimates: estimates,
        outliers_removed,
    };
    record.check_invariants()?;
    Ok(record)
}
