//! Multi-Analyzer Consensus & Confidence Engine
//!
//! Reconciles several independent estimates of one audio property into a
//! single value with a calibrated 0-100 confidence and an audit trail.
//!
//! # Pipeline
//! ```text
//! estimates ─► validate ─► Outlier Filter ─► Consensus Aggregator
//!                                 │                  │
//!                                 ▼                  ▼
//!                          Agreement Classifier ─► Confidence Scorer
//!                                                    │
//!                                                    ▼
//!                                        Analysis Record Builder
//! ```
//!
//! The engine is pure and synchronous: no I/O, no shared state, identical
//! inputs always give identical records. Runs for different samples or
//! properties may execute concurrently without coordination.

pub mod aggregator;
pub mod agreement;
pub mod confidence;
pub mod estimate;
pub mod outlier;
pub mod policy;
pub mod property;
pub mod record;
pub mod validation;

pub use agreement::{Agreement, AgreementLevel};
pub use estimate::{Estimate, EstimateValue, Property, UnknownProperty, ValueKind};
pub use outlier::{OutlierReason, OutlierRule};
pub use policy::{ConsensusPolicy, PolicyError};
pub use property::{kind_of, CategoricalKind, NumericKind, PropertyKind};
pub use record::{AnalysisRecord, RemovedOutlier};
pub use validation::{ConsensusError, ValidationFailure, ValidationReason};

use tracing::debug;

/// Consensus engine bound to one policy
#[derive(Debug, Clone, Default)]
pub struct ConsensusEngine {
    policy: ConsensusPolicy,
}

impl ConsensusEngine {
    /// Create an engine; the policy must already be validated
    pub fn new(policy: ConsensusPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ConsensusPolicy {
        &self.policy
    }

    /// Build the analysis record for one property
    ///
    /// An empty estimate set is not an error: it yields the "not analyzed"
    /// record (`final_value`/`confidence` null, agreement `none`).
    ///
    /// # Errors
    /// `ConsensusError::Validation` identifying the first malformed estimate.
    pub fn build_analysis(
        &self,
        property: Property,
        estimates: Vec<Estimate>,
    ) -> Result<AnalysisRecord, ConsensusError> {
        let kind = kind_of(property);
        validation::validate_estimates(&estimates, kind)?;

        if estimates.is_empty() {
            debug!(%property, "No estimates; recording as not analyzed");
            return Ok(AnalysisRecord::not_analyzed(property));
        }

        let partition = kind.filter_outliers(&estimates, &self.policy);
        if !partition.removed.is_empty() {
            debug!(
                %property,
                removed = partition.removed.len(),
                kept = partition.kept.len(),
                "Outliers removed before aggregation"
            );
        }

        let kept: Vec<&Estimate> = partition.kept.iter().map(|&i| &estimates[i]).collect();

        let final_value = kind.aggregate(&kept).ok_or_else(|| {
            ConsensusError::InvariantViolation(format!(
                "no surviving estimates for {} out of {}",
                property,
                estimates.len()
            ))
        })?;

        let agreement = kind.classify_agreement(&kept, &final_value, &self.policy);

        let confidences: Vec<f64> = kept.iter().map(|e| e.self_confidence).collect();
        let breakdown = confidence::score(&confidences, agreement.level, &self.policy);

        debug!(
            %property,
            %final_value,
            agreement = %agreement.level,
            base = breakdown.base,
            multiplier = breakdown.multiplier,
            bonus = breakdown.bonus,
            confidence = breakdown.score,
            "Consensus reached"
        );

        record::assemble(
            property,
            estimates,
            partition,
            final_value,
            agreement,
            breakdown.score,
        )
    }
}

/// Build an analysis record with the default policy
pub fn build_analysis(
    property: Property,
    estimates: Vec<Estimate>,
) -> Result<AnalysisRecord, ConsensusError> {
    ConsensusEngine::default().build_analysis(property, estimates)
}
