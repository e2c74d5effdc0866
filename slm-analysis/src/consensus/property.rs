//! Numeric / categorical strategies
//!
//! Each [`PropertyKind`] supplies its own value check, outlier rule,
//! aggregation rule and agreement rule, so the engine never branches on the
//! property type itself.

use super::agreement::{self, Agreement};
use super::aggregator;
use super::outlier::{self, OutlierPartition};
use super::validation::ValidationReason;
use super::{ConsensusPolicy, Estimate, EstimateValue, Property, ValueKind};

/// Per-kind consensus rules
pub trait PropertyKind: Send + Sync {
    fn value_kind(&self) -> ValueKind;

    /// Reject values of the wrong kind or malformed values
    fn check_value(&self, value: &EstimateValue) -> Result<(), ValidationReason>;

    /// Partition validated estimates into kept and removed
    fn filter_outliers(&self, estimates: &[Estimate], policy: &ConsensusPolicy) -> OutlierPartition;

    /// Reconcile survivors into one value; `None` only for an empty `kept`
    fn aggregate(&self, kept: &[&Estimate]) -> Option<EstimateValue>;

    /// Summarize how tightly `kept` clustered around `final_value`
    fn classify_agreement(
        &self,
        kept: &[&Estimate],
        final_value: &EstimateValue,
        policy: &ConsensusPolicy,
    ) -> Agreement;
}

/// Strategy for a property
pub fn kind_of(property: Property) -> &'static dyn PropertyKind {
    match property.value_kind() {
        ValueKind::Numeric => &NumericKind,
        ValueKind::Categorical => &CategoricalKind,
    }
}

fn kind_of_value(value: &EstimateValue) -> ValueKind {
    match value {
        EstimateValue::Number(_) => ValueKind::Numeric,
        EstimateValue::Label(_) => ValueKind::Categorical,
    }
}

/// Numeric properties: MAD filter, weighted mean, coefficient of variation
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericKind;

impl NumericKind {
    // Non-numeric values are rejected by check_value before reaching here
    fn numbers<'a>(estimates: impl Iterator<Item = &'a Estimate>) -> Vec<f64> {
        estimates.filter_map(|e| e.value.as_number()).collect()
    }
}

impl PropertyKind for NumericKind {
    fn value_kind(&self) -> ValueKind {
        ValueKind::Numeric
    }

    fn check_value(&self, value: &EstimateValue) -> Result<(), ValidationReason> {
        match value {
            EstimateValue::Number(n) if !n.is_finite() => Err(ValidationReason::NonFiniteValue(*n)),
            EstimateValue::Number(_) => Ok(()),
            other => Err(ValidationReason::KindMismatch {
                expected: ValueKind::Numeric,
                actual: kind_of_value(other),
            }),
        }
    }

    fn filter_outliers(&self, estimates: &[Estimate], policy: &ConsensusPolicy) -> OutlierPartition {
        let values = Self::numbers(estimates.iter());
        outlier::filter_outliers(&values, policy)
    }

    fn aggregate(&self, kept: &[&Estimate]) -> Option<EstimateValue> {
        let samples: Vec<(f64, f64)> = kept
            .iter()
            .filter_map(|e| e.value.as_number().map(|v| (v, e.self_confidence)))
            .collect();
        aggregator::weighted_mean(&samples).map(EstimateValue::Number)
    }

    fn classify_agreement(
        &self,
        kept: &[&Estimate],
        final_value: &EstimateValue,
        policy: &ConsensusPolicy,
    ) -> Agreement {
        let values = Self::numbers(kept.iter().copied());
        let center = final_value.as_number().unwrap_or(0.0);
        agreement::classify_numeric(&values, center, policy)
    }
}

/// Categorical properties: no outlier removal, weighted vote, vote share
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoricalKind;

impl CategoricalKind {
    fn ballots<'a>(kept: &[&'a Estimate]) -> Vec<(&'a str, f64)> {
        kept.iter()
            .copied()
            .filter_map(|e| e.value.as_label().map(|l| (l, e.self_confidence)))
            .collect()
    }
}

impl PropertyKind for CategoricalKind {
    fn value_kind(&self) -> ValueKind {
        ValueKind::Categorical
    }

    fn check_value(&self, value: &EstimateValue) -> Result<(), ValidationReason> {
        match value {
            EstimateValue::Label(label) if label.trim().is_empty() => Err(ValidationReason::EmptyLabel),
            EstimateValue::Label(_) => Ok(()),
            other => Err(ValidationReason::KindMismatch {
                expected: ValueKind::Categorical,
                actual: kind_of_value(other),
            }),
        }
    }

    fn filter_outliers(&self, estimates: &[Estimate], _policy: &ConsensusPolicy) -> OutlierPartition {
        OutlierPartition::keep_all(estimates.len())
    }

    fn aggregate(&self, kept: &[&Estimate]) -> Option<EstimateValue> {
        aggregator::weighted_vote(&Self::ballots(kept)).map(|tally| EstimateValue::Label(tally.winner))
    }

    fn classify_agreement(
        &self,
        kept: &[&Estimate],
        _final_value: &EstimateValue,
        policy: &ConsensusPolicy,
    ) -> Agreement {
        match aggregator::weighted_vote(&Self::ballots(kept)) {
            Some(tally) => agreement::classify_categorical(&tally, kept.len(), policy),
            None => Agreement::single_survivor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_dispatch() {
        assert_eq!(kind_of(Property::Tempo).value_kind(), ValueKind::Numeric);
        assert_eq!(kind_of(Property::Genre).value_kind(), ValueKind::Categorical);
    }

    #[test]
    fn test_numeric_rejects_label() {
        let err = NumericKind
            .check_value(&EstimateValue::Label("fast".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationReason::KindMismatch {
                expected: ValueKind::Numeric,
                actual: ValueKind::Categorical,
            }
        );
    }

    #[test]
    fn test_numeric_rejects_nan() {
        assert!(matches!(
            NumericKind.check_value(&EstimateValue::Number(f64::NAN)),
            Err(ValidationReason::NonFiniteValue(_))
        ));
    }

    #[test]
    fn test_categorical_rejects_number_and_blank() {
        assert!(CategoricalKind.check_value(&EstimateValue::Number(1.0)).is_err());
        assert_eq!(
            CategoricalKind.check_value(&EstimateValue::Label("  ".to_string())),
            Err(ValidationReason::EmptyLabel)
        );
    }

    #[test]
    fn test_categorical_never_filters() {
        let estimates = vec![
            Estimate::label("house", 0.9, "a"),
            Estimate::label("house", 0.8, "b"),
            Estimate::label("polka", 0.1, "c"),
        ];
        let partition = CategoricalKind.filter_outliers(&estimates, &ConsensusPolicy::default());
        assert_eq!(partition.kept, vec![0, 1, 2]);
    }
}
