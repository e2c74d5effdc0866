//! Boundary validation of analyzer estimates
//!
//! Malformed estimates are rejected, never clamped or coerced: a silently
//! repaired value would misrepresent what the analyzer actually said in the
//! audit trail.

use super::{Estimate, PropertyKind, ValueKind};
use thiserror::Error;

/// What is wrong with an estimate
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationReason {
    #[error("self_confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("numeric value {0} is not finite")]
    NonFiniteValue(f64),

    #[error("expected a {expected:?} value, got {actual:?}")]
    KindMismatch { expected: ValueKind, actual: ValueKind },

    #[error("categorical label is empty")]
    EmptyLabel,

    #[error("source_id is empty")]
    EmptySourceId,
}

/// A rejected estimate, identified by position and source
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Estimate #{index} from '{source_id}' rejected: {reason}")]
pub struct ValidationFailure {
    /// Position in the submitted estimate sequence
    pub index: usize,
    pub source_id: String,
    pub reason: ValidationReason,
}

/// Engine errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsensusError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// A record failed its own invariants; indicates a bug, never bad input
    #[error("Analysis record invariant violated: {0}")]
    InvariantViolation(String),
}

/// Validate every estimate, stopping at the first malformed one
pub fn validate_estimates(
    estimates: &[Estimate],
    kind: &dyn PropertyKind,
) -> Result<(), ValidationFailure> {
    for (index, estimate) in estimates.iter().enumerate() {
        validate_estimate(estimate, kind).map_err(|reason| ValidationFailure {
            index,
            source_id: estimate.source_id.clone(),
            reason,
        })?;
    }
    Ok(())
}

fn validate_estimate(estimate: &Estimate, kind: &dyn PropertyKind) -> Result<(), ValidationReason> {
    if estimate.source_id.trim().is_empty() {
        return Err(ValidationReason::EmptySourceId);
    }
    // NaN fails the range check as well
    if !(0.0..=1.0).contains(&estimate.self_confidence) {
        return Err(ValidationReason::ConfidenceOutOfRange(estimate.self_confidence));
    }
    kind.check_value(&estimate.value)
}
