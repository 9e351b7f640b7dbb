//! Error taxonomy for the metrics and reweighing core.

use thiserror::Error;

use crate::data::model::{GroupRole, Value};

/// Everything that can go wrong inside the core.
///
/// Everything except `EmptyGroup` and `UndefinedRate` is structural: the requested computation cannot be
/// carried out at all. `EmptyGroup` and `UndefinedRate` are numeric
/// degeneracies that a report renders as NaN with a reason.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    #[error("group value {0} is not in the group definition")]
    UnknownGroup(Value),

    #[error("{0} partition has zero weighted mass")]
    EmptyGroup(String),

    #[error("record {index} has no predicted label")]
    MissingPrediction { index: usize },

    #[error("{rate} is undefined: zero denominator")]
    UndefinedRate { rate: &'static str },

    #[error("invalid label {0}: expected 0 or 1")]
    InvalidLabel(String),

    #[error("invalid weight {0}: must be finite and non-negative")]
    InvalidWeight(f64),

    #[error("expected {expected} predicted labels, got {got}")]
    PredictionCount { expected: usize, got: usize },

    #[error("group value {value} cannot be both {existing} and {requested}")]
    ConflictingRole {
        value: Value,
        existing: GroupRole,
        requested: GroupRole,
    },
}

impl AuditError {
    /// True for the expected numeric degeneracies of small or skewed samples.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            AuditError::EmptyGroup(_) | AuditError::UndefinedRate { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
