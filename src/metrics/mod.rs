//! Fairness metrics over a [`Dataset`](crate::data::model::Dataset).
//!
//! Two calculators share one comparison model: an unprivileged selector is
//! compared against a privileged reference, and every difference is
//! `unprivileged − privileged`.
//!
//! - [`dataset::DatasetMetric`]: label-distribution disparities
//! - [`classification::ClassificationMetric`]: confusion-matrix disparities
//!
//! Each metric is a plain `Result<f64, AuditError>`. [`MetricReport`] turns
//! a batch of them into named [`MetricOutcome`]s so that one failed metric
//! never hides the others.

pub mod classification;
pub mod dataset;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::data::model::GroupRole;
use crate::data::partition::Selector;
use crate::error::{AuditError, Result};

pub use classification::{ClassificationMetric, ConfusionMatrix, EqualizedOdds};
pub use dataset::DatasetMetric;

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// The two sides a difference or ratio is taken between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub unprivileged: Selector,
    pub privileged: Selector,
}

impl Default for Comparison {
    fn default() -> Self {
        Comparison {
            unprivileged: Selector::Role(GroupRole::Unprivileged),
            privileged: Selector::Role(GroupRole::Privileged),
        }
    }
}

impl Comparison {
    /// Compare one group value against the whole privileged role.
    pub fn group_vs_privileged(group: crate::data::model::Value) -> Self {
        Comparison {
            unprivileged: Selector::Group(group),
            ..Comparison::default()
        }
    }
}

/// `num / den`, or `UndefinedRate` when the denominator is zero.
pub(crate) fn ratio(num: f64, den: f64, rate: &'static str) -> Result<f64> {
    if den == 0.0 {
        Err(AuditError::UndefinedRate { rate })
    } else {
        Ok(num / den)
    }
}

// ---------------------------------------------------------------------------
// Outcomes and reports
// ---------------------------------------------------------------------------

/// Reported state of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    /// A defined value.
    Value { value: f64 },
    /// A numeric degeneracy (empty group, zero denominator); reads as NaN.
    Undefined { reason: String },
    /// A structural failure (unknown group, missing predictions).
    Failed { error: String },
}

impl From<Result<f64>> for MetricOutcome {
    fn from(result: Result<f64>) -> Self {
        match result {
            Ok(value) => MetricOutcome::Value { value },
            Err(e) if e.is_degenerate() => MetricOutcome::Undefined {
                reason: e.to_string(),
            },
            Err(e) => MetricOutcome::Failed {
                error: e.to_string(),
            },
        }
    }
}

impl MetricOutcome {
    /// The value, or NaN when the metric is undefined or failed.
    pub fn value(&self) -> f64 {
        match self {
            MetricOutcome::Value { value } => *value,
            _ => f64::NAN,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, MetricOutcome::Value { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, MetricOutcome::Failed { .. })
    }
}

impl fmt::Display for MetricOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricOutcome::Value { value } => write!(f, "{value:.4}"),
            MetricOutcome::Undefined { reason } => write!(f, "NaN ({reason})"),
            MetricOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Metric name → outcome, in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricReport {
    outcomes: BTreeMap<String, MetricOutcome>,
}

/// One metric before and after a mitigation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDelta {
    pub name: String,
    pub before: f64,
    pub after: f64,
}

impl MetricReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, result: Result<f64>) {
        self.outcomes.insert(name.into(), MetricOutcome::from(result));
    }

    pub fn get(&self, name: &str) -> Option<&MetricOutcome> {
        self.outcomes.get(name)
    }

    /// Value of `name`, NaN when absent, undefined or failed.
    pub fn value(&self, name: &str) -> f64 {
        self.get(name).map_or(f64::NAN, MetricOutcome::value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricOutcome)> {
        self.outcomes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn extend(&mut self, other: MetricReport) {
        self.outcomes.extend(other.outcomes);
    }

    /// Pair every metric present in both reports.
    pub fn diff(&self, after: &MetricReport) -> Vec<MetricDelta> {
        self.outcomes
            .iter()
            .filter_map(|(name, before)| {
                after.get(name).map(|a| MetricDelta {
                    name: name.clone(),
                    before: before.value(),
                    after: a.value(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
