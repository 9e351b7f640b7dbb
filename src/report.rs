//! Audit report: every metric before and after reweighing, per-group
//! summaries and a severity band for each headline bias metric.

use std::fmt;

use serde::Serialize;

use crate::config::Thresholds;
use crate::data::model::{Dataset, GroupRole, Label, Value};
use crate::data::partition::{partition_by_group, LabelSource};
use crate::error::Result;
use crate::metrics::{
    ClassificationMetric, ConfusionMatrix, DatasetMetric, MetricDelta, MetricOutcome, MetricReport,
};
use crate::reweigh::{CellWeight, Reweighing};

// ---------------------------------------------------------------------------
// Severity bands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasLevel {
    Low,
    Moderate,
    High,
}

impl fmt::Display for BiasLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiasLevel::Low => write!(f, "LOW"),
            BiasLevel::Moderate => write!(f, "MODERATE"),
            BiasLevel::High => write!(f, "HIGH"),
        }
    }
}

impl Thresholds {
    /// Band of a signed difference; `None` for NaN.
    pub fn classify_difference(&self, value: f64) -> Option<BiasLevel> {
        if value.is_nan() {
            return None;
        }
        let v = value.abs();
        Some(if v > self.high_bias {
            BiasLevel::High
        } else if v > self.moderate_bias {
            BiasLevel::Moderate
        } else {
            BiasLevel::Low
        })
    }

    /// Band of a disparate impact ratio. Outside `[low, high]` is always
    /// high; inside, the deviation from 1 is banded like a difference.
    pub fn classify_disparate_impact(&self, value: f64) -> Option<BiasLevel> {
        if value.is_nan() {
            return None;
        }
        if value < self.disparate_impact_low || value > self.disparate_impact_high {
            Some(BiasLevel::High)
        } else {
            self.classify_difference(value - 1.0)
        }
    }
}

/// One headline metric with its band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiasFinding {
    pub metric: String,
    pub value: f64,
    pub level: Option<BiasLevel>,
}

// ---------------------------------------------------------------------------
// Report sections
// ---------------------------------------------------------------------------

/// Counts and rates for one group value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: Value,
    pub role: Option<GroupRole>,
    pub count: usize,
    pub weight: f64,
    pub base_rate: MetricOutcome,
    pub confusion: Option<ConfusionMatrix>,
    pub false_positive_rate: Option<MetricOutcome>,
}

/// Result of reweighing the audited dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mitigation {
    pub cells: Vec<CellWeight>,
    pub dataset_metrics: MetricReport,
    pub deltas: Vec<MetricDelta>,
    /// `|mean_difference before| − |mean_difference after|`
    pub bias_reduction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub samples: usize,
    pub favorable_label: Label,
    pub groups: Vec<GroupSummary>,
    pub dataset_metrics: MetricReport,
    pub classification_metrics: Option<MetricReport>,
    pub findings: Vec<BiasFinding>,
    pub mitigation: Option<Mitigation>,
    /// Why reweighing could not run, when it was attempted and failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigation_error: Option<String>,
}

const HEADLINE_DIFFERENCES: [&str; 4] = [
    "mean_difference",
    "statistical_parity_difference",
    "false_positive_rate_difference",
    "equal_opportunity_difference",
];

impl AuditReport {
    /// Compute every metric on the dataset as it stands. Individual
    /// metrics that fail are recorded as such; building never fails.
    pub fn build(dataset: &Dataset, thresholds: &Thresholds) -> Self {
        let dataset_metrics = DatasetMetric::new(dataset).report();
        let classification_metrics = dataset
            .has_predictions()
            .then(|| ClassificationMetric::new(dataset).report());

        let groups = match group_summaries(dataset) {
            Ok(groups) => groups,
            Err(e) => {
                log::warn!("Skipping per-group summary: {e}");
                Vec::new()
            }
        };

        let lookup = |name: &str| -> f64 {
            classification_metrics
                .as_ref()
                .and_then(|m| m.get(name))
                .or_else(|| dataset_metrics.get(name))
                .map_or(f64::NAN, MetricOutcome::value)
        };

        let mut findings: Vec<BiasFinding> = HEADLINE_DIFFERENCES
            .iter()
            .map(|&name| {
                let value = lookup(name);
                BiasFinding {
                    metric: name.to_string(),
                    value,
                    level: thresholds.classify_difference(value),
                }
            })
            .collect();
        let di = dataset_metrics.value("disparate_impact");
        findings.insert(
            1,
            BiasFinding {
                metric: "disparate_impact".to_string(),
                value: di,
                level: thresholds.classify_disparate_impact(di),
            },
        );

        AuditReport {
            samples: dataset.len(),
            favorable_label: dataset.favorable_label(),
            groups,
            dataset_metrics,
            classification_metrics,
            findings,
            mitigation: None,
            mitigation_error: None,
        }
    }

    /// Reweigh `dataset` in place and record the post-reweighing metrics.
    /// On failure the error is noted in the report and the metrics computed
    /// by `build` are kept.
    pub fn mitigate(&mut self, dataset: &mut Dataset) -> Result<()> {
        let model = match Reweighing::fit_transform(dataset) {
            Ok(model) => model,
            Err(e) => {
                self.mitigation = None;
                self.mitigation_error = Some(e.to_string());
                return Err(e);
            }
        };
        self.mitigation_error = None;
        let after = DatasetMetric::new(dataset).report();
        let before_md = self.dataset_metrics.value("mean_difference");
        let after_md = after.value("mean_difference");

        self.mitigation = Some(Mitigation {
            cells: model.cells().to_vec(),
            deltas: self.dataset_metrics.diff(&after),
            dataset_metrics: after,
            bias_reduction: before_md.abs() - after_md.abs(),
        });
        Ok(())
    }

    /// The most severe band across findings.
    pub fn worst_level(&self) -> Option<BiasLevel> {
        self.findings.iter().filter_map(|f| f.level).max()
    }
}

fn group_summaries(dataset: &Dataset) -> Result<Vec<GroupSummary>> {
    let positive = dataset.favorable_label();
    let with_predictions = dataset.has_predictions();

    Ok(partition_by_group(dataset)?
        .into_iter()
        .map(|(group, part)| {
            let confusion = with_predictions
                .then(|| ConfusionMatrix::from_partition(&part, positive).ok())
                .flatten();
            GroupSummary {
                role: dataset.groups().role_of(&group),
                count: part.len(),
                weight: part.total_weight(),
                base_rate: part.favorable_rate(LabelSource::True).into(),
                false_positive_rate: confusion.map(|cm| cm.false_positive_rate().into()),
                confusion,
                group,
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Console rendering
// ---------------------------------------------------------------------------

fn write_metrics(f: &mut fmt::Formatter<'_>, report: &MetricReport) -> fmt::Result {
    for (name, outcome) in report.iter() {
        writeln!(f, "  {name:<40} {outcome}")?;
    }
    Ok(())
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Dataset Overview ===")?;
        writeln!(f, "Total samples: {}", self.samples)?;
        writeln!(f, "Favorable label: {}", self.favorable_label)?;
        writeln!(f, "Group distribution:")?;
        for g in &self.groups {
            let role = g.role.map_or("unmapped".to_string(), |r| r.to_string());
            writeln!(
                f,
                "  {} ({role}): {} records, favorable rate {}",
                g.group, g.count, g.base_rate
            )?;
        }

        writeln!(f, "\n=== Bias Analysis ===")?;
        write_metrics(f, &self.dataset_metrics)?;

        if let Some(cm) = &self.classification_metrics {
            writeln!(f, "\n=== Classification Metrics ===")?;
            write_metrics(f, cm)?;

            writeln!(f, "\n=== Confusion Matrices (weighted) ===")?;
            for g in &self.groups {
                if let Some(c) = &g.confusion {
                    writeln!(
                        f,
                        "  {:<16} TP {:>9.2}  FP {:>9.2}  FN {:>9.2}  TN {:>9.2}",
                        g.group.to_string(),
                        c.true_positives,
                        c.false_positives,
                        c.false_negatives,
                        c.true_negatives
                    )?;
                }
            }
        }

        writeln!(f, "\n=== Bias Summary ===")?;
        for finding in &self.findings {
            let level = finding
                .level
                .map_or("UNDEFINED".to_string(), |l| l.to_string());
            writeln!(f, "  {:<40} {:>8.4}  {level}", finding.metric, finding.value)?;
        }

        if let Some(m) = &self.mitigation {
            writeln!(f, "\n=== Bias Mitigation (reweighing) ===")?;
            for c in &m.cells {
                writeln!(
                    f,
                    "  group {} label {}: weight x{:.4} (observed {:.2}, expected {:.2})",
                    c.group, c.label, c.factor, c.observed, c.expected
                )?;
            }
            for d in &m.deltas {
                writeln!(
                    f,
                    "  {:<40} {:>8.4} -> {:>8.4}",
                    d.name, d.before, d.after
                )?;
            }
            writeln!(f, "\n=== Summary ===")?;
            if let Some(d) = m.deltas.iter().find(|d| d.name == "mean_difference") {
                writeln!(f, "Original dataset bias (mean difference): {:.4}", d.before)?;
                writeln!(f, "After reweighing bias (mean difference): {:.4}", d.after)?;
            }
            writeln!(f, "Bias reduction: {:.4}", m.bias_reduction)?;
        }
        if let Some(e) = &self.mitigation_error {
            writeln!(f, "\n=== Bias Mitigation (reweighing) ===")?;
            writeln!(f, "  Reweighing failed: {e}")?;
        }
        Ok(())
    }
}
