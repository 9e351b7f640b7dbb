//! Confusion-matrix based disparities between true and predicted labels.
//!
//! The positive class is the dataset's favorable label.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::Serialize;

use super::dataset::DatasetMetric;
use super::{ratio, Comparison, MetricReport};
use crate::data::model::{Dataset, GroupRole, Label};
use crate::data::partition::{select, Partition, Selector};
use crate::error::{AuditError, Result};

// ---------------------------------------------------------------------------
// ConfusionMatrix
// ---------------------------------------------------------------------------

/// Weighted 2×2 confusion matrix. Cells are sums of instance weights, so
/// matrices over disjoint partitions combine by addition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positives: f64,
    pub false_positives: f64,
    pub false_negatives: f64,
    pub true_negatives: f64,
}

impl ConfusionMatrix {
    /// Tally a partition. Every record in it must carry a prediction.
    pub fn from_partition(partition: &Partition<'_>, positive: Label) -> Result<Self> {
        partition.require_predictions()?;
        let mut cm = ConfusionMatrix::default();
        for r in partition.iter() {
            let w = r.weight();
            let actual = r.true_label == positive;
            let predicted = r.predicted_label() == Some(positive);
            match (actual, predicted) {
                (true, true) => cm.true_positives += w,
                (false, true) => cm.false_positives += w,
                (true, false) => cm.false_negatives += w,
                (false, false) => cm.true_negatives += w,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> f64 {
        self.true_positives + self.false_positives + self.false_negatives + self.true_negatives
    }

    pub fn accuracy(&self) -> Result<f64> {
        ratio(
            self.true_positives + self.true_negatives,
            self.total(),
            "accuracy",
        )
    }

    pub fn precision(&self) -> Result<f64> {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
            "precision",
        )
    }

    /// True positive rate.
    pub fn recall(&self) -> Result<f64> {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
            "recall",
        )
    }

    pub fn false_positive_rate(&self) -> Result<f64> {
        ratio(
            self.false_positives,
            self.false_positives + self.true_negatives,
            "false_positive_rate",
        )
    }

    pub fn false_negative_rate(&self) -> Result<f64> {
        ratio(
            self.false_negatives,
            self.false_negatives + self.true_positives,
            "false_negative_rate",
        )
    }

    pub fn true_negative_rate(&self) -> Result<f64> {
        ratio(
            self.true_negatives,
            self.true_negatives + self.false_positives,
            "true_negative_rate",
        )
    }

    pub fn error_rate(&self) -> Result<f64> {
        ratio(
            self.false_positives + self.false_negatives,
            self.total(),
            "error_rate",
        )
    }
}

impl Add for ConfusionMatrix {
    type Output = ConfusionMatrix;

    fn add(mut self, rhs: ConfusionMatrix) -> ConfusionMatrix {
        self += rhs;
        self
    }
}

impl AddAssign for ConfusionMatrix {
    fn add_assign(&mut self, rhs: ConfusionMatrix) {
        self.true_positives += rhs.true_positives;
        self.false_positives += rhs.false_positives;
        self.false_negatives += rhs.false_negatives;
        self.true_negatives += rhs.true_negatives;
    }
}

impl Sum for ConfusionMatrix {
    fn sum<I: Iterator<Item = ConfusionMatrix>>(iter: I) -> Self {
        iter.fold(ConfusionMatrix::default(), Add::add)
    }
}

// ---------------------------------------------------------------------------
// Equalized odds
// ---------------------------------------------------------------------------

/// Both gaps the equalized-odds criterion needs small at once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EqualizedOdds {
    /// `FPR_unprivileged − FPR_privileged`
    pub fpr_difference: f64,
    /// `TPR_unprivileged − TPR_privileged`
    pub tpr_difference: f64,
}

impl EqualizedOdds {
    /// `max(|ΔFPR|, |ΔTPR|)`
    pub fn value(&self) -> f64 {
        self.fpr_difference.abs().max(self.tpr_difference.abs())
    }
}

// ---------------------------------------------------------------------------
// ClassificationMetric
// ---------------------------------------------------------------------------

/// Classification metrics for one comparison.
#[derive(Debug, Clone)]
pub struct ClassificationMetric<'a> {
    dataset: &'a Dataset,
    comparison: Comparison,
}

type Rate = fn(&ConfusionMatrix) -> Result<f64>;

impl<'a> ClassificationMetric<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        ClassificationMetric {
            dataset,
            comparison: Comparison::default(),
        }
    }

    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// Weighted confusion matrix of the selected records.
    pub fn confusion_matrix(&self, selector: &Selector) -> Result<ConfusionMatrix> {
        let part = select(self.dataset, selector)?;
        ConfusionMatrix::from_partition(&part, self.dataset.favorable_label())
    }

    /// A rate over a selection; an empty selection is `EmptyGroup`, not a
    /// zero denominator.
    fn rate(&self, selector: &Selector, rate: Rate) -> Result<f64> {
        let cm = self.confusion_matrix(selector)?;
        if cm.total() == 0.0 {
            return Err(AuditError::EmptyGroup(selector.to_string()));
        }
        rate(&cm)
    }

    fn difference(&self, rate: Rate) -> Result<f64> {
        let unpriv = self.rate(&self.comparison.unprivileged, rate)?;
        let priv_ = self.rate(&self.comparison.privileged, rate)?;
        Ok(unpriv - priv_)
    }

    pub fn accuracy(&self, selector: &Selector) -> Result<f64> {
        self.rate(selector, ConfusionMatrix::accuracy)
    }

    pub fn precision(&self, selector: &Selector) -> Result<f64> {
        self.rate(selector, ConfusionMatrix::precision)
    }

    pub fn recall(&self, selector: &Selector) -> Result<f64> {
        self.rate(selector, ConfusionMatrix::recall)
    }

    pub fn false_positive_rate(&self, selector: &Selector) -> Result<f64> {
        self.rate(selector, ConfusionMatrix::false_positive_rate)
    }

    pub fn false_negative_rate(&self, selector: &Selector) -> Result<f64> {
        self.rate(selector, ConfusionMatrix::false_negative_rate)
    }

    pub fn true_negative_rate(&self, selector: &Selector) -> Result<f64> {
        self.rate(selector, ConfusionMatrix::true_negative_rate)
    }

    pub fn error_rate(&self, selector: &Selector) -> Result<f64> {
        self.rate(selector, ConfusionMatrix::error_rate)
    }

    pub fn false_positive_rate_difference(&self) -> Result<f64> {
        self.difference(ConfusionMatrix::false_positive_rate)
    }

    pub fn false_negative_rate_difference(&self) -> Result<f64> {
        self.difference(ConfusionMatrix::false_negative_rate)
    }

    /// TPR gap.
    pub fn equal_opportunity_difference(&self) -> Result<f64> {
        self.difference(ConfusionMatrix::recall)
    }

    pub fn error_rate_difference(&self) -> Result<f64> {
        self.difference(ConfusionMatrix::error_rate)
    }

    pub fn equalized_odds(&self) -> Result<EqualizedOdds> {
        Ok(EqualizedOdds {
            fpr_difference: self.false_positive_rate_difference()?,
            tpr_difference: self.equal_opportunity_difference()?,
        })
    }

    /// `max(|ΔFPR|, |ΔTPR|)`
    pub fn equalized_odds_difference(&self) -> Result<f64> {
        Ok(self.equalized_odds()?.value())
    }

    /// `(ΔFPR + ΔTPR) / 2`
    pub fn average_odds_difference(&self) -> Result<f64> {
        let eo = self.equalized_odds()?;
        Ok((eo.fpr_difference + eo.tpr_difference) / 2.0)
    }

    /// Decision-rate gap; same value as the dataset-level metric.
    pub fn statistical_parity_difference(&self) -> Result<f64> {
        self.dataset_metric().statistical_parity_difference()
    }

    /// Ratio of favorable decision rates.
    pub fn predicted_disparate_impact(&self) -> Result<f64> {
        self.dataset_metric().predicted_disparate_impact()
    }

    fn dataset_metric(&self) -> DatasetMetric<'a> {
        DatasetMetric::new(self.dataset).with_comparison(self.comparison.clone())
    }

    /// Aggregate scores, per-role rates and every cross-group difference.
    pub fn report(&self) -> MetricReport {
        let mut report = MetricReport::new();

        report.insert("accuracy", self.accuracy(&Selector::All));
        report.insert("precision", self.precision(&Selector::All));
        report.insert("recall", self.recall(&Selector::All));

        for role in [GroupRole::Privileged, GroupRole::Unprivileged] {
            let sel = Selector::Role(role);
            report.insert(format!("false_positive_rate[{role}]"), self.false_positive_rate(&sel));
            report.insert(format!("false_negative_rate[{role}]"), self.false_negative_rate(&sel));
            report.insert(format!("true_positive_rate[{role}]"), self.recall(&sel));
        }

        report.insert(
            "false_positive_rate_difference",
            self.false_positive_rate_difference(),
        );
        report.insert(
            "false_negative_rate_difference",
            self.false_negative_rate_difference(),
        );
        report.insert(
            "equal_opportunity_difference",
            self.equal_opportunity_difference(),
        );
        report.insert("equalized_odds_difference", self.equalized_odds_difference());
        report.insert("average_odds_difference", self.average_odds_difference());
        report.insert("error_rate_difference", self.error_rate_difference());
        report.insert(
            "statistical_parity_difference",
            self.statistical_parity_difference(),
        );
        report.insert(
            "predicted_disparate_impact",
            self.predicted_disparate_impact(),
        );
        report
    }
}
