//! Label-distribution disparities.
//!
//! `base_rate` and everything derived from it read `true_label` only; the
//! `selection_rate` family reads `predicted_label`. The two are kept under
//! separate names because they measure different things: bias already in
//! the labels versus bias in the decisions.

use super::{ratio, Comparison, MetricReport};
use crate::data::model::Dataset;
use crate::data::partition::{select, LabelSource, Selector};
use crate::error::Result;

/// Dataset-level metrics for one comparison.
///
/// # Example
///
/// ```
/// use bias_audit::data::model::{Dataset, GroupDefinition, Label, Record, Value};
/// use bias_audit::metrics::DatasetMetric;
///
/// let groups = GroupDefinition::from_roles([Value::from("p")], [Value::from("u")]).unwrap();
/// let records = vec![
///     Record::new("p", Label::One),
///     Record::new("p", Label::Zero),
///     Record::new("u", Label::Zero),
///     Record::new("u", Label::Zero),
/// ];
/// let ds = Dataset::new(records, Label::One, groups);
///
/// let metric = DatasetMetric::new(&ds);
/// assert_eq!(metric.mean_difference().unwrap(), -0.5);
/// assert_eq!(metric.disparate_impact().unwrap(), 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct DatasetMetric<'a> {
    dataset: &'a Dataset,
    comparison: Comparison,
}

impl<'a> DatasetMetric<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        DatasetMetric {
            dataset,
            comparison: Comparison::default(),
        }
    }

    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// Weighted mass of the selected records.
    pub fn num_instances(&self, selector: &Selector) -> Result<f64> {
        Ok(select(self.dataset, selector)?.total_weight())
    }

    /// Weighted mass of selected records with a favorable true label.
    pub fn num_positives(&self, selector: &Selector) -> Result<f64> {
        select(self.dataset, selector)?.favorable_mass(LabelSource::True)
    }

    /// `P(true_label == favorable)` within the selection.
    pub fn base_rate(&self, selector: &Selector) -> Result<f64> {
        select(self.dataset, selector)?.favorable_rate(LabelSource::True)
    }

    /// `P(predicted_label == favorable)` within the selection.
    pub fn selection_rate(&self, selector: &Selector) -> Result<f64> {
        select(self.dataset, selector)?.favorable_rate(LabelSource::Predicted)
    }

    fn rates(&self, source: LabelSource) -> Result<(f64, f64)> {
        let unpriv = select(self.dataset, &self.comparison.unprivileged)?.favorable_rate(source)?;
        let priv_ = select(self.dataset, &self.comparison.privileged)?.favorable_rate(source)?;
        Ok((unpriv, priv_))
    }

    /// `P_unprivileged − P_privileged` on true labels. 0 is fair.
    pub fn mean_difference(&self) -> Result<f64> {
        let (u, p) = self.rates(LabelSource::True)?;
        Ok(u - p)
    }

    /// `P_unprivileged / P_privileged` on true labels. 1 is fair.
    pub fn disparate_impact(&self) -> Result<f64> {
        let (u, p) = self.rates(LabelSource::True)?;
        ratio(u, p, "disparate_impact")
    }

    /// `mean_difference` computed on predicted labels.
    pub fn statistical_parity_difference(&self) -> Result<f64> {
        let (u, p) = self.rates(LabelSource::Predicted)?;
        Ok(u - p)
    }

    /// `disparate_impact` computed on predicted labels.
    pub fn predicted_disparate_impact(&self) -> Result<f64> {
        let (u, p) = self.rates(LabelSource::Predicted)?;
        ratio(u, p, "disparate_impact")
    }

    /// The three headline label metrics. `statistical_parity_difference`
    /// shows up as a failure when predictions are absent.
    pub fn report(&self) -> MetricReport {
        let mut report = MetricReport::new();
        report.insert("mean_difference", self.mean_difference());
        report.insert("disparate_impact", self.disparate_impact());
        report.insert(
            "statistical_parity_difference",
            self.statistical_parity_difference(),
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{GroupDefinition, GroupRole, Label, Record, Value};
    use crate::error::AuditError;
    use crate::metrics::MetricOutcome;

    fn groups() -> GroupDefinition {
        GroupDefinition::from_roles([Value::Integer(1)], [Value::Integer(0)]).unwrap()
    }

    fn scenario_a() -> Dataset {
        let labels = [(1, 1), (1, 1), (1, 0), (1, 0), (0, 1), (0, 0), (0, 0), (0, 0)];
        let records = labels
            .iter()
            .map(|&(g, l): &(i64, u8)| Record::new(g, Label::from(l == 1)))
            .collect();
        Dataset::new(records, Label::One, groups())
    }

    #[test]
    fn base_rates_per_role() {
        let ds = scenario_a();
        let m = DatasetMetric::new(&ds);
        assert_eq!(m.base_rate(&Selector::Role(GroupRole::Privileged)).unwrap(), 0.5);
        assert_eq!(m.base_rate(&Selector::Role(GroupRole::Unprivileged)).unwrap(), 0.25);
        assert_eq!(m.base_rate(&Selector::All).unwrap(), 0.375);
        assert_eq!(m.num_positives(&Selector::All).unwrap(), 3.0);
        assert_eq!(m.num_instances(&Selector::All).unwrap(), 8.0);
    }

    #[test]
    fn favorable_zero_flips_the_rates() {
        let ds = scenario_a();
        let ds = Dataset::new(ds.records().to_vec(), Label::Zero, groups());
        let m = DatasetMetric::new(&ds);
        assert_eq!(m.mean_difference().unwrap(), 0.25);
        assert_eq!(m.disparate_impact().unwrap(), 1.5);
    }

    #[test]
    fn disparate_impact_undefined_when_privileged_rate_is_zero() {
        let records = vec![Record::new(1i64, Label::Zero), Record::new(0i64, Label::One)];
        let ds = Dataset::new(records, Label::One, groups());
        let m = DatasetMetric::new(&ds);
        assert_eq!(
            m.disparate_impact(),
            Err(AuditError::UndefinedRate { rate: "disparate_impact" })
        );
        assert_eq!(m.mean_difference().unwrap(), 1.0);
    }

    #[test]
    fn report_survives_missing_predictions() {
        let ds = scenario_a();
        let report = DatasetMetric::new(&ds).report();
        assert_eq!(report.value("mean_difference"), -0.25);
        assert_eq!(report.value("disparate_impact"), 0.5);
        assert!(matches!(
            report.get("statistical_parity_difference"),
            Some(MetricOutcome::Failed { .. })
        ));
    }

    #[test]
    fn statistical_parity_reads_predictions_not_labels() {
        let mut ds = scenario_a();
        // every prediction favorable: no decision disparity, label disparity remains
        ds.attach_predictions(&[Label::One; 8]).unwrap();
        let m = DatasetMetric::new(&ds);
        assert_eq!(m.statistical_parity_difference().unwrap(), 0.0);
        assert_eq!(m.mean_difference().unwrap(), -0.25);
        assert_eq!(m.predicted_disparate_impact().unwrap(), 1.0);
    }
}
