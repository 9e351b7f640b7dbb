//! Reweighing: per-instance weights that make group membership and the true
//! label statistically independent under the weighted distribution.
//!
//! For every observed `(group g, label l)` cell with weighted mass `n_gl`,
//! the expected mass under independence is `e_gl = n_g · n_l / n`. Every
//! record in the cell has its weight multiplied by `e_gl / n_gl`, so the
//! weighted cell mass becomes `e_gl` and the total mass `n` is unchanged.
//! When some cell is empty the expected masses of the occupied cells are
//! scaled by `n / Σ e_gl` so the total still holds.
//! On the unit-weight baseline the masses are the literal counts.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::model::{Dataset, Label, Value};
use crate::data::partition::check_groups;
use crate::error::Result;

/// Statistics and weight factor of one `(group, label)` cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellWeight {
    pub group: Value,
    pub label: Label,
    /// Weighted mass observed in the cell at fit time.
    pub observed: f64,
    /// Mass the cell holds after reweighing: the independence expectation,
    /// rescaled when other cells are empty.
    pub expected: f64,
    /// `expected / observed`
    pub factor: f64,
}

/// Weight factors learned from one dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReweighingModel {
    cells: Vec<CellWeight>,
}

/// Entry points of the reweighing engine.
pub struct Reweighing;

impl Reweighing {
    /// Learn the factor of every non-empty cell.
    pub fn fit(dataset: &Dataset) -> Result<ReweighingModel> {
        check_groups(dataset)?;

        let mut by_group: BTreeMap<Value, f64> = BTreeMap::new();
        let mut by_label: BTreeMap<Label, f64> = BTreeMap::new();
        let mut by_cell: BTreeMap<(Value, Label), f64> = BTreeMap::new();
        let mut total = 0.0;

        for r in dataset.records() {
            let w = r.weight();
            let g = r.group.normalized();
            total += w;
            *by_group.entry(g.clone()).or_default() += w;
            *by_label.entry(r.true_label).or_default() += w;
            *by_cell.entry((g, r.true_label)).or_default() += w;
        }

        if total == 0.0 {
            log::warn!("Dataset has no weighted mass; reweighing leaves weights unchanged");
            return Ok(ReweighingModel::default());
        }
        if by_label.values().filter(|&&m| m > 0.0).count() < 2 {
            log::warn!(
                "Only one label value present; group and label are trivially independent and every factor is 1"
            );
        }

        let mut cells: Vec<CellWeight> = by_cell
            .into_iter()
            .filter(|(_, observed)| *observed > 0.0)
            .map(|((group, label), observed)| {
                let expected = by_group[&group] * by_label[&label] / total;
                CellWeight {
                    factor: expected / observed,
                    group,
                    label,
                    observed,
                    expected,
                }
            })
            .collect();

        // Expected mass of empty cells has no records to land on; spread it
        // over the occupied cells so the total mass stays `n`.
        let labels = by_label.values().filter(|&&m| m > 0.0).count();
        let empty = by_group.len() * labels - cells.len();
        if empty > 0 {
            let covered: f64 = cells.iter().map(|c| c.expected).sum();
            let scale = total / covered;
            log::debug!("{empty} empty cells; scaling expected masses by {scale:.4}");
            for c in &mut cells {
                c.expected *= scale;
                c.factor = c.expected / c.observed;
            }
        }

        for c in &cells {
            log::debug!(
                "cell (group={}, label={}): observed {:.4}, expected {:.4}, factor {:.4}",
                c.group,
                c.label,
                c.observed,
                c.expected,
                c.factor
            );
        }

        Ok(ReweighingModel { cells })
    }

    /// Fit on `dataset` and rescale its own weights.
    pub fn fit_transform(dataset: &mut Dataset) -> Result<ReweighingModel> {
        let model = Reweighing::fit(dataset)?;
        model.transform(dataset)?;
        Ok(model)
    }
}

impl ReweighingModel {
    pub fn cells(&self) -> &[CellWeight] {
        &self.cells
    }

    /// Factor for a cell, if it was observed at fit time.
    pub fn factor(&self, group: &Value, label: Label) -> Option<f64> {
        let key = group.normalized();
        self.cells
            .iter()
            .find(|c| c.group == key && c.label == label)
            .map(|c| c.factor)
    }

    /// Multiply every record's weight by its cell factor.
    ///
    /// All factors are resolved before the first weight is written. A
    /// record whose cell was not seen at fit time keeps its weight.
    pub fn transform(&self, dataset: &mut Dataset) -> Result<()> {
        check_groups(dataset)?;

        let factors: Vec<Option<f64>> = dataset
            .records()
            .iter()
            .map(|r| self.factor(&r.group, r.true_label))
            .collect();

        let unseen = factors.iter().filter(|f| f.is_none()).count();
        if unseen > 0 {
            log::warn!("{unseen} records fall in cells unseen at fit time; their weights are kept");
        }

        for (rec, factor) in dataset.records_mut().iter_mut().zip(factors) {
            if let Some(f) = factor {
                rec.scale_weight(f);
            }
        }
        log::info!(
            "Reweighed {} records across {} cells",
            dataset.len(),
            self.cells.len()
        );
        Ok(())
    }
}
