//! Threshold predictions: label 1 where a numeric feature exceeds a cut
//! point. A stand-in for an upstream classifier when the source data has
//! no prediction column.

use anyhow::{bail, Context, Result};

use crate::config::{Cutoff, PredictionRule};
use crate::data::model::{Dataset, Label};

/// Resolve the cut point of `cutoff` over `values`.
pub fn resolve_cutoff(cutoff: Cutoff, values: &[f64]) -> Result<f64> {
    match cutoff {
        Cutoff::Fixed(t) => Ok(t),
        _ if values.is_empty() => bail!("cannot take a {cutoff:?} cut point of no values"),
        Cutoff::Mean => Ok(values.iter().sum::<f64>() / values.len() as f64),
        Cutoff::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_by(f64::total_cmp);
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                Ok((sorted[mid - 1] + sorted[mid]) / 2.0)
            } else {
                Ok(sorted[mid])
            }
        }
    }
}

/// Predicted labels for every record under `rule`, in record order.
pub fn threshold_predictions(dataset: &Dataset, rule: &PredictionRule) -> Result<(f64, Vec<Label>)> {
    let idx = dataset
        .feature_names()
        .iter()
        .position(|f| *f == rule.feature)
        .with_context(|| format!("no feature column '{}'", rule.feature))?;

    let values = dataset
        .records()
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.features
                .get(idx)
                .and_then(|v| v.as_f64())
                .with_context(|| format!("Row {i}: '{}' is not numeric", rule.feature))
        })
        .collect::<Result<Vec<f64>>>()?;

    let threshold = resolve_cutoff(rule.cutoff, &values)?;
    let labels = values.iter().map(|&v| Label::from(v > threshold)).collect();
    Ok((threshold, labels))
}

/// Attach threshold predictions to the dataset; returns the cut point used.
pub fn apply_rule(dataset: &mut Dataset, rule: &PredictionRule) -> Result<f64> {
    let (threshold, labels) = threshold_predictions(dataset, rule)?;
    dataset.attach_predictions(&labels)?;
    log::info!(
        "Predicted label 1 where {} > {threshold:.4} ({} of {} records)",
        rule.feature,
        labels.iter().filter(|&&l| l == Label::One).count(),
        labels.len()
    );
    Ok(threshold)
}
