use std::collections::BTreeMap;
use std::fmt;

use super::model::{Dataset, GroupRole, Label, Record, Value};
use crate::error::{AuditError, Result};

// ---------------------------------------------------------------------------
// Selector: which records a partition keeps
// ---------------------------------------------------------------------------

/// Names a subset of the dataset by group membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every record, regardless of group.
    All,
    /// Every record whose group maps to the role.
    Role(GroupRole),
    /// Every record with exactly this group value.
    Group(Value),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => write!(f, "all"),
            Selector::Role(role) => write!(f, "{role}"),
            Selector::Group(v) => write!(f, "group {v}"),
        }
    }
}

/// Which label column a rate is computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    True,
    Predicted,
}

// ---------------------------------------------------------------------------
// Partition: a read-only view into the dataset
// ---------------------------------------------------------------------------

/// Indices of the records a selector keeps. Borrows the dataset, so any
/// weight change made before the partition is built is reflected in it.
#[derive(Debug, Clone)]
pub struct Partition<'a> {
    dataset: &'a Dataset,
    selector: Selector,
    indices: Vec<usize>,
}

impl<'a> Partition<'a> {
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let records = self.dataset.records();
        self.indices.iter().map(move |&i| &records[i])
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.iter().map(|r| r.weight()).fold(0.0, |a, w| a + w)
    }

    /// Sum of weights of the records matching `pred`.
    pub fn weighted_count(&self, pred: impl Fn(&Record) -> bool) -> f64 {
        self.iter()
            .filter(|r| pred(r))
            .map(|r| r.weight())
            .fold(0.0, |a, w| a + w)
    }

    /// Total weight, or `EmptyGroup` when the partition has no mass.
    pub fn mass(&self) -> Result<f64> {
        let total = self.total_weight();
        if total > 0.0 {
            Ok(total)
        } else {
            Err(AuditError::EmptyGroup(self.selector.to_string()))
        }
    }

    /// Fails with `MissingPrediction` on the first record lacking one.
    pub fn require_predictions(&self) -> Result<()> {
        for &i in &self.indices {
            if self.dataset.records()[i].predicted_label().is_none() {
                return Err(AuditError::MissingPrediction { index: i });
            }
        }
        Ok(())
    }

    /// Weighted mass carrying the favorable label in `source`.
    pub fn favorable_mass(&self, source: LabelSource) -> Result<f64> {
        let favorable = self.dataset.favorable_label();
        match source {
            LabelSource::True => Ok(self.weighted_count(|r| r.true_label == favorable)),
            LabelSource::Predicted => {
                self.require_predictions()?;
                Ok(self.weighted_count(|r| r.predicted_label() == Some(favorable)))
            }
        }
    }

    /// Weighted share of the partition carrying the favorable label.
    pub fn favorable_rate(&self, source: LabelSource) -> Result<f64> {
        let hits = self.favorable_mass(source)?;
        Ok(hits / self.mass()?)
    }

    /// Weighted mass of records whose true label equals `label`.
    pub fn label_mass(&self, label: Label) -> f64 {
        self.weighted_count(|r| r.true_label == label)
    }
}

/// The privileged and unprivileged views of a dataset.
#[derive(Debug, Clone)]
pub struct RolePartitions<'a> {
    pub privileged: Partition<'a>,
    pub unprivileged: Partition<'a>,
}

// ---------------------------------------------------------------------------
// Partitioning
// ---------------------------------------------------------------------------

/// Fails with `UnknownGroup` on the first record whose group is unmapped.
pub fn check_groups(dataset: &Dataset) -> Result<()> {
    let groups = dataset.groups();
    match dataset
        .records()
        .iter()
        .find(|r| groups.role_of(&r.group).is_none())
    {
        Some(r) => Err(AuditError::UnknownGroup(r.group.clone())),
        None => Ok(()),
    }
}

/// Return the view of records the selector keeps.
///
/// Every record must resolve under the group definition, whichever
/// selector is asked for; a `Group` selector must itself name a mapped
/// value.
pub fn select<'a>(dataset: &'a Dataset, selector: &Selector) -> Result<Partition<'a>> {
    check_groups(dataset)?;
    let groups = dataset.groups();

    let indices = match selector {
        Selector::All => (0..dataset.len()).collect(),
        Selector::Role(role) => dataset
            .records()
            .iter()
            .enumerate()
            .filter(|(_, r)| groups.role_of(&r.group) == Some(*role))
            .map(|(i, _)| i)
            .collect(),
        Selector::Group(value) => {
            if groups.role_of(value).is_none() {
                return Err(AuditError::UnknownGroup(value.clone()));
            }
            let key = value.normalized();
            dataset
                .records()
                .iter()
                .enumerate()
                .filter(|(_, r)| r.group.normalized() == key)
                .map(|(i, _)| i)
                .collect()
        }
    };

    Ok(Partition {
        dataset,
        selector: selector.clone(),
        indices,
    })
}

/// Split the dataset into its privileged and unprivileged views.
pub fn partition(dataset: &Dataset) -> Result<RolePartitions<'_>> {
    Ok(RolePartitions {
        privileged: select(dataset, &Selector::Role(GroupRole::Privileged))?,
        unprivileged: select(dataset, &Selector::Role(GroupRole::Unprivileged))?,
    })
}

/// One view per observed group value (N-way audits).
pub fn partition_by_group(dataset: &Dataset) -> Result<BTreeMap<Value, Partition<'_>>> {
    check_groups(dataset)?;
    let mut buckets: BTreeMap<Value, Vec<usize>> = BTreeMap::new();
    for (i, r) in dataset.records().iter().enumerate() {
        buckets.entry(r.group.normalized()).or_default().push(i);
    }
    Ok(buckets
        .into_iter()
        .map(|(value, indices)| {
            let part = Partition {
                dataset,
                selector: Selector::Group(value.clone()),
                indices,
            };
            (value, part)
        })
        .collect())
}
