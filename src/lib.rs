//! Bias auditing for binary classification outcomes.
//!
//! The core is pure and synchronous: a [`Dataset`] of labeled records is
//! partitioned by a [`GroupDefinition`], the metric calculators report
//! label and decision disparities between privileged and unprivileged
//! groups, and [`Reweighing`] rescales instance weights so that group and
//! label become independent under the weighted distribution.
//!
//! ```
//! use bias_audit::{Dataset, DatasetMetric, GroupDefinition, Label, Record, Reweighing, Value};
//!
//! let groups = GroupDefinition::from_roles([Value::from("p")], [Value::from("u")]).unwrap();
//! let records = ["p", "p", "p", "u", "u", "u"]
//!     .iter()
//!     .zip([1, 1, 0, 1, 0, 0])
//!     .map(|(&g, l)| Record::new(g, Label::from(l == 1)))
//!     .collect();
//! let mut ds = Dataset::new(records, Label::One, groups);
//!
//! assert!(DatasetMetric::new(&ds).mean_difference().unwrap() < 0.0);
//! Reweighing::fit_transform(&mut ds).unwrap();
//! assert!(DatasetMetric::new(&ds).mean_difference().unwrap().abs() < 1e-12);
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod predict;
pub mod report;
pub mod reweigh;

pub use data::model::{Dataset, GroupDefinition, GroupRole, Label, Record, Value};
pub use data::partition::{partition, partition_by_group, select, Partition, Selector};
pub use error::AuditError;
pub use metrics::{
    ClassificationMetric, Comparison, ConfusionMatrix, DatasetMetric, MetricOutcome, MetricReport,
};
pub use reweigh::{Reweighing, ReweighingModel};
