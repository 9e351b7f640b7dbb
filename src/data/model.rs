use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

// ---------------------------------------------------------------------------
// Value – a single cell of a feature or group column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common dataframe dtypes.
/// Group values key `BTreeMap`s downstream so `Value` must be `Ord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put Value in BTreeMap keys --

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:.4}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "<null>"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl Value {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Canonical form used for group lookups: integral floats become
    /// integers, so `1.0` from a Parquet column matches `1` from a config.
    pub fn normalized(&self) -> Value {
        match self {
            Value::Float(v)
                if v.fract() == 0.0 && v.abs() < i64::MAX as f64 =>
            {
                Value::Integer(*v as i64)
            }
            other => other.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Label – a binary outcome
// ---------------------------------------------------------------------------

/// A binary label value. Serialized as the integer 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Label {
    Zero,
    One,
}

impl TryFrom<u8> for Label {
    type Error = AuditError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Label::Zero),
            1 => Ok(Label::One),
            other => Err(AuditError::InvalidLabel(other.to_string())),
        }
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> u8 {
        match label {
            Label::Zero => 0,
            Label::One => 1,
        }
    }
}

impl From<bool> for Label {
    fn from(b: bool) -> Self {
        if b {
            Label::One
        } else {
            Label::Zero
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

impl Label {
    /// Parse a label from a loaded cell: 0/1 integers, integral floats,
    /// booleans and the strings "0"/"1".
    pub fn from_value(value: &Value) -> Result<Label> {
        match value.normalized() {
            Value::Integer(0) => Ok(Label::Zero),
            Value::Integer(1) => Ok(Label::One),
            Value::Bool(b) => Ok(Label::from(b)),
            Value::String(s) if s.trim() == "0" => Ok(Label::Zero),
            Value::String(s) if s.trim() == "1" => Ok(Label::One),
            other => Err(AuditError::InvalidLabel(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Group roles
// ---------------------------------------------------------------------------

/// Role a protected-attribute value plays in the audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Privileged,
    Unprivileged,
}

impl GroupRole {
    pub fn opposite(self) -> GroupRole {
        match self {
            GroupRole::Privileged => GroupRole::Unprivileged,
            GroupRole::Unprivileged => GroupRole::Privileged,
        }
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupRole::Privileged => write!(f, "privileged"),
            GroupRole::Unprivileged => write!(f, "unprivileged"),
        }
    }
}

/// Maps each group value to its role. Any number of values may share a
/// role; no value may hold both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupDefinition {
    roles: BTreeMap<Value, GroupRole>,
}

impl GroupDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a definition from the privileged and unprivileged value lists.
    pub fn from_roles(
        privileged: impl IntoIterator<Item = Value>,
        unprivileged: impl IntoIterator<Item = Value>,
    ) -> Result<Self> {
        let mut def = GroupDefinition::new();
        for v in privileged {
            def.insert(v, GroupRole::Privileged)?;
        }
        for v in unprivileged {
            def.insert(v, GroupRole::Unprivileged)?;
        }
        Ok(def)
    }

    /// Assign `role` to `value`. Re-assigning the same role is a no-op.
    pub fn insert(&mut self, value: Value, role: GroupRole) -> Result<()> {
        let key = value.normalized();
        match self.roles.get(&key) {
            Some(&existing) if existing != role => Err(AuditError::ConflictingRole {
                value: key,
                existing,
                requested: role,
            }),
            _ => {
                self.roles.insert(key, role);
                Ok(())
            }
        }
    }

    /// Role of a group value, if it is mapped.
    pub fn role_of(&self, value: &Value) -> Option<GroupRole> {
        self.roles.get(&value.normalized()).copied()
    }

    /// Values mapped to `role`, in sorted order.
    pub fn values(&self, role: GroupRole) -> impl Iterator<Item = &Value> + '_ {
        self.roles
            .iter()
            .filter(move |(_, r)| **r == role)
            .map(|(v, _)| v)
    }

    /// The same mapping with privileged and unprivileged exchanged.
    pub fn swapped(&self) -> Self {
        GroupDefinition {
            roles: self
                .roles
                .iter()
                .map(|(v, r)| (v.clone(), r.opposite()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Record – one labeled instance
// ---------------------------------------------------------------------------

/// One labeled instance (one row of the source table).
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Opaque feature vector; the core never reads it.
    pub features: Vec<Value>,
    /// Protected-attribute value.
    pub group: Value,
    pub true_label: Label,
    predicted_label: Option<Label>,
    weight: f64,
}

impl Record {
    /// A unit-weight record without features or prediction.
    pub fn new(group: impl Into<Value>, true_label: Label) -> Self {
        Record {
            features: Vec::new(),
            group: group.into(),
            true_label,
            predicted_label: None,
            weight: 1.0,
        }
    }

    pub fn with_features(mut self, features: Vec<Value>) -> Self {
        self.features = features;
        self
    }

    pub fn with_prediction(mut self, predicted: Label) -> Self {
        self.predicted_label = Some(predicted);
        self
    }

    /// Start from a non-unit weight (e.g. a weight column in the source).
    pub fn with_weight(mut self, weight: f64) -> Result<Self> {
        check_weight(weight)?;
        self.weight = weight;
        Ok(self)
    }

    pub fn predicted_label(&self) -> Option<Label> {
        self.predicted_label
    }

    pub fn set_predicted_label(&mut self, predicted: Label) {
        self.predicted_label = Some(predicted);
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Only the reweighing engine rescales weights.
    pub(crate) fn scale_weight(&mut self, factor: f64) {
        self.weight *= factor;
    }
}

fn check_weight(weight: f64) -> Result<()> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(AuditError::InvalidWeight(weight))
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete record store
// ---------------------------------------------------------------------------

/// An ordered record store sharing one favorable label and one group
/// definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
    feature_names: Vec<String>,
    favorable_label: Label,
    groups: GroupDefinition,
}

impl Dataset {
    pub fn new(records: Vec<Record>, favorable_label: Label, groups: GroupDefinition) -> Self {
        Dataset {
            records,
            feature_names: Vec::new(),
            favorable_label,
            groups,
        }
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }

    /// The same records under a different group definition.
    pub fn with_groups(mut self, groups: GroupDefinition) -> Self {
        self.groups = groups;
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn favorable_label(&self) -> Label {
        self.favorable_label
    }

    pub fn groups(&self) -> &GroupDefinition {
        &self.groups
    }

    /// Attach one predicted label per record, in record order.
    pub fn attach_predictions(&mut self, predictions: &[Label]) -> Result<()> {
        if predictions.len() != self.records.len() {
            return Err(AuditError::PredictionCount {
                expected: self.records.len(),
                got: predictions.len(),
            });
        }
        for (rec, &p) in self.records.iter_mut().zip(predictions) {
            rec.set_predicted_label(p);
        }
        Ok(())
    }

    /// Whether every record carries a predicted label.
    pub fn has_predictions(&self) -> bool {
        !self.records.is_empty() && self.records.iter().all(|r| r.predicted_label.is_some())
    }

    pub fn weights(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.weight).collect()
    }

    pub fn total_weight(&self) -> f64 {
        self.records.iter().map(|r| r.weight).fold(0.0, |a, w| a + w)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
