use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::model::{GroupDefinition, Label, Value};

// ---------------------------------------------------------------------------
// Audit configuration (JSON)
// ---------------------------------------------------------------------------

/// Which source columns carry the fields the core needs. Every other
/// column is loaded as an opaque feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub group: String,
    pub label: String,
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
}

/// Cut-offs used to classify bias findings in a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// `|difference|` above this is high bias.
    pub high_bias: f64,
    /// `|difference|` above this is moderate bias.
    pub moderate_bias: f64,
    /// Disparate impact below this is flagged (four-fifths rule).
    pub disparate_impact_low: f64,
    /// Disparate impact above this is flagged.
    pub disparate_impact_high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            high_bias: 0.1,
            moderate_bias: 0.05,
            disparate_impact_low: 0.8,
            disparate_impact_high: 1.25,
        }
    }
}

/// Cut point for a threshold prediction rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cutoff {
    Median,
    Mean,
    Fixed(f64),
}

/// Predict label 1 where a numeric feature exceeds a cut point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRule {
    pub feature: String,
    #[serde(rename = "threshold")]
    pub cutoff: Cutoff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    pub columns: ColumnMapping,
    pub favorable_label: Label,
    pub privileged: Vec<Value>,
    pub unprivileged: Vec<Value>,
    #[serde(default)]
    pub prediction_rule: Option<PredictionRule>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

impl AuditConfig {
    /// Read and validate a JSON config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in config {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: AuditConfig = serde_json::from_str(text).context("parsing config JSON")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.privileged.is_empty() {
            bail!("config lists no privileged group values");
        }
        if self.unprivileged.is_empty() {
            bail!("config lists no unprivileged group values");
        }
        let t = &self.thresholds;
        if t.moderate_bias > t.high_bias {
            bail!(
                "moderate_bias ({}) must not exceed high_bias ({})",
                t.moderate_bias,
                t.high_bias
            );
        }
        if t.disparate_impact_low > t.disparate_impact_high {
            bail!("disparate_impact_low must not exceed disparate_impact_high");
        }
        self.group_definition()?;
        Ok(())
    }

    /// The role mapping described by `privileged` / `unprivileged`.
    pub fn group_definition(&self) -> Result<GroupDefinition> {
        Ok(GroupDefinition::from_roles(
            self.privileged.iter().cloned(),
            self.unprivileged.iter().cloned(),
        )?)
    }
}
