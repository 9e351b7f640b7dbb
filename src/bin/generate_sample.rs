use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use bias_audit::config::{AuditConfig, ColumnMapping, Cutoff, PredictionRule, Thresholds};
use bias_audit::{Label, Value};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn bernoulli(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// One synthetic defendant: (race, sex, age, priors_count, two_year_recid).
/// Race 1 is the privileged group. Race 0 has a heavier prior-count
/// distribution and an extra offset on recidivism, so both the labels and
/// a priors-based prediction are biased against it.
fn sample_person(rng: &mut SimpleRng, race: i64) -> (i64, &'static str, i64, i64, i64) {
    let sex = if rng.bernoulli(0.8) { "Male" } else { "Female" };
    let age = rng.gauss(34.0, 11.0).clamp(18.0, 80.0).round() as i64;
    let priors_mean = if race == 0 { 4.5 } else { 2.5 };
    let priors = rng.gauss(priors_mean, 3.0).max(0.0).round() as i64;

    let logit = -1.0 + 0.25 * priors as f64 - 0.03 * (age as f64 - 34.0)
        + if race == 0 { 0.4 } else { 0.0 };
    let recid = i64::from(rng.bernoulli(logistic(logit)));
    (race, sex, age, priors, recid)
}

fn main() -> Result<()> {
    env_logger::init();

    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_audit.parquet".to_string());
    let config_path = format!("{}.json", output_path.trim_end_matches(".parquet"));

    let mut rng = SimpleRng::new(42);
    let counts = [(0i64, 3000usize), (1, 2000)];

    let mut races = Vec::new();
    let mut sexes = Vec::new();
    let mut ages = Vec::new();
    let mut priors = Vec::new();
    let mut recids = Vec::new();

    for &(race, n) in &counts {
        for _ in 0..n {
            let (r, s, a, p, y) = sample_person(&mut rng, race);
            races.push(r);
            sexes.push(s);
            ages.push(a);
            priors.push(p);
            recids.push(y);
        }
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("race", DataType::Int64, false),
        Field::new("sex", DataType::Utf8, false),
        Field::new("age", DataType::Int64, false),
        Field::new("priors_count", DataType::Int64, false),
        Field::new("two_year_recid", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(races)),
            Arc::new(StringArray::from(sexes)),
            Arc::new(Int64Array::from(ages)),
            Arc::new(Int64Array::from(priors)),
            Arc::new(Int64Array::from(recids)),
        ],
    )
    .context("building record batch")?;

    // Write Parquet
    let file = std::fs::File::create(&output_path)
        .with_context(|| format!("creating {output_path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;

    // Matching audit config: favorable outcome is "no recidivism"
    let config = AuditConfig {
        columns: ColumnMapping {
            group: "race".into(),
            label: "two_year_recid".into(),
            prediction: None,
            weight: None,
        },
        favorable_label: Label::Zero,
        privileged: vec![Value::Integer(1)],
        unprivileged: vec![Value::Integer(0)],
        prediction_rule: Some(PredictionRule {
            feature: "priors_count".into(),
            cutoff: Cutoff::Median,
        }),
        thresholds: Thresholds::default(),
    };
    std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)
        .with_context(|| format!("writing {config_path}"))?;

    println!(
        "Wrote {} records to {output_path} and config to {config_path}",
        batch.num_rows()
    );
    Ok(())
}
