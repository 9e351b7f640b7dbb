use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use bias_audit::config::AuditConfig;
use bias_audit::data::loader::load_file;
use bias_audit::predict::apply_rule;
use bias_audit::report::AuditReport;
use bias_audit::{Dataset, Reweighing};

#[derive(Parser)]
#[command(name = "bias-audit")]
#[command(about = "Audit a binary outcome for group bias and reweigh to mitigate it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report fairness metrics before and after reweighing
    Audit {
        /// Dataset file (.csv, .json, .parquet)
        data: PathBuf,

        /// Audit config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Skip the reweighing step
        #[arg(long)]
        no_reweigh: bool,
    },

    /// Reweigh the dataset and write one weight per record as CSV
    Reweigh {
        /// Dataset file (.csv, .json, .parquet)
        data: PathBuf,

        /// Audit config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Audit {
            data,
            config,
            json,
            no_reweigh,
        } => audit(&data, &config, json, no_reweigh),
        Commands::Reweigh {
            data,
            config,
            output,
        } => reweigh(&data, &config, &output),
    }
}

/// Load config and data, attaching rule-based predictions when the data
/// has no prediction column of its own.
fn load(data: &Path, config: &Path) -> Result<(AuditConfig, Dataset)> {
    let config = AuditConfig::from_path(config)?;
    let mut dataset =
        load_file(data, &config).with_context(|| format!("loading {}", data.display()))?;
    log::info!(
        "Loaded {} records with features {:?}",
        dataset.len(),
        dataset.feature_names()
    );

    if config.columns.prediction.is_none() {
        if let Some(rule) = &config.prediction_rule {
            apply_rule(&mut dataset, rule)?;
        }
    }
    Ok((config, dataset))
}

fn audit(data: &Path, config: &Path, json: bool, no_reweigh: bool) -> Result<()> {
    let (config, mut dataset) = load(data, config)?;

    let mut report = AuditReport::build(&dataset, &config.thresholds);
    if !no_reweigh {
        if let Err(e) = report.mitigate(&mut dataset) {
            log::warn!("Reweighing failed, reporting unmitigated metrics: {e}");
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn reweigh(data: &Path, config: &Path, output: &Path) -> Result<()> {
    let (_, mut dataset) = load(data, config)?;
    let before = dataset.total_weight();
    Reweighing::fit_transform(&mut dataset).context("reweighing the dataset")?;

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("creating {}", output.display()))?;
    writer.write_record(["row", "group", "label", "weight"])?;
    for (i, r) in dataset.records().iter().enumerate() {
        writer.write_record([
            i.to_string(),
            r.group.to_string(),
            r.true_label.to_string(),
            r.weight().to_string(),
        ])?;
    }
    writer.flush()?;

    log::info!(
        "Wrote {} weights to {} (total weight {before:.4} -> {:.4})",
        dataset.len(),
        output.display(),
        dataset.total_weight()
    );
    Ok(())
}
