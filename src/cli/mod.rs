//! Tabsight CLI Module
//!
//! Command-line interface for training, model suggestions, comparisons and
//! dataset summaries.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{load_csv, DataSummary, Dataset};
use crate::training::{
    compare_models, get_model_suggestions, train_model_with, EpochProgress, ModelType, TrainOptions,
    TrainingConfig,
};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tabsight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and evaluate regression models on tabular data")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model and evaluate it on the held-out rows
    Train {
        /// Input data file (CSV or TSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Full training configuration as JSON; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Target column name
        #[arg(short, long)]
        target: Option<String>,

        /// Comma-separated feature columns (default: every other column)
        #[arg(short, long, value_delimiter = ',')]
        features: Vec<String>,

        /// Model type (linear, tree-ensemble, neural-net)
        #[arg(short, long)]
        model: Option<String>,

        /// Share of rows used for training
        #[arg(long)]
        split: Option<f64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Write the training result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recommend a model family, features and hyperparameters
    Suggest {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Comma-separated candidate features (default: every other column)
        #[arg(short, long, value_delimiter = ',')]
        features: Vec<String>,
    },

    /// Train every model family and rank them
    Compare {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Comma-separated feature columns (default: every other column)
        #[arg(short, long, value_delimiter = ',')]
        features: Vec<String>,

        /// Share of rows used for training
        #[arg(long, default_value = "0.8")]
        split: f64,
    },

    /// Summarize a dataset as assistant context
    Summary {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Sample rows to include
        #[arg(long, default_value = "5")]
        sample: usize,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Train { data, config, target, features, model, split, seed, output } => {
            let config = build_train_config(config.as_deref(), target, features, model, split, seed)?;
            cmd_train(&data, config, output.as_deref())
        }
        Commands::Suggest { data, target, features } => cmd_suggest(&data, &target, features),
        Commands::Compare { data, target, features, split } => cmd_compare(&data, &target, features, split),
        Commands::Summary { data, sample } => cmd_summary(&data, sample),
    }
}

// ─── Data loading ──────────────────────────────────────────────────────────────

fn load_data(path: &Path) -> anyhow::Result<Dataset> {
    step_run("Loading data");
    let start = Instant::now();
    let dataset = load_csv(path).with_context(|| format!("failed to load {}", path.display()))?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        dataset.len(),
        dataset.column_names().len(),
        start.elapsed()
    ));
    Ok(dataset)
}

/// Explicit features, or every column except the target
fn resolve_features(dataset: &Dataset, target: &str, features: Vec<String>) -> Vec<String> {
    if !features.is_empty() {
        return features;
    }
    dataset
        .column_names()
        .into_iter()
        .filter(|name| name != target)
        .collect()
}

fn build_train_config(
    config_path: Option<&Path>,
    target: Option<String>,
    features: Vec<String>,
    model: Option<String>,
    split: Option<f64>,
    seed: Option<u64>,
) -> anyhow::Result<TrainingConfig> {
    let mut config = match config_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            TrainingConfig::from_json(&json)?
        }
        None => {
            let target = target
                .clone()
                .context("--target is required without --config")?;
            TrainingConfig::new(target, Vec::<String>::new(), ModelType::TreeEnsemble)
        }
    };

    if let Some(target) = target {
        config.target = target;
    }
    if !features.is_empty() {
        config.features = features;
    }
    if let Some(model) = model {
        config.model = model.parse::<ModelType>()?.default_spec();
    }
    if let Some(split) = split {
        config = config.with_split_ratio(split);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(data_path: &Path, mut config: TrainingConfig, output: Option<&Path>) -> anyhow::Result<()> {
    section("Train");

    let dataset = load_data(data_path)?;
    config.features = resolve_features(&dataset, &config.target, std::mem::take(&mut config.features));

    let model_type = config.model_type();
    let options = if model_type == ModelType::NeuralNet {
        TrainOptions::new().with_observer(Box::new(|p: &EpochProgress| {
            if p.epoch == 1 || p.epoch == p.epochs || p.epoch % 10 == 0 {
                let val = p.val_loss.map(|v| format!("  val {:.5}", v)).unwrap_or_default();
                println!("    {} loss {:.5}{}", dim(&format!("epoch {:>3}/{}", p.epoch, p.epochs)), p.train_loss, val);
            }
        }))
    } else {
        TrainOptions::new()
    };

    step_run(&format!("Training {}", model_type.as_str().cyan()));
    if model_type == ModelType::NeuralNet {
        println!();
    }
    let result = train_model_with(&dataset, &config, options)?;
    step_done(&format!("{:.3}s", result.training_time_secs));

    println!();
    line_box_top();
    line_box(&kv("Model    ", result.model_type.as_str()));
    line_box(&kv("Rows     ", &format!("{} train / {} test", result.train_rows, result.test_rows)));
    line_box_sep();
    line_box(&kv("R²       ", &format!("{:.4}", result.metrics.r2)));
    line_box(&kv("RMSE     ", &format!("{:.4}", result.metrics.rmse)));
    line_box(&kv("MAE      ", &format!("{:.4}", result.metrics.mae)));
    line_box(&kv("Accuracy ", &format!("{:.1}%", result.accuracy_percentage())));
    line_box_bottom();

    section("Insights");
    for line in result.insights().lines() {
        println!("  {}", line);
    }

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        std::fs::write(path, serde_json::to_string_pretty(&result)?)?;
        step_done("");
    }

    println!();
    Ok(())
}

pub fn cmd_suggest(data_path: &Path, target: &str, features: Vec<String>) -> anyhow::Result<()> {
    section("Suggest");

    let dataset = load_data(data_path)?;
    let features = resolve_features(&dataset, target, features);
    let suggestion = get_model_suggestions(&dataset, &features, target)?;

    println!();
    println!("  {:<14} {}", muted("Model"), suggestion.model_type.as_str().white().bold());
    println!("  {:<14} {:.0}%", muted("Confidence"), suggestion.confidence * 100.0);
    println!("  {:<14} {:.3}", muted("Mean |r|"), suggestion.analysis.mean_correlation);
    println!("  {:<14} {:.3}", muted("Non-linearity"), suggestion.analysis.non_linearity);
    println!();
    println!("  {}", suggestion.rationale);

    section("Top features");
    for name in &suggestion.ranked_features {
        let r = suggestion
            .analysis
            .correlations
            .iter()
            .find(|c| &c.feature == name)
            .map_or(0.0, |c| c.correlation);
        println!("  {:<24} {:>8.3}", name, r);
    }

    section("Hyperparameters");
    println!("  {}", serde_json::to_string(&suggestion.model)?);
    println!();
    Ok(())
}

pub fn cmd_compare(data_path: &Path, target: &str, features: Vec<String>, split: f64) -> anyhow::Result<()> {
    section("Compare");

    let dataset = load_data(data_path)?;
    let features = resolve_features(&dataset, target, features);

    step_run("Training all model families");
    let start = Instant::now();
    let comparisons = compare_models(&dataset, target, &features, split)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<16} {:>10} {:>10} {:>10}", muted("Model"), muted("Accuracy"), muted("R²"), muted("Time"));
    println!("  {}", dim(&"─".repeat(50)));
    for c in &comparisons {
        println!(
            "  {:<16} {:>9.1}% {:>10.4} {:>9.2}s",
            c.model_type.as_str(),
            c.accuracy_pct,
            c.metrics.r2,
            c.training_time_secs
        );
    }
    println!("  {}", dim(&"─".repeat(50)));

    if let Some(best) = comparisons.first() {
        println!();
        println!("  {} {} {:.1}%", ok("best"), best.model_type.as_str().white().bold(), best.accuracy_pct);
    }

    println!();
    Ok(())
}

pub fn cmd_summary(data_path: &Path, sample: usize) -> anyhow::Result<()> {
    section("Summary");

    let dataset = load_data(data_path)?;
    let summary = DataSummary::from_dataset(&dataset, sample);

    println!();
    for line in summary.to_prompt_context().lines() {
        println!("  {}", line);
    }
    println!();
    Ok(())
}
