//! rcps CLI Module
//!
//! Command-line interface for calibrating thresholds, running trials and
//! experiments, and generating synthetic score datasets.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::calibration::{CalibrationParameters, LambdaSelector, ScoreDomain, ThresholdGrid};
use crate::data::{
    load_multilabel, load_segmentation, save_examples, synthetic_multilabel,
    synthetic_segmentation, SyntheticConfig,
};
use crate::experiment::{ExperimentConfig, ExperimentRunner, ExperimentSummary, Histogram, RiskTarget};
use crate::trial::TrialRunner;
use crate::validation::{sweep_by_components, ScoredExample};

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

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

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

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
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

/// Kind of precomputed dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatasetKind {
    /// Per-class scores in [0, 1] with boolean labels
    Multilabel,
    /// Per-pixel scores in [-1, 0] with ground-truth masks
    Segmentation,
}

impl DatasetKind {
    pub fn domain(&self) -> ScoreDomain {
        match self {
            DatasetKind::Multilabel => ScoreDomain::unit(),
            DatasetKind::Segmentation => ScoreDomain::segmentation(),
        }
    }
}

#[derive(Parser)]
#[command(name = "rcps")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Risk-controlling threshold calibration for prediction sets")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select λ̂ on a precomputed dataset
    Calibrate {
        /// Precomputed dataset (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Dataset kind
        #[arg(short, long, value_enum, default_value = "multilabel")]
        kind: DatasetKind,

        /// Target risk
        #[arg(short, long, default_value = "0.1")]
        gamma: f64,

        /// Failure probability
        #[arg(long, default_value = "0.1")]
        delta: f64,

        /// Number of grid thresholds
        #[arg(long, default_value = "100")]
        num_lam: usize,

        /// Calibration sample size (first examples of the dataset)
        #[arg(long, default_value = "4000")]
        num_val: usize,

        /// Search precision
        #[arg(long, default_value = "0.01")]
        epsilon: f64,

        /// Write the selection table as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run one randomized calibration/validation trial
    Trial {
        /// Precomputed dataset (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Dataset kind
        #[arg(short, long, value_enum, default_value = "multilabel")]
        kind: DatasetKind,

        /// Target risk
        #[arg(short, long, default_value = "0.1")]
        gamma: f64,

        /// Failure probability
        #[arg(long, default_value = "0.1")]
        delta: f64,

        /// Number of grid thresholds
        #[arg(long, default_value = "100")]
        num_lam: usize,

        /// Calibration sample size
        #[arg(long, default_value = "4000")]
        num_val: usize,

        /// Search precision
        #[arg(long, default_value = "0.01")]
        epsilon: f64,

        /// Split seed
        #[arg(short, long, default_value = "0")]
        seed: u64,
    },

    /// Run repeated trials for every (gamma, delta) target
    Experiment {
        /// Precomputed dataset (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Dataset kind
        #[arg(short, long, value_enum, default_value = "multilabel")]
        kind: DatasetKind,

        /// Experiment config (JSON); flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Single target risk (requires --delta)
        #[arg(short, long, requires = "delta")]
        gamma: Option<f64>,

        /// Single failure probability (requires --gamma)
        #[arg(long, requires = "gamma")]
        delta: Option<f64>,

        #[arg(long)]
        num_lam: Option<usize>,

        #[arg(long)]
        num_val: Option<usize>,

        #[arg(long)]
        num_trials: Option<usize>,

        #[arg(short, long)]
        seed: Option<u64>,

        /// Results cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Delete cached results and rerun
        #[arg(long)]
        refresh: bool,
    },

    /// Summarize segmentation examples per component count over a λ sweep
    Sweep {
        /// Segmentation dataset (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Number of grid thresholds
        #[arg(long, default_value = "10")]
        num_lam: usize,

        /// Component counts to stratify by
        #[arg(long, value_delimiter = ',', default_value = "1,2")]
        components: Vec<usize>,

        /// Examples taken from each stratum
        #[arg(long, default_value = "10")]
        per_stratum: usize,

        /// Write the frames as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a synthetic dataset
    Synthetic {
        /// Output file (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Dataset kind
        #[arg(short, long, value_enum, default_value = "multilabel")]
        kind: DatasetKind,

        /// Number of examples
        #[arg(short, long, default_value = "1000")]
        n_examples: usize,

        /// Classes per example (multilabel)
        #[arg(long, default_value = "1")]
        n_classes: usize,

        /// Probability that a class is present (multilabel)
        #[arg(long, default_value = "0.5")]
        positive_rate: f64,

        /// Score separation between positives and negatives (multilabel)
        #[arg(long, default_value = "0.0")]
        signal: f64,

        /// Image width (segmentation)
        #[arg(long, default_value = "32")]
        width: usize,

        /// Image height (segmentation)
        #[arg(long, default_value = "32")]
        height: usize,

        #[arg(short, long, default_value = "0")]
        seed: u64,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn print_banner(title: &str, rows: &[(&str, String)]) {
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", title.white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    for (key, val) in rows {
        line_box(&kv(key, val));
    }
    line_box_empty();
    line_box_bottom();
}

pub fn cmd_calibrate(
    data_path: &Path,
    kind: DatasetKind,
    params: CalibrationParameters,
    num_lam: usize,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    params.validate()?;
    let grid = ThresholdGrid::new(kind.domain(), num_lam)?;

    match kind {
        DatasetKind::Multilabel => {
            let data = load_step(data_path, load_multilabel)?;
            calibrate(&data, params, grid, output)
        }
        DatasetKind::Segmentation => {
            let data = load_step(data_path, load_segmentation)?;
            calibrate(&data, params, grid, output)
        }
    }
}

fn load_step<E>(
    path: &Path,
    load: fn(&Path) -> crate::Result<Vec<E>>,
) -> anyhow::Result<Vec<E>> {
    step_run("Loading data");
    let start = Instant::now();
    let data = load(path)?;
    step_done(&format!("{} examples in {:?}", data.len(), start.elapsed()));
    Ok(data)
}

fn calibrate<E: ScoredExample>(
    data: &[E],
    params: CalibrationParameters,
    grid: ThresholdGrid,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Calibrate");

    if data.len() < params.num_val {
        anyhow::bail!(
            "dataset has {} examples, fewer than num_val = {}",
            data.len(),
            params.num_val
        );
    }

    step_run(&format!("Sweeping {} thresholds", grid.len()));
    let start = Instant::now();
    let selector = LambdaSelector::new(params, grid)?;
    let selection = selector.select(data)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:>10} {:>10} {:>10} {:>10}", muted("λ"), muted("R̂"), muted("t"), muted("R̂ + t"));
    println!("  {}", dim(&"─".repeat(46)));
    let stride = (selection.table.len() / 10).max(1);
    for (i, row) in selection.table.iter().enumerate() {
        if i % stride != 0 && Some(i) != selection.index {
            continue;
        }
        let bound = format!("{:>10.4}", row.bound());
        let bound = if row.is_admissible(params.gamma) { ok(&bound) } else { bound.normal() };
        println!("  {:>10.4} {:>10.4} {:>10.4} {}", row.lambda, row.rhat, row.t, bound);
    }
    println!("  {}", dim(&"─".repeat(46)));

    println!();
    if selection.is_fallback() {
        println!("  {} {}", "fallback".yellow(), muted("no threshold met the bound"));
    }
    println!("  {:<16} {}", muted("λ̂"), format!("{:.4}", selection.lambda_hat).white().bold());
    println!(
        "  {:<16} {}",
        muted("Admissible"),
        format!("{} / {}", selection.num_admissible(params.gamma), selection.table.len()).white()
    );

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&selection)?)?;
        step_ok(&format!("Selection written → {}", path.display()));
    }

    println!();
    Ok(())
}

pub fn cmd_trial(
    data_path: &Path,
    kind: DatasetKind,
    params: CalibrationParameters,
    num_lam: usize,
    seed: u64,
) -> anyhow::Result<()> {
    params.validate()?;
    let runner = TrialRunner::new(params, ThresholdGrid::new(kind.domain(), num_lam)?)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    section("Trial");
    let start = Instant::now();
    let result = match kind {
        DatasetKind::Multilabel => {
            let data = load_step(data_path, load_multilabel)?;
            step_run("Calibrating and validating");
            runner.run_precomputed(&data, &mut rng)?
        }
        DatasetKind::Segmentation => {
            let data = load_step(data_path, load_segmentation)?;
            step_run("Calibrating and validating");
            runner.run_precomputed(&data, &mut rng)?
        }
    };
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<16} {}", muted("λ̂"), format!("{:.4}", result.lambda_hat).white().bold());
    println!("  {:<16} {:.4}", muted("Precision"), result.precision);
    println!("  {:<16} {:.4}", muted("Recall"), result.recall);
    println!("  {:<16} {:.4}", muted("Size"), result.size);
    let risk = format!("{:.4}", result.risk());
    let risk = if result.risk() <= params.gamma { ok(&risk) } else { risk.red() };
    println!("  {:<16} {}", muted("Risk"), risk);
    if result.fallback {
        println!("  {}", "fallback threshold used".yellow());
    }
    println!();
    Ok(())
}

/// Flag overrides of an experiment config
#[derive(Debug, Default, Clone)]
pub struct ExperimentOverrides {
    pub target: Option<RiskTarget>,
    pub num_lam: Option<usize>,
    pub num_val: Option<usize>,
    pub num_trials: Option<usize>,
    pub seed: Option<u64>,
    pub cache_dir: Option<PathBuf>,
}

impl ExperimentOverrides {
    pub fn apply(&self, mut config: ExperimentConfig) -> ExperimentConfig {
        if let Some(target) = self.target {
            config = config.with_targets(vec![target]);
        }
        if let Some(n) = self.num_lam {
            config = config.with_num_lam(n);
        }
        if let Some(n) = self.num_val {
            config = config.with_num_val(n);
        }
        if let Some(n) = self.num_trials {
            config = config.with_num_trials(n);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(dir) = &self.cache_dir {
            config = config.with_cache_dir(dir.clone());
        }
        config
    }
}

pub fn cmd_experiment(
    data_path: &Path,
    kind: DatasetKind,
    config_path: Option<&Path>,
    overrides: &ExperimentOverrides,
    refresh: bool,
) -> anyhow::Result<()> {
    let base = match config_path {
        Some(path) => ExperimentConfig::from_file(path)?,
        None => ExperimentConfig::default(),
    };
    let config = overrides.apply(base).with_domain(kind.domain());
    let runner = ExperimentRunner::new(config.clone())?.with_refresh(refresh);

    print_banner(
        "rcps experiment",
        &[
            ("Targets ", config.targets.len().to_string()),
            ("Trials  ", config.num_trials.to_string()),
            ("num_val ", config.num_val.to_string()),
            ("num_lam ", config.num_lam.to_string()),
            ("Cache   ", config.cache_dir.display().to_string()),
        ],
    );

    let summaries = match kind {
        DatasetKind::Multilabel => {
            let data = load_step(data_path, load_multilabel)?;
            run_targets(&runner, &data)?
        }
        DatasetKind::Segmentation => {
            let data = load_step(data_path, load_segmentation)?;
            run_targets(&runner, &data)?
        }
    };

    for summary in &summaries {
        print_summary(summary);
    }
    println!();
    Ok(())
}

fn run_targets<E: ScoredExample>(
    runner: &ExperimentRunner,
    data: &[E],
) -> anyhow::Result<Vec<ExperimentSummary>> {
    let mut summaries = Vec::with_capacity(runner.config().targets.len());
    for target in &runner.config().targets {
        step_run(&format!("γ = {}, δ = {}", target.gamma, target.delta));
        let start = Instant::now();
        let summary = runner.run_target(data, target)?;
        step_done(&format!("{} trials in {:?}", summary.trials, start.elapsed()));
        summaries.push(summary);
    }
    Ok(summaries)
}

fn print_summary(summary: &ExperimentSummary) {
    section(&format!("γ = {}  δ = {}", summary.target.gamma, summary.target.delta));

    println!("  {:<12} {:>10} {:>10} {:>10} {:>10}", "", muted("mean"), muted("std"), muted("min"), muted("max"));
    for (name, stats) in [
        ("Recall", &summary.recall),
        ("Precision", &summary.precision),
        ("Size", &summary.size),
        ("λ̂", &summary.lambda_hat),
    ] {
        println!(
            "  {:<12} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            muted(name), stats.mean, stats.std_dev, stats.min, stats.max
        );
    }

    println!();
    let coverage = format!("{:.3}", summary.coverage);
    let coverage = if summary.meets_nominal() { ok(&coverage) } else { coverage.red() };
    println!("  {:<12} {} {}", muted("Coverage"), coverage, dim(&format!("nominal {:.3}", summary.nominal_coverage)));
    println!("  {:<12} {}", muted("Fallbacks"), summary.fallbacks);

    print_histogram("Recall", &summary.recall_histogram);
    print_histogram("Size", &summary.size_histogram);
}

fn print_histogram(name: &str, hist: &Histogram) {
    println!();
    println!("  {}", muted(name));
    let peak = hist.bin_counts.iter().copied().max().unwrap_or(0).max(1);
    for (i, &count) in hist.bin_counts.iter().enumerate() {
        let bar = "█".repeat(count * 30 / peak);
        println!(
            "  {:>8.4} {:>8.4} {} {}",
            hist.bin_edges[i],
            hist.bin_edges[i + 1],
            accent(&bar),
            dim(&count.to_string())
        );
    }
}

pub fn cmd_sweep(
    data_path: &Path,
    num_lam: usize,
    components: &[usize],
    per_stratum: usize,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Sweep");
    let data = load_step(data_path, load_segmentation)?;
    let grid = ThresholdGrid::segmentation(num_lam)?;

    step_run("Sweeping strata");
    let frames = sweep_by_components(&data, &grid, components, per_stratum)?;
    step_done(&format!("{} frames", frames.len()));

    println!();
    println!("  {:>10} {:>6} {:>10} {:>10} {:>10}", muted("λ"), muted("comp"), muted("precision"), muted("recall"), muted("size"));
    println!("  {}", dim(&"─".repeat(50)));
    for frame in &frames {
        for (c, summary) in &frame.strata {
            println!(
                "  {:>10.4} {:>6} {:>10.4} {:>10.4} {:>10.4}",
                frame.lambda, c, summary.precision, summary.recall, summary.size
            );
        }
    }

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&frames)?)?;
        step_ok(&format!("Frames written → {}", path.display()));
    }
    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_synthetic(
    output: &Path,
    kind: DatasetKind,
    n_examples: usize,
    n_classes: usize,
    positive_rate: f64,
    signal: f64,
    width: usize,
    height: usize,
    seed: u64,
) -> anyhow::Result<()> {
    section("Synthetic");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    step_run("Generating");
    let start = Instant::now();
    match kind {
        DatasetKind::Multilabel => {
            let config = SyntheticConfig::default()
                .with_n_examples(n_examples)
                .with_n_classes(n_classes)
                .with_positive_rate(positive_rate)
                .with_signal(signal);
            let data = synthetic_multilabel(&config, &mut rng)?;
            step_done(&format!("{} examples in {:?}", data.len(), start.elapsed()));
            save_examples(output, &data)?;
        }
        DatasetKind::Segmentation => {
            let data = synthetic_segmentation(n_examples, width, height, &mut rng)?;
            step_done(&format!("{} examples in {:?}", data.len(), start.elapsed()));
            save_examples(output, &data)?;
        }
    }

    step_ok(&format!("Saved → {}", output.display()));
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_calibrate() {
        let cli = Cli::try_parse_from([
            "rcps", "calibrate", "-d", "scores.json", "--gamma", "0.05", "--num-val", "500",
        ])
        .unwrap();
        match cli.command {
            Commands::Calibrate { gamma, num_val, kind, .. } => {
                assert_eq!(gamma, 0.05);
                assert_eq!(num_val, 500);
                assert_eq!(kind, DatasetKind::Multilabel);
            }
            _ => panic!("expected calibrate"),
        }
    }

    #[test]
    fn test_experiment_gamma_requires_delta() {
        assert!(Cli::try_parse_from(["rcps", "experiment", "-d", "x.json", "-g", "0.1"]).is_err());
        assert!(Cli::try_parse_from([
            "rcps", "experiment", "-d", "x.json", "-g", "0.1", "--delta", "0.1",
        ])
        .is_ok());
    }

    #[test]
    fn test_parse_sweep_components() {
        let cli = Cli::try_parse_from(["rcps", "sweep", "-d", "p.json", "--components", "1,2,3"])
            .unwrap();
        match cli.command {
            Commands::Sweep { components, .. } => assert_eq!(components, vec![1, 2, 3]),
            _ => panic!("expected sweep"),
        }
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = ExperimentOverrides {
            target: Some(RiskTarget::new(0.2, 0.05)),
            num_trials: Some(3),
            ..Default::default()
        };
        let config = overrides.apply(ExperimentConfig::default());
        assert_eq!(config.targets, vec![RiskTarget::new(0.2, 0.05)]);
        assert_eq!(config.num_trials, 3);
        assert_eq!(config.num_val, 4000);
    }

    #[test]
    fn test_kind_domain() {
        assert_eq!(DatasetKind::Segmentation.domain(), ScoreDomain::segmentation());
        assert_eq!(DatasetKind::Multilabel.domain(), ScoreDomain::unit());
    }

    #[test]
    fn test_synthetic_then_trial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        cmd_synthetic(&path, DatasetKind::Multilabel, 300, 1, 0.5, 0.0, 0, 0, 1).unwrap();

        let params = CalibrationParameters::new(0.2, 0.1, 100, 0.01).unwrap();
        cmd_trial(&path, DatasetKind::Multilabel, params, 20, 0).unwrap();
        cmd_calibrate(&path, DatasetKind::Multilabel, params, 20, None).unwrap();
    }
}
