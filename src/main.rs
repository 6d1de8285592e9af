//! rcps - Main Entry Point
//!
//! Threshold calibration with finite-sample risk control, from the command line.

use clap::Parser;
use rcps::calibration::CalibrationParameters;
use rcps::cli::{
    cmd_calibrate, cmd_experiment, cmd_sweep, cmd_synthetic, cmd_trial, Cli, Commands,
    ExperimentOverrides,
};
use rcps::experiment::RiskTarget;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rcps=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Calibrate { data, kind, gamma, delta, num_lam, num_val, epsilon, output } => {
            let params = CalibrationParameters::new(gamma, delta, num_val, epsilon)?;
            cmd_calibrate(&data, kind, params, num_lam, output.as_deref())?;
        }
        Commands::Trial { data, kind, gamma, delta, num_lam, num_val, epsilon, seed } => {
            let params = CalibrationParameters::new(gamma, delta, num_val, epsilon)?;
            cmd_trial(&data, kind, params, num_lam, seed)?;
        }
        Commands::Experiment {
            data,
            kind,
            config,
            gamma,
            delta,
            num_lam,
            num_val,
            num_trials,
            seed,
            cache_dir,
            refresh,
        } => {
            let overrides = ExperimentOverrides {
                target: gamma.zip(delta).map(|(g, d)| RiskTarget::new(g, d)),
                num_lam,
                num_val,
                num_trials,
                seed,
                cache_dir,
            };
            cmd_experiment(&data, kind, config.as_deref(), &overrides, refresh)?;
        }
        Commands::Sweep { data, num_lam, components, per_stratum, output } => {
            cmd_sweep(&data, num_lam, &components, per_stratum, output.as_deref())?;
        }
        Commands::Synthetic {
            output,
            kind,
            n_examples,
            n_classes,
            positive_rate,
            signal,
            width,
            height,
            seed,
        } => {
            cmd_synthetic(
                &output,
                kind,
                n_examples,
                n_classes,
                positive_rate,
                signal,
                width,
                height,
                seed,
            )?;
        }
    }

    Ok(())
}
