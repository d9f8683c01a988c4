//! inflaton
//!
//! Integrates slow-roll inflation models over parameter sweeps and plots the
//! field evolution of every run.
//!
//! Usage:
//!   `inflaton run <config.json> [--output DIR] [--parallel] [--no-plots] [-v]`
//!   `inflaton init [--potential NAME] [--output PATH] [--force]`
//!   `inflaton check <config.json>`

mod output;
mod render;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use inflaton_core::diagnostics::check_slow_roll;
use inflaton_core::integrate::IntegrationStatus;
use inflaton_core::{PotentialKind, SweepConfig, SweepPlan};

#[derive(Parser, Debug)]
#[command(name = "inflaton", version)]
#[command(about = "Integrate single-field inflation models over parameter sweeps")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every combination of a sweep configuration and plot the results
    Run {
        /// Path to the JSON configuration
        config: PathBuf,

        /// Override the output folder
        #[arg(long)]
        output: Option<PathBuf>,

        /// Run combinations on all cores
        #[arg(long)]
        parallel: bool,

        /// Integrate only, without writing figures
        #[arg(long)]
        no_plots: bool,

        /// Log solver statistics and diagnostics
        #[arg(short, long)]
        verbose: bool,
    },
    /// Write a configuration template
    Init {
        /// Potential the template selects
        #[arg(long, default_value = "quadratic")]
        potential: String,

        #[arg(long, default_value = "config.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate a configuration and print slow-roll diagnostics for every run
    Check {
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy)]
enum Verbosity {
    Quiet,
    Normal,
    Debug,
}

fn init_logging(verbosity: Verbosity) {
    let default = match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Normal => "info",
        Verbosity::Debug => "info,inflaton_core=debug,inflaton=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            config,
            output,
            parallel,
            no_plots,
            verbose,
        } => run(&config, output, parallel, no_plots, verbose),
        Command::Init {
            potential,
            output,
            force,
        } => {
            init_logging(Verbosity::Normal);
            init(&potential, &output, force)
        }
        Command::Check { config } => {
            init_logging(Verbosity::Normal);
            check(&config)
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    path: &Path,
    output: Option<PathBuf>,
    parallel: bool,
    no_plots: bool,
    verbose: bool,
) -> Result<ExitCode> {
    // The config decides the default log level, so it is read first.
    let loaded = SweepConfig::from_path(path);
    init_logging(match &loaded {
        _ if verbose => Verbosity::Debug,
        Ok(config) if !config.verbose => Verbosity::Quiet,
        _ => Verbosity::Normal,
    });
    let mut config = loaded?;

    if let Some(folder) = output {
        config.output.output_folder = folder;
    }
    if no_plots {
        config.output.save_plot = false;
    }

    let mut plan = SweepPlan::from_config(&config)
        .with_context(|| format!("Invalid sweep in {}", path.display()))?;
    if parallel {
        plan.set_parallel(true);
    }
    info!(
        potential = %config.potential_type,
        runs = plan.len(),
        "Loaded {}",
        path.display()
    );

    let save_plot = config.output.save_plot;
    let text = save_plot && render::load_fonts();
    let artifact_failures = AtomicUsize::new(0);

    let outcomes = plan.execute_with(|outcome| {
        if !save_plot {
            return;
        }
        if let Err(err) = output::write_run(outcome, &config.output, text) {
            error!(
                run = outcome.spec.index,
                total = outcome.spec.total,
                "{err:#}"
            );
            artifact_failures.fetch_add(1, Ordering::Relaxed);
        }
    });

    for outcome in &outcomes {
        let status = match &outcome.trajectory.status {
            IntegrationStatus::Completed => "completed".to_string(),
            IntegrationStatus::Terminated => "terminated".to_string(),
            IntegrationStatus::Failed { t, error } => format!("failed at t={t}: {error}"),
        };
        match outcome.trajectory.end_of_inflation() {
            Some(event) => info!(
                run = outcome.spec.index,
                total = outcome.spec.total,
                "{status}, inflation ended at t={:.4} (φ={:.4})",
                event.t,
                event.state[0]
            ),
            None => info!(
                run = outcome.spec.index,
                total = outcome.spec.total,
                "{status}, inflation did not end before t={}",
                outcome.trajectory.last_time().unwrap_or(config.simulation.t_start)
            ),
        }
    }

    let failures = artifact_failures.into_inner();
    if failures > 0 {
        error!(failures, "Some runs could not be written");
        return Ok(ExitCode::FAILURE);
    }
    if save_plot {
        info!("Results written to {}", config.output.output_folder.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn init(potential: &str, output: &Path, force: bool) -> Result<ExitCode> {
    let kind: PotentialKind = potential.parse()?;
    if output.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }
    let text = SweepConfig::template(kind).to_json_pretty()?;
    fs::write(output, text + "\n")
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Wrote {kind} template to {}", output.display());
    Ok(ExitCode::SUCCESS)
}

fn check(path: &Path) -> Result<ExitCode> {
    let config = SweepConfig::from_path(path)?;
    let plan = SweepPlan::from_config(&config)
        .with_context(|| format!("Invalid sweep in {}", path.display()))?;
    info!("{} is valid: {} runs", path.display(), plan.len());

    let mut flagged = 0usize;
    for run in plan.runs() {
        let report = check_slow_roll(&run.potential, run.spec.phi_init);
        println!(
            "Run {}/{}: {}",
            run.spec.index,
            run.spec.total,
            run.spec.label()
        );
        println!("  {report}");
        for warning in &report.warnings {
            println!("  warning: {warning}");
        }
        if !report.is_clean() {
            flagged += 1;
        }
    }
    if flagged > 0 {
        info!(flagged, "Some runs do not start in slow roll");
    }
    Ok(ExitCode::SUCCESS)
}
