use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use sylva_model::{Approximation, Model, Project, Settings};
use sylva_risk::report;
use sylva_risk::RiskAnalysis;

/// SYLVA - fault-tree risk analysis
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analysis pipeline on a model
    Analyze {
        /// Model files (YAML or JSON)
        models: Vec<PathBuf>,

        /// Project file naming inputs, outputs, and options
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Maximum cut set order
        #[arg(long)]
        limit_order: Option<i64>,

        /// Cut set probability cut-off
        #[arg(long)]
        cut_off: Option<f64>,

        /// Truncation depth of the probability series
        #[arg(long)]
        num_sums: Option<i64>,

        /// Probability approximation: none, rare-event, or mcub
        #[arg(long)]
        approximation: Option<Approximation>,

        /// Mission time in hours
        #[arg(long)]
        mission_time: Option<f64>,

        /// Monte Carlo sample size
        #[arg(long)]
        num_trials: Option<i64>,

        /// Random number generator seed
        #[arg(long)]
        seed: Option<u64>,

        /// Compute the top event probability
        #[arg(long)]
        probability: bool,

        /// Compute basic event importance
        #[arg(long)]
        importance: bool,

        /// Propagate parameter uncertainty by Monte Carlo
        #[arg(long)]
        uncertainty: bool,

        /// Expand common-cause failure groups
        #[arg(long)]
        ccf: bool,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit JSON instead of the plain-text report
        #[arg(long)]
        json: bool,
    },

    /// Check model files without analyzing them
    Validate {
        /// Model files (YAML or JSON)
        models: Vec<PathBuf>,

        /// Mission time in hours used for likelihood checks
        #[arg(long, default_value_t = 8760.0)]
        mission_time: f64,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    if let Err(error) = run(cli) {
        eprintln!("error: {:#}", error);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Analyze {
            models,
            project,
            limit_order,
            cut_off,
            num_sums,
            approximation,
            mission_time,
            num_trials,
            seed,
            probability,
            importance,
            uncertainty,
            ccf,
            output,
            json,
        } => {
            let mut settings = Settings::default();
            let mut inputs = Vec::new();
            let mut project_output = None;
            if let Some(path) = &project {
                let loaded = Project::from_path(path)
                    .with_context(|| format!("loading project {}", path.display()))?;
                settings = loaded.apply(settings)?;
                inputs.extend(loaded.input_files.clone());
                project_output = loaded.output_path.clone();
            }
            inputs.extend(models);
            if inputs.is_empty() {
                bail!("no model files given; pass them directly or through --project");
            }

            if let Some(value) = limit_order {
                settings = settings.limit_order(value)?;
            }
            if let Some(value) = cut_off {
                settings = settings.cut_off(value)?;
            }
            if let Some(value) = num_sums {
                settings = settings.num_sums(value)?;
            }
            if let Some(value) = mission_time {
                settings = settings.mission_time(value)?;
            }
            if let Some(value) = num_trials {
                settings = settings.num_trials(value)?;
            }
            if let Some(value) = seed {
                settings = settings.seed(value);
            }
            if let Some(value) = approximation {
                settings = settings.approximation(value);
            }
            if probability {
                settings = settings.probability(true);
            }
            if importance {
                settings = settings.importance(true);
            }
            if uncertainty {
                settings = settings.uncertainty(true);
            }
            if ccf {
                settings = settings.ccf(true);
            }

            let model = load_models(&inputs)?;
            info!(
                model = model.name.as_deref().unwrap_or("unnamed"),
                limit_order = settings.limit_order,
                "starting analysis"
            );
            let analysis = RiskAnalysis::new(model, settings);
            let analysis_report = analysis.analyze()?;

            let rendered = if json {
                report::format_json(&analysis_report)?
            } else {
                report::format_report(&analysis_report)
            };
            match output.or(project_output) {
                Some(path) => fs::write(&path, rendered)
                    .with_context(|| format!("writing report to {}", path.display()))?,
                None => print!("{}", rendered),
            }
            Ok(())
        }
        Commands::Validate {
            models,
            mission_time,
        } => {
            if models.is_empty() {
                bail!("no model files given");
            }
            let model = load_models(&models)?;
            model.validate(mission_time)?;
            println!(
                "ok: {} basic events, {} gates, top gate {}",
                model.basic_events.len(),
                model.gates.len(),
                model.top_gate()?
            );
            Ok(())
        }
    }
}

fn load_models(paths: &[PathBuf]) -> Result<Model> {
    let mut merged = Model::default();
    for path in paths {
        let model = Model::from_path(path)
            .with_context(|| format!("loading model {}", path.display()))?;
        merged
            .absorb(model)
            .with_context(|| format!("merging model {}", path.display()))?;
    }
    Ok(merged)
}
