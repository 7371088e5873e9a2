use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::info;

use lucretia_xopt::optimization::{OptimizationDriver, ProgressLog};
use lucretia_xopt::python::{build_evaluator, CnsgaGenerator};
use lucretia_xopt::simulation::RunDirectory;
use lucretia_xopt::{enable_tracing, ParameterVector, Settings};

#[derive(Parser, Debug)]
#[command(name = "lucretia-xopt", about = "Lucretia injector optimization driver")]
struct Cli {
    /// YAML settings file; defaults reproduce the injector setup.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the optimizer configuration for a fresh run directory.
    Config,
    /// Run the CNSGA optimization until the evaluation budget is spent.
    Run,
    /// Evaluate recorded points without a generator.
    EvaluateData(EvaluateDataArgs),
}

#[derive(ClapArgs, Debug)]
struct EvaluateDataArgs {
    /// YAML list of parameter maps.
    #[arg(long)]
    points: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    enable_tracing(cli.verbose);
    pyo3::prepare_freethreaded_python();

    let settings = Settings::load_or_default(cli.settings.as_deref())
        .context("failed to load settings")?;
    let run_dir = match cli.command {
        Command::Config => RunDirectory::planned(&settings.output_root),
        _ => RunDirectory::create(&settings.output_root)?,
    };
    let config = settings.xopt_config(&run_dir)?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_yaml()?);
        }
        Command::Run => {
            let evaluator = build_evaluator(&settings, run_dir)?;
            let mut generator = CnsgaGenerator::new(&config)?;
            let mut progress = ProgressLog::new(config.vocs.objectives.clone());
            let mut driver = OptimizationDriver::new(config, &evaluator)?;

            let summary = driver.run(&mut generator, &mut progress)?;
            progress.log_summary();
            info!(
                evaluations = summary.evaluations,
                feasible = summary.feasible,
                dump = %driver.config().xopt.dump_file.display(),
                "{}",
                summary.message
            );
        }
        Command::EvaluateData(args) => {
            let text = fs::read_to_string(&args.points)
                .with_context(|| format!("failed to read {}", args.points.display()))?;
            let points: Vec<ParameterVector> = serde_yaml::from_str(&text)
                .with_context(|| format!("invalid points file {}", args.points.display()))?;

            let evaluator = build_evaluator(&settings, run_dir)?;
            let mut progress = ProgressLog::new(config.vocs.objectives.clone());
            let mut driver = OptimizationDriver::new(config, &evaluator)?;

            let records = driver.evaluate_data(&points, &mut progress)?;
            progress.log_summary();
            info!(
                evaluated = records.len(),
                dump = %driver.config().xopt.dump_file.display(),
                "recorded points evaluated"
            );
        }
    }

    Ok(())
}
