use anyhow::{Context, Result};
use clap::{error::ErrorKind, ArgGroup, CommandFactory, Parser};
use pgbao::config::{self, BaoSettings};
use pgbao::db::{create_client, ConnectionConfig};
use pgbao::explain::PlanRecord;
use pgbao::export::{self, RunAction};
use pgbao::trainer::{reset_bao, ModelTrainer, ScriptTrainer};
use pgbao::workload::{
    read_statements, schedule, training, BaoController, ChunkSize, QueryExecutor,
    TrainingAnnotation, TrainingManifest, TrainingSelection, WorkloadRunner,
};
use pgbao::WorkloadError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Run an SQL workload against a Bao-enabled PostgreSQL and control the Bao server
#[derive(Parser)]
#[command(version, about)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["run_workload", "retrain_bao", "reset_bao"])
))]
struct Cli {
    /// Run a workload with both Bao learning and Bao planning enabled
    #[arg(long)]
    run_workload: bool,

    /// Don't run any workload, only retrain the Bao model
    #[arg(long)]
    retrain_bao: bool,

    /// Delete everything Bao has learned so far and restart PostgreSQL and the Bao server
    #[arg(long)]
    reset_bao: bool,

    /// File to load the workload from (with --run-workload)
    #[arg(long, short = 'w')]
    workload: Option<PathBuf>,

    /// Retrain the Bao model every N training queries; negative disables retraining
    #[arg(long, short = 'r', value_name = "N", default_value_t = -1, allow_negative_numbers = true)]
    retrain: i64,

    /// Fraction of the workload queries used as training data (default: all)
    #[arg(long)]
    training_fraction: Option<f64>,

    /// Read which queries are used for training from a file written by --training-out
    #[arg(long)]
    training_in: Option<PathBuf>,

    /// Document which queries were used for training
    #[arg(long)]
    training_out: Option<PathBuf>,

    /// Seed for --training-fraction sampling
    #[arg(long)]
    seed: Option<u64>,

    /// File to write the workload results to (default: stdout)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Custom PostgreSQL connect string
    #[arg(long = "pg-connect", short = 'c', value_name = "CONNECT")]
    pg_connect: Option<String>,

    /// CA certificate (PEM) used when the connect string requests TLS
    #[arg(long)]
    pg_ca_cert: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pg_accept_invalid_certs: bool,

    /// Settings file with the Bao server locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Measure the execution time of this command
    #[arg(long, short = 't')]
    timing: bool,

    /// Write timing information to the given file instead of stdout
    #[arg(long)]
    timing_out: Option<PathBuf>,

    /// Don't write progress messages to stderr
    #[arg(long, short = 'q')]
    quiet: bool,
}

impl Cli {
    fn action(&self) -> RunAction {
        if self.run_workload {
            RunAction::Workload
        } else if self.retrain_bao {
            RunAction::Retrain
        } else {
            RunAction::Reset
        }
    }

    fn training_selection(&self) -> TrainingSelection {
        match (&self.training_in, self.training_fraction) {
            (Some(path), fraction) => {
                if fraction.is_some() {
                    tracing::warn!(
                        "Ignoring --training-fraction argument since source file was specified explicitly."
                    );
                }
                TrainingSelection::Manifest(path.clone())
            }
            (None, Some(fraction)) => TrainingSelection::Fraction(fraction),
            (None, None) => TrainingSelection::All,
        }
    }

    fn connection_config(&self) -> ConnectionConfig {
        let mut conn = match &self.pg_connect {
            Some(s) => ConnectionConfig::new(s.clone()),
            None => ConnectionConfig::local_default(),
        };
        conn.ca_cert_path = self.pg_ca_cert.clone();
        conn.accept_invalid_certs = self.pg_accept_invalid_certs;
        conn
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.run_workload && cli.workload.is_none() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "No workload given. Use --workload to specify the source file.",
            )
            .exit();
    }
    if let Some(fraction) = cli.training_fraction {
        if !(0.0..=1.0).contains(&fraction) {
            Cli::command()
                .error(
                    ErrorKind::ValueValidation,
                    format!("--training-fraction must lie within [0, 1], got {}", fraction),
                )
                .exit();
        }
    }

    // Setup logging
    let default_level = if cli.quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted");
            std::process::exit(1);
        }
    });

    let start = Instant::now();
    let settings = BaoSettings::load(cli.config.as_deref())?;

    match cli.action() {
        RunAction::Workload => run_workload(&cli, settings).await?,
        RunAction::Retrain => {
            ScriptTrainer::new(settings, cli.quiet)
                .retrain()
                .await
                .context("Retraining failed")?;
        }
        RunAction::Reset => reset_bao(&settings, cli.quiet)
            .await
            .context("Resetting Bao failed")?,
    }

    if cli.timing {
        let runtime = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &cli.timing_out {
            Some(path) => export::write_runtime(path, cli.action(), runtime)?,
            None => println!("{}", runtime),
        }
    }

    Ok(())
}

async fn run_workload(cli: &Cli, settings: BaoSettings) -> Result<()> {
    let Some(workload_path) = cli.workload.as_deref() else {
        anyhow::bail!("No workload given");
    };

    // Everything that can be rejected is checked before connecting.
    let arm_count = config::arm_count_from_env()?;
    let statements = read_statements(workload_path)
        .with_context(|| format!("Failed to read workload {}", workload_path.display()))?;
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let annotations = training::select(statements, &cli.training_selection(), &mut rng)
        .context("Failed to select training queries")?;
    let actions = schedule(annotations.clone(), ChunkSize::from_retrain_interval(cli.retrain));

    let client = create_client(&cli.connection_config()).await?;
    let executor = QueryExecutor::new(client, BaoController::new(arm_count));
    let trainer = ScriptTrainer::new(settings, cli.quiet);
    let mut runner = WorkloadRunner::new(executor, trainer, cli.quiet);

    let run = runner.run(actions).await;

    // partial results are written even when the run failed
    let written = write_outputs(cli, &run.results, &annotations);
    settle(run.failure, written)
}

fn write_outputs(
    cli: &Cli,
    results: &[PlanRecord],
    annotations: &[TrainingAnnotation],
) -> Result<()> {
    match &cli.output {
        Some(path) => export::write_results_file(path, results)
            .with_context(|| format!("Failed to write results to {}", path.display()))?,
        None => export::write_results(std::io::stdout().lock(), results)?,
    }
    if let Some(path) = &cli.training_out {
        TrainingManifest::write(path, annotations)
            .with_context(|| format!("Failed to write training manifest {}", path.display()))?;
    }
    Ok(())
}

/// The run's own failure is the primary error; a failed write is attached to
/// it rather than replacing it.
fn settle(failure: Option<WorkloadError>, written: Result<()>) -> Result<()> {
    let Some(failure) = failure else {
        return written;
    };
    let report = match failure {
        WorkloadError::Database(failure) => anyhow::anyhow!(failure.display_full()),
        err => anyhow::Error::new(err),
    };
    match written {
        Ok(()) => Err(report),
        Err(write_err) => Err(report.context(format!(
            "Workload aborted and its outputs could not be written: {:#}",
            write_err
        ))),
    }
}
