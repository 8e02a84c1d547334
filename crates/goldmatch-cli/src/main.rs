use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use goldmatch_core::{
    ColumnSelection, ComparisonPolicy, Config, GoldErrorMode, PolicySet, ResultFormat, Table,
};
use goldmatch_engine::{profile_table, TableComparator, Verdict};
use goldmatch_loader::{
    directory_loader, load_instances, load_policies, read_result_file, CsvDirectoryLoader,
    TableLoader,
};
use goldmatch_scorer::{BatchScorer, ScoreReport, ScorerOptions};

const DEFAULT_CONFIG: &str = "goldmatch.toml";

/// goldmatch - Score text-to-SQL results against gold results
#[derive(Parser)]
#[command(name = "goldmatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: goldmatch.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every benchmark instance and print a report
    Evaluate {
        /// Benchmark instances (JSONL)
        #[arg(long)]
        instances: Option<PathBuf>,

        /// Evaluation standards (JSONL)
        #[arg(long)]
        policies: Option<PathBuf>,

        /// Directory of gold CSV results
        #[arg(long)]
        gold_dir: Option<PathBuf>,

        /// Directory of candidate results
        #[arg(long)]
        candidate_dir: Option<PathBuf>,

        /// Candidate result format (csv or json)
        #[arg(long)]
        candidate_format: Option<ResultFormat>,

        /// Instances evaluated at once
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Per-load timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Record missing gold results as harness errors instead of aborting
        #[arg(long)]
        record_gold_errors: bool,

        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only evaluate these instance ids
        #[arg(long, num_args = 1..)]
        only: Vec<String>,
    },

    /// Compare one candidate result file against one gold result file
    Compare {
        /// Candidate result (.csv or .json)
        candidate: PathBuf,

        /// Gold result (.csv or .json)
        gold: PathBuf,

        /// Gold columns to compare: "0,2", "all" or "none"
        #[arg(long)]
        columns: Option<String>,

        /// Compare rows as multisets
        #[arg(long)]
        ignore_order: bool,

        /// Absolute numeric tolerance
        #[arg(long)]
        tolerance: Option<f64>,

        /// Compare text case-insensitively
        #[arg(long)]
        case_insensitive: bool,

        /// Trim whitespace before comparing text
        #[arg(long)]
        trim: bool,
    },

    /// Show the column profile of a result file
    Inspect {
        /// Result file (.csv or .json)
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::from(2)
        }
    }
}

/// Log to stderr, filtered by GOLDMATCH_LOG, then RUST_LOG
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env("GOLDMATCH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Evaluate {
            instances,
            policies,
            gold_dir,
            candidate_dir,
            candidate_format,
            parallel,
            timeout,
            record_gold_errors,
            output,
            only,
        } => {
            let mut config = config;
            let paths = &mut config.paths;
            paths.instances = instances.or(paths.instances.take());
            paths.policies = policies.or(paths.policies.take());
            paths.gold_dir = gold_dir.or(paths.gold_dir.take());
            paths.candidate_dir = candidate_dir.or(paths.candidate_dir.take());

            let run_config = &mut config.run;
            if let Some(format) = candidate_format {
                run_config.candidate_format = format;
            }
            if let Some(parallel) = parallel {
                run_config.parallel = parallel;
            }
            if let Some(timeout) = timeout {
                anyhow::ensure!(timeout > 0, "--timeout must be at least 1 second");
                run_config.timeout_seconds = timeout;
            }
            if record_gold_errors {
                run_config.on_gold_error = GoldErrorMode::Record;
            }

            evaluate_command(&config, output.as_deref(), &only, cli.verbose).await
        }
        Commands::Compare {
            candidate,
            gold,
            columns,
            ignore_order,
            tolerance,
            case_insensitive,
            trim,
        } => {
            let mut policy = config.comparison.default_policy();
            if let Some(columns) = columns {
                policy.columns = parse_columns(&columns)?;
            }
            if ignore_order {
                policy.ignore_order = true;
            }
            if let Some(tolerance) = tolerance {
                policy.tolerance = tolerance;
            }
            if case_insensitive {
                policy.text.case_insensitive = true;
            }
            if trim {
                policy.text.trim_whitespace = true;
            }

            compare_command(&config, &candidate, &gold, &policy)
        }
        Commands::Inspect { file } => inspect_command(&config, &file),
    }
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(config_path) = path {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };
    Ok(config)
}

/// Evaluate command - score every instance
async fn evaluate_command(
    config: &Config,
    output: Option<&Path>,
    only: &[String],
    verbose: bool,
) -> Result<ExitCode> {
    let paths = &config.paths;
    let instances_path = paths
        .instances
        .as_deref()
        .context("No instances file: pass --instances or set paths.instances")?;
    let gold_dir = paths
        .gold_dir
        .as_deref()
        .context("No gold directory: pass --gold-dir or set paths.gold_dir")?;
    let candidate_dir = paths
        .candidate_dir
        .as_deref()
        .context("No candidate directory: pass --candidate-dir or set paths.candidate_dir")?;

    if verbose {
        eprintln!("{} {}", "Loading instances from:".cyan(), instances_path.display());
    }
    let mut instances = load_instances(instances_path)?;

    if !only.is_empty() {
        for id in only {
            if !instances.iter().any(|i| &i.instance_id == id) {
                eprintln!("{} unknown instance id '{}'", "warning:".yellow(), id);
            }
        }
        instances.retain(|i| only.contains(&i.instance_id));
    }

    let defaults = config.comparison.default_policy();
    let policies = match paths.policies.as_deref() {
        Some(path) => {
            if verbose {
                eprintln!("{} {}", "Loading evaluation standards from:".cyan(), path.display());
            }
            load_policies(path, defaults)?
        }
        None => PolicySet::new(defaults),
    };

    let comparison = &config.comparison;
    let gold: Arc<dyn TableLoader> = Arc::new(
        CsvDirectoryLoader::new(gold_dir)
            .with_null_tokens(comparison.null_tokens.clone())
            .with_ragged_rows(comparison.ragged_rows),
    );
    let candidate = directory_loader(
        config.run.candidate_format,
        candidate_dir,
        comparison.null_tokens.clone(),
        comparison.ragged_rows,
    );

    if verbose {
        eprintln!(
            "{} {} instances ({} parallel, {}s timeout)",
            "Scoring".cyan(),
            instances.len(),
            config.run.parallel,
            config.run.timeout_seconds
        );
    }

    let scorer = BatchScorer::new(ScorerOptions::from_config(&config.run));
    let stop = scorer.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, waiting for in-flight instances");
            stop.stop();
        }
    });

    let metrics = scorer
        .run(&instances, &policies, candidate, gold)
        .await
        .context("Batch aborted")?;

    let report = ScoreReport::new(&metrics);
    report.print_terminal_report();

    if let Some(output) = output {
        report
            .save_json(output)
            .with_context(|| format!("Failed to write report to {}", output.display()))?;
        println!("{} {}", "Report written to".green(), output.display());
    }

    if metrics.has_harness_errors() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Compare command - one candidate file against one gold file
fn compare_command(
    config: &Config,
    candidate_path: &Path,
    gold_path: &Path,
    policy: &ComparisonPolicy,
) -> Result<ExitCode> {
    let candidate = read_table(config, candidate_path, "candidate")?;
    let gold = read_table(config, gold_path, "gold")?;

    let verdict = TableComparator::compare(&candidate, &gold, policy)
        .context("Invalid comparison policy")?;

    match verdict {
        Verdict::Match => {
            println!("{}", "✓ MATCH".green().bold());
            Ok(ExitCode::SUCCESS)
        }
        Verdict::Mismatch(mismatch) => {
            println!("{} {}", "✗ MISMATCH".red().bold(), mismatch.kind.as_str().yellow());
            println!("  {}", mismatch.message);
            if let Some(loc) = mismatch.location {
                println!("  at row {}, column {}", loc.row, loc.column);
            }
            if let Some(expected) = &mismatch.expected {
                println!("  Expected: {}", expected);
            }
            if let Some(actual) = &mismatch.actual {
                println!("  Actual:   {}", actual);
            }
            Ok(ExitCode::from(1))
        }
    }
}

/// Inspect command - column profile and mixed-type warnings
fn inspect_command(config: &Config, path: &Path) -> Result<ExitCode> {
    let table = read_table(config, path, "result")?;
    let profile = profile_table(&table);

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", path.display().to_string().bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!("Rows: {}  Columns: {}", profile.rows, profile.columns.len());
    println!();

    for column in &profile.columns {
        let line = format!(
            "  [{}] {:<24} {}",
            column.position,
            column.name,
            column.summary()
        );
        if column.is_mixed() {
            println!("{}  {}", line.yellow(), "⚠ mixed".yellow().bold());
        } else {
            println!("{}", line);
        }
    }

    if profile.has_mixed_columns() {
        println!();
        println!(
            "{}",
            "⚠ Mixed-type columns compare cell by cell; numeric and text cells never match each other"
                .yellow()
        );
    }

    Ok(ExitCode::SUCCESS)
}

fn read_table(config: &Config, path: &Path, role: &str) -> Result<Table> {
    read_result_file(
        path,
        &config.comparison.null_tokens,
        config.comparison.ragged_rows,
    )
    .with_context(|| format!("Failed to load {} {}", role, path.display()))
}

/// Parse a `--columns` value: comma-separated positions, "all" or "none"
fn parse_columns(raw: &str) -> Result<ColumnSelection> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "all" => Ok(ColumnSelection::All),
        "none" => Ok(ColumnSelection::Nothing),
        list => {
            let positions = list
                .split(',')
                .map(|part| {
                    part.trim()
                        .parse::<usize>()
                        .with_context(|| format!("Invalid column position '{}'", part.trim()))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ColumnSelection::from_positions(positions))
        }
    }
}
