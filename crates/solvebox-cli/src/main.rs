//! Solvebox CLI
//!
//! A command-line tool for judging puzzle solutions in container sandboxes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solvebox::{
    Config, EXAMPLE_CONFIG, MemoryStore, Runner, ScoringMode, SuiteRequest, TestCase, ValueType,
    size_score,
};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "solvebox")]
#[command(about = "A tool for judging puzzle solutions in sandboxed containers")]
#[command(version)]
struct Cli {
    /// Path to configuration file
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
    /// Initialize a new configuration file
    Init {
        /// Output path (default: solvebox.toml)
        #[arg(short, long, default_value = "solvebox.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a solution against test cases and print the report as JSON
    Run {
        #[command(flatten)]
        suite: SuiteArgs,
    },

    /// Run a solution and store it if it beats the stored best
    Submit {
        #[command(flatten)]
        suite: SuiteArgs,

        /// JSON file holding stored solutions (created if missing)
        #[arg(short, long, default_value = "solutions.json")]
        store: PathBuf,

        /// Puzzle ID
        #[arg(short, long)]
        puzzle: String,

        /// Submitting user
        #[arg(short, long)]
        user: String,
    },

    /// Print the size score of a source file
    Score {
        /// Source file to score
        #[arg(value_name = "FILE")]
        source: PathBuf,
    },

    /// List available languages
    Languages,

    /// Show effective configuration
    ShowConfig,
}

#[derive(clap::Args)]
struct SuiteArgs {
    /// Source file defining `solve`
    #[arg(value_name = "FILE")]
    source: PathBuf,

    /// Language ID (e.g., javascript, python)
    #[arg(short, long)]
    language: String,

    /// JSON array of {"input", "output"} test cases
    #[arg(short, long)]
    tests: PathBuf,

    /// Scoring mode: size (chars) or time (runtime)
    #[arg(short, long, default_value = "size")]
    mode: ScoringMode,

    /// Declared input type, e.g. number or string[]
    #[arg(long)]
    input_type: Option<ValueType>,

    /// Declared output type, e.g. boolean or number[]
    #[arg(long)]
    output_type: Option<ValueType>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    // Logs go to stderr so reports on stdout stay machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Run { suite } => run_suite(config, &suite).await,
        Commands::Submit {
            suite,
            store,
            puzzle,
            user,
        } => run_submit(config, &suite, &store, &puzzle, &user).await,
        Commands::Score { source } => score_source(&source).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn load_suite(args: &SuiteArgs) -> Result<SuiteRequest> {
    let code = tokio::fs::read_to_string(&args.source)
        .await
        .context("failed to read source file")?;
    let tests = tokio::fs::read_to_string(&args.tests)
        .await
        .context("failed to read test cases")?;
    let test_cases: Vec<TestCase> =
        serde_json::from_str(&tests).context("test cases must be a JSON array of {input, output}")?;

    Ok(SuiteRequest {
        code,
        language: args.language.clone(),
        test_cases,
        scoring_mode: args.mode,
        input_type: args.input_type,
        output_type: args.output_type,
    })
}

async fn run_suite(config: Config, args: &SuiteArgs) -> Result<()> {
    let request = load_suite(args).await?;
    let runner = Runner::new(config);
    runner.pool().warm();

    info!(
        language = %request.language,
        cases = request.test_cases.len(),
        "running test suite"
    );
    let report = runner.report(&request).await;
    runner.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.all_passed() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

async fn run_submit(
    config: Config,
    args: &SuiteArgs,
    store_path: &Path,
    puzzle: &str,
    user: &str,
) -> Result<()> {
    let request = load_suite(args).await?;
    let store = MemoryStore::load(store_path).context("failed to load solution store")?;
    let runner = Runner::new(config);
    runner.pool().warm();

    let outcome = runner.submit(&request, puzzle, user, &store).await;
    runner.shutdown().await;
    let outcome = outcome.context("submission failed")?;

    store
        .save(store_path)
        .context("failed to save solution store")?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn score_source(source: &Path) -> Result<()> {
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;
    println!("{}", size_score(&code));
    Ok(())
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    let mut languages: Vec<_> = config.languages.iter().collect();
    languages.sort_by_key(|(id, _)| *id);

    for (id, lang) in languages {
        println!("  {:<15} {} ({})", id, lang.name, lang.image);
    }
}

fn show_config(config: &Config) {
    println!("Container runtime: {}", config.runtime_binary().display());
    println!("Pool size per language: {}", config.pool_size);
    println!("Acquire wait: {} ms", config.acquire_wait_ms);
    println!("Benchmark runs: {}", config.bench_runs);
    println!("Suite timeout: {}s", config.suite_timeout);
    println!();
    println!("Default resource limits:");
    println!(
        "  Memory limit: {:?} MB",
        config.default_limits.memory_limit
    );
    println!("  CPUs: {:?}", config.default_limits.cpus);
    println!("  Max processes: {:?}", config.default_limits.max_processes);
    println!(
        "  Wall time limit: {:?}",
        config.default_limits.wall_time_limit
    );
    println!("  Max output: {:?} KB", config.default_limits.max_output);
    println!("  Tmpfs size: {:?} MB", config.default_limits.tmpfs_size);
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
