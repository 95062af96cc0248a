//! kvsweep command line entry point
//!
//! Runs the sweep, aggregation and charting stages separately or back to back.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kvsweep::{
    aggregate, chart, sweep, Config, Distribution, FailurePolicy, ImageFormat, ProcessRunner,
    SweepConfig,
};

#[derive(Parser)]
#[command(name = "kvsweep")]
#[command(about = "Benchmark key-value stores with YCSB, aggregate the trials and chart them")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark sweep and append results to the raw store
    Sweep(SweepArgs),

    /// Summarize the raw store into the filtered store
    Aggregate,

    /// Render charts from the filtered store
    Chart(ChartArgs),

    /// Sweep, aggregate and chart in one go
    RunAll {
        #[command(flatten)]
        sweep: SweepArgs,

        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Validate or write the configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Write the effective configuration to this path
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SweepArgs {
    /// Database(s) to benchmark
    #[arg(short = 'd', long = "db", num_args = 1..)]
    stores: Vec<String>,

    /// Workloads on which to benchmark
    #[arg(short, long = "workload", num_args = 1..)]
    workloads: Vec<String>,

    /// Max number of threads to run on each configuration
    #[arg(short, long)]
    max_threads: Option<u32>,

    /// Number of trials of each configuration to run
    #[arg(short, long)]
    trials: Option<u32>,

    /// Key distributions to sweep
    #[arg(long = "distribution", num_args = 1..)]
    distributions: Vec<Distribution>,

    /// Log failed trials and keep going instead of aborting
    #[arg(long)]
    skip_failures: bool,

    /// Per-trial timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args)]
struct ChartArgs {
    /// Write SVG instead of PNG
    #[arg(long)]
    svg: bool,

    /// Chart output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = initialize_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let config = match Config::load_with_fallback(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Sweep(args) => run_sweep(config, args).await,
        Commands::Aggregate => run_aggregate(&config),
        Commands::Chart(args) => run_charts(config, args),
        Commands::RunAll { sweep, chart } => run_all(config, sweep, chart).await,
        Commands::Config { show, write } => handle_config(&config, show, write),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn initialize_logging(cli: &Cli) -> Result<()> {
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("kvsweep={}", log_level).parse()?)
        .add_directive("tokio=warn".parse()?);

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}

fn sweep_config(config: &mut Config, args: SweepArgs) -> Result<SweepConfig> {
    if let Some(secs) = args.timeout {
        config.benchmark.timeout_secs = Some(secs);
    }

    let mut sweep = config.sweep_config();
    if !args.stores.is_empty() {
        sweep.stores = args.stores;
    }
    if !args.workloads.is_empty() {
        sweep.workloads = args.workloads;
    }
    if let Some(max_threads) = args.max_threads {
        sweep.max_threads = max_threads;
    }
    if let Some(trials) = args.trials {
        sweep.trials = trials;
    }
    if !args.distributions.is_empty() {
        sweep.distributions = args.distributions;
    }
    if args.skip_failures {
        sweep.failure_policy = FailurePolicy::Skip;
    }
    sweep.show_progress = !args.no_progress;

    if sweep.stores.is_empty() || sweep.workloads.is_empty() {
        bail!("at least one --db and one --workload are required (or set them under [sweep])");
    }
    Ok(sweep)
}

async fn run_sweep(mut config: Config, args: SweepArgs) -> Result<()> {
    let sweep_config = sweep_config(&mut config, args)?;
    let runner = ProcessRunner::new(config.runner_config());

    let report = sweep::run(&sweep_config, &runner)
        .await
        .context("sweep failed")?;

    println!(
        "Recorded {}/{} trials in {}",
        report.completed,
        report.planned,
        sweep_config.raw_path.display()
    );
    for (trial, reason) in &report.failed {
        println!("  skipped {}: {}", trial, reason);
    }
    Ok(())
}

fn run_aggregate(config: &Config) -> Result<()> {
    let report = aggregate::run(&config.paths.raw_data, &config.paths.filtered_data)
        .context("aggregation failed")?;

    for gap in &report.gaps {
        warn!("no samples for {} {} {}", gap.bucket, gap.stage, gap.metric);
    }
    println!(
        "Summarized {} buckets into {}",
        report.buckets,
        config.paths.filtered_data.display()
    );
    Ok(())
}

fn run_charts(mut config: Config, args: ChartArgs) -> Result<()> {
    if args.svg {
        config.charts.format = ImageFormat::Svg;
    }
    if let Some(dir) = args.output_dir {
        config.paths.graphs_dir = dir;
    }

    let renderer = config.renderer();
    let written = chart::render::run(&renderer, &config.paths.filtered_data, &config.charts.tasks)
        .context("chart rendering failed")?;

    println!("Wrote {} charts to {}", written.len(), renderer.output_dir.display());
    Ok(())
}

async fn run_all(config: Config, sweep: SweepArgs, chart: ChartArgs) -> Result<()> {
    let started = Instant::now();
    run_sweep(config.clone(), sweep).await?;
    run_aggregate(&config)?;
    run_charts(config, chart)?;
    info!("Pipeline finished in {}s", started.elapsed().as_secs());
    Ok(())
}

fn handle_config(config: &Config, show: bool, write: Option<PathBuf>) -> Result<()> {
    config.validate()?;

    if let Some(path) = write {
        config.save_to_file(&path)?;
        println!("Configuration written to: {}", path.display());
    } else if show {
        println!("Effective configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    } else {
        println!("Configuration is valid");
    }

    Ok(())
}
