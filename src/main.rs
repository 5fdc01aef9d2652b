use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};

use restaurant_sim::config::SimConfig;
use restaurant_sim::{logging, sim};

// Benchmarks run this much faster than real time unless told otherwise.
const BENCH_TIME_SCALE: f64 = 0.01;

#[derive(Parser)]
#[command(name = "restaurant_sim")]
#[command(about = "Concurrent restaurant simulation: customers, waiters, cooks and a receptionist")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,

    /// Increase log detail (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Run a timed demo and print a summary (default)
    Run(RunArgs),
    /// Serve a fixed number of customers and print one CSV line
    Bench(BenchArgs),
    /// Sweep table/waiter/cook counts and print CSV
    Stress(StressArgs),
}

#[derive(Args, Clone)]
struct WorldArgs {
    /// TOML file with simulation settings; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    tables: Option<usize>,
    #[arg(long)]
    waiters: Option<usize>,
    #[arg(long)]
    cooks: Option<usize>,
    /// Poisson arrival rate per arrival tick
    #[arg(long)]
    lambda: Option<f64>,
    /// Multiplier applied to every simulated duration
    #[arg(long)]
    time_scale: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[command(flatten)]
    world: WorldArgs,
    /// Wall-clock length of the demo
    #[arg(long, default_value = "10")]
    duration_secs: f64,
}

#[derive(Args, Clone)]
struct BenchArgs {
    #[command(flatten)]
    world: WorldArgs,
    #[arg(long, default_value = "20")]
    customers: u64,
    /// Give up after this many wall-clock seconds
    #[arg(long, default_value = "60")]
    limit_secs: f64,
}

#[derive(Args, Clone)]
struct StressArgs {
    #[command(flatten)]
    world: WorldArgs,
    #[arg(long, value_delimiter = ',', default_value = "2,5,10")]
    table_sets: Vec<usize>,
    #[arg(long, value_delimiter = ',', default_value = "1,2,4")]
    waiter_sets: Vec<usize>,
    #[arg(long, value_delimiter = ',', default_value = "1,2")]
    cook_sets: Vec<usize>,
    #[arg(long, default_value = "10")]
    customers: u64,
    #[arg(long, default_value = "60")]
    limit_secs: f64,
}

fn seconds(value: f64, name: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid --{name}: {value}"))
}

/// Load the optional config file, then apply flag overrides.
fn build_config(args: &WorldArgs, default_time_scale: Option<f64>) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(tables) = args.tables {
        config.tables = tables;
    }
    if let Some(waiters) = args.waiters {
        config.waiters = waiters;
    }
    if let Some(cooks) = args.cooks {
        config.cooks = cooks;
    }
    if let Some(lambda) = args.lambda {
        config.arrival_rate = lambda;
    }
    if let Some(scale) = args.time_scale.or(default_time_scale) {
        config.time_scale = scale;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command.unwrap_or(Command::Run(cli.run)) {
        Command::Run(args) => {
            let config = build_config(&args.world, None)?;
            sim::run_demo(config, seconds(args.duration_secs, "duration-secs")?)?;
        }
        Command::Bench(args) => {
            let config = build_config(&args.world, Some(BENCH_TIME_SCALE))?;
            sim::run_benchmark(
                config,
                args.customers,
                seconds(args.limit_secs, "limit-secs")?,
            )?;
        }
        Command::Stress(args) => {
            let base = build_config(&args.world, Some(BENCH_TIME_SCALE))?;
            for (name, sets) in [
                ("table-sets", &args.table_sets),
                ("waiter-sets", &args.waiter_sets),
                ("cook-sets", &args.cook_sets),
            ] {
                anyhow::ensure!(
                    !sets.is_empty() && sets.iter().all(|&n| n > 0),
                    "--{name} values must all be > 0"
                );
            }
            sim::run_stress(
                base,
                &args.table_sets,
                &args.waiter_sets,
                &args.cook_sets,
                args.customers,
                seconds(args.limit_secs, "limit-secs")?,
            )?;
        }
    }
    Ok(())
}
