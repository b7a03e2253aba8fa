use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;

#[derive(Parser)]
#[command(name = "jobpool-cmd")]
#[command(about = "Runs a batch of jobs through a fixed-size worker pool")]
#[command(version)]
struct Cli {
    /// Number of jobs to generate (jobs are the integers 1..=N)
    #[arg(long, default_value_t = 10)]
    jobs: u64,

    /// Number of workers in the pool
    #[arg(long, default_value_t = jobpool_workflow::config::DEFAULT_NUM_WORKERS)]
    workers: usize,

    /// Simulated processing time per job, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
}

fn main() -> Result<()> {
    // Logs go to stderr so that stdout carries only the collected results.
    // RUST_LOG overrides the default `info` filter.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    commands::run::run(cli.jobs, cli.workers, cli.delay_ms)
}
