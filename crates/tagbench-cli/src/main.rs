//! Tag storage benchmark runner.
//!
//! Runs the configured search and write workloads against each selected
//! engine/model pair and prints one line per measurement.

mod args;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use args::Args;
use tagbench::{BenchmarkConfig, BenchmarkRunner, ConnectionConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagbench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => println!("\nBenchmark completed successfully"),
        Err(e) => {
            eprintln!("\nBenchmark failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let output = args.output.clone();
    let (config, connection) = args.into_configs()?;
    print_configuration(&config, &connection);

    let mut runner = BenchmarkRunner::new(connection);
    let report = runner.run(&config).await?;

    if let Some(path) = output {
        report.write_json(&path)?;
        tracing::info!(path = %path.display(), "report written");
    }
    Ok(())
}

fn print_configuration(config: &BenchmarkConfig, connection: &ConnectionConfig) {
    println!("Benchmark configuration:");
    println!("  type:              {}", config.workload);
    println!("  database:          {}", config.engines);
    println!("  model:             {}", config.models);
    println!("  data size:         {}", config.data_size);
    println!("  iterations:        {}", config.iterations);
    println!("  warmup iterations: {}", config.warmup_iterations);
    println!("  write size:        {}", config.write_test_size);
    println!("  seed:              {}", config.seed);
    match &connection.duckdb_path {
        Some(path) => println!("  duckdb:            {}", path.display()),
        None => println!("  duckdb:            in-memory"),
    }
    match &connection.sqlite_path {
        Some(path) => println!("  sqlite:            {}", path.display()),
        None => println!("  sqlite:            in-memory"),
    }
}
