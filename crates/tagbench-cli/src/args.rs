//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use tagbench::config::{
    DEFAULT_DATA_SIZE, DEFAULT_ITERATIONS, DEFAULT_MAX_CONNECTIONS, DEFAULT_WARMUP_ITERATIONS,
    DEFAULT_WRITE_TEST_SIZE,
};
use tagbench::fixtures::DEFAULT_SEED;
use tagbench::{BenchmarkConfig, ConnectionConfig, Result};

/// Tag storage benchmark runner.
#[derive(Parser, Debug)]
#[command(name = "tagbench")]
#[command(version, about = "Benchmark normalized, array and document tag storage", long_about = None)]
pub struct Args {
    /// Workload to run: search, write or all.
    #[arg(long = "type", default_value = "all")]
    pub workload: String,

    /// Engine to run against: postgresql, duckdb, sqlite or all.
    #[arg(long, default_value = "postgresql")]
    pub database: String,

    /// Model to run: normalized, array, document or all.
    #[arg(long, default_value = "all")]
    pub model: String,

    /// People seeded before the workloads.
    #[arg(long, default_value_t = DEFAULT_DATA_SIZE)]
    pub data_size: usize,

    /// Measured runs per search shape.
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,

    /// Unmeasured runs per search shape.
    #[arg(long, default_value_t = DEFAULT_WARMUP_ITERATIONS)]
    pub warmup_iterations: usize,

    /// Records per write measurement.
    #[arg(long, default_value_t = DEFAULT_WRITE_TEST_SIZE)]
    pub write_size: usize,

    /// PostgreSQL connection string. Defaults to `DATABASE_URL`.
    #[arg(long)]
    pub database_url: Option<String>,

    /// DuckDB database file (in-memory when omitted).
    #[arg(long)]
    pub duckdb_path: Option<PathBuf>,

    /// SQLite database file (in-memory when omitted).
    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,

    /// PostgreSQL pool size.
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Seed for generated data.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Write the JSON report to this file.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl Args {
    /// Convert command-line arguments to benchmark and connection configuration.
    pub fn into_configs(self) -> Result<(BenchmarkConfig, ConnectionConfig)> {
        let benchmark = BenchmarkConfig::new()
            .with_workload(self.workload.parse()?)
            .with_engines(self.database.parse()?)
            .with_models(self.model.parse()?)
            .with_data_size(self.data_size)
            .with_iterations(self.iterations)
            .with_warmup_iterations(self.warmup_iterations)
            .with_write_test_size(self.write_size)
            .with_seed(self.seed);

        let mut connection =
            ConnectionConfig::from_env().with_max_connections(self.max_connections);
        if let Some(url) = self.database_url {
            connection = connection.with_database_url(url);
        }
        if let Some(path) = self.duckdb_path {
            connection = connection.with_duckdb_path(path);
        }
        if let Some(path) = self.sqlite_path {
            connection = connection.with_sqlite_path(path);
        }

        Ok((benchmark, connection))
    }
}
