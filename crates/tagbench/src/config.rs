//! Benchmark and connection configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::engine::EngineKind;
use crate::error::{Error, Result};
use crate::fixtures::DEFAULT_SEED;
use crate::models::ModelKind;

/// Default number of people seeded before searching.
pub const DEFAULT_DATA_SIZE: usize = 100_000;

/// Default number of measured runs per search shape.
pub const DEFAULT_ITERATIONS: usize = 1000;

/// Default number of unmeasured runs per search shape.
pub const DEFAULT_WARMUP_ITERATIONS: usize = 100;

/// Default number of records per write measurement.
pub const DEFAULT_WRITE_TEST_SIZE: usize = 10_000;

/// Default PostgreSQL pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Environment variable holding the PostgreSQL connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Which workloads a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Workload {
    /// Search queries only.
    Search,
    /// Inserts and updates only.
    Write,
    /// Both.
    All,
}

impl Workload {
    /// Lowercase workload name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Workload::Search => "search",
            Workload::Write => "write",
            Workload::All => "all",
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Workload {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "search" => Ok(Workload::Search),
            "write" => Ok(Workload::Write),
            "all" | "both" => Ok(Workload::All),
            other => Err(Error::Config(format!("unknown benchmark type: {}", other))),
        }
    }
}

/// A single engine or every engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSelection {
    One(EngineKind),
    All,
}

impl EngineSelection {
    fn engines(&self) -> Vec<EngineKind> {
        match self {
            EngineSelection::One(engine) => vec![*engine],
            EngineSelection::All => EngineKind::ALL.to_vec(),
        }
    }
}

impl fmt::Display for EngineSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineSelection::One(engine) => engine.fmt(f),
            EngineSelection::All => f.write_str("all"),
        }
    }
}

impl FromStr for EngineSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(EngineSelection::All);
        }
        s.parse().map(EngineSelection::One)
    }
}

/// A single model or every model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSelection {
    One(ModelKind),
    All,
}

impl ModelSelection {
    fn models(&self) -> Vec<ModelKind> {
        match self {
            ModelSelection::One(model) => vec![*model],
            ModelSelection::All => ModelKind::ALL.to_vec(),
        }
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSelection::One(model) => model.fmt(f),
            ModelSelection::All => f.write_str("all"),
        }
    }
}

impl FromStr for ModelSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(ModelSelection::All);
        }
        s.parse().map(ModelSelection::One)
    }
}

/// What to run and how much of it.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub workload: Workload,
    pub engines: EngineSelection,
    pub models: ModelSelection,
    /// People seeded before the search workload.
    pub data_size: usize,
    /// Measured runs per search shape.
    pub iterations: usize,
    /// Unmeasured runs per search shape.
    pub warmup_iterations: usize,
    /// Records per write measurement.
    pub write_test_size: usize,
    /// Seed for generated names and tag sets.
    pub seed: u64,
}

impl BenchmarkConfig {
    /// Create a configuration with every default.
    pub fn new() -> Self {
        Self {
            workload: Workload::All,
            engines: EngineSelection::One(EngineKind::Postgres),
            models: ModelSelection::All,
            data_size: DEFAULT_DATA_SIZE,
            iterations: DEFAULT_ITERATIONS,
            warmup_iterations: DEFAULT_WARMUP_ITERATIONS,
            write_test_size: DEFAULT_WRITE_TEST_SIZE,
            seed: DEFAULT_SEED,
        }
    }

    /// Set the workload.
    pub fn with_workload(mut self, workload: Workload) -> Self {
        self.workload = workload;
        self
    }

    /// Set the engine selection.
    pub fn with_engines(mut self, engines: EngineSelection) -> Self {
        self.engines = engines;
        self
    }

    /// Set the model selection.
    pub fn with_models(mut self, models: ModelSelection) -> Self {
        self.models = models;
        self
    }

    /// Set the number of seeded people.
    pub fn with_data_size(mut self, size: usize) -> Self {
        self.data_size = size;
        self
    }

    /// Set the measured iterations per search shape.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the warmup iterations per search shape.
    pub fn with_warmup_iterations(mut self, iterations: usize) -> Self {
        self.warmup_iterations = iterations;
        self
    }

    /// Set the records per write measurement.
    pub fn with_write_test_size(mut self, size: usize) -> Self {
        self.write_test_size = size;
        self
    }

    /// Set the generator seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn includes_search(&self) -> bool {
        matches!(self.workload, Workload::Search | Workload::All)
    }

    pub fn includes_write(&self) -> bool {
        matches!(self.workload, Workload::Write | Workload::All)
    }

    /// Resolve the selection into `(engine, model)` pairs, in run order.
    ///
    /// An unsupported combination is an error only when both sides were
    /// named explicitly; under `all` it is skipped.
    pub fn pairs(&self) -> Result<Vec<(EngineKind, ModelKind)>> {
        if let (EngineSelection::One(engine), ModelSelection::One(model)) =
            (self.engines, self.models)
        {
            if !is_supported(engine, model) {
                return Err(Error::Unsupported { engine, model });
            }
        }

        let pairs: Vec<_> = self
            .engines
            .engines()
            .into_iter()
            .flat_map(|engine| {
                self.models
                    .models()
                    .into_iter()
                    .map(move |model| (engine, model))
            })
            .filter(|&(engine, model)| is_supported(engine, model))
            .collect();

        if pairs.is_empty() {
            return Err(Error::Config(format!(
                "no supported combination for database {} and model {}",
                self.engines, self.models
            )));
        }
        Ok(pairs)
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `engine` can host `model`. SQLite has no array column type.
pub fn is_supported(engine: EngineKind, model: ModelKind) -> bool {
    !matches!((engine, model), (EngineKind::Sqlite, ModelKind::Array))
}

/// Where the engines live.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// DuckDB database file. None opens an in-memory database.
    pub duckdb_path: Option<PathBuf>,
    /// SQLite database file. None opens an in-memory database.
    pub sqlite_path: Option<PathBuf>,
    /// PostgreSQL pool size.
    pub max_connections: u32,
}

impl ConnectionConfig {
    /// Defaults plus `DATABASE_URL` from the environment, if set.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var(DATABASE_URL_ENV).ok(),
            ..Self::default()
        }
    }

    /// Set the PostgreSQL connection string.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Set the DuckDB database file.
    pub fn with_duckdb_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.duckdb_path = Some(path.into());
        self
    }

    /// Set the SQLite database file.
    pub fn with_sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sqlite_path = Some(path.into());
        self
    }

    /// Set the PostgreSQL pool size.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            duckdb_path: None,
            sqlite_path: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}
