//! Tag storage benchmark suite.
//!
//! Measures how three physical layouts of a person/tag relationship perform
//! on the same searches and writes:
//!
//! - **Normalized**: join table between `person` and `tag`
//! - **Array**: native list column (`TEXT[]` / `VARCHAR[]`)
//! - **Document**: JSON array of tag names
//!
//! Every layout runs on PostgreSQL (feature `postgres`) and on the embedded
//! DuckDB engine (feature `duckdb`). SQLite hosts the normalized and
//! document layouts. [`BenchmarkRunner`] seeds identical generated
//! data into every selected `(engine, model)` pair, times single-tag, AND and
//! OR searches plus single, batch and update writes, and collects a
//! [`RunReport`].
//!
//! ```no_run
//! use tagbench::{BenchmarkConfig, BenchmarkRunner, ConnectionConfig};
//!
//! # async fn run() -> tagbench::Result<()> {
//! let config = BenchmarkConfig::default().with_data_size(10_000);
//! let mut runner = BenchmarkRunner::new(ConnectionConfig::from_env());
//! let report = runner.run(&config).await?;
//! println!("{}", report.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod models;
pub mod registry;
pub mod report;
pub mod runner;
pub mod timer;

pub use config::{
    BenchmarkConfig, ConnectionConfig, EngineSelection, ModelSelection, Workload,
};
#[cfg(feature = "duckdb")]
pub use engine::DuckDbHandle;
pub use engine::{EngineKind, Engines, SqliteHandle};
pub use error::{Error, Result};
pub use fixtures::{generate_people, PersonData, PersonGenerator};
pub use models::{ModelKind, Person, TagModel};
pub use registry::ModelRegistry;
pub use report::{PairReport, QueryReport, RunReport, WriteReport};
pub use runner::{BenchmarkRunner, QueryShape};
pub use timer::{Timer, TimingResult};
