//! Benchmark orchestration.
//!
//! A run resolves the configured `(engine, model)` pairs, opens each engine
//! once, then for every pair: setup, cleanup, seed, and the selected
//! workloads. The first failure aborts the run. Engine connections are
//! released whether the run succeeds or not.

use tracing::{error, info};

use crate::config::{BenchmarkConfig, ConnectionConfig};
use crate::engine::{EngineKind, Engines};
use crate::error::Result;
use crate::fixtures::PersonGenerator;
use crate::models::{Person, TagModel};
use crate::registry::ModelRegistry;
use crate::report::{
    pair_prefix, per_record_line, search_line, PairReport, QueryReport, RunReport, WriteReport,
};
use crate::timer::Timer;

/// People per `insert_persons_batch` call while seeding.
pub const SEED_BATCH_SIZE: usize = 1000;

/// The measured search shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    SingleTag,
    And,
    Or,
}

impl QueryShape {
    /// Shapes in report order.
    pub const ALL: [QueryShape; 3] = [QueryShape::SingleTag, QueryShape::And, QueryShape::Or];

    pub fn label(&self) -> &'static str {
        match self {
            QueryShape::SingleTag => "Single tag (engineer)",
            QueryShape::And => "AND search (engineer AND remote)",
            QueryShape::Or => "OR search (frontend OR backend)",
        }
    }

    /// Tags the shape searches for.
    pub fn tags(&self) -> Vec<String> {
        let tags: &[&str] = match self {
            QueryShape::SingleTag => &["engineer"],
            QueryShape::And => &["engineer", "remote"],
            QueryShape::Or => &["frontend", "backend"],
        };
        tags.iter().map(|tag| tag.to_string()).collect()
    }

    /// Run the query once against `model`.
    pub async fn execute(&self, model: &dyn TagModel, tags: &[String]) -> Result<Vec<Person>> {
        match self {
            QueryShape::SingleTag => model.search_by_tag(&tags[0]).await,
            QueryShape::And => model.search_by_tags_and(tags).await,
            QueryShape::Or => model.search_by_tags_or(tags).await,
        }
    }
}

/// Drives benchmark runs over a set of engine connections.
pub struct BenchmarkRunner {
    engines: Engines,
}

impl BenchmarkRunner {
    /// Create a runner that opens engines from `connection` as needed.
    pub fn new(connection: ConnectionConfig) -> Self {
        Self::with_engines(Engines::new(connection))
    }

    /// Create a runner over already prepared engines.
    pub fn with_engines(engines: Engines) -> Self {
        Self { engines }
    }

    pub fn engines(&self) -> &Engines {
        &self.engines
    }

    /// Run every configured pair and return the collected timings.
    ///
    /// Engines are closed before returning, also on failure.
    pub async fn run(&mut self, config: &BenchmarkConfig) -> Result<RunReport> {
        let result = self.run_pairs(config).await;
        self.engines.close().await;

        match &result {
            Ok(report) => info!(pairs = report.pairs.len(), "benchmark run complete"),
            Err(e) => error!(error = %e, "benchmark run failed"),
        }
        result
    }

    async fn run_pairs(&mut self, config: &BenchmarkConfig) -> Result<RunReport> {
        let pairs = config.pairs()?;

        let mut engines: Vec<EngineKind> = pairs.iter().map(|&(engine, _)| engine).collect();
        engines.dedup();
        for engine in engines {
            self.engines.connect(engine).await?;
        }

        let registry = ModelRegistry::build(&self.engines);
        let mut report = RunReport::new();
        for (engine, model) in pairs {
            let model = registry.get(engine, model)?;
            report.pairs.push(run_pair(model.as_ref(), config).await?);
        }
        Ok(report)
    }
}

/// Setup, cleanup, seed and run the selected workloads for one model.
///
/// Every pair draws from a fresh generator seeded with `config.seed`, so
/// all models are measured over identical data.
pub async fn run_pair(model: &dyn TagModel, config: &BenchmarkConfig) -> Result<PairReport> {
    let engine = model.engine();
    let kind = model.kind();
    let mut report = PairReport::new(engine, kind);
    let mut generator = PersonGenerator::new(config.seed);

    info!(engine = %engine, model = %kind, "setting up");
    model.setup().await?;
    model.cleanup().await?;

    report.seeded = seed(model, &mut generator, config.data_size).await?;

    if config.includes_search() {
        println!(
            "\n=== SEARCH BENCHMARK: {} {} ===",
            engine.as_str().to_uppercase(),
            kind.as_str().to_uppercase()
        );
        report.searches = run_search(model, config.iterations, config.warmup_iterations).await?;
    }

    if config.includes_write() {
        println!(
            "\n=== WRITE BENCHMARK: {} {} ===",
            engine.as_str().to_uppercase(),
            kind.as_str().to_uppercase()
        );
        report.write = Some(run_write(model, &mut generator, config.write_test_size).await?);
    }

    Ok(report)
}

/// Insert `count` generated people in batches of [`SEED_BATCH_SIZE`].
pub async fn seed(
    model: &dyn TagModel,
    generator: &mut PersonGenerator,
    count: usize,
) -> Result<usize> {
    info!(
        engine = %model.engine(),
        model = %model.kind(),
        count,
        "seeding"
    );

    let mut remaining = count;
    while remaining > 0 {
        let size = remaining.min(SEED_BATCH_SIZE);
        model.insert_persons_batch(&generator.people(size)).await?;
        remaining -= size;
    }
    Ok(count)
}

/// Time every [`QueryShape`]: `warmup` unmeasured runs, then `iterations`
/// measured ones. Each shape's line is printed as soon as it finishes.
pub async fn run_search(
    model: &dyn TagModel,
    iterations: usize,
    warmup: usize,
) -> Result<Vec<QueryReport>> {
    let prefix = pair_prefix(model.engine(), model.kind());
    let mut timer = Timer::new();
    let mut reports = Vec::with_capacity(QueryShape::ALL.len());

    for shape in QueryShape::ALL {
        let tags = shape.tags();

        for _ in 0..warmup {
            shape.execute(model, &tags).await?;
        }
        for _ in 0..iterations {
            timer.measure(|| shape.execute(model, &tags)).await?;
        }

        let query = QueryReport {
            label: shape.label().to_string(),
            result: timer.result(),
        };
        println!("{}", search_line(&prefix, &query));
        reports.push(query);
        timer.reset();
    }

    Ok(reports)
}

/// Time single inserts, one batch insert and label-set replacements, each
/// over `size` records.
pub async fn run_write(
    model: &dyn TagModel,
    generator: &mut PersonGenerator,
    size: usize,
) -> Result<WriteReport> {
    let prefix = pair_prefix(model.engine(), model.kind());

    let mut single = Timer::new();
    for person in generator.people(size) {
        single
            .measure(|| model.insert_person(&person.name, &person.tags))
            .await?;
    }
    let single = single.result();
    println!(
        "{}",
        per_record_line(&prefix, "Single", single.count, single.total_ms)
    );

    let mut batch = Timer::new();
    let records = generator.people(size);
    batch.measure(|| model.insert_persons_batch(&records)).await?;
    let batch = batch.result();
    println!(
        "{}",
        per_record_line(&prefix, "Batch", size, batch.total_ms)
    );

    let mut update = Timer::new();
    for id in model.person_ids(size).await? {
        let tags = generator.tags();
        update
            .measure(|| model.update_person_tags(id, &tags))
            .await?;
    }
    let update = update.result();
    println!(
        "{}",
        per_record_line(&prefix, "Update", update.count, update.total_ms)
    );

    Ok(WriteReport {
        single,
        batch,
        batch_records: size,
        update,
    })
}
