//! Run results and their text and JSON renderings.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::engine::EngineKind;
use crate::error::Result;
use crate::models::ModelKind;
use crate::timer::{format_ms, format_seconds, TimingResult};

/// Timing of one search shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryReport {
    pub label: String,
    #[serde(flatten)]
    pub result: TimingResult,
}

/// Timings of the write workload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteReport {
    /// One sample per single-person insert.
    pub single: TimingResult,
    /// One sample covering the whole batch.
    pub batch: TimingResult,
    /// Records in the timed batch.
    pub batch_records: usize,
    /// One sample per label-set replacement.
    pub update: TimingResult,
}

/// Everything measured for one engine/model pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairReport {
    pub engine: EngineKind,
    pub model: ModelKind,
    /// People seeded before the workloads ran.
    pub seeded: usize,
    pub searches: Vec<QueryReport>,
    pub write: Option<WriteReport>,
}

impl PairReport {
    pub fn new(engine: EngineKind, model: ModelKind) -> Self {
        Self {
            engine,
            model,
            seeded: 0,
            searches: Vec::new(),
            write: None,
        }
    }

    /// `[ENGINE-MODEL]`, the prefix of every report line.
    pub fn prefix(&self) -> String {
        pair_prefix(self.engine, self.model)
    }

    /// Every report line for this pair, searches first.
    pub fn lines(&self) -> Vec<String> {
        let prefix = self.prefix();
        let mut lines: Vec<String> = self
            .searches
            .iter()
            .map(|query| search_line(&prefix, query))
            .collect();
        if let Some(write) = &self.write {
            lines.extend(write_lines(&prefix, write));
        }
        lines
    }
}

/// Results of a whole run, in pair order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub pairs: Vec<PairReport>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the pretty JSON report to `path`.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

pub fn pair_prefix(engine: EngineKind, model: ModelKind) -> String {
    format!(
        "[{}-{}]",
        engine.as_str().to_uppercase(),
        model.as_str().to_uppercase()
    )
}

/// `[P] Label: avg=.., p50=.., p95=.. (N queries, total=..)`
pub fn search_line(prefix: &str, query: &QueryReport) -> String {
    let r = &query.result;
    format!(
        "{} {}: avg={}, p50={}, p95={} ({} queries, total={})",
        prefix,
        query.label,
        format_ms(r.avg_ms),
        format_ms(r.p50_ms),
        format_ms(r.p95_ms),
        r.count,
        format_seconds(r.total_ms)
    )
}

/// `[P] Kind: X/record (N records, total=..)`
pub fn per_record_line(prefix: &str, kind: &str, records: usize, total_ms: f64) -> String {
    let per_record = if records == 0 {
        0.0
    } else {
        total_ms / records as f64
    };
    format!(
        "{} {}: {}/record ({} records, total={})",
        prefix,
        kind,
        format_ms(per_record),
        records,
        format_seconds(total_ms)
    )
}

/// Single, batch and update lines.
pub fn write_lines(prefix: &str, write: &WriteReport) -> Vec<String> {
    vec![
        per_record_line(prefix, "Single", write.single.count, write.single.total_ms),
        per_record_line(prefix, "Batch", write.batch_records, write.batch.total_ms),
        per_record_line(prefix, "Update", write.update.count, write.update.total_ms),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(count: usize, total_ms: f64) -> TimingResult {
        TimingResult {
            count,
            total_ms,
            avg_ms: if count == 0 { 0.0 } else { total_ms / count as f64 },
            min_ms: 1.0,
            max_ms: 3.0,
            p50_ms: 1.1,
            p95_ms: 2.0,
        }
    }

    #[test]
    fn test_prefix() {
        assert_eq!(
            pair_prefix(EngineKind::Postgres, ModelKind::Normalized),
            "[POSTGRESQL-NORMALIZED]"
        );
        assert_eq!(
            pair_prefix(EngineKind::DuckDb, ModelKind::Array),
            "[DUCKDB-ARRAY]"
        );
        assert_eq!(
            pair_prefix(EngineKind::Sqlite, ModelKind::Document),
            "[SQLITE-DOCUMENT]"
        );
    }

    #[test]
    fn test_search_line() {
        let query = QueryReport {
            label: "Single tag (engineer)".to_string(),
            result: timing(1000, 1200.0),
        };
        assert_eq!(
            search_line("[POSTGRESQL-NORMALIZED]", &query),
            "[POSTGRESQL-NORMALIZED] Single tag (engineer): avg=1.2ms, p50=1.1ms, p95=2.0ms (1000 queries, total=1.2s)"
        );
    }

    #[test]
    fn test_write_lines() {
        let write = WriteReport {
            single: timing(10_000, 4000.0),
            batch: timing(1, 1000.0),
            batch_records: 10_000,
            update: timing(10_000, 5000.0),
        };
        assert_eq!(
            write_lines("[SQLITE-NORMALIZED]", &write),
            vec![
                "[SQLITE-NORMALIZED] Single: 0.4ms/record (10000 records, total=4.0s)",
                "[SQLITE-NORMALIZED] Batch: 0.1ms/record (10000 records, total=1.0s)",
                "[SQLITE-NORMALIZED] Update: 0.5ms/record (10000 records, total=5.0s)",
            ]
        );
    }

    #[test]
    fn test_per_record_line_empty() {
        assert_eq!(
            per_record_line("[X]", "Update", 0, 0.0),
            "[X] Update: 0.0ms/record (0 records, total=0.0s)"
        );
    }

    #[test]
    fn test_pair_lines_and_json() {
        let mut pair = PairReport::new(EngineKind::Sqlite, ModelKind::Document);
        pair.seeded = 10;
        pair.searches.push(QueryReport {
            label: "OR search (frontend OR backend)".to_string(),
            result: timing(2, 4.0),
        });
        assert_eq!(pair.lines().len(), 1);

        let report = RunReport { pairs: vec![pair] };
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["pairs"][0]["engine"], "sqlite");
        assert_eq!(json["pairs"][0]["model"], "document");
        assert_eq!(json["pairs"][0]["seeded"], 10);
        assert_eq!(json["pairs"][0]["searches"][0]["count"], 2);
        assert!(json["pairs"][0]["write"].is_null());
    }

    #[test]
    fn test_write_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        RunReport::new().write_json(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"pairs\": []"));
    }
}
