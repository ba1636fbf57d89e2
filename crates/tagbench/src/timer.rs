//! Latency sampling for benchmark operations.
//!
//! A [`Timer`] keeps every sample so percentiles are exact rather than
//! bucketed. Samples are taken with [`Instant`], which is monotonic.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Summary statistics over a set of samples, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimingResult {
    /// Number of samples.
    pub count: usize,
    /// Sum of all samples.
    pub total_ms: f64,
    /// Arithmetic mean.
    pub avg_ms: f64,
    /// Smallest sample.
    pub min_ms: f64,
    /// Largest sample.
    pub max_ms: f64,
    /// 50th percentile.
    pub p50_ms: f64,
    /// 95th percentile.
    pub p95_ms: f64,
}

/// Accumulates elapsed-time samples.
#[derive(Debug, Default)]
pub struct Timer {
    samples: Vec<Duration>,
}

impl Timer {
    /// Create an empty timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` once and record how long it took.
    ///
    /// The output is returned untouched. When it is an `Err`, the sample is
    /// still recorded before the error reaches the caller.
    pub async fn measure<F, Fut, T>(&mut self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let start = Instant::now();
        let output = op().await;
        self.samples.push(start.elapsed());
        output
    }

    /// Record an externally measured sample.
    pub fn record(&mut self, elapsed: Duration) {
        self.samples.push(elapsed);
    }

    /// Number of recorded samples.
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Reduce the recorded samples to summary statistics.
    pub fn result(&self) -> TimingResult {
        if self.samples.is_empty() {
            return TimingResult::default();
        }

        let mut sorted: Vec<f64> = self.samples.iter().map(|d| as_ms(*d)).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let total_ms: f64 = sorted.iter().sum();

        TimingResult {
            count,
            total_ms,
            avg_ms: total_ms / count as f64,
            min_ms: sorted[0],
            max_ms: sorted[count - 1],
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: percentile(&sorted, 0.95),
        }
    }

    /// Discard all recorded samples.
    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

/// Nearest-rank percentile over ascending samples: `sorted[floor(len * fraction)]`.
fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    let index = (sorted.len() as f64 * fraction).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Render milliseconds with one decimal place, e.g. `12.3ms`.
pub fn format_ms(ms: f64) -> String {
    format!("{:.1}ms", ms)
}

/// Render milliseconds as seconds with one decimal place, e.g. `1.2s`.
pub fn format_seconds(ms: f64) -> String {
    format!("{:.1}s", ms / 1_000.0)
}
