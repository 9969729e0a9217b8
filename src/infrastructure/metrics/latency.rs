//! Bounded latency sample window with percentile readout.

use std::collections::VecDeque;
use std::time::Duration;

use crate::domain::LatencyStats;

/// Maximum number of latency samples retained per window.
pub const MAX_SAMPLES: usize = 10_000;

/// Sliding window of the most recent latency samples, in milliseconds.
#[derive(Debug)]
pub struct LatencyWindow {
    samples: VecDeque<f64>,
    max_samples: usize,
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(MAX_SAMPLES)
    }
}

impl LatencyWindow {
    #[must_use]
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: VecDeque::with_capacity(max_samples.min(1024)),
            max_samples,
        }
    }

    pub fn record(&mut self, latency: Duration) {
        self.samples.push_back(latency.as_secs_f64() * 1000.0);
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Summarize the window.
    ///
    /// Small windows cannot resolve the tail: p95 reports the maximum with 20
    /// samples or fewer, p99 with 100 or fewer.
    #[must_use]
    pub fn stats(&self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let max = sorted[n - 1];
        let sum: f64 = sorted.iter().sum();

        LatencyStats {
            samples: n,
            avg_ms: sum / n as f64,
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: if n > 20 { percentile(&sorted, 0.95) } else { max },
            p99_ms: if n > 100 { percentile(&sorted, 0.99) } else { max },
            min_ms: sorted[0],
            max_ms: max,
        }
    }
}

/// Nearest-rank percentile of a sorted, non-empty slice: index `floor(n * p)`.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let index = (sorted.len() as f64 * p).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}
