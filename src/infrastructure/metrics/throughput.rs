//! One-second sliding window of completion instants.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(1);

/// Most completions held at once. Rates above this per second read as the cap.
pub const MAX_SAMPLES: usize = 200_000;

/// Completion instants from the last second, bounded by [`MAX_SAMPLES`].
#[derive(Debug, Default)]
pub struct ThroughputWindow {
    recent: VecDeque<Instant>,
}

impl ThroughputWindow {
    pub fn record(&mut self, at: Instant) {
        if self.recent.len() == MAX_SAMPLES {
            self.recent.pop_front();
        }
        self.recent.push_back(at);
        self.evict(at);
    }

    /// Completions in the last second.
    pub fn per_second(&mut self, now: Instant) -> f64 {
        self.evict(now);
        self.recent.len() as f64
    }

    /// Completions in the last `window` (at most one second), scaled to a
    /// per-second rate.
    pub fn windowed(&mut self, now: Instant, window: Duration) -> f64 {
        self.evict(now);
        let window = window.min(WINDOW);
        if window.is_zero() {
            return 0.0;
        }
        let count = self
            .recent
            .iter()
            .rev()
            .take_while(|at| now.saturating_duration_since(**at) <= window)
            .count();
        count as f64 / window.as_secs_f64()
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.recent.front() {
            if now.saturating_duration_since(*front) > WINDOW {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}
