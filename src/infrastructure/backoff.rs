//! Doubling backoff with a ceiling.

use std::time::Duration;

/// Exponential backoff state.
///
/// [`next_delay`](Self::next_delay) returns the current delay and doubles it
/// for the next call, never past the ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial_ms: u64,
    max_ms: u64,
    current_ms: u64,
}

impl Backoff {
    /// Creation retries: 100 ms doubling to 2 s.
    pub const CREATE: (u64, u64) = (100, 2_000);
    /// Acquire retries and worker failure backoff: 100 ms doubling to 5 s.
    pub const RETRY: (u64, u64) = (100, 5_000);

    #[must_use]
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        let initial_ms = initial_ms.max(1);
        Self {
            initial_ms,
            max_ms: max_ms.max(initial_ms),
            current_ms: initial_ms,
        }
    }

    #[must_use]
    pub fn from_bounds((initial_ms, max_ms): (u64, u64)) -> Self {
        Self::new(initial_ms, max_ms)
    }

    /// Delay the next call to [`next_delay`](Self::next_delay) will return.
    #[must_use]
    pub fn current(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = Duration::from_millis(self.current_ms);
        self.current_ms = self.current_ms.saturating_mul(2).min(self.max_ms);
        delay
    }

    pub fn reset(&mut self) {
        self.current_ms = self.initial_ms;
    }
}
