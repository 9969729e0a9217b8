//! Per-worker error log throttling.

use std::time::Duration;

use tokio::time::Instant;

/// Lets one error line through per interval and counts the rest.
#[derive(Debug)]
pub struct ErrorLogThrottle {
    interval: Duration,
    last_logged: Option<Instant>,
    suppressed: u64,
}

impl ErrorLogThrottle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_logged: None,
            suppressed: 0,
        }
    }

    /// Returns `Some(suppressed)` when a line may be logged now, carrying the
    /// number of errors held back since the previous line. Returns `None`
    /// when the caller should downgrade the line.
    pub fn admit(&mut self, now: Instant) -> Option<u64> {
        let due = self
            .last_logged
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last_logged = Some(now);
            Some(std::mem::take(&mut self.suppressed))
        } else {
            self.suppressed += 1;
            None
        }
    }

    /// Errors held back since the last admitted line.
    #[must_use]
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
