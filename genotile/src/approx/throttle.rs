//! Leading-edge rate limiting.

use std::time::{Duration, Instant};

/// Allows one call per `interval`; calls in between are refused.
///
/// The first call always passes. There is no trailing call: a refused call
/// is simply dropped.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a call at `now` may proceed. Records it if so.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Let the next call through regardless of timing.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
