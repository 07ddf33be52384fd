use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::gap::{GapTracker, Observation};

/// Mutable state of one `start()`..`stop()` lifetime.
#[derive(Debug, Clone)]
pub struct StreamSession {
    tracker: GapTracker,
    reconnect_attempts: u32,
    current_backoff_delay: Duration,
}

impl StreamSession {
    pub fn new(since_seq: u64, backoff: &BackoffPolicy) -> Self {
        Self {
            tracker: GapTracker::new(since_seq),
            reconnect_attempts: 0,
            current_backoff_delay: backoff.initial_delay,
        }
    }

    pub fn last_seq(&self) -> u64 {
        self.tracker.last_seq()
    }

    pub fn expected_seq(&self) -> u64 {
        self.tracker.expected_seq()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn current_backoff_delay(&self) -> Duration {
        self.current_backoff_delay
    }

    pub fn observe(&mut self, seq: u64) -> Observation {
        self.tracker.observe(seq)
    }

    /// Record that a connection opened.
    pub fn connected(&mut self, backoff: &BackoffPolicy) {
        self.reconnect_attempts = 0;
        self.current_backoff_delay = backoff.initial_delay;
    }

    /// Consume one reconnect attempt, returning its index and delay.
    pub fn schedule_retry(&mut self, backoff: &BackoffPolicy) -> (u32, Duration) {
        let attempt = self.reconnect_attempts;
        self.current_backoff_delay = backoff.next(attempt);
        self.reconnect_attempts = attempt.saturating_add(1);
        (attempt, self.current_backoff_delay)
    }
}
