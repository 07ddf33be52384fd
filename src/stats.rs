use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Snapshot of a client's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Events handed to the consumer, live or recovered.
    pub events_received: u64,
    pub reconnects: u64,
    pub errors: u64,
    pub gaps_detected: u64,
    pub gaps_recovered: u64,
    /// Events delivered through gap recovery.
    pub events_recovered: u64,
    /// Live events dropped because their `seq` had already been delivered.
    pub duplicates_dropped: u64,
}

/// Shared counters, written by the driver and read by the facade.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    events_received: AtomicU64,
    reconnects: AtomicU64,
    errors: AtomicU64,
    gaps_detected: AtomicU64,
    gaps_recovered: AtomicU64,
    events_recovered: AtomicU64,
    duplicates_dropped: AtomicU64,
}

impl StatsCounters {
    pub fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn gap_detected(&self) {
        self.gaps_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn gaps_recovered(&self, gaps: u64) {
        self.gaps_recovered.fetch_add(gaps, Ordering::Relaxed);
    }

    pub fn event_recovered(&self) {
        self.events_recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn duplicate_dropped(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StreamStats {
        StreamStats {
            events_received: self.events_received.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            gaps_detected: self.gaps_detected.load(Ordering::Relaxed),
            gaps_recovered: self.gaps_recovered.load(Ordering::Relaxed),
            events_recovered: self.events_recovered.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.events_received,
            &self.reconnects,
            &self.errors,
            &self.gaps_detected,
            &self.gaps_recovered,
            &self.events_recovered,
            &self.duplicates_dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
