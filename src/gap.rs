//! Sequence gap detection and bookkeeping for outstanding recoveries.

use std::ops::Range;

/// How an inbound live event relates to the expected sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// `seq` is exactly the expected one.
    InOrder,
    /// `seq` skipped ahead; `missing` never arrived.
    Gap { missing: Range<u64> },
    /// `seq` is below the expected one: either a late arrival for a gap or a
    /// duplicate.
    Behind,
}

/// Tracks the highest sequence number seen on one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapTracker {
    last_seq: u64,
}

impl GapTracker {
    /// Start a tracker for a stream whose last seen event is `last_seq`.
    pub fn new(last_seq: u64) -> Self {
        Self { last_seq }
    }

    /// `last_seq + 1`. Saturates once `u64::MAX` has been seen, at which
    /// point every further event is `Behind`.
    pub fn expected_seq(&self) -> u64 {
        self.last_seq.saturating_add(1)
    }

    /// Highest sequence number delivered or known so far.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn observe(&mut self, seq: u64) -> Observation {
        if seq <= self.last_seq {
            return Observation::Behind;
        }

        let expected = self.last_seq + 1;
        self.last_seq = seq;

        if seq == expected {
            Observation::InOrder
        } else {
            Observation::Gap {
                missing: expected..seq,
            }
        }
    }
}

/// A recovery fetch covering the open interval `(since, until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryBatch {
    pub since: u64,
    pub until: u64,
    /// Number of flagged gaps folded into this fetch.
    pub gaps: u64,
}

/// Outstanding missing ranges and the single in-flight recovery of a stream.
///
/// At most one batch is in flight. Gaps flagged meanwhile are recorded and
/// dispatched together once the running batch completes.
#[derive(Debug, Default)]
pub struct GapRecoveryTask {
    outstanding: Vec<Range<u64>>,
    queued_gaps: u64,
    in_flight: Option<RecoveryBatch>,
}

impl GapRecoveryTask {
    pub fn record(&mut self, missing: Range<u64>) {
        if missing.is_empty() {
            return;
        }
        self.outstanding.push(missing);
        self.queued_gaps += 1;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<RecoveryBatch> {
        self.in_flight
    }

    /// Whether `seq` is still missing.
    pub fn is_outstanding(&self, seq: u64) -> bool {
        self.outstanding.iter().any(|range| range.contains(&seq))
    }

    /// Start a batch for everything outstanding, unless one is already running.
    pub fn dispatch(&mut self) -> Option<RecoveryBatch> {
        if self.in_flight.is_some() {
            return None;
        }

        let first = self.outstanding.first()?;
        let last = self.outstanding.last()?;
        let batch = RecoveryBatch {
            since: first.start.saturating_sub(1),
            until: last.end,
            gaps: std::mem::take(&mut self.queued_gaps),
        };
        self.in_flight = Some(batch);
        Some(batch)
    }

    /// Mark `seq` as delivered. Returns `false` when it was not missing, in
    /// which case delivering it again would be a duplicate.
    pub fn claim(&mut self, seq: u64) -> bool {
        let Some(index) = self
            .outstanding
            .iter()
            .position(|range| range.contains(&seq))
        else {
            return false;
        };

        let range = self.outstanding.remove(index);
        let mut insert_at = index;
        if range.start < seq {
            self.outstanding.insert(insert_at, range.start..seq);
            insert_at += 1;
        }
        if seq + 1 < range.end {
            self.outstanding.insert(insert_at, seq + 1..range.end);
        }
        true
    }

    /// Finish the in-flight batch. Whatever it did not fill is abandoned.
    pub fn complete(&mut self) -> Option<RecoveryBatch> {
        let batch = self.in_flight.take()?;
        self.outstanding
            .retain(|range| !(range.start > batch.since && range.end <= batch.until));
        Some(batch)
    }

    pub fn clear(&mut self) {
        self.outstanding.clear();
        self.queued_gaps = 0;
        self.in_flight = None;
    }
}
