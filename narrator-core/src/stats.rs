//! Pipeline counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters shared by every stage
#[derive(Debug, Default)]
pub struct PipelineStats {
    submitted: AtomicU64,
    responded: AtomicU64,
    synthesized: AtomicU64,
    played: AtomicU64,
    dropped_overflow: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub responded: u64,
    pub synthesized: u64,
    pub played: u64,
    pub dropped_overflow: u64,
    pub failed: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_responded(&self) {
        self.responded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_synthesized(&self) {
        self.synthesized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_played(&self) {
        self.played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overflow(&self) {
        self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            responded: self.responded.load(Ordering::Relaxed),
            synthesized: self.synthesized.load(Ordering::Relaxed),
            played: self.played.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
