// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Trial Statistics
 * Lock-free outcome counters shared across all workers
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Outcome counters the engine reports into. The engine calls these from
/// many workers at once but does not own reporting or storage; the default
/// implementation below is a plain atomic struct.
pub trait StatsSink: Send + Sync {
    fn increment_success(&self);
    fn increment_failure(&self);
    fn increment_error(&self);
    fn increment_offline(&self);
    fn increment_rate_limited(&self);

    /// Total trials folded into any bucket so far.
    fn processed(&self) -> u64;

    /// Consistent-enough point-in-time view of every bucket.
    fn snapshot(&self) -> StatsSnapshot;
}

/// Default in-process statistics: one atomic per bucket plus a processed
/// total, incremented together so `processed` always equals the bucket sum.
#[derive(Debug, Default)]
pub struct ScanStats {
    successes: AtomicU64,
    failures: AtomicU64,
    errors: AtomicU64,
    offline: AtomicU64,
    rate_limited: AtomicU64,
    processed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub successes: u64,
    pub failures: u64,
    pub errors: u64,
    pub offline: u64,
    pub rate_limited: u64,
    pub processed: u64,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsSink for ScanStats {
    fn increment_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_offline(&self) {
        self.offline.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            offline: self.offline.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
        }
    }
}

/// Progress line helper for the periodic monitor.
pub struct ProgressReporter {
    started: Instant,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn format(&self, snap: &StatsSnapshot) -> String {
        let elapsed = self.started.elapsed().as_secs_f64().max(0.001);
        let speed = snap.processed as f64 / elapsed;
        format!(
            "valid:{} invalid:{} err:{} offline:{} blocked:{} | {:.1}/s | {:.0}s elapsed",
            snap.successes,
            snap.failures,
            snap.errors,
            snap.offline,
            snap.rate_limited,
            speed,
            elapsed
        )
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_tracks_bucket_sum() {
        let stats = ScanStats::new();
        stats.increment_success();
        stats.increment_failure();
        stats.increment_failure();
        stats.increment_error();
        stats.increment_offline();
        stats.increment_rate_limited();

        let snap = stats.snapshot();
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.failures, 2);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.offline, 1);
        assert_eq!(snap.rate_limited, 1);
        assert_eq!(
            snap.processed,
            snap.successes + snap.failures + snap.errors + snap.offline + snap.rate_limited
        );
    }
}
