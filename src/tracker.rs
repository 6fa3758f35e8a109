// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Per-Host Error & Block Tracker
 * Concurrent per-source counters driving an escalating self-throttle
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use dashmap::DashMap;
use std::collections::HashMap;
use std::time::Duration;

/// Error category recorded per host. Finer-grained than the outcome buckets
/// so the operator can tell refused hosts from slow ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Refused,
    Unreachable,
    Slow,
    Unknown,
}

/// Block count beyond which further rate-limit signals start sleeping.
const BLOCK_DELAY_THRESHOLD: u32 = 5;

/// Tracks per-host error categories and block counts. Shared by every
/// executor; reads are lock-free and updates lock only the touched shard.
/// This is a self-throttle, not a circuit breaker: a blocked host is never
/// abandoned, only retried more slowly.
#[derive(Debug, Default)]
pub struct BlockTracker {
    errors: DashMap<String, HashMap<ErrorKind, u64>>,
    blocks: DashMap<String, u32>,
}

impl BlockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one classified error against a host.
    pub fn record_error(&self, host: &str, kind: ErrorKind) {
        *self
            .errors
            .entry(host.to_string())
            .or_default()
            .entry(kind)
            .or_insert(0) += 1;
    }

    /// Record a rate-limit signal and return the delay the caller should
    /// sleep before continuing. Linear backoff: once a host has blocked us
    /// more than the threshold, each further block waits `count` seconds.
    pub fn record_block(&self, host: &str) -> Option<Duration> {
        let mut entry = self.blocks.entry(host.to_string()).or_insert(0);
        *entry += 1;
        let count = *entry;
        drop(entry);

        if count > BLOCK_DELAY_THRESHOLD {
            Some(Duration::from_secs(u64::from(count)))
        } else {
            None
        }
    }

    pub fn block_count(&self, host: &str) -> u32 {
        self.blocks.get(host).map(|c| *c).unwrap_or(0)
    }

    pub fn error_count(&self, host: &str, kind: ErrorKind) -> u64 {
        self.errors
            .get(host)
            .and_then(|m| m.get(&kind).copied())
            .unwrap_or(0)
    }
}
