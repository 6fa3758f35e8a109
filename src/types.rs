// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use std::time::Duration;

/// One candidate login to trial against a gateway.
///
/// `host_spec` is taken verbatim from the input list. For most vendors it is
/// `host[:port]`; SonicWall/Sophos may carry a domain inside the password
/// field and WatchGuard/Cisco pack extra fields into `host_spec` itself.
/// The vendor probe owns that parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub host_spec: String,
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(
        host_spec: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host_spec: host_spec.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Output-sink line format: `host;username;password`.
    pub fn as_line(&self) -> String {
        format!("{};{};{}", self.host_spec, self.username, self.password)
    }
}

/// Classification bucket for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Gateway accepted the credentials.
    Success,
    /// Gateway rejected the credentials.
    Failure,
    /// Target unreachable: refused, timed out, no route, or pathologically slow.
    Offline,
    /// Target is actively throttling us (429 / rate-limit signals).
    RateLimited,
    /// Anything else (malformed host spec, protocol errors, unknown failures).
    Error,
}

/// Transient result of one credential trial. Never persisted as an entity;
/// folded into statistics and, on success, appended to the output sink.
#[derive(Debug, Clone)]
pub struct TrialResult {
    pub outcome: Outcome,
    pub status_code: u16,
    pub duration: Duration,
    pub body_prefix: Vec<u8>,
}

impl TrialResult {
    pub fn new(outcome: Outcome, status_code: u16, duration: Duration) -> Self {
        Self {
            outcome,
            status_code,
            duration,
            body_prefix: Vec::new(),
        }
    }
}
