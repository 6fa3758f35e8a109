// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Engine Error Types
 * Setup-fatal vs per-credential error taxonomy with thiserror
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use thiserror::Error;

/// Fatal errors surfaced from `Engine::new` / `Engine::start`. Everything
/// per-credential is classified into an outcome bucket instead and never
/// aborts the run.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to open input file {path}: {source}")]
    InputUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open output file {path}: {source}")]
    OutputUnwritable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Errors produced by one probe invocation. These are classified into
/// outcome buckets by the executor and never propagate past it.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("malformed host spec {spec:?} for {vendor}: {reason}")]
    InvalidHostSpec {
        vendor: &'static str,
        spec: String,
        reason: &'static str,
    },

    #[error("request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        if err.is_timeout() {
            ProbeError::Timeout { url }
        } else if err.is_connect() {
            ProbeError::Connect {
                url,
                reason: err.to_string(),
            }
        } else {
            ProbeError::Request(err.to_string())
        }
    }
}

/// Error bucket a failed trial falls into. Derived from structured error
/// kinds where the HTTP client exposes them, with substring matching on the
/// error text as a fallback for cases the client reports opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Offline,
    RateLimited,
    Other,
}

impl ErrorCategory {
    /// Classify a probe error, factoring in how long the attempt took.
    /// A duration beyond twice the configured timeout counts as offline even
    /// when the error text matches nothing.
    pub fn classify(err: &ProbeError, duration: Duration, timeout: Duration) -> Self {
        match err {
            ProbeError::Timeout { .. } => return ErrorCategory::Offline,
            ProbeError::Connect { .. } => return ErrorCategory::Offline,
            _ => {}
        }

        let text = err.to_string().to_lowercase();
        if text.contains("timeout")
            || text.contains("connection refused")
            || text.contains("no route to host")
        {
            ErrorCategory::Offline
        } else if text.contains("too many requests") || text.contains("rate limit") {
            ErrorCategory::RateLimited
        } else if duration > timeout * 2 {
            ErrorCategory::Offline
        } else {
            ErrorCategory::Other
        }
    }
}
