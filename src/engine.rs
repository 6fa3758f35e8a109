// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Trial Engine
 * Worker-pool dispatch with rate limiting, dynamic scaling and
 * per-host self-throttling
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, Receiver};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::errors::{EngineError, ErrorCategory, ProbeError};
use crate::output::SuccessSink;
use crate::probes::{HttpProber, ProbeVerdict, Prober};
use crate::source::{self, QUEUE_CAPACITY};
use crate::stats::{ProgressReporter, ScanStats, StatsSink, StatsSnapshot};
use crate::tracker::{BlockTracker, ErrorKind};
use crate::types::{Credential, Outcome, TrialResult};

/// How often the progress monitor logs a status line.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Mutable run state shared by workers, scaler and monitor.
struct RunState {
    /// Live worker count, maintained by the workers themselves.
    current_workers: AtomicUsize,
    /// Attempts completed since the scaler last looked; swapped to zero
    /// each scaling tick to extrapolate a per-minute rate.
    window_attempts: AtomicU64,
    /// Workers currently parked on the rate limiter. A majority of the pool
    /// sitting here means throughput is limiter-bound, not worker-bound.
    limiter_waiters: AtomicUsize,
}

struct Shared {
    config: EngineConfig,
    prober: Arc<dyn Prober>,
    limiter: Option<DefaultDirectRateLimiter>,
    sink: SuccessSink,
    tracker: BlockTracker,
    stats: Arc<dyn StatsSink>,
    state: RunState,
    /// In-flight trial budget, kept in step with the pool size by the scaler.
    permits: Semaphore,
    cancel: CancellationToken,
    /// Child tokens of live workers, most recent last. The scaler cancels
    /// from the back to shrink the pool.
    worker_tokens: parking_lot::Mutex<Vec<CancellationToken>>,
    tasks: TaskTracker,
}

/// The credential-trial engine. `new` performs all fail-fast setup work;
/// `start` runs the trial to completion; `stop` cancels an in-flight run
/// and is safe to call any number of times.
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let prober = HttpProber::new(
            config.vendor,
            config.timeout(),
            config.max_idle_conns_per_host,
            Duration::from_secs(config.idle_conn_timeout_secs),
        )?;
        Self::with_prober(config, Arc::new(prober))
    }

    /// Build an engine around an externally supplied prober, reporting into
    /// a fresh in-process stats sink.
    pub fn with_prober(
        config: EngineConfig,
        prober: Arc<dyn Prober>,
    ) -> Result<Self, EngineError> {
        Self::with_parts(config, prober, Arc::new(ScanStats::new()))
    }

    /// Build an engine from its collaborators. Setup errors (unreadable
    /// input, unwritable output, bad config) are fatal here; nothing
    /// per-credential ever is.
    pub fn with_parts(
        mut config: EngineConfig,
        prober: Arc<dyn Prober>,
        stats: Arc<dyn StatsSink>,
    ) -> Result<Self, EngineError> {
        config.normalize();
        config
            .validate()
            .map_err(|e| EngineError::Configuration(e.to_string()))?;

        // Probe the input path up front so a typo fails before any worker
        // spawns, not after.
        std::fs::File::open(&config.input_file).map_err(|source| {
            EngineError::InputUnreadable {
                path: config.input_file.clone(),
                source,
            }
        })?;

        let sink = SuccessSink::open(&config.output_file)?;

        let limiter = NonZeroU32::new(config.rate_limit)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));

        // The permit budget tracks the pool size: the scaler adds and
        // forgets permits in step with the workers it spawns and cancels.
        let permits = Semaphore::new(config.threads);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                prober,
                limiter,
                sink,
                tracker: BlockTracker::new(),
                stats,
                state: RunState {
                    current_workers: AtomicUsize::new(0),
                    window_attempts: AtomicU64::new(0),
                    limiter_waiters: AtomicUsize::new(0),
                },
                permits,
                cancel: CancellationToken::new(),
                worker_tokens: parking_lot::Mutex::new(Vec::new()),
                tasks: TaskTracker::new(),
            }),
        })
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn current_workers(&self) -> usize {
        self.shared.state.current_workers.load(Ordering::Relaxed)
    }

    /// Request shutdown. Idempotent; an engine that already finished or was
    /// never started just ignores it.
    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }

    /// Run the trial to completion: stream the input list through the worker
    /// pool until the queue drains or `stop` is called, then return the final
    /// statistics.
    pub async fn start(&self) -> Result<StatsSnapshot, EngineError> {
        let shared = &self.shared;
        let (tx, rx) = mpsc::channel::<Credential>(QUEUE_CAPACITY);
        let queue = Arc::new(Mutex::new(rx));

        info!(
            vendor = %shared.config.vendor,
            workers = shared.config.threads,
            rate_limit = shared.config.rate_limit,
            "starting credential trial"
        );

        // Producer.
        {
            let path = shared.config.input_file.clone();
            let cancel = shared.cancel.clone();
            shared.tasks.spawn(async move {
                if let Err(e) = source::stream(path, tx, cancel).await {
                    error!("credential source failed: {}", e);
                }
            });
        }

        // Initial pool.
        for _ in 0..shared.config.threads {
            spawn_worker(shared.clone(), queue.clone());
        }

        // Scaler and monitor outlive no one: both stop on this child token,
        // which fires on completion or external cancellation.
        let aux = shared.cancel.child_token();
        let scaler = tokio::spawn(scale_loop(shared.clone(), queue.clone(), aux.clone()));
        let monitor = tokio::spawn(progress_loop(shared.clone(), aux.clone()));

        shared.tasks.close();
        shared.tasks.wait().await;
        aux.cancel();
        let _ = scaler.await;
        let _ = monitor.await;
        // The scaler may have spawned a worker in the instant the first wait
        // resolved; with the scaler joined, a second wait reaps it.
        shared.tasks.wait().await;

        let snap = shared.stats.snapshot();
        info!(
            valid = snap.successes,
            invalid = snap.failures,
            errors = snap.errors,
            offline = snap.offline,
            blocked = snap.rate_limited,
            processed = snap.processed,
            "credential trial finished"
        );
        Ok(snap)
    }
}

/// Spawn one worker onto the task tracker. The worker drains the queue until
/// it is empty, the run is cancelled, or its own token is cancelled by the
/// scaler shrinking the pool. The token only gates the dequeue loop: a
/// worker always finishes the credential it already holds, so scale-down
/// never loses a trial. On exit the worker cancels its own token, marking
/// the entry in `worker_tokens` as dead.
fn spawn_worker(shared: Arc<Shared>, queue: Arc<Mutex<Receiver<Credential>>>) {
    let token = shared.cancel.child_token();
    shared.worker_tokens.lock().push(token.clone());
    shared.state.current_workers.fetch_add(1, Ordering::Relaxed);

    let inner = shared.clone();
    shared.tasks.spawn(async move {
        loop {
            let cred = tokio::select! {
                _ = token.cancelled() => break,
                cred = async { queue.lock().await.recv().await } => {
                    match cred {
                        Some(cred) => cred,
                        None => break,
                    }
                }
            };

            run_trial(&inner, cred).await;
        }
        token.cancel();
        inner.state.current_workers.fetch_sub(1, Ordering::Relaxed);
    });
}

/// Execute one credential trial end to end: rate-limit gate, concurrency
/// permit, probe, classify, record. Only engine-wide shutdown may abandon a
/// dequeued credential (it then counts in no bucket); scale-down cannot.
async fn run_trial(shared: &Shared, cred: Credential) {
    let cancel = &shared.cancel;

    if let Some(limiter) = &shared.limiter {
        shared.state.limiter_waiters.fetch_add(1, Ordering::Relaxed);
        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = limiter.until_ready() => false,
        };
        shared.state.limiter_waiters.fetch_sub(1, Ordering::Relaxed);
        if cancelled {
            return;
        }
    }

    let permit = tokio::select! {
        _ = cancel.cancelled() => return,
        permit = shared.permits.acquire() => {
            match permit {
                Ok(permit) => permit,
                Err(_) => return,
            }
        }
    };

    // The HTTP client enforces the configured timeout itself; this outer
    // deadline is a generous backstop for probers without their own, wide
    // enough that a slow failure can still be classified by how long it took.
    let backstop = shared.config.timeout() * 3;
    let started = Instant::now();
    let outcome = tokio::select! {
        _ = cancel.cancelled() => return,
        outcome = tokio::time::timeout(backstop, shared.prober.probe(&cred)) => {
            outcome.unwrap_or_else(|_| {
                Err(ProbeError::Timeout {
                    url: cred.host_spec.clone(),
                })
            })
        }
    };
    let duration = started.elapsed();
    drop(permit);

    let result = classify(shared, &cred, outcome, duration);
    debug!(
        host = %cred.host_spec,
        outcome = ?result.outcome,
        status = result.status_code,
        took_ms = duration.as_millis() as u64,
        "trial done"
    );

    match result.outcome {
        Outcome::Success => {
            shared.stats.increment_success();
            if shared.config.verbose {
                info!(host = %cred.host_spec, user = %cred.username, "valid credential");
            }
            if let Err(e) = shared.sink.record(&cred) {
                // The credential is already counted; losing the line is the
                // one thing worth shouting about.
                error!(host = %cred.host_spec, "failed to persist valid credential: {}", e);
            }
        }
        Outcome::Failure => shared.stats.increment_failure(),
        Outcome::Offline => shared.stats.increment_offline(),
        Outcome::RateLimited => {
            shared.stats.increment_rate_limited();
            throttle(shared, &cred.host_spec).await;
        }
        Outcome::Error => shared.stats.increment_error(),
    }

    shared.state.window_attempts.fetch_add(1, Ordering::Relaxed);
}

/// Fold one probe outcome into a trial result, feeding the per-host tracker
/// along the way.
fn classify(
    shared: &Shared,
    cred: &Credential,
    outcome: Result<ProbeVerdict, ProbeError>,
    duration: Duration,
) -> TrialResult {
    match outcome {
        Ok(verdict) => {
            let bucket = if verdict.success {
                Outcome::Success
            } else if verdict.status_code == 429 {
                Outcome::RateLimited
            } else {
                Outcome::Failure
            };
            TrialResult {
                outcome: bucket,
                status_code: verdict.status_code,
                duration,
                body_prefix: verdict.body_prefix,
            }
        }
        Err(err) => {
            let timeout = shared.config.timeout();
            let bucket = match ErrorCategory::classify(&err, duration, timeout) {
                ErrorCategory::Offline => {
                    shared
                        .tracker
                        .record_error(&cred.host_spec, offline_kind(&err, duration, timeout));
                    Outcome::Offline
                }
                ErrorCategory::RateLimited => Outcome::RateLimited,
                ErrorCategory::Other => {
                    shared
                        .tracker
                        .record_error(&cred.host_spec, ErrorKind::Unknown);
                    debug!(host = %cred.host_spec, "trial error: {}", err);
                    Outcome::Error
                }
            };
            TrialResult::new(bucket, 0, duration)
        }
    }
}

fn offline_kind(err: &ProbeError, duration: Duration, timeout: Duration) -> ErrorKind {
    match err {
        ProbeError::Timeout { .. } => ErrorKind::Timeout,
        ProbeError::Connect { reason, .. } => {
            if reason.contains("refused") {
                ErrorKind::Refused
            } else {
                ErrorKind::Unreachable
            }
        }
        _ if duration > timeout * 2 => ErrorKind::Slow,
        _ => ErrorKind::Unknown,
    }
}

/// Record a block signal and, past the per-host threshold, sleep out the
/// escalating delay. Engine shutdown cuts the sleep short.
async fn throttle(shared: &Shared, host: &str) {
    if let Some(delay) = shared.tracker.record_block(host) {
        warn!(
            host = %host,
            blocks = shared.tracker.block_count(host),
            "host is throttling us, backing off {:?}",
            delay
        );
        tokio::select! {
            _ = shared.cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Periodically steer the worker pool toward the configured rate target.
/// Growth spawns real workers when throughput falls short of the target and
/// the pool is the bottleneck. Shrinkage fires when the pool is
/// limiter-bound instead: a majority of workers parked at the rate-limiter
/// gate means extra workers add nothing, so the newest ones are cancelled.
async fn scale_loop(
    shared: Arc<Shared>,
    queue: Arc<Mutex<Receiver<Credential>>>,
    cancel: CancellationToken,
) {
    if shared.config.rate_limit == 0 {
        return;
    }
    let target_per_minute = u64::from(shared.config.rate_limit) * 60;
    let interval_secs = shared.config.scale_interval_secs;
    let cpus = num_cpus::get();
    let mut tick = tokio::time::interval(Duration::from_secs(interval_secs));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tick.tick().await; // immediate first tick carries no window

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tick.tick() => {}
        }

        let window = shared.state.window_attempts.swap(0, Ordering::Relaxed);
        let per_minute = window * 60 / interval_secs;
        let current = shared.state.current_workers.load(Ordering::Relaxed);
        let waiting = shared.state.limiter_waiters.load(Ordering::Relaxed);

        if waiting * 2 > current {
            // Limiter-bound. Surplus workers only queue at the gate.
            if current > shared.config.min_threads {
                let remove = (cpus * 5).min(current - shared.config.min_threads);
                let cancelled = cancel_newest_workers(&shared, remove);
                if cancelled > 0 {
                    shrink_permits(&shared, cancelled);
                    info!(
                        per_minute,
                        target = target_per_minute,
                        waiting,
                        workers = current - cancelled,
                        "scaled worker pool down by {}",
                        cancelled
                    );
                }
            }
        } else if per_minute < target_per_minute && current < shared.config.max_threads {
            let add = (cpus * 10).min(shared.config.max_threads - current);
            for _ in 0..add {
                spawn_worker(shared.clone(), queue.clone());
            }
            shared.permits.add_permits(add);
            info!(
                per_minute,
                target = target_per_minute,
                workers = current + add,
                "scaled worker pool up by {}",
                add
            );
        }
    }
}

/// Cancel up to `count` of the most recently spawned live workers. Workers
/// that already exited cancelled their own tokens, so popped dead entries
/// are skipped without counting.
fn cancel_newest_workers(shared: &Shared, count: usize) -> usize {
    let mut cancelled = 0usize;
    let mut tokens = shared.worker_tokens.lock();
    while cancelled < count {
        match tokens.pop() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                cancelled += 1;
            }
            Some(_) => {}
            None => break,
        }
    }
    cancelled
}

/// Shrink the in-flight budget by `count`. Permits currently held by running
/// trials cannot be forgotten directly, so the remainder is reclaimed as
/// those trials release them.
fn shrink_permits(shared: &Arc<Shared>, count: usize) {
    let forgotten = shared.permits.forget_permits(count);
    let remaining = count - forgotten;
    if remaining > 0 {
        let shared = shared.clone();
        tokio::spawn(async move {
            if let Ok(permit) = shared.permits.acquire_many(remaining as u32).await {
                permit.forget();
            }
        });
    }
}

async fn progress_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    let reporter = ProgressReporter::new();
    let mut tick = tokio::time::interval(PROGRESS_INTERVAL);
    tick.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tick.tick() => {}
        }
        info!(
            workers = shared.state.current_workers.load(Ordering::Relaxed),
            "{}",
            reporter.format(&shared.stats.snapshot())
        );
    }
}
