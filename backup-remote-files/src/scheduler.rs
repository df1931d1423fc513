//! Sweep scheduling.
//!
//! Two timers drive the sweeps:
//! - the full timer ticks every `interval` and retrieves every item;
//! - the retry timer, only while armed, ticks every `retry_interval` and
//!   retrieves the items whose last retrieval failed.
//!
//! Any sweep where everything succeeded disarms the retry timer. A failing
//! full sweep arms it with a fresh deadline; a failing retry sweep keeps it on
//! its current cadence.
//!
//! Everything runs in one task, so at most one sweep is in flight and items
//! need no locking. Time comes from `tokio::time`, which tests pause and
//! advance instead of sleeping.

use crate::fetch::Fetcher;
use crate::metrics::MetricsSink;
use crate::retrieval::{BackupItem, RetrievalState, SweepKind, SweepResult};
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTimer {
    Disarmed,
    Armed { next: Instant },
}

impl RetryTimer {
    pub fn is_armed(&self) -> bool {
        matches!(self, RetryTimer::Armed { .. })
    }

    fn deadline(&self) -> Option<Instant> {
        match self {
            RetryTimer::Armed { next } => Some(*next),
            RetryTimer::Disarmed => None,
        }
    }
}

pub struct Scheduler<F, M> {
    retrieval: RetrievalState<F, M>,
    items: Vec<BackupItem>,
    full_interval: Duration,
    retry_interval: Duration,
    retry: RetryTimer,
}

impl<F: Fetcher, M: MetricsSink> Scheduler<F, M> {
    /// Both intervals must be non-zero.
    pub fn new(
        retrieval: RetrievalState<F, M>,
        items: Vec<BackupItem>,
        full_interval: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            retrieval,
            items,
            full_interval,
            retry_interval,
            retry: RetryTimer::Disarmed,
        }
    }

    pub fn items(&self) -> &[BackupItem] {
        &self.items
    }

    pub fn retry_timer(&self) -> RetryTimer {
        self.retry
    }

    /// Initial full sweep, run before the periodic loop.
    pub async fn start(&mut self) -> SweepResult {
        self.full_sweep().await
    }

    /// Run the periodic loop until `shutdown` is cancelled.
    ///
    /// Cancellation is only observed between sweeps; a running sweep always
    /// completes. When the full and retry timers are due at the same instant
    /// either sweep may run first.
    pub async fn run(mut self, shutdown: CancellationToken) -> Self {
        let mut full = time::interval_at(Instant::now() + self.full_interval, self.full_interval);
        full.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval = ?self.full_interval,
            retry_interval = ?self.retry_interval,
            items = self.items.len(),
            "Scheduler started"
        );

        loop {
            let retry_deadline = self.retry.deadline();
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = full.tick() => {
                    self.full_sweep().await;
                }
                _ = sleep_until(retry_deadline) => {
                    self.retry_sweep().await;
                }
            }
        }

        info!("Scheduler stopped");
        self
    }

    /// Sweep every item, then arm or disarm the retry timer.
    pub async fn full_sweep(&mut self) -> SweepResult {
        let result = self.retrieval.sweep(SweepKind::Full, &mut self.items).await;
        self.retry = if result.all_succeeded {
            RetryTimer::Disarmed
        } else {
            RetryTimer::Armed {
                next: Instant::now() + self.retry_interval,
            }
        };
        self.log_retry_timer();
        result
    }

    /// Sweep the failed items; disarm once they all succeed.
    pub async fn retry_sweep(&mut self) -> SweepResult {
        let result = self.retrieval.sweep(SweepKind::Retry, &mut self.items).await;
        self.retry = match self.retry {
            _ if result.all_succeeded => RetryTimer::Disarmed,
            RetryTimer::Armed { next } => RetryTimer::Armed {
                next: next_tick(next, self.retry_interval, Instant::now()),
            },
            RetryTimer::Disarmed => RetryTimer::Armed {
                next: Instant::now() + self.retry_interval,
            },
        };
        self.log_retry_timer();
        result
    }

    fn log_retry_timer(&self) {
        match self.retry {
            RetryTimer::Armed { next } => {
                let pending = self.items.iter().filter(|i| !i.last_succeeded).count();
                info!(
                    pending,
                    in_secs = next.saturating_duration_since(Instant::now()).as_secs(),
                    "Retry timer armed"
                );
            }
            RetryTimer::Disarmed => debug!("Retry timer disarmed"),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// First tick of the `period` cadence through `previous` that is after `now`.
fn next_tick(previous: Instant, period: Duration, now: Instant) -> Instant {
    let mut next = previous + period;
    if next <= now {
        let period_nanos = period.as_nanos();
        let skipped = now.duration_since(next).as_nanos() / period_nanos + 1;
        let offset = u64::try_from(skipped.saturating_mul(period_nanos)).unwrap_or(u64::MAX);
        next = next
            .checked_add(Duration::from_nanos(offset))
            .unwrap_or_else(|| now + period);
    }
    next
}
