//! Periodic progress reporting
//!
//! A timer-driven task logs the running total of records that passed the
//! deduplicator. It is tied to the pipeline: [`ProgressReporter::stop`]
//! (or dropping the reporter) ends it, so it never outlives the run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Process-wide count of deduplicated records
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter(Arc<AtomicU64>);

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTotals {
    /// Progress events emitted
    pub reports: u64,
    pub total: u64,
}

pub struct ProgressReporter {
    counter: ProgressCounter,
    token: CancellationToken,
    handle: Option<JoinHandle<u64>>,
}

impl ProgressReporter {
    /// Spawn the reporting task; the first event fires one `period` from now.
    pub fn start(counter: ProgressCounter, period: Duration) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let task_counter = counter.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut reports = 0u64;

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        reports += 1;
                        info!(total = task_counter.get(), "Number of addresses imported");
                    },
                }
            }
            reports
        });

        Self {
            counter,
            token,
            handle: Some(handle),
        }
    }

    /// Cancel the timer and wait for the task to end.
    pub async fn stop(mut self) -> ProgressTotals {
        self.token.cancel();
        let reports = match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                warn!(error = %e, "Progress reporter task failed");
                0
            }),
            None => 0,
        };

        ProgressTotals {
            reports,
            total: self.counter.get(),
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_reports_on_interval() {
        let counter = ProgressCounter::new();
        let reporter = ProgressReporter::start(counter.clone(), Duration::from_secs(10));

        counter.increment();
        counter.increment();
        tokio::time::sleep(Duration::from_secs(35)).await;

        let totals = reporter.stop().await;
        assert_eq!(totals.reports, 3);
        assert_eq!(totals.total, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick() {
        let reporter = ProgressReporter::start(ProgressCounter::new(), DEFAULT_PROGRESS_INTERVAL);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(reporter.stop().await.reports, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_task() {
        let reporter = ProgressReporter::start(ProgressCounter::new(), Duration::from_secs(1));
        let token = reporter.token.clone();
        drop(reporter);
        assert!(token.is_cancelled());
    }
}
