//! Elapsed-seconds counter for a call in progress.
//!
//! The counter is a `tokio::time::interval` task owned by the [`Stopwatch`].
//! Stopping, resetting or dropping the stopwatch cancels the task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use helpline_core::format_duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

/// A start/stop/reset seconds counter.
#[derive(Debug, Default)]
pub struct Stopwatch {
    elapsed: Arc<AtomicU64>,
    ticker: Option<CancellationToken>,
}

impl Stopwatch {
    /// Create a stopped stopwatch at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from the current value. Does nothing if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let token = CancellationToken::new();
        let elapsed = Arc::clone(&self.elapsed);
        let cancelled = token.clone();

        tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + TICK, TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticks.tick() => {
                        elapsed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });

        tracing::debug!(from_secs = self.elapsed_secs(), "Stopwatch started");
        self.ticker = Some(token);
    }

    /// Stop counting, keeping the current value.
    pub fn stop(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
            tracing::debug!(elapsed_secs = self.elapsed_secs(), "Stopwatch stopped");
        }
    }

    /// Stop counting and return to zero.
    pub fn reset(&mut self) {
        self.stop();
        self.elapsed.store(0, Ordering::Relaxed);
    }

    /// Seconds counted so far.
    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.load(Ordering::Relaxed)
    }

    /// Returns `true` while the counter task is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Returns `true` if the stopwatch is stopped at zero.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.is_running() && self.elapsed_secs() == 0
    }

    /// Elapsed time as `m:ss`.
    #[must_use]
    pub fn display(&self) -> String {
        format_duration(self.elapsed_secs())
    }
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run_for(secs: u64) {
        // Half a tick of slack keeps the sleep deadline off a tick boundary.
        tokio::time::sleep(Duration::from_millis(secs * 1000 + 500)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn counts_seconds_while_running() {
        let mut watch = Stopwatch::new();
        assert!(watch.is_idle());

        watch.start();
        run_for(30).await;
        assert_eq!(watch.elapsed_secs(), 30);
        assert_eq!(watch.display(), "0:30");
        assert!(watch.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_and_start_resumes() {
        let mut watch = Stopwatch::new();
        watch.start();
        run_for(5).await;
        watch.stop();

        run_for(10).await;
        assert_eq!(watch.elapsed_secs(), 5);
        assert!(!watch.is_running());

        watch.start();
        run_for(3).await;
        assert_eq!(watch.elapsed_secs(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_returns_to_idle() {
        let mut watch = Stopwatch::new();
        watch.start();
        run_for(2).await;

        watch.reset();
        assert!(watch.is_idle());
        run_for(2).await;
        assert_eq!(watch.elapsed_secs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_does_not_double_count() {
        let mut watch = Stopwatch::new();
        watch.start();
        watch.start();
        run_for(4).await;
        assert_eq!(watch.elapsed_secs(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_task() {
        let watch = Stopwatch::new();
        let elapsed = Arc::clone(&watch.elapsed);
        let mut watch = watch;
        watch.start();
        run_for(1).await;
        drop(watch);

        run_for(5).await;
        assert_eq!(elapsed.load(Ordering::Relaxed), 1);
    }
}
