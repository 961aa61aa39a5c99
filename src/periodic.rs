//! Fixed-rate execution of blocking work.
//!
//! A [`PeriodicTask`] runs a unit of work every `interval`, measured from the
//! start of one run to the start of the next, so the time the work itself
//! takes does not stretch the period. The work runs on tokio's blocking pool
//! because device reads block.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::error;

#[derive(Debug)]
pub struct PeriodicTask {
    interval: Duration,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Create a task firing every `interval_seconds`. Zero, negative and
    /// non-finite intervals disable the task.
    pub fn new(interval_seconds: f64) -> Self {
        let interval = if interval_seconds.is_finite() && interval_seconds > 0.0 {
            Duration::try_from_secs_f64(interval_seconds).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };

        Self {
            interval,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the task fires at all.
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Whether the loop is currently spawned and has not exited.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start firing `work`, the first time one interval from now.
    ///
    /// Must be called from within a tokio runtime. Starting a disabled task
    /// is the same as stopping it; starting a running task does nothing.
    pub fn start<F>(&mut self, work: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if !self.is_enabled() {
            self.stop();
            return;
        }
        if self.handle.is_some() {
            return;
        }

        let interval = self.interval;
        let cancel = self.cancel.clone();
        let work = Arc::new(work);

        self.handle = Some(tokio::spawn(async move {
            let mut deadline = Instant::now().checked_add(interval);

            loop {
                // An interval too long to be represented never elapses
                let Some(at) = deadline else {
                    cancel.cancelled().await;
                    break;
                };
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => break,
                    () = sleep_until(at) => {}
                }

                let start = Instant::now();
                let work = work.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || work()).await {
                    error!(error = %e, "periodic work failed");
                }

                if cancel.is_cancelled() {
                    break;
                }

                // When the work overran the interval the next run starts right away
                deadline = start.checked_add(interval);
            }
        }));
    }

    /// Request the task to stop. A run in progress finishes; no further run
    /// is started.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to exit, including a run in progress. Returns
    /// immediately for disabled or never started tasks.
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "periodic task ended abnormally");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
