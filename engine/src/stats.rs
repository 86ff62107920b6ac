//! Live progress counters and the periodic reporter that logs them.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub processed: u64,
    pub errored: u64,
}

/// Counts finished rows as the sink records them.
pub trait Stats: Send + Sync + fmt::Debug {
    fn add_processed(&self);
    fn add_error(&self);
    /// Each counter is read independently; the pair may be momentarily skewed.
    fn values(&self) -> StatsSnapshot;
}

/// Atomic counters, used when progress is reported.
#[derive(Debug, Default)]
pub struct VerboseStats {
    processed: AtomicU64,
    errored: AtomicU64,
}

impl Stats for VerboseStats {
    fn add_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn add_error(&self) {
        self.errored.fetch_add(1, Ordering::Relaxed);
    }

    fn values(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
        }
    }
}

/// No-op counters for quiet runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentStats;

impl Stats for SilentStats {
    fn add_processed(&self) {}

    fn add_error(&self) {}

    fn values(&self) -> StatsSnapshot {
        StatsSnapshot::default()
    }
}

#[must_use]
pub fn format_progress(snapshot: StatsSnapshot, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        snapshot.processed as f64 / secs
    } else {
        0.0
    };
    format!(
        "processed: {} ({rate:.1}/s), errors: {}",
        snapshot.processed, snapshot.errored
    )
}

/// Logs a progress line every interval until stopped.
#[derive(Debug)]
pub struct ProgressReporter {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn spawn(stats: Arc<dyn Stats>, interval: Duration) -> Self {
        let stop = CancellationToken::new();
        let token = stop.clone();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval_at(started + interval, interval);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        tracing::info!("{}", format_progress(stats.values(), started.elapsed()));
                    }
                }
            }
            tracing::info!("{}", format_progress(stats.values(), started.elapsed()));
        });
        Self { stop, handle }
    }

    /// Stop reporting after logging one final line.
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Progress reporter ended abnormally");
        }
    }
}
