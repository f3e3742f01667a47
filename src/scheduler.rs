use std::time::Duration;

use chrono::Utc;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{error, info};

use crate::{
    config::RETENTION_DAYS,
    db::store::ReadingStore,
    error::StorageFault,
    ingest::IngestService,
};

#[derive(Debug, Clone, Copy)]
pub struct ScheduleSettings {
    pub fetch_interval: Duration,
    pub retention_interval: Duration,
}

impl ScheduleSettings {
    pub fn from_secs(fetch_interval_secs: u64, retention_interval_secs: u64) -> Self {
        Self {
            fetch_interval: Duration::from_secs(fetch_interval_secs),
            retention_interval: Duration::from_secs(retention_interval_secs),
        }
    }
}

/// Owns the two periodic loops: the diagnostics fetch cycle and the
/// retention sweep. Both are started by [`Scheduler::start`] and stopped by
/// [`Scheduler::shutdown`].
///
/// Every failure inside a loop is logged and the loop moves on to its next
/// tick; nothing is retried.
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Runs one retention sweep, then spawns the loops.
    ///
    /// Without an ingest service (no upstream credentials) only the
    /// retention loop is started.
    pub async fn start(
        ingest: Option<IngestService>,
        store: ReadingStore,
        settings: ScheduleSettings,
    ) -> Self {
        sweep(&store).await;

        let (shutdown, _) = watch::channel(false);
        let mut tasks = Vec::with_capacity(2);

        tasks.push(tokio::spawn(retention_loop(
            store,
            settings.retention_interval,
            shutdown.subscribe(),
        )));

        match ingest {
            Some(ingest) => tasks.push(tokio::spawn(fetch_loop(
                ingest,
                settings.fetch_interval,
                shutdown.subscribe(),
            ))),
            None => info!("No VRM client configured; diagnostics fetch loop not scheduled"),
        }

        Self { shutdown, tasks }
    }

    /// Number of running loops (1 in degraded mode, 2 otherwise).
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal both loops to stop and wait for them. A fetch already in flight
    /// is allowed to finish (or time out) first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Scheduler task terminated abnormally");
            }
        }
        info!("Scheduler stopped");
    }
}

async fn fetch_loop(ingest: IngestService, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    info!(interval_secs = interval.as_secs(), "Diagnostics fetch loop started");
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // Shutdown wins when both are ready.
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        if let Err(e) = ingest.fetch_and_persist().await {
            error!(error = ?e, "Failed to store reading");
        }
    }
}

async fn retention_loop(store: ReadingStore, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    info!(interval_secs = interval.as_secs(), "Retention loop started");
    // The startup sweep already ran; first scheduled sweep is one interval out.
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        sweep(&store).await;
    }
}

/// Delete readings older than the retention window. Returns the number of
/// rows removed.
pub async fn sweep_expired(store: &ReadingStore) -> Result<u64, StorageFault> {
    let cutoff = Utc::now() - chrono::Duration::days(RETENTION_DAYS);
    store.delete_older_than(cutoff).await
}

async fn sweep(store: &ReadingStore) {
    match sweep_expired(store).await {
        Ok(0) => {}
        Ok(removed) => info!(removed, retention_days = RETENTION_DAYS, "Removed expired readings"),
        Err(e) => error!(error = ?e, "Retention sweep failed"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
