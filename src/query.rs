use chrono::{DateTime, Duration, Utc};

use crate::{
    config::{MAX_HISTORY_HOURS, MAX_HISTORY_POINTS},
    db::{models::EnergyReading, store::ReadingStore},
    error::{HistoryError, RefreshError, StorageFault},
    ingest::{CycleOutcome, IngestService},
    metrics::{self, BatteryConfig, DailyStats, TimeRemaining},
};

/// The latest stored reading together with its runway estimate.
#[derive(Debug, Clone)]
pub struct CurrentReading {
    pub reading: EnergyReading,
    pub time_remaining: TimeRemaining,
}

/// Read side of the service, shared with the HTTP handlers as axum state.
///
/// `ingest` is `None` in degraded mode (no upstream credentials); reads keep
/// working against whatever is already stored.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: ReadingStore,
    battery: BatteryConfig,
    ingest: Option<IngestService>,
}

impl QueryService {
    pub fn new(store: ReadingStore, battery: BatteryConfig, ingest: Option<IngestService>) -> Self {
        Self {
            store,
            battery,
            ingest,
        }
    }

    pub async fn current(&self) -> Result<Option<CurrentReading>, StorageFault> {
        let Some(reading) = self.store.latest().await? else {
            return Ok(None);
        };

        let time_remaining = metrics::time_remaining(
            reading.battery_soc,
            reading.consumption_power,
            reading.solar_power,
            &self.battery,
        );
        Ok(Some(CurrentReading {
            reading,
            time_remaining,
        }))
    }

    pub async fn history(&self, hours: i64) -> Result<Vec<EnergyReading>, HistoryError> {
        self.history_at(hours, Utc::now()).await
    }

    /// Readings from the last `hours` before `now`, oldest first, thinned to
    /// about 1440 points. `hours` must lie in 1..=168.
    pub async fn history_at(
        &self,
        hours: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<EnergyReading>, HistoryError> {
        let max = i64::from(MAX_HISTORY_HOURS);
        if !(1..=max).contains(&hours) {
            return Err(HistoryError::HoursOutOfRange {
                requested: hours,
                min: 1,
                max,
            });
        }
        let since = now - Duration::hours(hours);
        let rows = self.store.range(since, now).await?;
        Ok(metrics::downsample(rows, MAX_HISTORY_POINTS))
    }

    pub async fn stats(&self) -> Result<Option<DailyStats>, StorageFault> {
        self.stats_at(Utc::now()).await
    }

    /// Statistics for the UTC day containing `now`, up to `now`.
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<Option<DailyStats>, StorageFault> {
        let aggregate = self
            .store
            .aggregate(metrics::start_of_day(now), now)
            .await?;
        Ok(metrics::daily_stats(aggregate))
    }

    /// Run one ingestion cycle right away, outside the schedule.
    pub async fn trigger_refresh(&self) -> Result<CycleOutcome, RefreshError> {
        let ingest = self.ingest.as_ref().ok_or(RefreshError::NotConfigured)?;
        Ok(ingest.fetch_and_persist().await?)
    }

    /// Whether an upstream client was configured at startup.
    pub fn vrm_connected(&self) -> bool {
        self.ingest.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
