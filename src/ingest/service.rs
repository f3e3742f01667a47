use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    db::{
        models::{EnergyReading, NewEnergyReading},
        store::ReadingStore,
    },
    error::StorageFault,
    vrm::{models::DiagnosticReading, VrmClient},
};

/// What a single fetch-parse-store cycle produced.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A reading was appended to the store.
    Stored(EnergyReading),
    /// The upstream returned nothing usable; nothing was stored.
    NoData,
}

/// Runs the fetch → parse → append cycle.
///
/// Clones share a cycle lock, so a scheduled tick and a manual refresh never
/// run concurrently and timestamps are assigned in order.
#[derive(Debug, Clone)]
pub struct IngestService {
    store: ReadingStore,
    vrm: VrmClient,
    store_raw_payload: bool,
    cycle: Arc<Mutex<()>>,
}

impl IngestService {
    pub fn new(store: ReadingStore, vrm: VrmClient, store_raw_payload: bool) -> Self {
        Self {
            store,
            vrm,
            store_raw_payload,
            cycle: Arc::new(Mutex::new(())),
        }
    }

    /// Fetches the latest diagnostics from VRM, maps known codes to canonical
    /// fields and appends one row.
    ///
    /// Upstream failures are not errors here: they were already logged by the
    /// client and yield [`CycleOutcome::NoData`]. Only storage faults are
    /// returned.
    pub async fn fetch_and_persist(&self) -> Result<CycleOutcome, StorageFault> {
        let _cycle = self.cycle.lock().await;

        let Some(payload) = self.vrm.get_diagnostics().await else {
            warn!(
                installation_id = %self.vrm.installation_id(),
                "No diagnostic data received from VRM"
            );
            return Ok(CycleOutcome::NoData);
        };

        let reading = NewEnergyReading {
            recorded_at: Utc::now(),
            values: DiagnosticReading::from(&payload),
            raw_payload: self.store_raw_payload.then(|| payload.to_string()),
        };
        let stored = self.store.append(&reading).await?;

        info!(
            id = stored.id,
            battery_soc = ?stored.battery_soc,
            battery_voltage = ?stored.battery_voltage,
            solar_power = ?stored.solar_power,
            "Stored reading"
        );
        Ok(CycleOutcome::Stored(stored))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
