use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::vrm::models::DiagnosticReading;

/// One row of the `energy_readings` time series.
///
/// Every measurement is nullable: `None` means the upstream did not report
/// the quantity for that cycle, never zero.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EnergyReading {
    pub id: i64,
    /// Ingestion time (not the device's own clock).
    pub recorded_at: DateTime<Utc>,

    /// Percent, 0–100.
    pub battery_soc: Option<f64>,
    /// Volts
    pub battery_voltage: Option<f64>,
    /// Amps
    pub battery_current: Option<f64>,
    /// Watts
    pub battery_power: Option<f64>,
    /// Degrees Celsius
    pub battery_temperature: Option<f64>,
    /// Vendor label, e.g. `"charging"`, `"idle"`, `"discharging"`.
    pub battery_state: Option<String>,

    /// Watts
    pub solar_power: Option<f64>,
    /// Volts
    pub solar_voltage: Option<f64>,
    /// Amps
    pub solar_current: Option<f64>,
    /// kWh
    pub solar_yield_today: Option<f64>,

    /// Watts
    pub consumption_power: Option<f64>,

    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,

    /// JSON snapshot of the upstream response, when raw storage is enabled.
    /// Only populated by `append`; `latest` and `range` leave it `None`.
    #[sqlx(default)]
    pub raw_payload: Option<String>,
}

/// A parsed reading waiting to be appended to the store.
#[derive(Debug, Clone)]
pub struct NewEnergyReading {
    pub recorded_at: DateTime<Utc>,
    pub values: DiagnosticReading,
    pub raw_payload: Option<String>,
}

/// Result of the in-database aggregation over a time window.
#[derive(Debug, Clone, FromRow)]
pub struct DailyAggregate {
    pub solar_peak: Option<f64>,
    pub solar_avg: Option<f64>,
    pub consumption_avg: Option<f64>,
    pub readings_count: i64,
}
