use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    db::models::EnergyReading,
    ingest::CycleOutcome,
    metrics::{DailyStats, TimeRemaining},
    query::CurrentReading,
};

/// Soft "nothing stored" answer; clients check for the `error` key.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NoDataResponse {
    pub error: String,
}

impl NoDataResponse {
    fn new(message: &str) -> Self {
        Self {
            error: message.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/current
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatteryDto {
    /// State of charge, percent
    pub soc: Option<f64>,
    /// Volts
    pub voltage: Option<f64>,
    /// Amps
    pub current: Option<f64>,
    /// Watts
    pub power: Option<f64>,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    pub state: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SolarDto {
    /// Watts
    pub power: Option<f64>,
    /// Volts
    pub voltage: Option<f64>,
    /// Amps
    pub current: Option<f64>,
    /// kWh
    pub yield_today: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsumptionDto {
    /// Watts
    pub power: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnvironmentDto {
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentReadingDto {
    pub timestamp: DateTime<Utc>,
    pub battery: BatteryDto,
    pub solar: SolarDto,
    pub consumption: ConsumptionDto,
    pub environment: EnvironmentDto,
    pub time_remaining: TimeRemaining,
}

impl From<CurrentReading> for CurrentReadingDto {
    fn from(c: CurrentReading) -> Self {
        let r = c.reading;
        Self {
            timestamp: r.recorded_at,
            battery: BatteryDto {
                soc: r.battery_soc,
                voltage: r.battery_voltage,
                current: r.battery_current,
                power: r.battery_power,
                temperature: r.battery_temperature,
                state: r.battery_state,
            },
            solar: SolarDto {
                power: r.solar_power,
                voltage: r.solar_voltage,
                current: r.solar_current,
                yield_today: r.solar_yield_today,
            },
            consumption: ConsumptionDto {
                power: r.consumption_power,
            },
            environment: EnvironmentDto {
                temperature: r.temperature,
                humidity: r.humidity,
            },
            time_remaining: c.time_remaining,
        }
    }
}

/// Body of `/api/current`: the reading, or an `{"error": ...}` marker when
/// nothing has been stored yet. Both are served with 200.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum CurrentResponse {
    Reading(CurrentReadingDto),
    NoData(NoDataResponse),
}

impl From<Option<CurrentReading>> for CurrentResponse {
    fn from(current: Option<CurrentReading>) -> Self {
        match current {
            Some(c) => Self::Reading(c.into()),
            None => Self::NoData(NoDataResponse::new("No data available")),
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/history
// ---------------------------------------------------------------------------

/// Flat history point, suited to chart series.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryReadingDto {
    pub timestamp: DateTime<Utc>,
    pub battery_soc: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub battery_current: Option<f64>,
    pub battery_power: Option<f64>,
    pub battery_state: Option<String>,
    pub solar_power: Option<f64>,
    pub solar_voltage: Option<f64>,
    pub solar_current: Option<f64>,
    pub solar_yield_today: Option<f64>,
    pub consumption_power: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl From<EnergyReading> for HistoryReadingDto {
    fn from(r: EnergyReading) -> Self {
        Self {
            timestamp: r.recorded_at,
            battery_soc: r.battery_soc,
            battery_voltage: r.battery_voltage,
            battery_current: r.battery_current,
            battery_power: r.battery_power,
            battery_state: r.battery_state,
            solar_power: r.solar_power,
            solar_voltage: r.solar_voltage,
            solar_current: r.solar_current,
            solar_yield_today: r.solar_yield_today,
            consumption_power: r.consumption_power,
            temperature: r.temperature,
            humidity: r.humidity,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub readings: Vec<HistoryReadingDto>,
}

// ---------------------------------------------------------------------------
// GET /api/stats
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct TodayStatsDto {
    pub today: DailyStats,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum StatsResponse {
    Today(TodayStatsDto),
    NoData(NoDataResponse),
}

impl From<Option<DailyStats>> for StatsResponse {
    fn from(stats: Option<DailyStats>) -> Self {
        match stats {
            Some(today) => Self::Today(TodayStatsDto { today }),
            None => Self::NoData(NoDataResponse::new("No data for today")),
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/refresh, GET /api/health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub status: String,
    /// `false` when the upstream returned nothing usable this time.
    pub stored: bool,
}

impl From<CycleOutcome> for RefreshResponse {
    fn from(outcome: CycleOutcome) -> Self {
        Self {
            status: "ok".to_owned(),
            stored: matches!(outcome, CycleOutcome::Stored(_)),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub vrm_connected: bool,
}
