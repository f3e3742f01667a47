//! Pure calculations over stored readings: battery runway, daily statistics
//! and history downsampling.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::DailyAggregate;

/// Static description of the battery bank used for runway estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryConfig {
    /// Usable capacity in amp-hours.
    pub capacity_ah: f64,
    /// Nominal bank voltage in volts.
    pub nominal_voltage: f64,
    /// Lowest state of charge (%) the bank should be drawn down to.
    pub min_soc: f64,
}

impl BatteryConfig {
    pub fn capacity_wh(&self) -> f64 {
        self.capacity_ah * self.nominal_voltage
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_ah: 150.0,
            nominal_voltage: 12.0,
            min_soc: 50.0,
        }
    }
}

/// Runway estimate derived from a single reading. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct TimeRemaining {
    /// Consumption minus solar, in watts. Positive means net discharge.
    pub net_power: Option<f64>,
    pub is_charging: bool,
    pub is_discharging: bool,
    pub hours_to_empty: Option<f64>,
    /// Hours until the bank reaches the configured minimum SOC.
    pub hours_to_min: Option<f64>,
    pub hours_to_full: Option<f64>,
}

/// Estimate how long the battery lasts (or how long until it is full) at the
/// current net power draw.
pub fn time_remaining(
    soc: Option<f64>,
    consumption_power: Option<f64>,
    solar_power: Option<f64>,
    battery: &BatteryConfig,
) -> TimeRemaining {
    let Some(soc) = soc else {
        return TimeRemaining::default();
    };

    let net = consumption_power.unwrap_or(0.0) - solar_power.unwrap_or(0.0);
    let capacity_wh = battery.capacity_wh();
    let mut result = TimeRemaining {
        net_power: Some(round_to(net, 1)),
        ..TimeRemaining::default()
    };

    if net > 0.0 {
        result.is_discharging = true;
        result.hours_to_empty = Some(round_to(capacity_wh * soc / 100.0 / net, 1));
        result.hours_to_min = Some(if soc > battery.min_soc {
            round_to(capacity_wh * (soc - battery.min_soc) / 100.0 / net, 1)
        } else {
            0.0
        });
    } else if net < 0.0 && soc < 100.0 {
        result.is_charging = true;
        result.hours_to_full = Some(round_to(capacity_wh * (100.0 - soc) / 100.0 / net.abs(), 1));
    }

    result
}

/// Aggregated statistics for the current calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyStats {
    /// Highest solar power seen today, in watts.
    pub solar_peak: Option<f64>,
    pub solar_avg: Option<f64>,
    pub consumption_avg: Option<f64>,
    pub readings_count: i64,
}

/// Turn a store aggregate into display statistics; `None` when the window
/// holds no readings.
pub fn daily_stats(aggregate: DailyAggregate) -> Option<DailyStats> {
    if aggregate.readings_count == 0 {
        return None;
    }

    Some(DailyStats {
        solar_peak: aggregate.solar_peak,
        solar_avg: aggregate.solar_avg.map(|v| round_to(v, 2)),
        consumption_avg: aggregate.consumption_avg.map(|v| round_to(v, 2)),
        readings_count: aggregate.readings_count,
    })
}

/// Midnight (UTC) of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

/// Stride used when thinning `count` rows down to roughly `max_points`.
///
/// Returns 1 when no thinning is needed.
pub fn history_stride(count: usize, max_points: usize) -> usize {
    if max_points == 0 || count <= max_points {
        1
    } else {
        count / max_points
    }
}

/// Keep every Nth row (starting with the first) so that large ranges stay
/// close to `max_points` entries. Order is preserved.
pub fn downsample<T>(rows: Vec<T>, max_points: usize) -> Vec<T> {
    let stride = history_stride(rows.len(), max_points);
    if stride == 1 {
        return rows;
    }
    rows.into_iter().step_by(stride).collect()
}

/// Round to `decimals` places, ties to even (`0.25` becomes `0.2`).
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
