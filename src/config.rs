use anyhow::{Context, Result};

use crate::metrics::BatteryConfig;

/// Readings older than this are removed by the retention sweep.
pub const RETENTION_DAYS: i64 = 7;
/// Largest window `/api/history` will serve.
pub const MAX_HISTORY_HOURS: u32 = 168;
/// History responses are thinned to roughly this many points.
pub const MAX_HISTORY_POINTS: usize = 1440;

pub const DEFAULT_VRM_API_BASE: &str = "https://vrmapi.victronenergy.com/v2";

/// Dashboard origins allowed to call the API from a browser.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "https://victron-monitor.fly.dev",
    "http://localhost:5173",
    "http://localhost:3000",
];

// ---------------------------------------------------------------------------
// VrmSettings
// ---------------------------------------------------------------------------

/// Upstream connection settings. Credentials are optional here: without
/// them the service runs in degraded mode (no ingestion).
#[derive(Debug, Clone)]
pub struct VrmSettings {
    pub token: Option<String>,
    pub installation_id: Option<String>,
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub vrm: VrmSettings,
    pub battery: BatteryConfig,
    /// Diagnostics fetch interval in seconds.
    pub fetch_interval_secs: u64,
    /// Retention sweep interval in seconds.
    pub retention_interval_secs: u64,
    /// Keep a JSON snapshot of every upstream payload alongside the reading.
    pub store_raw_payload: bool,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process
    /// environment in production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str, default: &str| with_default(&lookup, key, default);

        Ok(Self {
            database_url: optional("DATABASE_URL", "sqlite://data/vrm_monitor.db"),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            vrm: VrmSettings {
                token: lookup("VRM_TOKEN"),
                installation_id: lookup("VRM_INSTALLATION_ID"),
                base_url: optional("VRM_API_BASE", DEFAULT_VRM_API_BASE),
                timeout_secs: positive(&optional("VRM_TIMEOUT_SECS", "30"), "VRM_TIMEOUT_SECS")?,
            },
            battery: BatteryConfig {
                capacity_ah: parse_f64(&optional("BATTERY_CAPACITY_AH", "150"), "BATTERY_CAPACITY_AH")?,
                nominal_voltage: parse_f64(
                    &optional("BATTERY_VOLTAGE_NOMINAL", "12"),
                    "BATTERY_VOLTAGE_NOMINAL",
                )?,
                min_soc: parse_f64(&optional("BATTERY_MIN_SOC", "50"), "BATTERY_MIN_SOC")?,
            },
            fetch_interval_secs: positive(
                &optional("FETCH_INTERVAL_SECS", "60"),
                "FETCH_INTERVAL_SECS",
            )?,
            retention_interval_secs: positive(
                &optional("RETENTION_INTERVAL_SECS", "3600"),
                "RETENTION_INTERVAL_SECS",
            )?,
            store_raw_payload: parse_bool(&optional("STORE_RAW_PAYLOAD", "false"))
                .context("STORE_RAW_PAYLOAD must be true or false")?,
            cors_origins: lookup("CORS_ORIGINS")
                .filter(|v| !v.trim().is_empty())
                .map(|v| parse_list(&v))
                .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|o| (*o).to_owned()).collect()),
        })
    }
}

fn with_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn positive(raw: &str, key: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|v| *v > 0)
        .with_context(|| format!("{key} must be a positive integer, got {raw:?}"))
}

fn parse_f64(raw: &str, key: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .with_context(|| format!("{key} must be a number, got {raw:?}"))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("invalid boolean: {other:?}")),
    }
}
