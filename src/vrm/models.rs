use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

// ---------------------------------------------------------------------------
// Diagnostics envelope: GET /installations/{id}/diagnostics
//
// Observed shape:
//   { "success": true, "records": [ { "code": "bv", "rawValue": 12.85, ... }, ... ] }
//
// Records carry many more attributes (idDataAttribute, formattedValue,
// description, instance, ...) that are ignored here. The payload is handled
// as a raw `serde_json::Value` so that a missing or malformed `records` list,
// or a single malformed record, never rejects the whole response.
// ---------------------------------------------------------------------------

/// Raw value of a diagnostic record.
///
/// VRM reports most attributes as numbers but some as strings (numeric or
/// labels). Bool MUST come before Number for untagged deserialisation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Numeric view. Numeric strings are accepted; labels and non-finite
    /// values are not.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            RawValue::Bool(b) => f64::from(u8::from(*b)),
            RawValue::Number(n) => *n,
            RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }

    /// Text view; numbers and booleans are rendered.
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Bool(b) => b.to_string(),
            RawValue::Number(n) => n.to_string(),
            RawValue::Text(s) => s.clone(),
        }
    }
}

/// A single diagnostic attribute.
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticRecord {
    /// Attribute code, e.g. `"bv"`, `"PVP"`, `"tsT"`.
    pub code: String,

    /// `None` when the attribute is reported without a value.
    #[serde(rename = "rawValue", default)]
    pub raw_value: Option<RawValue>,
}

/// Extract the well-formed records from a diagnostics payload, in order.
pub fn diagnostic_records(payload: &Value) -> Vec<DiagnosticRecord> {
    payload
        .get("records")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| DiagnosticRecord::deserialize(item).ok())
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Canonical reading
//
// Code → field mapping (GlobalLink 520 with solar charger and temperature
// sensor; SOC only present when a battery monitor is attached):
//
//   bv   battery voltage       V
//   bc   battery current       A
//   bp   battery power         W
//   BT   battery temperature   °C
//   SOC  state of charge       %
//   bst  battery state         text ("charging" | "idle" | "discharging")
//   PVP  PV power              W
//   ScW  solar charger watts   W   (alternative source for PV power)
//   ScV  solar charger voltage V
//   ScI  solar charger current A
//   YT   yield today           kWh
//   SLI  load                  W
//   tsT  sensor temperature    °C
//   tsH  sensor humidity       %
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    BatteryVoltage,
    BatteryCurrent,
    BatteryPower,
    BatteryTemperature,
    BatterySoc,
    BatteryState,
    SolarPower,
    SolarVoltage,
    SolarCurrent,
    SolarYieldToday,
    ConsumptionPower,
    Temperature,
    Humidity,
}

const CODE_MAPPING: &[(&str, Field)] = &[
    ("bv", Field::BatteryVoltage),
    ("bc", Field::BatteryCurrent),
    ("bp", Field::BatteryPower),
    ("BT", Field::BatteryTemperature),
    ("SOC", Field::BatterySoc),
    ("bst", Field::BatteryState),
    ("PVP", Field::SolarPower),
    ("ScW", Field::SolarPower),
    ("ScV", Field::SolarVoltage),
    ("ScI", Field::SolarCurrent),
    ("YT", Field::SolarYieldToday),
    ("SLI", Field::ConsumptionPower),
    ("tsT", Field::Temperature),
    ("tsH", Field::Humidity),
];

fn field_for(code: &str) -> Option<Field> {
    CODE_MAPPING
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, field)| *field)
}

/// Canonical view of one diagnostics payload. The timestamp is assigned by
/// the caller when the reading is persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticReading {
    pub battery_soc: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub battery_current: Option<f64>,
    pub battery_power: Option<f64>,
    pub battery_temperature: Option<f64>,
    pub battery_state: Option<String>,
    pub solar_power: Option<f64>,
    pub solar_voltage: Option<f64>,
    pub solar_current: Option<f64>,
    pub solar_yield_today: Option<f64>,
    pub consumption_power: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl DiagnosticReading {
    /// Map every recognised record onto its field. Later records overwrite
    /// earlier ones for the same field. Values that cannot be coerced leave
    /// the field untouched.
    pub fn from_records(records: &[DiagnosticRecord]) -> Self {
        let mut reading = Self::default();

        for record in records {
            let Some(field) = field_for(&record.code) else {
                debug!(code = %record.code, "Unmapped diagnostic code, ignoring");
                continue;
            };
            let Some(raw) = &record.raw_value else {
                continue;
            };
            reading.apply(field, raw);
        }

        if reading.battery_soc.is_none() {
            reading.battery_soc = reading.battery_voltage.map(estimate_soc_from_voltage);
        }

        reading
    }

    fn apply(&mut self, field: Field, raw: &RawValue) {
        if field == Field::BatteryState {
            self.battery_state = Some(raw.as_text());
            return;
        }

        let Some(value) = raw.as_f64() else {
            return;
        };
        let slot = match field {
            Field::BatteryVoltage => &mut self.battery_voltage,
            Field::BatteryCurrent => &mut self.battery_current,
            Field::BatteryPower => &mut self.battery_power,
            Field::BatteryTemperature => &mut self.battery_temperature,
            Field::BatterySoc => &mut self.battery_soc,
            Field::SolarPower => &mut self.solar_power,
            Field::SolarVoltage => &mut self.solar_voltage,
            Field::SolarCurrent => &mut self.solar_current,
            Field::SolarYieldToday => &mut self.solar_yield_today,
            Field::ConsumptionPower => &mut self.consumption_power,
            Field::Temperature => &mut self.temperature,
            Field::Humidity => &mut self.humidity,
            Field::BatteryState => return,
        };
        *slot = Some(value);
    }
}

impl From<&Value> for DiagnosticReading {
    fn from(payload: &Value) -> Self {
        Self::from_records(&diagnostic_records(payload))
    }
}

/// Approximate state of charge of a resting 12 V lead-acid battery.
///
/// Resting-voltage table (25 °C):
///   12.70 V+ = 100 %, 12.50 V = 75 %, 12.30 V = 50 %, 12.10 V = 25 %, 11.90 V = 0 %
///
/// Linear between 11.90 V and 12.70 V, rounded to one decimal. Readings
/// taken under load or charge are skewed.
pub fn estimate_soc_from_voltage(voltage: f64) -> f64 {
    const EMPTY_V: f64 = 11.90;
    const FULL_V: f64 = 12.70;

    if voltage >= FULL_V {
        100.0
    } else if voltage <= EMPTY_V {
        0.0
    } else {
        let soc = (voltage - EMPTY_V) / (FULL_V - EMPTY_V) * 100.0;
        (soc * 10.0).round() / 10.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(payload: Value) -> DiagnosticReading {
        DiagnosticReading::from(&payload)
    }

    // --- RawValue -----------------------------------------------------------

    #[test]
    fn raw_value_number_deserializes() {
        let v: RawValue = serde_json::from_str("12.85").unwrap();
        assert_eq!(v.as_f64(), Some(12.85));
    }

    #[test]
    fn raw_value_integer_deserializes_as_number() {
        let v: RawValue = serde_json::from_str("150").unwrap();
        assert_eq!(v.as_f64(), Some(150.0));
        assert_eq!(v.as_text(), "150");
    }

    #[test]
    fn raw_value_numeric_string_coerces() {
        let v: RawValue = serde_json::from_str(r#"" 13.1 ""#).unwrap();
        assert_eq!(v.as_f64(), Some(13.1));
    }

    #[test]
    fn raw_value_label_is_not_numeric() {
        let v: RawValue = serde_json::from_str(r#""invalid""#).unwrap();
        assert_eq!(v.as_f64(), None);
        assert_eq!(v.as_text(), "invalid");
    }

    #[test]
    fn raw_value_non_finite_string_is_rejected() {
        let v = RawValue::Text("NaN".to_owned());
        assert_eq!(v.as_f64(), None);
        let v = RawValue::Text("inf".to_owned());
        assert_eq!(v.as_f64(), None);
    }

    // --- Parsing ------------------------------------------------------------

    #[test]
    fn empty_payload_yields_all_unknown() {
        assert_eq!(parse(json!({})), DiagnosticReading::default());
        assert_eq!(parse(json!({"success": true})), DiagnosticReading::default());
        assert_eq!(parse(Value::Null), DiagnosticReading::default());
    }

    #[test]
    fn malformed_records_list_yields_all_unknown() {
        assert_eq!(parse(json!({"records": "nope"})), DiagnosticReading::default());
        assert_eq!(parse(json!({"records": {"bv": 12.0}})), DiagnosticReading::default());
    }

    #[test]
    fn unrecognised_codes_yield_all_unknown() {
        let r = parse(json!({"records": [
            {"code": "XYZ", "rawValue": 1},
            {"code": "Pdc", "rawValue": 33.0}
        ]}));
        assert_eq!(r, DiagnosticReading::default());
    }

    #[test]
    fn parses_battery_voltage() {
        let r = parse(json!({"success": true, "records": [{"code": "bv", "rawValue": 12.85}]}));
        assert_eq!(r.battery_voltage, Some(12.85));
    }

    #[test]
    fn parses_solar_power() {
        let r = parse(json!({"records": [{"code": "PVP", "rawValue": 150}]}));
        assert_eq!(r.solar_power, Some(150.0));
    }

    #[test]
    fn parses_battery_state_as_text() {
        let r = parse(json!({"records": [{"code": "bst", "rawValue": "idle"}]}));
        assert_eq!(r.battery_state.as_deref(), Some("idle"));

        let r = parse(json!({"records": [{"code": "bst", "rawValue": 2}]}));
        assert_eq!(r.battery_state.as_deref(), Some("2"));
    }

    #[test]
    fn parses_full_diagnostic() {
        let r = parse(json!({"success": true, "records": [
            {"code": "bv", "rawValue": 12.95},
            {"code": "bc", "rawValue": 0.5},
            {"code": "bp", "rawValue": 6},
            {"code": "bst", "rawValue": "charging"},
            {"code": "PVP", "rawValue": 120},
            {"code": "ScV", "rawValue": 18.5},
            {"code": "ScI", "rawValue": 6.5},
            {"code": "YT", "rawValue": 0.85},
            {"code": "tsT", "rawValue": 21.3},
            {"code": "tsH", "rawValue": 58.0},
            {"code": "SLI", "rawValue": 42},
            {"code": "BT", "rawValue": 19.5}
        ]}));
        assert_eq!(r.battery_voltage, Some(12.95));
        assert_eq!(r.battery_current, Some(0.5));
        assert_eq!(r.battery_power, Some(6.0));
        assert_eq!(r.battery_state.as_deref(), Some("charging"));
        assert_eq!(r.battery_temperature, Some(19.5));
        assert_eq!(r.solar_power, Some(120.0));
        assert_eq!(r.solar_voltage, Some(18.5));
        assert_eq!(r.solar_current, Some(6.5));
        assert_eq!(r.solar_yield_today, Some(0.85));
        assert_eq!(r.temperature, Some(21.3));
        assert_eq!(r.humidity, Some(58.0));
        assert_eq!(r.consumption_power, Some(42.0));
        // No SOC record, so estimated from 12.95 V.
        assert_eq!(r.battery_soc, Some(100.0));
    }

    #[test]
    fn invalid_value_leaves_field_unknown() {
        let r = parse(json!({"records": [{"code": "bv", "rawValue": "invalid"}]}));
        assert_eq!(r.battery_voltage, None);
        assert_eq!(r.battery_soc, None);
    }

    #[test]
    fn invalid_value_does_not_abort_remaining_records() {
        let r = parse(json!({"records": [
            {"code": "bv", "rawValue": "invalid"},
            {"code": "tsT", "rawValue": {"nested": true}},
            {"rawValue": 3},
            "garbage",
            {"code": "PVP", "rawValue": 80},
            {"code": "tsH", "rawValue": null}
        ]}));
        assert_eq!(r.solar_power, Some(80.0));
        assert_eq!(r.temperature, None);
        assert_eq!(r.humidity, None);
        assert_eq!(r.battery_voltage, None);
    }

    #[test]
    fn duplicate_solar_codes_last_write_wins() {
        let r = parse(json!({"records": [
            {"code": "PVP", "rawValue": 120},
            {"code": "ScW", "rawValue": 95}
        ]}));
        assert_eq!(r.solar_power, Some(95.0));

        let r = parse(json!({"records": [
            {"code": "ScW", "rawValue": 95},
            {"code": "PVP", "rawValue": 120}
        ]}));
        assert_eq!(r.solar_power, Some(120.0));
    }

    #[test]
    fn failed_coercion_does_not_clear_earlier_value() {
        let r = parse(json!({"records": [
            {"code": "PVP", "rawValue": 120},
            {"code": "ScW", "rawValue": "n/a"}
        ]}));
        assert_eq!(r.solar_power, Some(120.0));
    }

    // --- SOC fallback -------------------------------------------------------

    #[test]
    fn soc_estimated_when_no_monitor() {
        let r = parse(json!({"records": [{"code": "bv", "rawValue": 12.50}]}));
        let soc = r.battery_soc.unwrap();
        assert!((74.0..=76.0).contains(&soc), "soc = {soc}");
    }

    #[test]
    fn direct_soc_is_never_overridden() {
        let r = parse(json!({"records": [
            {"code": "bv", "rawValue": 11.5},
            {"code": "SOC", "rawValue": 87.0}
        ]}));
        assert_eq!(r.battery_soc, Some(87.0));

        let r = parse(json!({"records": [
            {"code": "SOC", "rawValue": 42.0},
            {"code": "bv", "rawValue": 13.2}
        ]}));
        assert_eq!(r.battery_soc, Some(42.0));
    }

    #[test]
    fn no_voltage_means_no_estimate() {
        let r = parse(json!({"records": [{"code": "PVP", "rawValue": 10}]}));
        assert_eq!(r.battery_soc, None);
    }

    #[test]
    fn soc_full_battery() {
        assert_eq!(estimate_soc_from_voltage(12.70), 100.0);
        assert_eq!(estimate_soc_from_voltage(12.85), 100.0);
        assert_eq!(estimate_soc_from_voltage(13.0), 100.0);
    }

    #[test]
    fn soc_empty_battery() {
        assert_eq!(estimate_soc_from_voltage(11.90), 0.0);
        assert_eq!(estimate_soc_from_voltage(11.50), 0.0);
    }

    #[test]
    fn soc_mid_range() {
        let soc = estimate_soc_from_voltage(12.30);
        assert!((49.0..=51.0).contains(&soc), "soc = {soc}");
        let soc = estimate_soc_from_voltage(12.50);
        assert!((74.0..=76.0).contains(&soc), "soc = {soc}");
    }

    #[test]
    fn soc_estimate_is_monotonic() {
        let mut previous = estimate_soc_from_voltage(11.90);
        for step in 1..=80 {
            let v = 11.90 + f64::from(step) * 0.01;
            let soc = estimate_soc_from_voltage(v);
            assert!(soc >= previous, "{v} V → {soc} < {previous}");
            assert!((0.0..=100.0).contains(&soc));
            previous = soc;
        }
    }
}
