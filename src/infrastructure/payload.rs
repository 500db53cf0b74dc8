// Normalization of raw Dozemate API payloads into domain samples
use crate::application::error::TelemetryError;
use crate::domain::metric::Metric;
use crate::domain::sample::{DeviceId, Sample};
use std::collections::BTreeMap;
use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

const TIMESTAMP_FIELDS: [&str; 3] = ["timestamp", "time", "createdAt"];

/// Parse a health/history response body. The health endpoint returns a
/// bare array; the history endpoint wraps it as `{ "data": [...] }`.
pub fn parse_samples(body: &[u8]) -> Result<Vec<Sample>, TelemetryError> {
    let value: Value = serde_json::from_slice(body)?;
    samples_from_value(value)
}

/// Parse a history response body. A missing or null `data` field is an
/// empty history rather than an error.
pub fn parse_history(body: &[u8]) -> Result<Vec<Sample>, TelemetryError> {
    let value: Value = serde_json::from_slice(body)?;
    if let Value::Object(map) = &value {
        if matches!(map.get("data"), None | Some(Value::Null)) {
            tracing::debug!("History payload carried no data");
            return Ok(Vec::new());
        }
    }
    samples_from_value(value)
}

pub fn samples_from_value(value: Value) -> Result<Vec<Sample>, TelemetryError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => {
                return Err(TelemetryError::parse("object payload without a data array"));
            }
            Some(other) => {
                return Err(TelemetryError::parse(format!(
                    "data field is {}, expected an array",
                    json_kind(&other)
                )));
            }
        },
        other => {
            return Err(TelemetryError::parse(format!(
                "expected an array of samples, got {}",
                json_kind(&other)
            )));
        }
    };

    let total = items.len();
    let now = Utc::now();
    let samples: Vec<Sample> = items
        .iter()
        .filter_map(|item| sample_from_value(item, now))
        .collect();

    if samples.len() < total {
        tracing::warn!(
            "Skipped {} of {} samples without a usable timestamp",
            total - samples.len(),
            total
        );
    }

    Ok(samples)
}

/// Build one sample from a raw record; `None` when it has no usable timestamp.
///
/// When a record carries several names for one metric, the canonical name
/// (`heart_rate`, `heartRate`) wins; otherwise the alphabetically smallest
/// alias with a usable value does.
pub fn sample_from_value(value: &Value, now: DateTime<Utc>) -> Option<Sample> {
    let record = value.as_object()?;
    let timestamp = TIMESTAMP_FIELDS.iter().find_map(|field| {
        record
            .get(*field)
            .and_then(parse_timestamp)
            .filter(|ts| is_plausible(*ts, now))
    })?;

    let mut chosen: BTreeMap<Metric, (bool, &str, f64)> = BTreeMap::new();
    for (name, raw) in record {
        let Some(metric) = Metric::from_field_name(name) else {
            continue;
        };
        let Some(v) = metric_value(raw) else {
            continue;
        };
        let rank = (!is_canonical_name(name, metric), name.as_str());
        let outranked = chosen
            .get(&metric)
            .is_some_and(|(alias, held, _)| (*alias, *held) <= rank);
        if !outranked {
            chosen.insert(metric, (rank.0, rank.1, v));
        }
    }

    let mut sample = Sample::new(timestamp);
    for (metric, (_, _, v)) in chosen {
        sample.set(metric, v);
    }
    Some(sample)
}

fn is_canonical_name(name: &str, metric: Metric) -> bool {
    let fold = |s: &str| -> String {
        s.chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(|c| c.to_lowercase())
            .collect()
    };
    fold(name) == fold(metric.key())
}

/// Rejects instants before 2000 or ahead of `now` by more than the clock
/// skew, e.g. microseconds sent where milliseconds were expected
fn is_plausible(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let earliest = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).single();
    // device clocks may run a little ahead of ours
    let latest = now.checked_add_signed(TimeDelta::hours(1)).unwrap_or(now);
    earliest.is_some_and(|earliest| timestamp >= earliest) && timestamp <= latest
}

/// RFC 3339 strings, zone-less ISO strings (taken as UTC), or epoch milliseconds
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        _ => None,
    }
}

fn metric_value(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Deserialize)]
struct UserDevicesPayload {
    #[serde(default, rename = "activeDevice")]
    active_device: Option<Value>,
    #[serde(default)]
    devices: Option<Vec<DeviceEntry>>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    #[serde(default, rename = "_id")]
    id: Option<Value>,
    #[serde(default, rename = "deviceId")]
    device_id: Option<Value>,
}

/// Pick the active device from `GET /api/devices/user`.
///
/// `activeDevice` is either an embedded device object carrying `deviceId`,
/// or a `_id` reference into `devices`. Without either, the first listed
/// device is used.
pub fn parse_active_device(body: &[u8]) -> Result<DeviceId, TelemetryError> {
    let payload: UserDevicesPayload = serde_json::from_slice(body)?;
    let devices = payload.devices.unwrap_or_default();

    let active = match &payload.active_device {
        Some(Value::Object(map)) => map.get("deviceId").and_then(id_from_value),
        Some(Value::Null) | None => None,
        Some(reference) => {
            let reference = id_from_value(reference);
            devices
                .iter()
                .find(|d| d.id.as_ref().and_then(id_from_value) == reference)
                .and_then(|d| d.device_id.as_ref().and_then(id_from_value))
        }
    };

    active
        .or_else(|| {
            devices
                .first()
                .and_then(|d| d.device_id.as_ref().and_then(id_from_value))
        })
        .ok_or(TelemetryError::NoActiveDevice)
}

fn id_from_value(value: &Value) -> Option<DeviceId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(DeviceId::new(s.trim())),
        Value::Number(n) => Some(DeviceId::new(n.to_string())),
        _ => None,
    }
}
