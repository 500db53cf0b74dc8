// Sample domain model - one timestamped telemetry reading
use super::metric::Metric;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Device identifier as used in the telemetry API paths
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub fields: BTreeMap<Metric, f64>,
}

impl Sample {
    /// The timestamp is truncated to whole milliseconds; two samples are
    /// the same reading exactly when their millisecond instants match.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: truncate_to_millis(timestamp),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.set(metric, value);
        self
    }

    /// Non-finite values are dropped, leaving the metric absent.
    pub fn set(&mut self, metric: Metric, value: f64) {
        if value.is_finite() {
            self.fields.insert(metric, value);
        } else {
            self.fields.remove(&metric);
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.fields.get(&metric).copied()
    }

    pub fn time_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub fn truncate_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp)
}
