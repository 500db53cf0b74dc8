// Metric domain model - canonical set of telemetry channels
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    HeartRate,
    RespirationRate,
    Temperature,
    Humidity,
    Iaq,
    Eco2,
    Tvoc,
    Etoh,
    Hrv,
    Stress,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::HeartRate,
        Metric::RespirationRate,
        Metric::Temperature,
        Metric::Humidity,
        Metric::Iaq,
        Metric::Eco2,
        Metric::Tvoc,
        Metric::Etoh,
        Metric::Hrv,
        Metric::Stress,
    ];

    /// Canonical name used by this service's own API
    pub fn key(&self) -> &'static str {
        match self {
            Metric::HeartRate => "heart_rate",
            Metric::RespirationRate => "respiration_rate",
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Iaq => "iaq",
            Metric::Eco2 => "eco2",
            Metric::Tvoc => "tvoc",
            Metric::Etoh => "etoh",
            Metric::Hrv => "hrv",
            Metric::Stress => "stress",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::HeartRate => "Heart Rate",
            Metric::RespirationRate => "Respiration Rate",
            Metric::Temperature => "Temperature",
            Metric::Humidity => "Humidity",
            Metric::Iaq => "IAQ",
            Metric::Eco2 => "eCO2",
            Metric::Tvoc => "TVOC",
            Metric::Etoh => "EtOH",
            Metric::Hrv => "HRV",
            Metric::Stress => "Stress",
        }
    }

    /// Display unit; indices (IAQ, stress) are unitless
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::HeartRate => "bpm",
            Metric::RespirationRate => "rpm",
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
            Metric::Iaq => "",
            Metric::Eco2 => "ppm",
            Metric::Tvoc => "ppb",
            Metric::Etoh => "ppb",
            Metric::Hrv => "ms",
            Metric::Stress => "",
        }
    }

    /// Map a raw payload field name onto the canonical metric.
    ///
    /// Devices and API revisions disagree on naming (`hr`, `heartRate`,
    /// `heart_rate`, ...). Matching ignores case, `_` and `-`.
    pub fn from_field_name(name: &str) -> Option<Metric> {
        let folded: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(|c| c.to_lowercase())
            .collect();

        let metric = match folded.as_str() {
            "hr" | "heartrate" => Metric::HeartRate,
            "resp" | "respiration" | "respiratoryrate" | "respirationrate" | "rr" => {
                Metric::RespirationRate
            }
            "temp" | "temperature" => Metric::Temperature,
            "humidity" | "hum" => Metric::Humidity,
            "iaq" | "airquality" => Metric::Iaq,
            "eco2" | "co2" => Metric::Eco2,
            "tvoc" => Metric::Tvoc,
            "etoh" | "ethanol" => Metric::Etoh,
            "hrv" | "heartratevariability" => Metric::Hrv,
            "stress" | "stressindex" => Metric::Stress,
            _ => return None,
        };

        Some(metric)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::from_field_name(s).ok_or_else(|| format!("unknown metric: {}", s))
    }
}
