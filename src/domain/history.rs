// History periods offered by the telemetry API
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistoryPeriod {
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "48h")]
    TwoDays,
    #[serde(rename = "72h")]
    ThreeDays,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl HistoryPeriod {
    pub fn token(&self) -> &'static str {
        match self {
            HistoryPeriod::Day => "24h",
            HistoryPeriod::TwoDays => "48h",
            HistoryPeriod::ThreeDays => "72h",
            HistoryPeriod::Week => "7d",
            HistoryPeriod::Month => "30d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            HistoryPeriod::Day => Duration::hours(24),
            HistoryPeriod::TwoDays => Duration::hours(48),
            HistoryPeriod::ThreeDays => Duration::hours(72),
            HistoryPeriod::Week => Duration::days(7),
            HistoryPeriod::Month => Duration::days(30),
        }
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for HistoryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "24h" | "1d" => Ok(HistoryPeriod::Day),
            "48h" | "2d" => Ok(HistoryPeriod::TwoDays),
            "72h" | "3d" => Ok(HistoryPeriod::ThreeDays),
            "7d" => Ok(HistoryPeriod::Week),
            "30d" => Ok(HistoryPeriod::Month),
            other => Err(format!("unsupported history period: {}", other)),
        }
    }
}
