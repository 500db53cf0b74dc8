// Error taxonomy for talking to the telemetry API
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    #[error("network error: {0}")]
    Network(String),

    #[error("not authorized: session token missing, expired or rejected")]
    Auth,

    #[error("unexpected payload: {0}")]
    Parse(String),

    #[error("no active device for the current user")]
    NoActiveDevice,

    #[error("invalid time window: start {start} is not before end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl TelemetryError {
    pub fn network<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Network(msg.into())
    }

    pub fn parse<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Parse(msg.into())
    }

    /// Auth failures are handed up to the session layer; everything else
    /// is absorbed by the poller.
    pub fn is_auth(&self) -> bool {
        matches!(self, TelemetryError::Auth)
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        TelemetryError::Parse(err.to_string())
    }
}
