// Repository trait for telemetry data access
use crate::application::error::TelemetryError;
use crate::domain::history::HistoryPeriod;
use crate::domain::sample::{DeviceId, Sample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Resolve which of the user's devices is currently the telemetry source
    async fn resolve_active_device(&self) -> TelemetryResult<DeviceId>;

    /// Fetch normalized samples for `[start, end]`; `start` must precede `end`
    async fn fetch_window(
        &self,
        device_id: &DeviceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TelemetryResult<Vec<Sample>>;

    /// Fetch aggregated history for one of the predefined periods
    async fn fetch_history(
        &self,
        device_id: &DeviceId,
        period: HistoryPeriod,
    ) -> TelemetryResult<Vec<Sample>>;
}

/// Shared precondition for `fetch_window` implementations
pub fn check_window(start: DateTime<Utc>, end: DateTime<Utc>) -> TelemetryResult<()> {
    if start < end {
        Ok(())
    } else {
        Err(TelemetryError::InvalidWindow { start, end })
    }
}
