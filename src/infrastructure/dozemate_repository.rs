// Dozemate REST API repository implementation
use crate::application::error::TelemetryError;
use crate::application::telemetry_repository::{check_window, TelemetryRepository, TelemetryResult};
use crate::domain::history::HistoryPeriod;
use crate::domain::sample::{DeviceId, Sample};
use crate::infrastructure::payload::{parse_active_device, parse_history, parse_samples};
use crate::infrastructure::session::SessionTokenSource;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DozemateRepository {
    base_url: String,
    session: SessionTokenSource,
    client: reqwest::Client,
}

impl DozemateRepository {
    pub fn new(base_url: String, session: SessionTokenSource, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            client,
        })
    }

    fn devices_url(&self) -> String {
        format!("{}/api/devices/user", self.base_url)
    }

    fn health_url(&self, device_id: &DeviceId, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        format!(
            "{}/api/data/health/{}?start={}&end={}",
            self.base_url,
            urlencoding::encode(device_id.as_str()),
            urlencoding::encode(&iso8601(start)),
            urlencoding::encode(&iso8601(end)),
        )
    }

    fn history_url(&self, device_id: &DeviceId, period: HistoryPeriod) -> String {
        format!(
            "{}/api/data/history/{}?period={}",
            self.base_url,
            urlencoding::encode(device_id.as_str()),
            period.token(),
        )
    }

    async fn get_bytes(&self, url: &str) -> TelemetryResult<Bytes> {
        let token = self.session.token().await?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| TelemetryError::network(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TelemetryError::Auth);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelemetryError::network(format!(
                "{} returned {}: {}",
                url,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| TelemetryError::network(format!("reading body from {} failed: {}", url, e)))
    }
}

/// `2025-07-12T19:00:52.173Z`
fn iso8601(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl TelemetryRepository for DozemateRepository {
    async fn resolve_active_device(&self) -> TelemetryResult<DeviceId> {
        let body = self.get_bytes(&self.devices_url()).await?;
        let device_id = parse_active_device(&body)?;
        tracing::debug!("Active device resolved to {}", device_id);
        Ok(device_id)
    }

    async fn fetch_window(
        &self,
        device_id: &DeviceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TelemetryResult<Vec<Sample>> {
        check_window(start, end)?;
        let body = self.get_bytes(&self.health_url(device_id, start, end)).await?;
        parse_samples(&body)
    }

    async fn fetch_history(
        &self,
        device_id: &DeviceId,
        period: HistoryPeriod,
    ) -> TelemetryResult<Vec<Sample>> {
        let body = self.get_bytes(&self.history_url(device_id, period)).await?;
        parse_history(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn repository() -> DozemateRepository {
        DozemateRepository::new(
            "https://admin.dozemate.com/".to_string(),
            SessionTokenSource::Static("t".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_health_url() {
        let start = Utc.with_ymd_and_hms(2025, 7, 12, 18, 55, 52).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 7, 12, 19, 0, 52).unwrap();
        let url = repository().health_url(&DeviceId::new("2"), start, end);
        assert_eq!(
            url,
            "https://admin.dozemate.com/api/data/health/2?start=2025-07-12T18%3A55%3A52.000Z&end=2025-07-12T19%3A00%3A52.000Z"
        );
    }

    #[test]
    fn test_history_and_devices_urls() {
        let repo = repository();
        assert_eq!(repo.devices_url(), "https://admin.dozemate.com/api/devices/user");
        assert_eq!(
            repo.history_url(&DeviceId::new("2"), HistoryPeriod::Week),
            "https://admin.dozemate.com/api/data/history/2?period=7d"
        );
    }

    #[tokio::test]
    async fn test_inverted_window_rejected_before_any_request() {
        let repo = DozemateRepository::new(
            "http://127.0.0.1:9".to_string(),
            SessionTokenSource::Missing,
            Duration::from_secs(1),
        )
        .unwrap();
        let t = Utc.with_ymd_and_hms(2025, 7, 12, 19, 0, 0).unwrap();

        let err = repo.fetch_window(&DeviceId::new("2"), t, t).await.unwrap_err();
        assert_eq!(err, TelemetryError::InvalidWindow { start: t, end: t });
    }

    #[tokio::test]
    async fn test_missing_token_is_auth_error() {
        let repo = DozemateRepository::new(
            "http://127.0.0.1:9".to_string(),
            SessionTokenSource::Missing,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(repo.resolve_active_device().await, Err(TelemetryError::Auth));
    }
}
