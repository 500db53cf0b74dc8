// Dashboard service - owns the live state and the poller lifecycle
use crate::application::live_state::{LiveState, PollerStatus};
use crate::application::poller::{PollMode, Poller, PollerHandle, PollerSettings, StateSender};
use crate::application::telemetry_repository::{TelemetryRepository, TelemetryResult};
use crate::domain::history::HistoryPeriod;
use crate::domain::metric::Metric;
use crate::domain::sample::{DeviceId, Sample};
use crate::domain::series::{LiveWindow, Series};
use crate::domain::stats::{MetricSummary, YAxisBounds};
use crate::infrastructure::snapshot_store::{Snapshot, SnapshotStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone, Serialize)]
pub struct MetricPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricView {
    pub metric: Metric,
    pub label: &'static str,
    pub unit: &'static str,
    pub points: Vec<MetricPoint>,
    pub summary: Option<MetricSummary>,
    pub bounds: YAxisBounds,
    pub window: Option<LiveWindow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub device_id: DeviceId,
    pub period: HistoryPeriod,
    pub samples: Vec<Sample>,
    pub summaries: BTreeMap<Metric, MetricSummary>,
}

pub struct DashboardService {
    repository: Arc<dyn TelemetryRepository>,
    settings: PollerSettings,
    state: StateSender,
    snapshots: Option<Arc<SnapshotStore>>,
    poller: Mutex<Option<PollerHandle>>,
}

impl DashboardService {
    pub fn new(
        repository: Arc<dyn TelemetryRepository>,
        settings: PollerSettings,
        auto_scroll: bool,
        snapshots: Option<Arc<SnapshotStore>>,
    ) -> Self {
        let series = Series::new(settings.max_retention);
        let (tx, _rx) = watch::channel(LiveState::new(series, auto_scroll));

        Self {
            repository,
            settings,
            state: Arc::new(tx),
            snapshots,
            poller: Mutex::new(None),
        }
    }

    /// Seed the series from the local snapshot, if one is configured and readable
    pub async fn hydrate(&self) {
        let Some(store) = &self.snapshots else {
            return;
        };

        match store.load().await {
            Ok(Some(snapshot)) => {
                let device_id = snapshot.device_id.clone();
                let series = snapshot.into_series(self.settings.max_retention);
                tracing::info!("Hydrated {} samples from {}", series.len(), store.path().display());
                let settings = &self.settings;
                self.state.send_modify(|state| {
                    state.hydrate(device_id, series);
                    if state.auto_scroll {
                        state.refresh_window(settings, Utc::now());
                    }
                });
            }
            Ok(None) => tracing::debug!("No snapshot at {}", store.path().display()),
            Err(e) => tracing::warn!("Ignoring unreadable snapshot: {:#}", e),
        }
    }

    /// Start polling in `mode`. A poller already running in another mode is
    /// torn down completely first; the same mode is a no-op.
    pub async fn start(&self, mode: PollMode) {
        let mut current = self.poller.lock().await;

        if let Some(handle) = current.as_ref() {
            if handle.mode() == mode && !handle.is_finished() {
                return;
            }
        }

        if let Some(handle) = current.take() {
            tracing::info!(
                "Switching poller generation {} from {:?} to {:?}",
                handle.generation(),
                handle.mode(),
                mode
            );
            handle.stop().await;
        }

        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.status = PollerStatus::Running;
            state.mode = mode;
            generation = state.generation;
        });

        let handle = Poller::new(
            self.repository.clone(),
            self.settings.clone(),
            mode,
            self.state.clone(),
            generation,
        )
        .with_snapshots(self.snapshots.clone())
        .start();

        *current = Some(handle);
    }

    pub async fn stop(&self) {
        let mut current = self.poller.lock().await;
        let Some(handle) = current.take() else {
            return;
        };

        handle.stop().await;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.status = PollerStatus::Stopped;
        });
    }

    pub async fn current_mode(&self) -> Option<PollMode> {
        self.poller.lock().await.as_ref().map(|h| h.mode())
    }

    pub fn set_auto_scroll(&self, enabled: bool) {
        let settings = &self.settings;
        self.state.send_modify(|state| {
            state.auto_scroll = enabled;
            if enabled {
                state.refresh_window(settings, Utc::now());
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> LiveState {
        self.state.borrow().clone()
    }

    /// Current window, derived on the fly when none has been pushed yet
    pub fn live_window(&self) -> LiveWindow {
        let state = self.state.borrow();
        match state.window {
            Some(window) => window,
            None => crate::domain::series::advance_live_window(
                &state.series,
                self.settings.display_window,
                self.settings.right_margin,
                Utc::now(),
            ),
        }
    }

    pub fn metric_view(&self, metric: Metric) -> MetricView {
        let state = self.state.borrow();
        let points: Vec<MetricPoint> = state
            .series
            .metric_points(metric)
            .into_iter()
            .map(|(time, value)| MetricPoint { time, value })
            .collect();
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();

        MetricView {
            metric,
            label: metric.label(),
            unit: metric.unit(),
            summary: MetricSummary::from_values(&values),
            bounds: YAxisBounds::for_values(&values),
            points,
            window: state.window,
        }
    }

    pub async fn history(&self, period: HistoryPeriod) -> TelemetryResult<HistoryView> {
        let device_id = self.repository.resolve_active_device().await?;
        let mut samples = self.repository.fetch_history(&device_id, period).await?;
        samples.sort_by_key(Sample::time_ms);

        let summaries = Metric::ALL
            .iter()
            .filter_map(|metric| {
                let values: Vec<f64> = samples.iter().filter_map(|s| s.get(*metric)).collect();
                MetricSummary::from_values(&values).map(|summary| (*metric, summary))
            })
            .collect();

        Ok(HistoryView {
            device_id,
            period,
            samples,
            summaries,
        })
    }

    pub async fn persist_snapshot(&self) -> anyhow::Result<()> {
        let Some(store) = &self.snapshots else {
            return Ok(());
        };

        let snapshot = {
            let state = self.state.borrow();
            Snapshot::capture(state.device_id.clone(), &state.series)
        };
        store.save(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::TelemetryError;
    use crate::application::poller::tests::{at, fast_settings, held_batch, hr, FakeRepository};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn service(repo: FakeRepository) -> DashboardService {
        DashboardService::new(Arc::new(repo), fast_settings(), true, None)
    }

    #[tokio::test]
    async fn test_start_and_stop_transitions() {
        let service = service(FakeRepository::new(vec![Ok(vec![hr(0, 60.0)])]));
        assert_eq!(service.snapshot().status, PollerStatus::Stopped);

        service.start(PollMode::Normal).await;
        assert_eq!(service.snapshot().status, PollerStatus::Running);
        assert_eq!(service.current_mode().await, Some(PollMode::Normal));

        let mut rx = service.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| !s.series.is_empty()))
            .await
            .unwrap()
            .unwrap();

        service.stop().await;
        let state = service.snapshot();
        assert_eq!(state.status, PollerStatus::Stopped);
        assert_eq!(service.current_mode().await, None);
        // last known good data survives a stop
        assert!(!state.series.is_empty());
    }

    #[tokio::test]
    async fn test_mode_switch_bumps_generation() {
        let service = service(FakeRepository::new(vec![]));

        service.start(PollMode::Normal).await;
        let first = service.snapshot().generation;

        service.start(PollMode::Normal).await;
        assert_eq!(service.snapshot().generation, first);

        service.start(PollMode::LowLatency).await;
        let state = service.snapshot();
        assert_eq!(state.generation, first + 1);
        assert_eq!(state.mode, PollMode::LowLatency);

        service.stop().await;
        assert_eq!(service.snapshot().generation, first + 2);
    }

    #[tokio::test]
    async fn test_mode_switch_discards_in_flight_fetch() {
        let repo = Arc::new(FakeRepository::new(vec![]).holding());
        let service = DashboardService::new(repo.clone(), fast_settings(), true, None);

        service.start(PollMode::Normal).await;
        tokio::time::timeout(Duration::from_secs(5), repo.entered.notified())
            .await
            .expect("normal poller never fetched");

        repo.hold.store(false, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(1), service.start(PollMode::LowLatency))
            .await
            .expect("switch waited on the in-flight fetch");
        // a late answer to the old fetch has nowhere to land
        repo.release.notify_waiters();

        let mut rx = service.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.series.len() >= 2))
            .await
            .unwrap()
            .unwrap();

        let held = held_batch()[0].get(Metric::HeartRate);
        let state = service.snapshot();
        assert_eq!(state.mode, PollMode::LowLatency);
        assert!(state.series.samples().iter().all(|s| s.get(Metric::HeartRate) != held));

        tokio::time::timeout(Duration::from_secs(1), service.stop())
            .await
            .expect("stop did not return promptly");
        assert_eq!(service.snapshot().status, PollerStatus::Stopped);
    }

    #[tokio::test]
    async fn test_auto_scroll_toggle() {
        let service = service(FakeRepository::new(vec![]));
        service.set_auto_scroll(false);
        assert!(!service.snapshot().auto_scroll);

        service.set_auto_scroll(true);
        let state = service.snapshot();
        assert!(state.auto_scroll);
        assert!(state.window.is_some());
    }

    #[tokio::test]
    async fn test_metric_view_over_live_series() {
        let service = service(FakeRepository::new(vec![]));
        service.state.send_modify(|state| {
            state.series = Series::from_samples(100, vec![hr(0, 60.0), hr(1, 70.0)]);
        });

        let view = service.metric_view(Metric::HeartRate);
        assert_eq!(view.points.len(), 2);
        assert_eq!(view.unit, "bpm");
        assert_eq!(view.summary.map(|s| s.max), Some(70.0));
        assert_eq!(view.bounds, YAxisBounds { min: 50.0, max: 80.0 });

        let empty = service.metric_view(Metric::Tvoc);
        assert!(empty.points.is_empty());
        assert!(empty.summary.is_none());
    }

    #[tokio::test]
    async fn test_history_sorted_with_summaries() {
        let repo = FakeRepository::new(vec![]);
        *repo.history.lock().unwrap() = Ok(vec![hr(5, 65.0), hr(1, 61.0), hr(3, 63.0)]);
        let service = service(repo);

        let view = service.history(HistoryPeriod::Week).await.unwrap();
        let times: Vec<_> = view.samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(times, vec![at(1), at(3), at(5)]);
        assert_eq!(view.summaries[&Metric::HeartRate].min, 61.0);
        assert!(!view.summaries.contains_key(&Metric::Humidity));
    }

    #[tokio::test]
    async fn test_history_without_device() {
        let service = service(FakeRepository::new(vec![]).with_device(Err(TelemetryError::NoActiveDevice)));
        let err = service.history(HistoryPeriod::Day).await.unwrap_err();
        assert_eq!(err, TelemetryError::NoActiveDevice);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SnapshotStore::new(dir.path().join("series.json")));

        let writer = DashboardService::new(
            Arc::new(FakeRepository::new(vec![])),
            fast_settings(),
            true,
            Some(store.clone()),
        );
        writer.state.send_modify(|state| {
            state.device_id = Some(DeviceId::new("2"));
            state.series = Series::from_samples(100, vec![hr(0, 60.0), hr(1, 64.0)]);
        });
        writer.persist_snapshot().await.unwrap();

        let reader = DashboardService::new(
            Arc::new(FakeRepository::new(vec![])),
            fast_settings(),
            true,
            Some(store),
        );
        reader.hydrate().await;
        let state = reader.snapshot();
        assert_eq!(state.series.len(), 2);
        assert_eq!(state.device_id, Some(DeviceId::new("2")));
        assert_eq!(state.latest.get(Metric::HeartRate), Some(64.0));
        assert!(state.window.is_some());
    }
}
