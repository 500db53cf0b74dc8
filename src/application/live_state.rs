// Live dashboard state published to readers through a watch channel
use crate::application::error::TelemetryError;
use crate::application::poller::{PollMode, PollerSettings};
use crate::domain::readings::LatestReadings;
use crate::domain::sample::{DeviceId, Sample};
use crate::domain::series::{advance_live_window, merge, LiveWindow, Series};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerStatus {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveState {
    /// Bumped on every start/stop; commits carrying an older value are dropped
    pub generation: u64,
    pub status: PollerStatus,
    pub mode: PollMode,
    pub auto_scroll: bool,
    pub device_id: Option<DeviceId>,
    pub series: Series,
    pub window: Option<LiveWindow>,
    pub latest: LatestReadings,
    /// Set when the API rejected the session token; cleared by the next success
    pub auth_required: bool,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

impl LiveState {
    pub fn new(series: Series, auto_scroll: bool) -> Self {
        Self {
            generation: 0,
            status: PollerStatus::Stopped,
            mode: PollMode::Normal,
            auto_scroll,
            device_id: None,
            series,
            window: None,
            latest: LatestReadings::default(),
            auth_required: false,
            last_error: None,
            last_success: None,
        }
    }

    /// Seed from a locally cached series, e.g. after a restart
    pub fn hydrate(&mut self, device_id: Option<DeviceId>, series: Series) {
        if let Some(newest) = series.last() {
            self.latest.update(std::slice::from_ref(newest));
        }
        self.device_id = device_id;
        self.series = series;
    }

    pub fn apply_batch(
        &mut self,
        device_id: DeviceId,
        batch: Vec<Sample>,
        settings: &PollerSettings,
        now: DateTime<Utc>,
    ) {
        if let Some(previous) = &self.device_id {
            if *previous != device_id {
                tracing::info!(
                    "Active device changed from {} to {}, resetting live series",
                    previous,
                    device_id
                );
                self.series = Series::new(self.series.max_retention());
                self.latest = LatestReadings::default();
            }
        }
        self.device_id = Some(device_id);

        self.latest.update(&batch);
        self.series = merge(&self.series, batch);

        if self.auto_scroll {
            self.refresh_window(settings, now);
        }

        self.auth_required = false;
        self.last_error = None;
        self.last_success = Some(now);
    }

    pub fn record_failure(&mut self, err: &TelemetryError) {
        if err.is_auth() {
            self.auth_required = true;
        }
        self.last_error = Some(err.to_string());
    }

    pub fn refresh_window(&mut self, settings: &PollerSettings, now: DateTime<Utc>) {
        self.window = Some(advance_live_window(
            &self.series,
            settings.display_window,
            settings.right_margin,
            now,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::Metric;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 12, 9, minute, 0).unwrap()
    }

    fn sample(minute: u32, hr: f64) -> Sample {
        Sample::new(at(minute)).with(Metric::HeartRate, hr)
    }

    #[test]
    fn test_apply_batch_merges_and_scrolls() {
        let settings = PollerSettings::default();
        let mut state = LiveState::new(Series::new(100), true);
        state.apply_batch(DeviceId::new("2"), vec![sample(1, 60.0), sample(2, 61.0)], &settings, at(3));

        assert_eq!(state.series.len(), 2);
        assert_eq!(state.latest.get(Metric::HeartRate), Some(61.0));
        let window = state.window.unwrap();
        assert_eq!(window.end, at(2) + settings.right_margin);
        assert_eq!(state.last_success, Some(at(3)));
    }

    #[test]
    fn test_window_frozen_without_auto_scroll() {
        let settings = PollerSettings::default();
        let mut state = LiveState::new(Series::new(100), false);
        state.apply_batch(DeviceId::new("2"), vec![sample(1, 60.0)], &settings, at(3));
        assert!(state.window.is_none());
    }

    #[test]
    fn test_device_change_resets_series() {
        let settings = PollerSettings::default();
        let mut state = LiveState::new(Series::new(100), true);
        state.apply_batch(DeviceId::new("2"), vec![sample(1, 60.0)], &settings, at(3));
        state.apply_batch(DeviceId::new("7"), vec![sample(4, 80.0)], &settings, at(5));

        assert_eq!(state.series.samples(), &[sample(4, 80.0)]);
        assert_eq!(state.device_id, Some(DeviceId::new("7")));
    }

    #[test]
    fn test_auth_failure_flag_cleared_by_success() {
        let settings = PollerSettings::default();
        let mut state = LiveState::new(Series::new(100), true);
        state.record_failure(&TelemetryError::Auth);
        assert!(state.auth_required);
        assert!(state.last_error.is_some());

        state.apply_batch(DeviceId::new("2"), vec![], &settings, at(0));
        assert!(!state.auth_required);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_network_failure_keeps_last_known_good_series() {
        let settings = PollerSettings::default();
        let mut state = LiveState::new(Series::new(100), true);
        state.apply_batch(DeviceId::new("2"), vec![sample(1, 60.0)], &settings, at(1));
        state.record_failure(&TelemetryError::network("connection reset"));

        assert!(!state.auth_required);
        assert_eq!(state.series.len(), 1);
    }

    #[test]
    fn test_sample_at_end_of_time_does_not_break_scrolling() {
        let settings = PollerSettings::default();
        let mut state = LiveState::new(Series::new(100), true);
        let edge = Sample::new(DateTime::<Utc>::MAX_UTC).with(Metric::HeartRate, 60.0);
        state.apply_batch(DeviceId::new("2"), vec![edge], &settings, at(10));

        let window = state.window.unwrap();
        assert_eq!(window.end, at(10) + settings.right_margin);
        assert!(window.contains(at(10)));
    }

    #[test]
    fn test_hydrate_seeds_latest_from_newest_sample() {
        let mut state = LiveState::new(Series::new(100), true);
        let series = Series::from_samples(100, vec![sample(1, 60.0), sample(2, 64.0)]);
        state.hydrate(Some(DeviceId::new("2")), series);

        assert_eq!(state.latest.get(Metric::HeartRate), Some(64.0));
        assert_eq!(state.latest.as_of, Some(at(2)));
        assert_eq!(state.series.len(), 2);
    }
}
