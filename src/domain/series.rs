// Series domain model - capped, deduplicated, time-ordered sample history
use super::metric::Metric;
use super::sample::Sample;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// 24 hours at one-minute resolution
pub const DEFAULT_MAX_RETENTION: usize = 1440;

/// Samples strictly ascending by timestamp, no duplicate instants,
/// never longer than `max_retention`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    max_retention: usize,
    samples: Vec<Sample>,
}

impl Series {
    pub fn new(max_retention: usize) -> Self {
        Self {
            max_retention,
            samples: Vec::new(),
        }
    }

    /// Build a series from samples in any order, possibly with duplicates
    pub fn from_samples(max_retention: usize, samples: impl IntoIterator<Item = Sample>) -> Self {
        merge(&Series::new(max_retention), samples)
    }

    pub fn max_retention(&self) -> usize {
        self.max_retention
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// `(timestamp, value)` pairs for one metric, skipping samples where it is absent
    pub fn metric_points(&self, metric: Metric) -> Vec<(DateTime<Utc>, f64)> {
        self.samples
            .iter()
            .filter_map(|s| s.get(metric).map(|v| (s.timestamp, v)))
            .collect()
    }

    fn truncate_oldest(&mut self) {
        if self.samples.len() > self.max_retention {
            let excess = self.samples.len() - self.max_retention;
            self.samples.drain(..excess);
        }
    }
}

impl Default for Series {
    fn default() -> Self {
        Series::new(DEFAULT_MAX_RETENTION)
    }
}

/// Merge freshly fetched samples into a series.
///
/// A sample whose millisecond timestamp is already present replaces the
/// stored one (newer fetch wins, also within a single batch); others are
/// inserted in chronological position. Afterwards the oldest entries
/// beyond `max_retention` are dropped. The input series is left untouched.
pub fn merge(series: &Series, incoming: impl IntoIterator<Item = Sample>) -> Series {
    let mut merged = series.clone();

    for sample in incoming {
        let key = sample.time_ms();
        match merged.samples.binary_search_by_key(&key, Sample::time_ms) {
            Ok(idx) => merged.samples[idx] = sample,
            Err(idx) => merged.samples.insert(idx, sample),
        }
    }

    merged.truncate_oldest();
    merged
}

/// Visible time range of the live chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LiveWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

/// Derive the auto-scrolled window from the newest sample, or from `now`
/// when the series is empty. `end` sits `right_margin` past the anchor and
/// `start` a further `display + right_margin` before `end`.
///
/// If the newest sample is so far out that the window would leave chrono's
/// range, the window falls back to being anchored at `now`.
pub fn advance_live_window(
    series: &Series,
    display: Duration,
    right_margin: Duration,
    now: DateTime<Utc>,
) -> LiveWindow {
    let anchored = |anchor: DateTime<Utc>| {
        let end = anchor.checked_add_signed(right_margin)?;
        let start = end
            .checked_sub_signed(display)?
            .checked_sub_signed(right_margin)?;
        Some(LiveWindow { start, end })
    };

    series
        .last()
        .and_then(|newest| anchored(newest.timestamp))
        .or_else(|| anchored(now))
        .unwrap_or(LiveWindow { start: now, end: now })
}
