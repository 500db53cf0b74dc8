// Latest readings - tile values shown above the live charts
use super::metric::Metric;
use super::sample::Sample;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatestReadings {
    pub as_of: Option<DateTime<Utc>>,
    pub values: BTreeMap<Metric, f64>,
}

impl LatestReadings {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    /// Apply the newest sample of a batch. Metrics it reports overwrite
    /// the tiles; metrics it lacks keep their previous value. A batch
    /// older than what is already shown is ignored.
    pub fn update(&mut self, batch: &[Sample]) {
        let Some(newest) = batch.iter().max_by_key(|s| s.time_ms()) else {
            return;
        };

        if let Some(as_of) = self.as_of {
            if newest.timestamp < as_of {
                return;
            }
        }

        for (metric, value) in &newest.fields {
            self.values.insert(*metric, *value);
        }
        self.as_of = Some(newest.timestamp);
    }
}
