// Local JSON snapshot of the live series, used to hydrate after a restart
use crate::domain::sample::{DeviceId, Sample};
use crate::domain::series::Series;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub device_id: Option<DeviceId>,
    pub max_retention: usize,
    pub samples: Vec<Sample>,
}

impl Snapshot {
    pub fn capture(device_id: Option<DeviceId>, series: &Series) -> Self {
        Self {
            saved_at: Utc::now(),
            device_id,
            max_retention: series.max_retention(),
            samples: series.samples().to_vec(),
        }
    }

    /// Rebuild a series under the current retention. The file is not
    /// trusted to be sorted or deduplicated, so samples are re-merged.
    pub fn into_series(self, max_retention: usize) -> Series {
        Series::from_samples(max_retention, self.samples)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<Snapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        let snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt snapshot at {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    /// Write to a sibling temp file, then rename over the old snapshot
    pub async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let bytes = serde_json::to_vec(snapshot).context("Failed to serialize snapshot")?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to move snapshot into {}", self.path.display()))?;

        tracing::debug!("Saved {} samples to {}", snapshot.samples.len(), self.path.display());
        Ok(())
    }
}
