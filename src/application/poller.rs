// Telemetry poller - keeps the live series current by polling the API
use crate::application::error::TelemetryError;
use crate::application::live_state::LiveState;
use crate::application::telemetry_repository::{TelemetryRepository, TelemetryResult};
use crate::domain::sample::{DeviceId, Sample};
use crate::infrastructure::snapshot_store::{Snapshot, SnapshotStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub type StateSender = Arc<watch::Sender<LiveState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollMode {
    /// Slow cadence with a wide trailing window
    Normal,
    /// The same request/response polling, just faster and with a narrower
    /// window. Nothing is pushed by the server in this mode.
    LowLatency,
}

/// How often to poll and how far back each poll reaches. The trailing
/// window must comfortably exceed the interval so consecutive polls overlap.
#[derive(Debug, Clone)]
pub struct PollCadence {
    pub interval: Duration,
    pub trailing_window: chrono::Duration,
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub normal: PollCadence,
    pub low_latency: PollCadence,
    pub initial_window: chrono::Duration,
    pub display_window: chrono::Duration,
    pub right_margin: chrono::Duration,
    pub max_retention: usize,
    pub snapshot_every_ticks: u32,
}

impl PollerSettings {
    pub fn cadence(&self, mode: PollMode) -> &PollCadence {
        match mode {
            PollMode::Normal => &self.normal,
            PollMode::LowLatency => &self.low_latency,
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            normal: PollCadence {
                interval: Duration::from_secs(6),
                trailing_window: chrono::Duration::minutes(5),
            },
            low_latency: PollCadence {
                interval: Duration::from_secs(1),
                trailing_window: chrono::Duration::minutes(1),
            },
            initial_window: chrono::Duration::hours(24),
            display_window: chrono::Duration::minutes(30),
            right_margin: chrono::Duration::minutes(2),
            max_retention: 1440,
            snapshot_every_ticks: 10,
        }
    }
}

pub struct Poller {
    repository: Arc<dyn TelemetryRepository>,
    settings: PollerSettings,
    mode: PollMode,
    state: StateSender,
    generation: u64,
    snapshots: Option<Arc<SnapshotStore>>,
}

impl Poller {
    pub fn new(
        repository: Arc<dyn TelemetryRepository>,
        settings: PollerSettings,
        mode: PollMode,
        state: StateSender,
        generation: u64,
    ) -> Self {
        Self {
            repository,
            settings,
            mode,
            state,
            generation,
            snapshots: None,
        }
    }

    pub fn with_snapshots(mut self, store: Option<Arc<SnapshotStore>>) -> Self {
        self.snapshots = store;
        self
    }

    /// Spawn the polling task. The returned handle owns it.
    pub fn start(self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let generation = self.generation;
        let mode = self.mode;
        let task = tokio::spawn(self.run(shutdown_rx));

        PollerHandle {
            generation,
            mode,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let cadence = self.settings.cadence(self.mode).clone();
        info!(
            "Starting {:?} poller (generation {}) every {:?}, trailing window {}s",
            self.mode,
            self.generation,
            cadence.interval,
            cadence.trailing_window.num_seconds()
        );

        tokio::select! {
            _ = &mut shutdown => {
                info!("Poller generation {} stopped during backfill", self.generation);
                return;
            }
            _ = self.backfill() => {}
        }

        let mut interval = time::interval_at(Instant::now() + cadence.interval, cadence.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: u32 = 0;

        loop {
            // A tick runs to completion (or is cancelled) before the next one
            // is awaited, so fetches never overlap.
            tokio::select! {
                _ = &mut shutdown => break,
                committed = async {
                    interval.tick().await;
                    self.tick(&cadence).await
                } => {
                    if committed {
                        ticks = ticks.wrapping_add(1);
                        if self.settings.snapshot_every_ticks > 0
                            && ticks % self.settings.snapshot_every_ticks == 0
                        {
                            self.save_snapshot().await;
                        }
                    }
                }
            }
        }

        info!("Poller generation {} stopped", self.generation);
    }

    /// Load the longer initial window once so the chart is not empty
    async fn backfill(&self) {
        let end = Utc::now();
        let start = end - self.settings.initial_window;

        let result = async {
            let device_id = self.repository.resolve_active_device().await?;
            let batch = self.repository.fetch_window(&device_id, start, end).await?;
            Ok::<_, TelemetryError>((device_id, batch))
        }
        .await;

        match result {
            Ok((device_id, batch)) => {
                info!("Loaded {} historical samples for device {}", batch.len(), device_id);
                self.commit(device_id, batch);
            }
            Err(e) => {
                warn!("Initial backfill failed: {}", e);
                self.record_failure(&e);
            }
        }
    }

    /// One poll cycle. Returns whether a batch was committed.
    async fn tick(&self, cadence: &PollCadence) -> bool {
        match self.poll_once(cadence).await {
            Ok((device_id, batch)) => {
                debug!("Polled {} samples for device {}", batch.len(), device_id);
                self.commit(device_id, batch)
            }
            Err(e) => {
                match &e {
                    TelemetryError::Auth => error!("Polling rejected, re-authentication required"),
                    TelemetryError::NoActiveDevice => warn!("No active device, skipping poll"),
                    other => warn!("Poll failed, skipping cycle: {}", other),
                }
                self.record_failure(&e);
                false
            }
        }
    }

    async fn poll_once(&self, cadence: &PollCadence) -> TelemetryResult<(DeviceId, Vec<Sample>)> {
        let device_id = self.repository.resolve_active_device().await?;
        let end = Utc::now();
        let start = end - cadence.trailing_window;
        let batch = self.repository.fetch_window(&device_id, start, end).await?;
        Ok((device_id, batch))
    }

    fn commit(&self, device_id: DeviceId, batch: Vec<Sample>) -> bool {
        let generation = self.generation;
        let settings = &self.settings;

        let committed = self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.apply_batch(device_id, batch, settings, Utc::now());
            true
        });

        if !committed {
            debug!("Dropping stale batch from poller generation {}", generation);
        }
        committed
    }

    fn record_failure(&self, err: &TelemetryError) {
        let generation = self.generation;
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.record_failure(err);
            true
        });
    }

    async fn save_snapshot(&self) {
        let Some(store) = &self.snapshots else {
            return;
        };

        let snapshot = {
            let state = self.state.borrow();
            Snapshot::capture(state.device_id.clone(), &state.series)
        };

        if let Err(e) = store.save(&snapshot).await {
            warn!("Failed to write series snapshot: {:#}", e);
        }
    }
}

/// Owned handle to a running poller. `stop` tears it down; dropping the
/// handle without stopping aborts the task.
pub struct PollerHandle {
    generation: u64,
    mode: PollMode,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }

    /// Signal shutdown and wait for the task; an in-flight fetch is dropped
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("Poller generation {} panicked: {}", self.generation, e);
                }
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
