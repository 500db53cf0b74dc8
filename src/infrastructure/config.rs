use crate::application::poller::{PollCadence, PollMode, PollerSettings};
use anyhow::Context;
use chrono::TimeDelta;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub snapshot: SnapshotSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionSettings {
    pub token: Option<String>,
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingSettings {
    #[serde(default = "default_mode")]
    pub mode: PollMode,
    #[serde(default = "default_normal_interval_secs")]
    pub normal_interval_secs: u64,
    #[serde(default = "default_normal_window_minutes")]
    pub normal_window_minutes: i64,
    #[serde(default = "default_low_latency_interval_secs")]
    pub low_latency_interval_secs: u64,
    #[serde(default = "default_low_latency_window_minutes")]
    pub low_latency_window_minutes: i64,
    #[serde(default = "default_initial_window_hours")]
    pub initial_window_hours: i64,
    #[serde(default = "default_true")]
    pub auto_scroll: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplaySettings {
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    #[serde(default = "default_right_margin_minutes")]
    pub right_margin_minutes: i64,
    #[serde(default = "default_max_retention")]
    pub max_retention: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotSettings {
    pub path: Option<PathBuf>,
    #[serde(default = "default_save_every_ticks")]
    pub save_every_ticks: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_base_url() -> String {
    "https://admin.dozemate.com".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_mode() -> PollMode {
    PollMode::Normal
}
fn default_normal_interval_secs() -> u64 {
    6
}
fn default_normal_window_minutes() -> i64 {
    5
}
fn default_low_latency_interval_secs() -> u64 {
    1
}
fn default_low_latency_window_minutes() -> i64 {
    1
}
fn default_initial_window_hours() -> i64 {
    24
}
fn default_true() -> bool {
    true
}
fn default_window_minutes() -> i64 {
    30
}
fn default_right_margin_minutes() -> i64 {
    2
}
fn default_max_retention() -> usize {
    1440
}
fn default_save_every_ticks() -> u32 {
    10
}
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_level() -> String {
    "info".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            normal_interval_secs: default_normal_interval_secs(),
            normal_window_minutes: default_normal_window_minutes(),
            low_latency_interval_secs: default_low_latency_interval_secs(),
            low_latency_window_minutes: default_low_latency_window_minutes(),
            initial_window_hours: default_initial_window_hours(),
            auto_scroll: true,
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            right_margin_minutes: default_right_margin_minutes(),
            max_retention: default_max_retention(),
        }
    }
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            path: None,
            save_every_ticks: default_save_every_ticks(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

const MAX_INTERVAL_SECS: u64 = 60 * 60;
const MAX_WINDOW_MINUTES: i64 = 7 * 24 * 60;
const MAX_INITIAL_WINDOW_HOURS: i64 = 30 * 24;
const MAX_RETENTION: usize = 1_000_000;

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let p = &self.polling;
        if p.normal_interval_secs == 0 || p.low_latency_interval_secs == 0 {
            anyhow::bail!("polling intervals must be at least one second");
        }
        if p.normal_interval_secs > MAX_INTERVAL_SECS || p.low_latency_interval_secs > MAX_INTERVAL_SECS {
            anyhow::bail!("polling intervals must not exceed {} seconds", MAX_INTERVAL_SECS);
        }
        check_range("polling.normal_window_minutes", p.normal_window_minutes, 1, MAX_WINDOW_MINUTES)?;
        check_range(
            "polling.low_latency_window_minutes",
            p.low_latency_window_minutes,
            1,
            MAX_WINDOW_MINUTES,
        )?;
        check_range(
            "polling.initial_window_hours",
            p.initial_window_hours,
            1,
            MAX_INITIAL_WINDOW_HOURS,
        )?;
        check_range("display.window_minutes", self.display.window_minutes, 1, MAX_WINDOW_MINUTES)?;
        check_range(
            "display.right_margin_minutes",
            self.display.right_margin_minutes,
            0,
            MAX_WINDOW_MINUTES,
        )?;
        if self.display.max_retention == 0 || self.display.max_retention > MAX_RETENTION {
            anyhow::bail!("display.max_retention must be between 1 and {}", MAX_RETENTION);
        }

        let overlaps = p
            .normal_window_minutes
            .checked_mul(60)
            .is_some_and(|secs| secs > p.normal_interval_secs as i64);
        if !overlaps {
            tracing::warn!("Normal polling window does not overlap consecutive polls; samples may be missed");
        }
        Ok(())
    }

    pub fn poller_settings(&self) -> anyhow::Result<PollerSettings> {
        let p = &self.polling;
        Ok(PollerSettings {
            normal: PollCadence {
                interval: Duration::from_secs(p.normal_interval_secs),
                trailing_window: minutes("polling.normal_window_minutes", p.normal_window_minutes)?,
            },
            low_latency: PollCadence {
                interval: Duration::from_secs(p.low_latency_interval_secs),
                trailing_window: minutes(
                    "polling.low_latency_window_minutes",
                    p.low_latency_window_minutes,
                )?,
            },
            initial_window: TimeDelta::try_hours(p.initial_window_hours)
                .context("polling.initial_window_hours is out of range")?,
            display_window: minutes("display.window_minutes", self.display.window_minutes)?,
            right_margin: minutes("display.right_margin_minutes", self.display.right_margin_minutes)?,
            max_retention: self.display.max_retention,
            snapshot_every_ticks: self.snapshot.save_every_ticks,
        })
    }
}

fn check_range(key: &str, value: i64, min: i64, max: i64) -> anyhow::Result<()> {
    if value < min || value > max {
        anyhow::bail!("{} must be between {} and {}, got {}", key, min, max, value);
    }
    Ok(())
}

fn minutes(key: &str, value: i64) -> anyhow::Result<TimeDelta> {
    TimeDelta::try_minutes(value).with_context(|| format!("{} is out of range", key))
}

/// Load `config/dozemate.*` (optional) overlaid with `DOZEMATE__SECTION__KEY`
/// environment variables
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dozemate").required(false))
        .add_source(
            config::Environment::with_prefix("DOZEMATE")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let app: AppConfig = settings.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
