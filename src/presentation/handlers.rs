// HTTP request handlers
use crate::application::error::TelemetryError;
use crate::application::poller::PollMode;
use crate::domain::history::HistoryPeriod;
use crate::domain::metric::Metric;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub period: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeChoice {
    Normal,
    LowLatency,
    Stopped,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: ModeChoice,
}

#[derive(Debug, Serialize)]
pub struct ModeResponse {
    pub mode: Option<PollMode>,
    pub generation: u64,
}

#[derive(Debug, Deserialize)]
pub struct AutoScrollRequest {
    pub enabled: bool,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Full live state: series, window, tiles and poller status
pub async fn live_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dashboard_service.snapshot())
}

pub async fn latest_readings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dashboard_service.snapshot().latest)
}

pub async fn live_window(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dashboard_service.live_window())
}

/// Points, summary and padded Y bounds for one metric of the live series
pub async fn metric_view(
    Path(metric): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match metric.parse::<Metric>() {
        Ok(metric) => Json(state.dashboard_service.metric_view(metric)).into_response(),
        Err(e) => (StatusCode::NOT_FOUND, e).into_response(),
    }
}

/// Server-sent events: the current state, then one event per commit
pub async fn live_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.dashboard_service.subscribe();
    let mut shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        loop {
            let payload = {
                let current = rx.borrow_and_update();
                serde_json::to_string(&*current)
            };

            match payload {
                Ok(json) => yield Ok(Event::default().event("state").data(json)),
                Err(e) => tracing::warn!("Failed to encode live state: {}", e),
            }

            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Switch data source mode; `stopped` tears the poller down
pub async fn set_mode(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ModeRequest>,
) -> impl IntoResponse {
    let service = &state.dashboard_service;
    match request.mode {
        ModeChoice::Normal => service.start(PollMode::Normal).await,
        ModeChoice::LowLatency => service.start(PollMode::LowLatency).await,
        ModeChoice::Stopped => service.stop().await,
    }

    Json(ModeResponse {
        mode: service.current_mode().await,
        generation: service.snapshot().generation,
    })
}

pub async fn set_auto_scroll(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AutoScrollRequest>,
) -> StatusCode {
    state.dashboard_service.set_auto_scroll(request.enabled);
    StatusCode::NO_CONTENT
}

/// Historical data for the active device
pub async fn history(
    Query(query): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let period = match query.period.as_deref().map(str::parse::<HistoryPeriod>) {
        None => HistoryPeriod::default(),
        Some(Ok(period)) => period,
        Some(Err(e)) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };

    match state.dashboard_service.history(period).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => {
            tracing::warn!("History request for {} failed: {}", period, e);
            (error_status(&e), e.to_string()).into_response()
        }
    }
}

fn error_status(err: &TelemetryError) -> StatusCode {
    match err {
        TelemetryError::Auth => StatusCode::UNAUTHORIZED,
        TelemetryError::NoActiveDevice => StatusCode::NOT_FOUND,
        TelemetryError::InvalidWindow { .. } => StatusCode::BAD_REQUEST,
        TelemetryError::Network(_) | TelemetryError::Parse(_) => StatusCode::BAD_GATEWAY,
    }
}
