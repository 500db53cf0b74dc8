// Application state for HTTP handlers
use crate::application::dashboard_service::DashboardService;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub dashboard_service: Arc<DashboardService>,
    /// Flips to `true` on shutdown so long-lived streams end
    pub shutdown: watch::Receiver<bool>,
}
