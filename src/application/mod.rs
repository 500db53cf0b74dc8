// Application layer - polling, live state and use cases
pub mod dashboard_service;
pub mod error;
pub mod live_state;
pub mod poller;
pub mod telemetry_repository;
