// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod dozemate_repository;
pub mod payload;
pub mod session;
pub mod snapshot_store;
