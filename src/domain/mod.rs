// Domain layer - telemetry models and pure series logic
pub mod history;
pub mod metric;
pub mod readings;
pub mod sample;
pub mod series;
pub mod stats;
