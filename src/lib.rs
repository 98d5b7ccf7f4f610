// Supporting modules
pub mod config;
pub mod metrics;
pub mod telemetry;

// Queue backends
pub mod queue;
