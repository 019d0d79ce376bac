//! fleet-core — shared types for the fleet coordinator.
//!
//! Everything the scheduler, device state manager, and orchestrator
//! exchange lives here: tasks and their lifecycle records, typed device
//! operations, device snapshots, and the `fleet.toml` configuration model.

pub mod config;
pub mod time;
pub mod types;

pub use config::{
    ConfigError, FailurePolicy, FleetConfig, LogFormat, LoggingConfig, OrchestratorConfig,
    SchedulerConfig,
};
pub use types::*;
