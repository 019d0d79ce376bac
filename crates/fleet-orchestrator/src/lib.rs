//! fleet-orchestrator — runs scheduled tasks against devices.
//!
//! The orchestrator pulls a task from the [`TaskScheduler`], issues the
//! task's operation to each target device through a [`DeviceExecutor`],
//! and reconciles the result into both the scheduler (task outcome) and
//! the [`DeviceStateManager`] (device snapshots).
//!
//! # Architecture
//!
//! ```text
//! Orchestrator
//!   ├── TaskScheduler        (start / complete / observe cancel)
//!   ├── DeviceStateManager   (existence check, post-operation refresh)
//!   └── dyn DeviceExecutor   (one call per target device, no locks held)
//! ```
//!
//! Any device failure fails the whole task. Devices that already
//! succeeded are not rolled back; per-device outcomes are kept on the
//! task entry.
//!
//! [`TaskScheduler`]: fleet_scheduler::TaskScheduler
//! [`DeviceStateManager`]: fleet_state::DeviceStateManager

pub mod error;
pub mod executor;
pub mod orchestrator;

pub use error::{
    AggregateFailure, ExecutionError, ExecutionErrorKind, OrchestratorError, OrchestratorResult,
};
pub use executor::{DeviceExecutor, ExecutorFuture};
pub use orchestrator::Orchestrator;
