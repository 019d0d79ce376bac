//! Orchestrator error types.

use std::fmt;
use std::time::Duration;

use fleet_scheduler::SchedulerError;
use fleet_state::StateError;
use thiserror::Error;

/// Why a single device operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionErrorKind {
    /// The execution boundary reported an error (message kept verbatim).
    Operation(String),
    /// The device is not known to the state manager.
    DeviceUnknown,
    /// The operation did not finish before the deadline.
    Timeout(Duration),
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionErrorKind::Operation(msg) => f.write_str(msg),
            ExecutionErrorKind::DeviceUnknown => f.write_str("device not registered"),
            ExecutionErrorKind::Timeout(after) => {
                write!(f, "timed out after {}ms", after.as_millis())
            }
        }
    }
}

/// A device-level failure, annotated with the device it happened on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("device {device_id}: {kind}")]
pub struct ExecutionError {
    pub device_id: String,
    pub kind: ExecutionErrorKind,
}

impl ExecutionError {
    pub fn new(device_id: impl Into<String>, kind: ExecutionErrorKind) -> Self {
        Self {
            device_id: device_id.into(),
            kind,
        }
    }
}

/// One or more device failures recorded against a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateFailure {
    pub task_id: String,
    pub failures: Vec<ExecutionError>,
}

impl AggregateFailure {
    /// IDs of the devices that failed, in execution order.
    pub fn failing_devices(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.device_id.as_str()).collect()
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "task {} failed on {} device(s): ",
            self.task_id,
            self.failures.len()
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateFailure {}

/// Errors that can occur while executing a task.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task canceled during execution: {0}")]
    Canceled(String),

    #[error(transparent)]
    Aggregate(AggregateFailure),

    #[error(transparent)]
    Execution(ExecutionError),

    #[error("scheduler error: {0}")]
    Scheduler(SchedulerError),

    #[error("device state error: {0}")]
    State(#[from] StateError),
}

impl From<SchedulerError> for OrchestratorError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::TaskNotFound(id) => OrchestratorError::TaskNotFound(id),
            other => OrchestratorError::Scheduler(other),
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
