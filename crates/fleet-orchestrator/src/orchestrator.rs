//! Orchestrator — executes a scheduled task on its target devices.
//!
//! For each device in `task.device_ids` the orchestrator:
//! - checks the device is registered with the state manager
//! - calls the executor (under the configured deadline, with no lock held)
//! - on success, refreshes the device snapshot (status, optional metrics)
//!
//! The task outcome is then written back to the scheduler together with
//! the per-device outcome list.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use fleet_core::{
    DeviceOutcome, DeviceState, FailurePolicy, Operation, OrchestratorConfig, TaskEntry,
    TaskState,
};
use fleet_scheduler::{SchedulerError, TaskScheduler};
use fleet_state::DeviceStateManager;

use crate::error::{
    AggregateFailure, ExecutionError, ExecutionErrorKind, OrchestratorError, OrchestratorResult,
};
use crate::executor::DeviceExecutor;

/// Ties the scheduler and device state manager to an execution boundary.
#[derive(Clone)]
pub struct Orchestrator {
    /// Source of tasks and sink for their outcomes.
    scheduler: TaskScheduler,
    /// Device snapshots refreshed after each successful operation.
    devices: DeviceStateManager,
    /// Boundary that actually talks to devices.
    executor: Arc<dyn DeviceExecutor>,
    /// Failure policy, per-device deadline and refresh settings.
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator with the default configuration.
    pub fn new(
        scheduler: TaskScheduler,
        devices: DeviceStateManager,
        executor: Arc<dyn DeviceExecutor>,
    ) -> Self {
        Self {
            scheduler,
            devices,
            executor,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn devices(&self) -> &DeviceStateManager {
        &self.devices
    }

    /// Execute an already-scheduled task by ID.
    ///
    /// A pending task is started first. On device failure the task is
    /// recorded as `Failed` and the aggregate error is also returned.
    pub async fn execute_task(&self, task_id: &str) -> OrchestratorResult<TaskEntry> {
        let entry = self.scheduler.get_task(task_id).await?;
        let entry = match entry.state {
            TaskState::Pending => self.scheduler.start_task(task_id).await?,
            TaskState::Running => entry,
            from => {
                return Err(OrchestratorError::Scheduler(
                    SchedulerError::InvalidTransition {
                        id: task_id.to_string(),
                        from,
                        action: "execute",
                    },
                ));
            }
        };
        self.run(entry).await
    }

    /// Pull the highest-priority pending task and execute it.
    ///
    /// Returns `Ok(None)` when the queue is empty.
    pub async fn execute_next(&self) -> OrchestratorResult<Option<TaskEntry>> {
        match self.scheduler.next_task().await {
            Some(entry) => self.run(entry).await.map(Some),
            None => Ok(None),
        }
    }

    /// Pull telemetry for one device and store it.
    ///
    /// If the executor offers no telemetry the current snapshot is
    /// returned unchanged.
    pub async fn refresh_device(&self, device_id: &str) -> OrchestratorResult<DeviceState> {
        let current = self.devices.get_device_state(device_id).await?;
        let metrics = self
            .with_deadline(device_id, self.executor.device_metrics(device_id))
            .await
            .map_err(OrchestratorError::Execution)?;

        match metrics {
            Some(metrics) => Ok(self.devices.update_metrics(device_id, metrics).await?),
            None => Ok(current),
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn run(&self, entry: TaskEntry) -> OrchestratorResult<TaskEntry> {
        let task = &entry.task;
        let generation = entry.generation;
        info!(
            task_id = %task.id,
            operation = %task.operation,
            devices = task.device_ids.len(),
            "executing task"
        );

        let mut outcomes = Vec::with_capacity(task.device_ids.len());
        let mut failures: Vec<ExecutionError> = Vec::new();

        for (idx, device_id) in task.device_ids.iter().enumerate() {
            if !failures.is_empty() && self.config.failure_policy == FailurePolicy::FailFast {
                outcomes.push(DeviceOutcome::skipped(device_id.as_str()));
                continue;
            }

            if self.is_canceled(&task.id, generation).await {
                info!(task_id = %task.id, completed = idx, "task canceled, stopping execution");
                outcomes.extend(
                    task.device_ids[idx..]
                        .iter()
                        .map(|d| DeviceOutcome::skipped(d.as_str())),
                );
                self.record_canceled(&task.id, generation, outcomes).await;
                return Err(OrchestratorError::Canceled(task.id.clone()));
            }

            match self.execute_on(device_id, &task.operation).await {
                Ok(()) => {
                    debug!(task_id = %task.id, %device_id, "device operation succeeded");
                    outcomes.push(DeviceOutcome::succeeded(device_id.as_str()));
                }
                Err(err) => {
                    warn!(task_id = %task.id, %device_id, error = %err.kind, "device operation failed");
                    outcomes.push(DeviceOutcome::failed(device_id.as_str(), err.kind.to_string()));
                    failures.push(err);
                }
            }
        }

        if failures.is_empty() {
            let done = self.finish(&task.id, generation, None, outcomes).await?;
            info!(task_id = %task.id, "task succeeded on all devices");
            return Ok(done);
        }

        let aggregate = AggregateFailure {
            task_id: task.id.clone(),
            failures,
        };
        error!(
            task_id = %task.id,
            failed = ?aggregate.failing_devices(),
            "task failed"
        );
        self.finish(&task.id, generation, Some(aggregate.to_string()), outcomes)
            .await?;
        Err(OrchestratorError::Aggregate(aggregate))
    }

    /// Issue the operation to one device and refresh its snapshot.
    async fn execute_on(&self, device_id: &str, operation: &Operation) -> Result<(), ExecutionError> {
        if !self.devices.contains(device_id).await {
            return Err(ExecutionError::new(device_id, ExecutionErrorKind::DeviceUnknown));
        }

        self.with_deadline(device_id, self.executor.execute_operation(device_id, operation))
            .await?;

        let metrics = if self.config.refresh_metrics {
            match self
                .with_deadline(device_id, self.executor.device_metrics(device_id))
                .await
            {
                Ok(metrics) => metrics,
                Err(err) => {
                    warn!(%device_id, error = %err.kind, "metrics refresh failed, keeping previous");
                    None
                }
            }
        } else {
            None
        };

        let status = status_after(operation);
        self.devices
            .modify(device_id, |device| {
                if let Some(status) = status {
                    device.status = status.to_string();
                }
                if let Some(metrics) = metrics {
                    device.metrics = metrics;
                }
            })
            .await
            // Removed while the operation was in flight.
            .map_err(|_| ExecutionError::new(device_id, ExecutionErrorKind::DeviceUnknown))?;
        Ok(())
    }

    /// Await an executor future under the configured per-device deadline.
    async fn with_deadline<T>(
        &self,
        device_id: &str,
        fut: impl Future<Output = Result<T, String>>,
    ) -> Result<T, ExecutionError> {
        let result = match self.config.operation_timeout() {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ExecutionError::new(
                        device_id,
                        ExecutionErrorKind::Timeout(limit),
                    ));
                }
            },
            None => fut.await,
        };
        result.map_err(|msg| ExecutionError::new(device_id, ExecutionErrorKind::Operation(msg)))
    }

    /// True once this run's record has been canceled, evicted, or
    /// replaced by a newer task under the same ID.
    async fn is_canceled(&self, task_id: &str, generation: u64) -> bool {
        match self.scheduler.get_task(task_id).await {
            Ok(entry) => entry.generation != generation || entry.state == TaskState::Canceled,
            Err(_) => true,
        }
    }

    /// Record the task outcome, translating a lost race with `cancel`.
    async fn finish(
        &self,
        task_id: &str,
        generation: u64,
        error: Option<String>,
        outcomes: Vec<DeviceOutcome>,
    ) -> OrchestratorResult<TaskEntry> {
        match self
            .scheduler
            .complete_run(task_id, generation, error, outcomes.clone())
            .await
        {
            Ok(entry) => Ok(entry),
            Err(SchedulerError::InvalidTransition {
                from: TaskState::Canceled,
                ..
            }) => {
                info!(%task_id, "task canceled before its outcome was recorded");
                self.record_canceled(task_id, generation, outcomes).await;
                Err(OrchestratorError::Canceled(task_id.to_string()))
            }
            Err(SchedulerError::TaskNotFound(_)) | Err(SchedulerError::StaleRun { .. }) => {
                info!(%task_id, generation, "task record gone, outcome dropped");
                Err(OrchestratorError::Canceled(task_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Best-effort: a record that was evicted or replaced keeps nothing.
    async fn record_canceled(&self, task_id: &str, generation: u64, outcomes: Vec<DeviceOutcome>) {
        if let Err(err) = self
            .scheduler
            .record_canceled_outcomes(task_id, generation, outcomes)
            .await
        {
            debug!(%task_id, error = %err, "canceled task outcomes not recorded");
        }
    }
}

/// Device status label implied by a successful operation, if any.
fn status_after(operation: &Operation) -> Option<&'static str> {
    match operation {
        Operation::Reboot | Operation::PowerCycle => Some("online"),
        Operation::Shutdown => Some("offline"),
        Operation::UpdateFirmware { .. } => Some("online"),
        Operation::SetPowerMode { .. } => None,
        Operation::RunCommand { .. } => None,
        Operation::Custom { .. } => None,
    }
}
