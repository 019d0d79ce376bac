//! Drive a manifest through the coordinator and collect a report.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use fleet_core::{DeviceState, FleetConfig, TaskEntry, TaskState};
use fleet_orchestrator::{DeviceExecutor, Orchestrator, OrchestratorError};
use fleet_scheduler::TaskScheduler;
use fleet_state::DeviceStateManager;

use crate::manifest::Manifest;

/// Final state of every task and device after a run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub completed: usize,
    pub failed: usize,
    pub canceled: usize,
    pub tasks: Vec<TaskEntry>,
    pub devices: Vec<DeviceState>,
}

/// Register the manifest's devices, schedule its tasks, and execute them
/// in admission order until the queue drains.
pub async fn run_manifest(
    manifest: Manifest,
    config: &FleetConfig,
    executor: Arc<dyn DeviceExecutor>,
) -> anyhow::Result<RunReport> {
    let devices = DeviceStateManager::new();
    for device in manifest.devices {
        devices.add_device(device).await?;
    }
    info!(devices = devices.len().await, "devices registered");

    let scheduler = TaskScheduler::from_config(&config.scheduler);
    for task in manifest.tasks {
        scheduler.schedule(task).await?;
    }

    let orchestrator = Orchestrator::new(scheduler.clone(), devices.clone(), executor)
        .with_config(config.orchestrator.clone());

    loop {
        match orchestrator.execute_next().await {
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(OrchestratorError::Aggregate(failure)) => {
                debug!(task_id = %failure.task_id, failed = ?failure.failing_devices(), "continuing after failed task");
            }
            Err(OrchestratorError::Canceled(task_id)) => {
                debug!(%task_id, "continuing after canceled task");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let tasks = scheduler.list_tasks().await;
    let count = |state: TaskState| tasks.iter().filter(|t| t.state == state).count();
    let report = RunReport {
        completed: count(TaskState::Completed),
        failed: count(TaskState::Failed),
        canceled: count(TaskState::Canceled),
        devices: devices.list_devices().await,
        tasks,
    };
    info!(
        completed = report.completed,
        failed = report.failed,
        "run finished"
    );
    Ok(report)
}
