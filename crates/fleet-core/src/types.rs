//! Domain types for the fleet coordinator.
//!
//! A [`Task`] is an immutable request to run one [`Operation`] against one
//! or more devices. The scheduler wraps each admitted task in a
//! [`TaskEntry`], the only mutable part of a task's life. Devices are
//! tracked as [`DeviceState`] snapshots keyed by [`DeviceId`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::time::epoch_millis;

/// Unique identifier for a task.
pub type TaskId = String;

/// Unique identifier for a managed device.
pub type DeviceId = String;

// ── Operation ─────────────────────────────────────────────────────

/// An action the orchestrator can apply to a device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Reboot,
    Shutdown,
    PowerCycle,
    SetPowerMode {
        /// Vendor power profile name (e.g. "maxn", "15w").
        mode: String,
    },
    UpdateFirmware {
        version: String,
        url: String,
    },
    RunCommand {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Escape hatch for integrations that define their own actions.
    Custom {
        name: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

impl Operation {
    /// Short label used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Reboot => "reboot",
            Operation::Shutdown => "shutdown",
            Operation::PowerCycle => "power_cycle",
            Operation::SetPowerMode { .. } => "set_power_mode",
            Operation::UpdateFirmware { .. } => "update_firmware",
            Operation::RunCommand { .. } => "run_command",
            Operation::Custom { .. } => "custom",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::SetPowerMode { mode } => write!(f, "set_power_mode({mode})"),
            Operation::UpdateFirmware { version, .. } => write!(f, "update_firmware({version})"),
            Operation::RunCommand { command, .. } => write!(f, "run_command({command})"),
            Operation::Custom { name, .. } => write!(f, "custom({name})"),
            other => f.write_str(other.kind()),
        }
    }
}

// ── Task ──────────────────────────────────────────────────────────

/// A requested operation against one or more devices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    /// Target devices, in execution order. Duplicates are executed twice.
    pub device_ids: Vec<DeviceId>,
    pub operation: Operation,
    /// Higher values are scheduled sooner.
    #[serde(default)]
    pub priority: i32,
    /// Requested quantity per resource kind. Advisory only.
    #[serde(default)]
    pub resources: HashMap<String, u64>,
    /// Unix timestamp (milliseconds) when this task was created.
    #[serde(default = "epoch_millis")]
    pub created_at: u64,
}

impl Task {
    pub fn new(
        id: impl Into<TaskId>,
        device_ids: Vec<DeviceId>,
        operation: Operation,
    ) -> Self {
        Self {
            id: id.into(),
            device_ids,
            operation,
            priority: 0,
            resources: HashMap::new(),
            created_at: epoch_millis(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_resource(mut self, kind: impl Into<String>, quantity: u64) -> Self {
        self.resources.insert(kind.into(), quantity);
        self
    }
}

/// Lifecycle state of a task.
///
/// `Pending → Running → {Completed | Failed}`, with `Canceled` reachable
/// from either non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a task's operation on a single device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed { error: String },
    /// Never attempted (an earlier device failed, or the task was canceled).
    Skipped,
}

/// Per-device record attached to a finished task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceOutcome {
    pub device_id: DeviceId,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl DeviceOutcome {
    pub fn succeeded(device_id: impl Into<DeviceId>) -> Self {
        Self {
            device_id: device_id.into(),
            status: OutcomeStatus::Succeeded,
        }
    }

    pub fn failed(device_id: impl Into<DeviceId>, error: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            status: OutcomeStatus::Failed {
                error: error.into(),
            },
        }
    }

    pub fn skipped(device_id: impl Into<DeviceId>) -> Self {
        Self {
            device_id: device_id.into(),
            status: OutcomeStatus::Skipped,
        }
    }
}

/// The mutable lifecycle record wrapped around an admitted [`Task`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEntry {
    pub task: Task,
    pub state: TaskState,
    /// Admission sequence number assigned by the scheduler. Distinguishes
    /// records that reuse an evicted task ID.
    #[serde(default)]
    pub generation: u64,
    /// Unix timestamp (milliseconds) of the `Running` transition.
    pub started_at: Option<u64>,
    /// Unix timestamp (milliseconds) of the terminal transition.
    pub ended_at: Option<u64>,
    /// Set only when `state == Failed`.
    pub error: Option<String>,
    /// Filled in by the orchestrator, in `task.device_ids` order.
    #[serde(default)]
    pub device_outcomes: Vec<DeviceOutcome>,
}

impl TaskEntry {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            state: TaskState::Pending,
            generation: 0,
            started_at: None,
            ended_at: None,
            error: None,
            device_outcomes: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.task.id
    }
}

// ── Device ────────────────────────────────────────────────────────

/// Point-in-time telemetry for one device.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceMetrics {
    /// Load average, normalized to 0.0–1.0 per core.
    pub load: f64,
    pub temperature_c: f64,
    pub power_w: f64,
}

/// Authoritative snapshot of one device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceState {
    pub id: DeviceId,
    /// Free-form operational label ("online", "offline", "updating", ...).
    #[serde(default = "default_status")]
    pub status: String,
    /// Allocation per resource kind.
    #[serde(default)]
    pub resources: HashMap<String, u64>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub metrics: DeviceMetrics,
    /// Unix timestamp (milliseconds) of the last write. Owned by the
    /// state manager; any caller-supplied value is overwritten.
    #[serde(default)]
    pub last_updated: u64,
}

fn default_status() -> String {
    "unknown".to_string()
}

impl DeviceState {
    pub fn new(id: impl Into<DeviceId>) -> Self {
        Self {
            id: id.into(),
            status: default_status(),
            resources: HashMap::new(),
            location: String::new(),
            metrics: DeviceMetrics::default(),
            last_updated: 0,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_resource(mut self, kind: impl Into<String>, allocation: u64) -> Self {
        self.resources.insert(kind.into(), allocation);
        self
    }
}
