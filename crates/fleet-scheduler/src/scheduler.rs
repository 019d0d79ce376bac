//! TaskScheduler — priority admission queue plus lifecycle records.
//!
//! Pending order is descending priority, then FIFO by admission order.
//! Every public operation takes the single `RwLock` once, does its work,
//! and releases it; nothing here awaits while holding the lock.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use fleet_core::time::epoch_millis;
use fleet_core::{DeviceOutcome, Task, TaskEntry, TaskId, TaskState};

use crate::error::{SchedulerError, SchedulerResult};

/// Ordering key for the pending queue: highest priority first, then
/// earliest admission.
type PendingKey = (Reverse<i32>, u64);

/// A task record plus the sequence numbers that locate it in its bucket.
struct Slot {
    /// The lifecycle record; `entry.generation` is the admission sequence
    /// and keys the pending queue.
    entry: TaskEntry,
    /// Start sequence, keys the running bucket once the task is running.
    started: Option<u64>,
}

impl Slot {
    /// Reject callers holding a record from an earlier admission of this ID.
    fn ensure_generation(&self, id: &str, generation: u64) -> SchedulerResult<()> {
        if self.entry.generation != generation {
            return Err(SchedulerError::StaleRun {
                id: id.to_string(),
                generation,
            });
        }
        Ok(())
    }
}

struct Inner {
    /// Every retained record, keyed by task ID.
    tasks: HashMap<TaskId, Slot>,
    /// Pending IDs ordered by priority, then admission.
    pending: BTreeMap<PendingKey, TaskId>,
    /// Running IDs ordered by start sequence.
    running: BTreeMap<u64, TaskId>,
    /// Terminal IDs, oldest-terminated first.
    terminal: VecDeque<TaskId>,
    /// Shared counter for admission and start sequences.
    next_seq: u64,
    /// Retention bound for `terminal`; zero is unbounded.
    max_terminal: usize,
}

impl Inner {
    fn seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn slot_mut(&mut self, id: &str) -> SchedulerResult<&mut Slot> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| SchedulerError::TaskNotFound(id.to_string()))
    }

    /// Detach a slot from whichever non-terminal bucket holds it.
    fn detach(&mut self, id: &str) {
        let Some(slot) = self.tasks.get(id) else {
            return;
        };
        match slot.entry.state {
            TaskState::Pending => {
                let key = (Reverse(slot.entry.task.priority), slot.entry.generation);
                self.pending.remove(&key);
            }
            TaskState::Running => {
                if let Some(started) = slot.started {
                    self.running.remove(&started);
                }
            }
            _ => {}
        }
    }

    /// Move a non-terminal task into a terminal state.
    fn finish(
        &mut self,
        id: &str,
        state: TaskState,
        error: Option<String>,
        outcomes: Option<Vec<DeviceOutcome>>,
    ) -> SchedulerResult<TaskEntry> {
        self.detach(id);
        let slot = self.slot_mut(id)?;
        slot.entry.state = state;
        slot.entry.ended_at = Some(epoch_millis());
        slot.entry.error = error;
        if let Some(outcomes) = outcomes {
            slot.entry.device_outcomes = outcomes;
        }
        let snapshot = slot.entry.clone();
        self.terminal.push_back(id.to_string());
        self.evict_terminal();
        Ok(snapshot)
    }

    /// Drop the oldest terminal records beyond the retention bound.
    fn evict_terminal(&mut self) {
        if self.max_terminal == 0 {
            return;
        }
        while self.terminal.len() > self.max_terminal {
            if let Some(old) = self.terminal.pop_front() {
                self.tasks.remove(&old);
                debug!(task_id = %old, "terminal task evicted");
            }
        }
    }
}

/// The task scheduler.
///
/// Cheap to clone; clones share the same queue and records.
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<RwLock<Inner>>,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    /// Create a scheduler with the default terminal retention (1024).
    pub fn new() -> Self {
        Self::with_retention(fleet_core::SchedulerConfig::default().max_terminal_tasks)
    }

    /// Create a scheduler that keeps at most `max_terminal` finished
    /// tasks. Zero keeps all of them.
    pub fn with_retention(max_terminal: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                tasks: HashMap::new(),
                pending: BTreeMap::new(),
                running: BTreeMap::new(),
                terminal: VecDeque::new(),
                next_seq: 0,
                max_terminal,
            })),
        }
    }

    pub fn from_config(config: &fleet_core::SchedulerConfig) -> Self {
        Self::with_retention(config.max_terminal_tasks)
    }

    /// Admit a task into the pending queue.
    pub async fn schedule(&self, task: Task) -> SchedulerResult<TaskEntry> {
        validate(&task)?;

        let mut inner = self.inner.write().await;
        if inner.tasks.contains_key(&task.id) {
            return Err(SchedulerError::AlreadyScheduled(task.id));
        }

        let admitted = inner.seq();
        let id = task.id.clone();
        let priority = task.priority;
        let mut entry = TaskEntry::new(task);
        entry.generation = admitted;
        inner.pending.insert((Reverse(priority), admitted), id.clone());
        inner.tasks.insert(
            id.clone(),
            Slot {
                entry: entry.clone(),
                started: None,
            },
        );
        let queued = inner.pending.len();
        drop(inner);

        info!(task_id = %id, priority, queued, operation = %entry.task.operation, "task scheduled");
        Ok(entry)
    }

    /// Move a pending task to running.
    pub async fn start_task(&self, id: &str) -> SchedulerResult<TaskEntry> {
        let mut inner = self.inner.write().await;
        let from = inner.slot_mut(id)?.entry.state;
        if from != TaskState::Pending {
            warn!(task_id = %id, state = %from, "start rejected");
            return Err(SchedulerError::InvalidTransition {
                id: id.to_string(),
                from,
                action: "start",
            });
        }

        inner.detach(id);
        let started = inner.seq();
        inner.running.insert(started, id.to_string());
        let slot = inner.slot_mut(id)?;
        slot.started = Some(started);
        slot.entry.state = TaskState::Running;
        slot.entry.started_at = Some(epoch_millis());
        let snapshot = slot.entry.clone();
        drop(inner);

        info!(task_id = %id, "task started");
        Ok(snapshot)
    }

    /// Pop the highest-priority pending task and start it.
    ///
    /// Returns `None` when nothing is pending.
    pub async fn next_task(&self) -> Option<TaskEntry> {
        let mut inner = self.inner.write().await;
        let (_, id) = inner.pending.pop_first()?;
        let started = inner.seq();
        let slot = inner.tasks.get_mut(&id)?;
        slot.started = Some(started);
        slot.entry.state = TaskState::Running;
        slot.entry.started_at = Some(epoch_millis());
        let snapshot = slot.entry.clone();
        inner.running.insert(started, id.clone());
        drop(inner);

        info!(task_id = %id, priority = snapshot.task.priority, "task dequeued and started");
        Some(snapshot)
    }

    /// Finish a running task. `None` means success.
    pub async fn complete_task(
        &self,
        id: &str,
        error: Option<String>,
    ) -> SchedulerResult<TaskEntry> {
        self.complete(id, None, error, None).await
    }

    /// Finish a running task and attach its per-device outcomes.
    pub async fn complete_task_with_outcomes(
        &self,
        id: &str,
        error: Option<String>,
        outcomes: Vec<DeviceOutcome>,
    ) -> SchedulerResult<TaskEntry> {
        self.complete(id, None, error, Some(outcomes)).await
    }

    /// Finish a running task on behalf of the run that started it.
    ///
    /// `generation` is the one on the entry the run was handed; if the ID
    /// has since been evicted and admitted again this fails with
    /// `StaleRun` and the newer record is left alone.
    pub async fn complete_run(
        &self,
        id: &str,
        generation: u64,
        error: Option<String>,
        outcomes: Vec<DeviceOutcome>,
    ) -> SchedulerResult<TaskEntry> {
        self.complete(id, Some(generation), error, Some(outcomes))
            .await
    }

    async fn complete(
        &self,
        id: &str,
        generation: Option<u64>,
        error: Option<String>,
        outcomes: Option<Vec<DeviceOutcome>>,
    ) -> SchedulerResult<TaskEntry> {
        let mut inner = self.inner.write().await;
        let slot = inner.slot_mut(id)?;
        if let Some(generation) = generation {
            slot.ensure_generation(id, generation)?;
        }
        let from = slot.entry.state;
        if from != TaskState::Running {
            warn!(task_id = %id, state = %from, "complete rejected");
            return Err(SchedulerError::InvalidTransition {
                id: id.to_string(),
                from,
                action: "complete",
            });
        }

        let state = if error.is_some() {
            TaskState::Failed
        } else {
            TaskState::Completed
        };
        let snapshot = inner.finish(id, state, error, outcomes)?;
        drop(inner);

        match &snapshot.error {
            None => info!(task_id = %id, "task completed"),
            Some(err) => warn!(task_id = %id, error = %err, "task failed"),
        }
        Ok(snapshot)
    }

    /// Cancel a pending or running task.
    ///
    /// Only the record changes; operations already issued to devices are
    /// not interrupted.
    pub async fn cancel(&self, id: &str) -> SchedulerResult<TaskEntry> {
        let mut inner = self.inner.write().await;
        let from = inner.slot_mut(id)?.entry.state;
        if from.is_terminal() {
            warn!(task_id = %id, state = %from, "cancel rejected");
            return Err(SchedulerError::InvalidTransition {
                id: id.to_string(),
                from,
                action: "cancel",
            });
        }

        let snapshot = inner.finish(id, TaskState::Canceled, None, None)?;
        drop(inner);

        info!(task_id = %id, from = %from, "task canceled");
        Ok(snapshot)
    }

    /// Attach per-device outcomes to a task that was canceled mid-run.
    ///
    /// State, `ended_at` and `error` stay as `cancel` left them.
    pub async fn record_canceled_outcomes(
        &self,
        id: &str,
        generation: u64,
        outcomes: Vec<DeviceOutcome>,
    ) -> SchedulerResult<TaskEntry> {
        let mut inner = self.inner.write().await;
        let slot = inner.slot_mut(id)?;
        slot.ensure_generation(id, generation)?;
        if slot.entry.state != TaskState::Canceled {
            return Err(SchedulerError::InvalidTransition {
                id: id.to_string(),
                from: slot.entry.state,
                action: "record outcomes for",
            });
        }
        slot.entry.device_outcomes = outcomes;
        let snapshot = slot.entry.clone();
        drop(inner);

        debug!(task_id = %id, outcomes = snapshot.device_outcomes.len(), "canceled task outcomes recorded");
        Ok(snapshot)
    }

    /// Look up a task in any bucket.
    pub async fn get_task(&self, id: &str) -> SchedulerResult<TaskEntry> {
        let inner = self.inner.read().await;
        inner
            .tasks
            .get(id)
            .map(|slot| slot.entry.clone())
            .ok_or_else(|| SchedulerError::TaskNotFound(id.to_string()))
    }

    /// Snapshot of every retained task: pending in admission order, then
    /// running in start order, then terminal oldest first.
    pub async fn list_tasks(&self) -> Vec<TaskEntry> {
        let inner = self.inner.read().await;
        inner
            .pending
            .values()
            .chain(inner.running.values())
            .chain(inner.terminal.iter())
            .filter_map(|id| inner.tasks.get(id).map(|slot| slot.entry.clone()))
            .collect()
    }

    /// Snapshot of pending tasks in admission order.
    pub async fn pending_tasks(&self) -> Vec<TaskEntry> {
        let inner = self.inner.read().await;
        inner
            .pending
            .values()
            .filter_map(|id| inner.tasks.get(id).map(|slot| slot.entry.clone()))
            .collect()
    }

    /// Number of retained tasks across all buckets.
    pub async fn len(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.tasks.is_empty()
    }
}

fn validate(task: &Task) -> SchedulerResult<()> {
    if task.id.trim().is_empty() {
        return Err(SchedulerError::Validation("task id is empty".to_string()));
    }
    if task.device_ids.is_empty() {
        return Err(SchedulerError::Validation(format!(
            "task {} has no target devices",
            task.id
        )));
    }
    if task.device_ids.iter().any(|d| d.trim().is_empty()) {
        return Err(SchedulerError::Validation(format!(
            "task {} has an empty device id",
            task.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::Operation;

    fn task(id: &str, priority: i32) -> Task {
        Task::new(id, vec!["dev-a".to_string()], Operation::Reboot).with_priority(priority)
    }

    fn ids(entries: &[TaskEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id()).collect()
    }

    #[tokio::test]
    async fn scheduler_starts_empty() {
        let scheduler = TaskScheduler::new();
        assert!(scheduler.is_empty().await);
        assert!(scheduler.list_tasks().await.is_empty());
        assert!(scheduler.next_task().await.is_none());
    }

    #[tokio::test]
    async fn scheduled_task_is_pending() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("t1", 1)).await.unwrap();

        let entry = scheduler.get_task("t1").await.unwrap();
        assert_eq!(entry.state, TaskState::Pending);
        assert!(entry.started_at.is_none());
    }

    #[tokio::test]
    async fn empty_device_list_is_rejected() {
        let scheduler = TaskScheduler::new();
        let bad = Task::new("t1", vec![], Operation::Reboot);
        let result = scheduler.schedule(bad).await;
        assert!(matches!(result, Err(SchedulerError::Validation(_))));
        assert!(scheduler.is_empty().await);
    }

    #[tokio::test]
    async fn blank_ids_are_rejected() {
        let scheduler = TaskScheduler::new();
        let no_id = Task::new(" ", vec!["d".to_string()], Operation::Reboot);
        let blank_device = Task::new("t1", vec![String::new()], Operation::Reboot);
        assert!(matches!(
            scheduler.schedule(no_id).await,
            Err(SchedulerError::Validation(_))
        ));
        assert!(matches!(
            scheduler.schedule(blank_device).await,
            Err(SchedulerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("t1", 1)).await.unwrap();
        let result = scheduler.schedule(task("t1", 9)).await;
        assert_eq!(
            result,
            Err(SchedulerError::AlreadyScheduled("t1".to_string()))
        );
        assert_eq!(scheduler.get_task("t1").await.unwrap().task.priority, 1);
    }

    #[tokio::test]
    async fn pending_order_is_descending_priority() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("p1", 1)).await.unwrap();
        scheduler.schedule(task("p5", 5)).await.unwrap();
        scheduler.schedule(task("p3", 3)).await.unwrap();

        let pending = scheduler.pending_tasks().await;
        assert_eq!(ids(&pending), vec!["p5", "p3", "p1"]);
        assert_eq!(ids(&scheduler.list_tasks().await), vec!["p5", "p3", "p1"]);
    }

    #[tokio::test]
    async fn equal_priorities_keep_admission_order() {
        let scheduler = TaskScheduler::new();
        for id in ["a", "b", "c"] {
            scheduler.schedule(task(id, 2)).await.unwrap();
        }
        scheduler.schedule(task("urgent", 10)).await.unwrap();
        scheduler.schedule(task("d", 2)).await.unwrap();
        scheduler.schedule(task("low", -1)).await.unwrap();

        let pending = scheduler.pending_tasks().await;
        assert_eq!(ids(&pending), vec!["urgent", "a", "b", "c", "d", "low"]);
    }

    #[tokio::test]
    async fn start_moves_task_to_running() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("t1", 1)).await.unwrap();
        scheduler.schedule(task("t2", 1)).await.unwrap();

        let entry = scheduler.start_task("t1").await.unwrap();
        assert_eq!(entry.state, TaskState::Running);
        assert!(entry.started_at.unwrap() > 0);

        assert_eq!(ids(&scheduler.pending_tasks().await), vec!["t2"]);
        // Pending first, then running.
        assert_eq!(ids(&scheduler.list_tasks().await), vec!["t2", "t1"]);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let scheduler = TaskScheduler::new();
        let missing = SchedulerError::TaskNotFound("ghost".to_string());
        assert_eq!(scheduler.start_task("ghost").await, Err(missing.clone()));
        assert_eq!(
            scheduler.complete_task("ghost", None).await,
            Err(missing.clone())
        );
        assert_eq!(scheduler.cancel("ghost").await, Err(missing.clone()));
        assert_eq!(scheduler.get_task("ghost").await, Err(missing));
    }

    #[tokio::test]
    async fn start_twice_is_invalid() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("t1", 1)).await.unwrap();
        scheduler.start_task("t1").await.unwrap();

        let result = scheduler.start_task("t1").await;
        assert_eq!(
            result,
            Err(SchedulerError::InvalidTransition {
                id: "t1".to_string(),
                from: TaskState::Running,
                action: "start",
            })
        );
    }

    #[tokio::test]
    async fn complete_requires_running() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("t1", 1)).await.unwrap();
        let result = scheduler.complete_task("t1", None).await;
        assert!(matches!(
            result,
            Err(SchedulerError::InvalidTransition {
                from: TaskState::Pending,
                ..
            })
        ));
        assert_eq!(
            scheduler.get_task("t1").await.unwrap().state,
            TaskState::Pending
        );
    }

    #[tokio::test]
    async fn complete_success_and_failure() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("ok", 1)).await.unwrap();
        scheduler.schedule(task("bad", 1)).await.unwrap();
        scheduler.start_task("ok").await.unwrap();
        scheduler.start_task("bad").await.unwrap();

        let ok = scheduler.complete_task("ok", None).await.unwrap();
        assert_eq!(ok.state, TaskState::Completed);
        assert!(ok.error.is_none());
        assert!(ok.ended_at.is_some());

        let bad = scheduler
            .complete_task("bad", Some("dev-a: link down".to_string()))
            .await
            .unwrap();
        assert_eq!(bad.state, TaskState::Failed);
        assert_eq!(bad.error.as_deref(), Some("dev-a: link down"));

        // Terminal states never transition further.
        assert!(scheduler.complete_task("ok", None).await.is_err());
        assert!(scheduler.cancel("bad").await.is_err());
    }

    #[tokio::test]
    async fn outcomes_are_recorded() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("t1", 1)).await.unwrap();
        scheduler.start_task("t1").await.unwrap();

        let outcomes = vec![DeviceOutcome::succeeded("dev-a")];
        let entry = scheduler
            .complete_task_with_outcomes("t1", None, outcomes.clone())
            .await
            .unwrap();
        assert_eq!(entry.device_outcomes, outcomes);
    }

    #[tokio::test]
    async fn cancel_from_pending_and_running() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("p", 1)).await.unwrap();
        scheduler.schedule(task("r", 1)).await.unwrap();
        scheduler.start_task("r").await.unwrap();

        let p = scheduler.cancel("p").await.unwrap();
        let r = scheduler.cancel("r").await.unwrap();
        assert_eq!(p.state, TaskState::Canceled);
        assert_eq!(r.state, TaskState::Canceled);
        assert!(p.ended_at.is_some());
        assert!(r.started_at.is_some());

        assert!(scheduler.pending_tasks().await.is_empty());
        assert!(scheduler.next_task().await.is_none());
        assert_eq!(ids(&scheduler.list_tasks().await), vec!["p", "r"]);
    }

    #[tokio::test]
    async fn next_task_pops_highest_priority() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("low", 1)).await.unwrap();
        scheduler.schedule(task("high", 9)).await.unwrap();

        let first = scheduler.next_task().await.unwrap();
        assert_eq!(first.id(), "high");
        assert_eq!(first.state, TaskState::Running);

        let second = scheduler.next_task().await.unwrap();
        assert_eq!(second.id(), "low");
        assert!(scheduler.next_task().await.is_none());
    }

    #[tokio::test]
    async fn terminal_retention_evicts_oldest() {
        let scheduler = TaskScheduler::with_retention(2);
        for id in ["t1", "t2", "t3"] {
            scheduler.schedule(task(id, 1)).await.unwrap();
            scheduler.start_task(id).await.unwrap();
            scheduler.complete_task(id, None).await.unwrap();
        }

        assert!(matches!(
            scheduler.get_task("t1").await,
            Err(SchedulerError::TaskNotFound(_))
        ));
        assert_eq!(ids(&scheduler.list_tasks().await), vec!["t2", "t3"]);

        // An evicted ID may be admitted again.
        scheduler.schedule(task("t1", 1)).await.unwrap();
    }

    #[tokio::test]
    async fn generations_follow_admission() {
        let scheduler = TaskScheduler::new();
        let first = scheduler.schedule(task("t1", 1)).await.unwrap();
        let second = scheduler.schedule(task("t2", 1)).await.unwrap();
        assert!(second.generation > first.generation);

        let started = scheduler.start_task("t1").await.unwrap();
        assert_eq!(started.generation, first.generation);
    }

    #[tokio::test]
    async fn complete_run_rejects_reused_id() {
        let scheduler = TaskScheduler::with_retention(1);
        scheduler.schedule(task("t1", 1)).await.unwrap();
        let old = scheduler.start_task("t1").await.unwrap();
        scheduler.cancel("t1").await.unwrap();

        // A second terminal record evicts t1, freeing the ID.
        scheduler.schedule(task("t2", 1)).await.unwrap();
        scheduler.cancel("t2").await.unwrap();
        scheduler.schedule(task("t1", 1)).await.unwrap();
        let fresh = scheduler.start_task("t1").await.unwrap();
        assert_ne!(fresh.generation, old.generation);

        let result = scheduler
            .complete_run("t1", old.generation, None, vec![DeviceOutcome::succeeded("dev-a")])
            .await;
        assert_eq!(
            result,
            Err(SchedulerError::StaleRun {
                id: "t1".to_string(),
                generation: old.generation,
            })
        );
        let current = scheduler.get_task("t1").await.unwrap();
        assert_eq!(current.state, TaskState::Running);
        assert!(current.device_outcomes.is_empty());

        let done = scheduler
            .complete_run("t1", fresh.generation, None, vec![])
            .await
            .unwrap();
        assert_eq!(done.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn canceled_outcomes_are_attached() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("t1", 1)).await.unwrap();
        let running = scheduler.start_task("t1").await.unwrap();
        let canceled = scheduler.cancel("t1").await.unwrap();

        let outcomes = vec![
            DeviceOutcome::succeeded("dev-a"),
            DeviceOutcome::skipped("dev-b"),
        ];
        let entry = scheduler
            .record_canceled_outcomes("t1", running.generation, outcomes.clone())
            .await
            .unwrap();
        assert_eq!(entry.state, TaskState::Canceled);
        assert_eq!(entry.ended_at, canceled.ended_at);
        assert_eq!(entry.device_outcomes, outcomes);
    }

    #[tokio::test]
    async fn outcomes_only_attach_to_canceled_tasks() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("t1", 1)).await.unwrap();
        let running = scheduler.start_task("t1").await.unwrap();

        let result = scheduler
            .record_canceled_outcomes("t1", running.generation, vec![])
            .await;
        assert!(matches!(
            result,
            Err(SchedulerError::InvalidTransition {
                from: TaskState::Running,
                ..
            })
        ));
        assert!(matches!(
            scheduler
                .record_canceled_outcomes("t1", running.generation + 100, vec![])
                .await,
            Err(SchedulerError::StaleRun { .. })
        ));
    }

    #[tokio::test]
    async fn zero_retention_keeps_everything() {
        let scheduler = TaskScheduler::with_retention(0);
        for i in 0..10 {
            let id = format!("t{i}");
            scheduler.schedule(task(&id, 1)).await.unwrap();
            scheduler.cancel(&id).await.unwrap();
        }
        assert_eq!(scheduler.len().await, 10);
    }

    #[tokio::test]
    async fn concurrent_schedule_loses_nothing() {
        let scheduler = TaskScheduler::new();
        let mut handles = Vec::new();
        for i in 0..64 {
            let scheduler = scheduler.clone();
            handles.push(tokio::spawn(async move {
                scheduler.schedule(task(&format!("t{i}"), i % 4)).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let listed = scheduler.list_tasks().await;
        assert_eq!(listed.len(), 64);
        let priorities: Vec<i32> = listed.iter().map(|e| e.task.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
    }

    #[tokio::test]
    async fn reads_are_idempotent() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule(task("t1", 1)).await.unwrap();
        scheduler.start_task("t1").await.unwrap();

        let a = scheduler.list_tasks().await;
        let b = scheduler.list_tasks().await;
        assert_eq!(a, b);
        assert_eq!(
            scheduler.get_task("t1").await,
            scheduler.get_task("t1").await
        );
    }
}
