//! DeviceStateManager — lock-protected map of device snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use fleet_core::time::epoch_millis;
use fleet_core::{DeviceMetrics, DeviceState};

use crate::error::{StateError, StateResult};

/// Thread-safe store of device state keyed by device ID.
#[derive(Clone, Default)]
pub struct DeviceStateManager {
    devices: Arc<RwLock<HashMap<String, DeviceState>>>,
}

impl DeviceStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device. Same upsert semantics as [`Self::update_device_state`].
    pub async fn add_device(&self, state: DeviceState) -> StateResult<DeviceState> {
        self.update_device_state(state).await
    }

    /// Insert or replace a device snapshot.
    ///
    /// `last_updated` is always set by the manager; the caller's value is
    /// ignored. Returns the stored copy.
    pub async fn update_device_state(&self, mut state: DeviceState) -> StateResult<DeviceState> {
        if state.id.trim().is_empty() {
            return Err(StateError::InvalidDevice("device id is empty".to_string()));
        }

        let mut devices = self.devices.write().await;
        let previous = devices.get(&state.id).map(|d| d.last_updated);
        let created = previous.is_none();
        state.last_updated = next_stamp(previous);
        devices.insert(state.id.clone(), state.clone());
        drop(devices);

        debug!(
            device_id = %state.id,
            status = %state.status,
            created,
            last_updated = state.last_updated,
            "device state stored"
        );
        Ok(state)
    }

    /// Mutate an existing device in place and restamp it.
    ///
    /// The closure must not change the device ID; any change is reverted.
    pub async fn modify<F>(&self, id: &str, f: F) -> StateResult<DeviceState>
    where
        F: FnOnce(&mut DeviceState) + Send,
    {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(id)
            .ok_or_else(|| StateError::DeviceNotFound(id.to_string()))?;

        f(device);
        device.id = id.to_string();
        device.last_updated = next_stamp(Some(device.last_updated));
        let snapshot = device.clone();
        drop(devices);

        debug!(device_id = %id, last_updated = snapshot.last_updated, "device state modified");
        Ok(snapshot)
    }

    /// Replace a device's telemetry.
    pub async fn update_metrics(
        &self,
        id: &str,
        metrics: DeviceMetrics,
    ) -> StateResult<DeviceState> {
        self.modify(id, |d| d.metrics = metrics).await
    }

    /// Replace a device's operational label.
    pub async fn update_status(&self, id: &str, status: &str) -> StateResult<DeviceState> {
        self.modify(id, |d| d.status = status.to_string()).await
    }

    /// Get a copy of a device's state.
    pub async fn get_device_state(&self, id: &str) -> StateResult<DeviceState> {
        let devices = self.devices.read().await;
        devices
            .get(id)
            .cloned()
            .ok_or_else(|| StateError::DeviceNotFound(id.to_string()))
    }

    /// Snapshot of every device, ordered by ID.
    pub async fn list_devices(&self) -> Vec<DeviceState> {
        let devices = self.devices.read().await;
        let mut snapshot: Vec<DeviceState> = devices.values().cloned().collect();
        drop(devices);
        snapshot.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot
    }

    /// Remove a device. Returns true if it existed; absent IDs are not an error.
    pub async fn remove_device(&self, id: &str) -> bool {
        let existed = self.devices.write().await.remove(id).is_some();
        debug!(device_id = %id, existed, "device removed");
        existed
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.devices.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

/// Wall-clock time, bumped past `previous` when the clock has not moved
/// (or moved backwards) since the last write.
fn next_stamp(previous: Option<u64>) -> u64 {
    let now = epoch_millis();
    match previous {
        Some(prev) if now <= prev => prev + 1,
        _ => now,
    }
}
