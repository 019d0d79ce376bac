//! Simulated execution boundary for dry runs.
//!
//! Stands in for real device drivers: operations on configured devices
//! fail, everything else succeeds after an optional delay. Telemetry is
//! derived from how many operations each device has seen.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use fleet_core::{DeviceMetrics, Operation};
use fleet_orchestrator::{DeviceExecutor, ExecutorFuture};

use crate::manifest::SimulationConfig;

pub struct SimulatedExecutor {
    failing: HashSet<String>,
    latency: Duration,
    /// Successful operations per device.
    operations: Mutex<HashMap<String, u32>>,
}

impl SimulatedExecutor {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            failing: config.failing_devices.iter().cloned().collect(),
            latency: Duration::from_millis(config.latency_ms),
            operations: Mutex::new(HashMap::new()),
        }
    }

    fn operation_count(&self, device_id: &str) -> u32 {
        self.counts().get(device_id).copied().unwrap_or(0)
    }

    /// The counters stay consistent even if a holder panicked, so a
    /// poisoned lock is recovered rather than treated as empty.
    fn counts(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DeviceExecutor for SimulatedExecutor {
    fn execute_operation<'a>(
        &'a self,
        device_id: &'a str,
        operation: &'a Operation,
    ) -> ExecutorFuture<'a, ()> {
        Box::pin(async move {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.failing.contains(device_id) {
                return Err(format!("simulated failure applying {operation}"));
            }
            *self.counts().entry(device_id.to_string()).or_insert(0) += 1;
            debug!(%device_id, %operation, "simulated operation applied");
            Ok(())
        })
    }

    fn device_metrics<'a>(&'a self, device_id: &'a str) -> ExecutorFuture<'a, Option<DeviceMetrics>> {
        Box::pin(async move {
            let ops = self.operation_count(device_id) as f64;
            Ok(Some(DeviceMetrics {
                load: (0.1 * ops).min(1.0),
                temperature_c: 40.0 + 2.5 * ops,
                power_w: 5.0 + ops,
            }))
        })
    }
}
