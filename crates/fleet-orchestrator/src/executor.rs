//! The device execution boundary.
//!
//! Implementations talk to real hardware (or an edge agent) and may block
//! on network I/O. The orchestrator never holds a scheduler or state lock
//! while awaiting these futures.

use std::future::Future;
use std::pin::Pin;

use fleet_core::{DeviceMetrics, Operation};

/// Boxed future returned by executor calls. Errors are surfaced verbatim.
pub type ExecutorFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send + 'a>>;

/// Performs operations on individual devices — injected for testability.
pub trait DeviceExecutor: Send + Sync {
    /// Perform one operation on one device.
    fn execute_operation<'a>(
        &'a self,
        device_id: &'a str,
        operation: &'a Operation,
    ) -> ExecutorFuture<'a, ()>;

    /// Pull current telemetry for a device. `Ok(None)` means the executor
    /// has no telemetry to offer.
    fn device_metrics<'a>(&'a self, _device_id: &'a str) -> ExecutorFuture<'a, Option<DeviceMetrics>> {
        Box::pin(async { Ok(None) })
    }
}
