//! Error types for the device state manager.

use thiserror::Error;

/// Result type alias for device state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during device state operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("invalid device: {0}")]
    InvalidDevice(String),
}
