//! fleet-state — the device state manager.
//!
//! Holds the authoritative in-memory record of every known device. The
//! manager is `Clone` + `Send` + `Sync` (backed by `Arc<RwLock<..>>`) and
//! can be shared across async tasks. Readers always receive copies, never
//! references into the live map.
//!
//! The manager owns `DeviceState::last_updated`: every write stamps it,
//! and successive writes to the same device strictly increase it.

pub mod error;
pub mod manager;

pub use error::{StateError, StateResult};
pub use manager::DeviceStateManager;
