//! Fleet manifest — devices and tasks to load at startup.
//!
//! ```toml
//! [[devices]]
//! id = "orin-01"
//! status = "online"
//! location = "lab/rack-1"
//!
//! [[tasks]]
//! id = "reboot-lab"
//! device_ids = ["orin-01"]
//! priority = 5
//! operation = { type = "reboot" }
//!
//! [simulation]
//! failing_devices = ["orin-02"]
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use fleet_core::{DeviceState, Task};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub devices: Vec<DeviceState>,
    pub tasks: Vec<Task>,
    pub simulation: SimulationConfig,
}

/// Behavior of the simulated execution boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Devices whose operations always fail.
    pub failing_devices: Vec<String>,
    /// Artificial latency per operation, in milliseconds.
    pub latency_ms: u64,
}

impl Manifest {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let manifest: Manifest = toml::from_str(content)?;
        manifest.check_unique_ids()?;
        Ok(manifest)
    }

    fn check_unique_ids(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            if !seen.insert(device.id.as_str()) {
                anyhow::bail!("duplicate device id in manifest: {}", device.id);
            }
        }
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id.as_str()) {
                anyhow::bail!("duplicate task id in manifest: {}", task.id);
            }
        }
        Ok(())
    }
}
