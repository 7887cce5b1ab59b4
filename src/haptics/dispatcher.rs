//! Capability registry for physical haptic targets
//!
//! Physical devices register under their serial; the force feedback bridge
//! only knows the serial it was told to forward to and looks the target up
//! on every dispatch.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum HapticError {
    #[error("Device rejected haptic command: {0}")]
    Rejected(String),

    #[error("Device communication failed: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No haptic target registered for '{0}'")]
    UnknownDevice(String),

    #[error("Haptic target '{device_id}' failed: {source}")]
    Target {
        device_id: String,
        #[source]
        source: HapticError,
    },
}

/// Commands a haptic target understands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HapticCommand {
    /// Motor intensities, 0 = off
    Rumble { left: u8, right: u8 },
}

impl HapticCommand {
    pub const STOP: Self = Self::Rumble { left: 0, right: 0 };
}

/// A physical device able to drive two rumble motors
pub trait HapticTarget: Send + Sync {
    fn trigger_haptics(&self, left: u8, right: u8) -> Result<(), HapticError>;
}

/// Maps device identifiers to their haptic implementation
#[derive(Default)]
pub struct HapticRegistry {
    targets: RwLock<HashMap<String, Arc<dyn HapticTarget>>>,
}

impl HapticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, device_id: impl Into<String>, target: Arc<dyn HapticTarget>) {
        let device_id = device_id.into();
        info!("Registered haptic target '{}'", device_id);
        if self.targets.write().insert(device_id.clone(), target).is_some() {
            warn!("Replaced existing haptic target '{}'", device_id);
        }
    }

    pub fn unregister(&self, device_id: &str) -> bool {
        let removed = self.targets.write().remove(device_id).is_some();
        if removed {
            info!("Unregistered haptic target '{}'", device_id);
        }
        removed
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.targets.read().contains_key(device_id)
    }

    /// Delivers `command` to the target registered as `device_id`.
    /// The registry lock is released before the target is invoked.
    pub fn dispatch(&self, device_id: &str, command: HapticCommand) -> Result<(), DispatchError> {
        let target = self
            .targets
            .read()
            .get(device_id)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownDevice(device_id.to_string()))?;

        debug!("Dispatching {:?} to '{}'", command, device_id);
        match command {
            HapticCommand::Rumble { left, right } => target
                .trigger_haptics(left, right)
                .map_err(|source| DispatchError::Target {
                    device_id: device_id.to_string(),
                    source,
                }),
        }
    }
}
