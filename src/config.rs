//! Bridge configuration stored as TOML
//!
//! Lives at `<config dir>/vhid-bridge/config.toml` unless a path is given.
//! A missing file is created with defaults on first start.

use crate::axis::{PointerShaping, MOUSE_CURVE_GAMMA, MOUSE_DEADZONE};
use crate::haptics::RUMBLE_FALLBACK;
use crate::uinput::device::DeviceProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "vhid-bridge";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No configuration directory available on this system")]
    NoConfigDir,

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GamepadConfig {
    pub enabled: bool,
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    /// At least one slot; uinput refuses an FF device without any
    pub ff_effects_max: u32,
    /// Safety stop for effects without a usable length; 0 means the default
    pub rumble_fallback_ms: u64,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "vhid-bridge Virtual Gamepad".to_string(),
            vendor_id: 0x1209,
            product_id: 0x0001,
            ff_effects_max: 16,
            rumble_fallback_ms: 1000,
        }
    }
}

impl GamepadConfig {
    pub fn profile(&self) -> DeviceProfile {
        let mut profile = DeviceProfile::gamepad(&self.name, self.vendor_id, self.product_id);
        if self.ff_effects_max == 0 {
            warn!("gamepad.ff_effects_max = 0 is not accepted by uinput, using 1");
        }
        profile.ff_effects_max = self.ff_effects_max.max(1);
        profile
    }

    pub fn rumble_fallback(&self) -> Duration {
        if self.rumble_fallback_ms == 0 {
            warn!(
                "gamepad.rumble_fallback_ms = 0 would stop every effect at once, using {:?}",
                RUMBLE_FALLBACK
            );
            return RUMBLE_FALLBACK;
        }
        Duration::from_millis(self.rumble_fallback_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MouseConfig {
    pub enabled: bool,
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub deadzone: f64,
    pub curve_gamma: f64,
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "vhid-bridge Virtual Mouse".to_string(),
            vendor_id: 0x1209,
            product_id: 0x0002,
            deadzone: MOUSE_DEADZONE,
            curve_gamma: MOUSE_CURVE_GAMMA,
        }
    }
}

impl MouseConfig {
    pub fn profile(&self) -> DeviceProfile {
        DeviceProfile::mouse(&self.name, self.vendor_id, self.product_id)
    }

    pub fn shaping(&self) -> PointerShaping {
        PointerShaping {
            deadzone: self.deadzone,
            curve_gamma: self.curve_gamma,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct HapticsConfig {
    /// Physical device rumble is forwarded to; empty disables forwarding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub gamepad: GamepadConfig,
    pub mouse: MouseConfig,
    pub haptics: HapticsConfig,
}

impl BridgeConfig {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Loads `path`, writing defaults there first if nothing exists yet
    pub async fn load_or_create(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| io_error(path, source))?;

        if !exists {
            warn!("No configuration at {}, writing defaults", path.display());
            let config = Self::default();
            config.save(path).await?;
            return Ok(config);
        }

        Self::load(path).await
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| io_error(path, source))?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded configuration from {}", path.display());
        debug!("{:?}", config);
        Ok(config)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| io_error(path, source))?;
        debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Serial with blank values treated as unset
    pub fn haptic_serial(&self) -> Option<String> {
        self.haptics
            .serial
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}
