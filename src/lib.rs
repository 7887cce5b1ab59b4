//! Virtual HID gamepad and mouse on Linux uinput, with force feedback
//! forwarded to a physical device.

pub mod axis;
pub mod config;
pub mod error;
pub mod haptics;
pub mod input_manager;
pub mod uinput;

pub use config::{BridgeConfig, ConfigError};
pub use error::InputError;
pub use haptics::{HapticError, HapticRegistry, HapticTarget};
pub use input_manager::{ControlMode, GamepadControl, InputManager};
