use crate::config::ConfigError;
use crate::haptics::{BridgeError, DispatchError, HapticError};
use crate::input_manager::controls::ControlError;
use crate::uinput::{CodecError, DeviceError, EmitError};

/// Any failure surfaced by this crate
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// Opening, configuring or creating a virtual device failed
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Emit error: {0}")]
    Emit(#[from] EmitError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Control lookup by id or name failed
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Haptic error: {0}")]
    Haptic(#[from] HapticError),

    #[error("Force feedback bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
