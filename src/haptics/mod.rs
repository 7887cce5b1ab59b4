//! Force feedback path from games to physical rumble motors
//!
//! ```text
//! kernel FF events → ff_bridge → rumble::RumbleController → HapticRegistry → HapticTarget
//! ```

pub mod dispatcher;
pub mod effects;
pub mod ff_bridge;
pub mod rumble;

pub use dispatcher::{DispatchError, HapticCommand, HapticError, HapticRegistry, HapticTarget};
pub use effects::{EffectRecord, EffectStore};
pub use ff_bridge::{BridgeError, BridgeStats, ForceFeedbackBridge};
pub use rumble::{
    mag_to_byte, RumbleController, RumblePlayback, RumbleSafetyTimer, RumbleSink, RumbleState,
    RUMBLE_FALLBACK,
};
