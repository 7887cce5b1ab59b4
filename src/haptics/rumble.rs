//! Rumble forwarding and the safety timer that guarantees motors stop
//!
//! Every play/stop event bumps a generation counter in [`RumbleState`].
//! A play event arms a [`RumbleSafetyTimer`] for its generation; when the timer
//! expires it only acts if nothing newer has happened since. Superseded timers
//! are cancelled logically by that check, never interrupted.
//!
//! Generations are assigned and dispatched under one dispatch lock, so the
//! command that reaches the motors last always belongs to the newest
//! generation.

use super::dispatcher::{HapticCommand, HapticRegistry};
use crate::uinput::abi::FF_LENGTH_INFINITE;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Wait used when an effect has no usable length (0 or infinite)
pub const RUMBLE_FALLBACK: Duration = Duration::from_millis(1000);

/// 16-bit force feedback magnitude → 8-bit motor intensity, floored
pub fn mag_to_byte(magnitude: u16) -> u8 {
    ((u32::from(magnitude) * 255) / 65535) as u8
}

/// Last intensities sent to the physical device plus the generation they belong to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RumbleState {
    pub last_left: u8,
    pub last_right: u8,
    pub generation: u64,
}

impl RumbleState {
    pub fn is_active(&self) -> bool {
        self.last_left != 0 || self.last_right != 0
    }
}

/// One play or stop request coming out of the force feedback bridge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RumblePlayback {
    pub strong: u16,
    pub weak: u16,
    pub length_ms: u16,
    pub playing: bool,
}

impl RumblePlayback {
    pub fn play(strong: u16, weak: u16, length_ms: u16) -> Self {
        Self {
            strong,
            weak,
            length_ms,
            playing: true,
        }
    }

    pub fn stop() -> Self {
        Self {
            strong: 0,
            weak: 0,
            length_ms: 0,
            playing: false,
        }
    }
}

/// Receiver of play/stop requests
pub trait RumbleSink: Send + Sync {
    fn on_rumble(&self, playback: RumblePlayback);
}

/// Forwards rumble to the physical device registered under the haptic serial
#[derive(Clone)]
pub struct RumbleController {
    registry: Arc<HapticRegistry>,
    serial: Arc<RwLock<Option<String>>>,
    state: Arc<Mutex<RumbleState>>,
    dispatch: Arc<Mutex<()>>,
    fallback: Duration,
}

impl RumbleController {
    pub fn new(registry: Arc<HapticRegistry>, fallback: Duration) -> Self {
        Self {
            registry,
            serial: Arc::new(RwLock::new(None)),
            state: Arc::new(Mutex::new(RumbleState::default())),
            dispatch: Arc::new(Mutex::new(())),
            fallback,
        }
    }

    /// Installs (or clears) the device id rumble is forwarded to
    pub fn set_serial(&self, serial: Option<String>) {
        info!("Haptic forwarding serial set to {:?}", serial);
        *self.serial.write() = serial;
    }

    pub fn serial(&self) -> Option<String> {
        self.serial.read().clone()
    }

    pub fn state(&self) -> RumbleState {
        *self.state.lock()
    }

    /// How long a play event may run before the safety timer stops it
    pub fn wait_for(&self, length_ms: u16) -> Duration {
        if length_ms == 0 || length_ms == FF_LENGTH_INFINITE {
            self.fallback
        } else {
            Duration::from_millis(u64::from(length_ms))
        }
    }

    /// Applies a play/stop request; returns the safety timer task if one was armed
    pub fn handle_playback(&self, playback: RumblePlayback) -> Option<JoinHandle<bool>> {
        let (left, right) = if playback.playing {
            (mag_to_byte(playback.strong), mag_to_byte(playback.weak))
        } else {
            (0, 0)
        };

        let generation = {
            let _dispatch = self.dispatch.lock();
            let generation = {
                let mut state = self.state.lock();
                state.last_left = left;
                state.last_right = right;
                state.generation += 1;
                state.generation
            };
            self.send(left, right);
            generation
        };
        debug!(
            "Rumble generation {}: left={} right={} playing={}",
            generation, left, right, playback.playing
        );

        if playback.playing && (left != 0 || right != 0) {
            let timer = RumbleSafetyTimer::new(generation, self.wait_for(playback.length_ms));
            Some(timer.arm(self.clone()))
        } else {
            None
        }
    }

    fn send(&self, left: u8, right: u8) {
        let Some(serial) = self.serial() else {
            debug!("No haptic serial installed, dropping rumble {}/{}", left, right);
            return;
        };

        if let Err(e) = self
            .registry
            .dispatch(&serial, HapticCommand::Rumble { left, right })
        {
            warn!(error = %e, serial = %serial, "Failed to forward rumble");
        }
    }
}

impl RumbleSink for RumbleController {
    fn on_rumble(&self, playback: RumblePlayback) {
        // Timer runs detached
        let _ = self.handle_playback(playback);
    }
}

/// Stops the motors if a play event is never followed by anything newer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RumbleSafetyTimer {
    generation: u64,
    wait: Duration,
}

impl RumbleSafetyTimer {
    pub fn new(generation: u64, wait: Duration) -> Self {
        Self { generation, wait }
    }

    /// Spawns the timer task. Resolves to `true` when it had to stop the motors.
    pub fn arm(self, controller: RumbleController) -> JoinHandle<bool> {
        tokio::spawn(async move {
            tokio::time::sleep(self.wait).await;
            self.fire(&controller)
        })
    }

    fn fire(&self, controller: &RumbleController) -> bool {
        let _dispatch = controller.dispatch.lock();
        if !self.expire(&controller.state) {
            return false;
        }

        warn!(
            "Rumble generation {} never stopped after {:?}, forcing stop",
            self.generation, self.wait
        );
        controller.send(0, 0);
        true
    }

    /// Zeroes the state if it still belongs to this timer's generation.
    /// Check, zero and bump happen under one lock.
    pub fn expire(&self, state: &Mutex<RumbleState>) -> bool {
        let mut state = state.lock();
        if state.generation != self.generation || !state.is_active() {
            return false;
        }
        state.last_left = 0;
        state.last_right = 0;
        state.generation += 1;
        true
    }
}
