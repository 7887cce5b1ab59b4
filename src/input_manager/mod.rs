//! Input Manager - Public API of the virtual HID layer
//!
//! Owns the virtual gamepad and mouse, turns decoded samples from the physical
//! peripheral into event bursts, and wires the gamepad's force feedback back to
//! the physical device through the haptic registry.
//!
//! Control operations never return emission errors. Failures are logged with
//! their context and the operation is dropped, so a flaky device never stalls
//! the caller's input loop.

pub mod controls;

use crate::axis::{clamp_stick, decode_sample, map_trigger_deadzone, mouse_delta, PointerShaping};
use crate::config::BridgeConfig;
use crate::error::InputError;
use crate::haptics::{
    BridgeError, BridgeStats, ForceFeedbackBridge, HapticRegistry, RumbleController,
};
use crate::uinput::codes::{
    ABS_RX, ABS_RY, ABS_RZ, ABS_X, ABS_Y, ABS_Z, EV_ABS, EV_REL, REL_X, REL_Y, UINPUT_PATH,
};
use crate::uinput::device::{DeviceError, DeviceProfile, Live, Opened, VirtualDevice};
use crate::uinput::emitter::emit_burst;
use crate::uinput::event::HidEvent;
use crate::uinput::sys::UinputIo;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use controls::{ControlError, ControlMode, ControlTarget, GamepadControl};

/// Pause between the down and up halves of a tapped control
pub const TAP_INTERVAL: Duration = Duration::from_millis(20);

/// Produces an opened, unconfigured device for a profile
pub type DeviceOpener =
    dyn Fn(DeviceProfile) -> Result<VirtualDevice<Opened>, DeviceError> + Send + Sync;

struct GamepadSlot {
    device: VirtualDevice<Live>,
    bridge: JoinHandle<Result<BridgeStats, BridgeError>>,
}

/// Facade over the virtual gamepad, the virtual mouse and rumble forwarding
///
/// At most one device of each kind exists at a time. Enabling an already
/// enabled device recreates it. Device handles are cloned out of their slot
/// before any write, so no lock is held across a syscall.
///
/// Enabling the gamepad spawns its force feedback bridge and therefore must
/// happen inside a tokio runtime.
pub struct InputManager {
    config: BridgeConfig,
    opener: Box<DeviceOpener>,
    gamepad: Mutex<Option<GamepadSlot>>,
    mouse: Mutex<Option<VirtualDevice<Live>>>,
    rumble: RumbleController,
}

impl InputManager {
    pub fn new(config: BridgeConfig, registry: Arc<HapticRegistry>) -> Self {
        Self::with_opener(config, registry, |profile| {
            VirtualDevice::<Opened>::open(UINPUT_PATH, profile)
        })
    }

    /// Uses `opener` instead of `/dev/uinput` to obtain device handles
    pub fn with_opener<F>(config: BridgeConfig, registry: Arc<HapticRegistry>, opener: F) -> Self
    where
        F: Fn(DeviceProfile) -> Result<VirtualDevice<Opened>, DeviceError> + Send + Sync + 'static,
    {
        let rumble = RumbleController::new(registry, config.gamepad.rumble_fallback());
        rumble.set_serial(config.haptic_serial());

        Self {
            config,
            opener: Box::new(opener),
            gamepad: Mutex::new(None),
            mouse: Mutex::new(None),
            rumble,
        }
    }

    pub fn rumble(&self) -> &RumbleController {
        &self.rumble
    }

    pub fn is_gamepad_enabled(&self) -> bool {
        self.gamepad.lock().is_some()
    }

    pub fn is_mouse_enabled(&self) -> bool {
        self.mouse.lock().is_some()
    }

    /// Creates the virtual gamepad and starts its force feedback bridge
    pub fn enable_gamepad(&self) -> Result<(), InputError> {
        self.disable_gamepad();

        let profile = self.config.gamepad.profile();
        info!("Enabling virtual gamepad '{}'", profile.name);
        let device = (self.opener)(profile)
            .and_then(|opened| opened.configure())
            .and_then(|configured| configured.create())
            .map_err(|e| {
                error!(error = %e, "Failed to enable virtual gamepad");
                e
            })?;

        let bridge = ForceFeedbackBridge::new(
            device.shared_io(),
            device.running(),
            Arc::new(self.rumble.clone()),
        )
        .spawn();

        *self.gamepad.lock() = Some(GamepadSlot { device, bridge });
        Ok(())
    }

    /// Destroys the virtual gamepad; no-op when none exists
    pub fn disable_gamepad(&self) {
        let Some(slot) = self.gamepad.lock().take() else {
            return;
        };
        slot.device.destroy();
        // The bridge sees the cleared running flag on its next iteration
        debug!("Bridge task finished: {}", slot.bridge.is_finished());
    }

    pub fn enable_mouse(&self) -> Result<(), InputError> {
        self.disable_mouse();

        let profile = self.config.mouse.profile();
        info!("Enabling virtual mouse '{}'", profile.name);
        let device = (self.opener)(profile)
            .and_then(|opened| opened.configure())
            .and_then(|configured| configured.create())
            .map_err(|e| {
                error!(error = %e, "Failed to enable virtual mouse");
                e
            })?;

        *self.mouse.lock() = Some(device);
        Ok(())
    }

    /// Destroys the virtual mouse; no-op when none exists
    pub fn disable_mouse(&self) {
        if let Some(device) = self.mouse.lock().take() {
            device.destroy();
        }
    }

    /// Tears down both devices
    pub fn shutdown(&self) {
        info!("Shutting down virtual devices");
        self.disable_gamepad();
        self.disable_mouse();
    }

    /// Installs (or clears) the serial rumble is forwarded to
    pub fn set_haptic_serial(&self, serial: Option<String>) {
        self.rumble.set_serial(serial);
    }

    fn gamepad_io(&self) -> Option<Arc<dyn UinputIo>> {
        let io = self.gamepad.lock().as_ref().map(|s| s.device.shared_io());
        if io.is_none() {
            error!("Virtual gamepad is not present");
        }
        io
    }

    fn mouse_io(&self) -> Option<Arc<dyn UinputIo>> {
        let io = self.mouse.lock().as_ref().map(|d| d.shared_io());
        if io.is_none() {
            error!("Virtual mouse is not present");
        }
        io
    }

    /// Actuates a gamepad control
    ///
    /// `Press` sends the down burst, waits [`TAP_INTERVAL`], then sends the up
    /// burst. `Hold` and `Release` send a single burst.
    pub async fn emit_control(&self, control: GamepadControl, mode: ControlMode) {
        let Some(io) = self.gamepad_io() else {
            return;
        };
        debug!("Control {} ({:?})", control, mode);

        match mode {
            ControlMode::Press => {
                if emit_burst(Some(io.as_ref()), &[control.event(true)]).is_err() {
                    return;
                }
                tokio::time::sleep(TAP_INTERVAL).await;
                let _ = emit_burst(Some(io.as_ref()), &[control.event(false)]);
            }
            ControlMode::Hold => {
                let _ = emit_burst(Some(io.as_ref()), &[control.event(true)]);
            }
            ControlMode::Release => {
                let _ = emit_burst(Some(io.as_ref()), &[control.event(false)]);
            }
        }
    }

    pub async fn emit_control_id(&self, id: u16, mode: ControlMode) -> Result<(), InputError> {
        let control = GamepadControl::from_id(id)?;
        self.emit_control(control, mode).await;
        Ok(())
    }

    pub async fn emit_control_named(&self, name: &str, mode: ControlMode) -> Result<(), InputError> {
        let control: GamepadControl = name.parse()?;
        self.emit_control(control, mode).await;
        Ok(())
    }

    /// Moves one stick from a raw `(x, y)` sample
    ///
    /// Module 0 is the left stick, module 1 the right one. `invert` negates Y
    /// after clamping, so a raw -32768 becomes 32768.
    pub fn update_thumbsticks(&self, bytes: &[u8], module: u8, invert: bool) {
        let Some((x, y)) = decode_sample(bytes) else {
            return;
        };

        let (x_axis, y_axis) = match module {
            0 => (ABS_X, ABS_Y),
            1 => (ABS_RX, ABS_RY),
            _ => {
                warn!(module, "Unknown thumbstick module");
                return;
            }
        };

        let x = clamp_stick(i32::from(x));
        let mut y = clamp_stick(i32::from(y));
        if invert {
            y = -y;
        }

        let Some(io) = self.gamepad_io() else {
            return;
        };
        let _ = emit_burst(
            Some(io.as_ref()),
            &[
                HidEvent::new(EV_ABS, x_axis, x),
                HidEvent::new(EV_ABS, y_axis, y),
            ],
        );
    }

    /// Moves both triggers from raw 0..1023 values through the inner/outer deadzones
    pub fn update_triggers(&self, left: i32, right: i32, min_pct: u8, max_pct: u8) {
        let left = map_trigger_deadzone(left, i32::from(min_pct), i32::from(max_pct));
        let right = map_trigger_deadzone(right, i32::from(min_pct), i32::from(max_pct));

        let Some(io) = self.gamepad_io() else {
            return;
        };
        let _ = emit_burst(
            Some(io.as_ref()),
            &[
                HidEvent::new(EV_ABS, ABS_Z, left),
                HidEvent::new(EV_ABS, ABS_RZ, right),
            ],
        );
    }

    /// Moves the pointer from a raw `(x, y)` stick sample
    ///
    /// Axes resting in the deadzone produce no record; the sync is always sent.
    pub fn move_mouse(&self, bytes: &[u8], invert: bool, sensitivity_x: u8, sensitivity_y: u8) {
        let Some((x, y)) = decode_sample(bytes) else {
            return;
        };
        let delta = mouse_delta(
            x,
            y,
            self.pointer_shaping(),
            sensitivity_x,
            sensitivity_y,
            invert,
        );

        let Some(io) = self.mouse_io() else {
            return;
        };

        let events: Vec<HidEvent> = [(REL_X, delta.dx), (REL_Y, delta.dy)]
            .into_iter()
            .filter_map(|(axis, value)| value.map(|v| HidEvent::new(EV_REL, axis, v)))
            .collect();
        let _ = emit_burst(Some(io.as_ref()), &events);
    }

    fn pointer_shaping(&self) -> PointerShaping {
        self.config.mouse.shaping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haptics::dispatcher::recording::RecordingTarget;
    use crate::uinput::abi::{FfEffect, FfUpload};
    use crate::uinput::codes::{
        ABS_HAT0Y, BTN_SOUTH, EV_FF, EV_KEY, EV_UINPUT, UI_FF_UPLOAD,
    };
    use crate::uinput::sys::fake::{Call, FakeUinput, Pending};
    use std::io;

    struct Harness {
        manager: InputManager,
        gamepad: Arc<FakeUinput>,
        mouse: Arc<FakeUinput>,
        target: Arc<RecordingTarget>,
    }

    fn harness() -> Harness {
        let gamepad = Arc::new(FakeUinput::default());
        let mouse = Arc::new(FakeUinput::default());
        let registry = Arc::new(HapticRegistry::new());
        let target = Arc::new(RecordingTarget::default());
        registry.register("PAD-1", target.clone());

        let mut config = BridgeConfig::default();
        config.haptics.serial = Some("PAD-1".to_string());

        let (g, m) = (gamepad.clone(), mouse.clone());
        let manager = InputManager::with_opener(config, registry, move |profile| {
            let io: Arc<dyn UinputIo> = match profile.kind {
                crate::uinput::DeviceKind::Gamepad => g.clone(),
                crate::uinput::DeviceKind::Mouse => m.clone(),
            };
            Ok(VirtualDevice::<Opened>::from_io(io, profile))
        });

        Harness {
            manager,
            gamepad,
            mouse,
            target,
        }
    }

    #[tokio::test]
    async fn thumbstick_extremes_with_inversion_on_right_stick() {
        let h = harness();
        h.manager.enable_gamepad().unwrap();

        h.manager
            .update_thumbsticks(&[0xFF, 0x7F, 0x00, 0x80], 1, true);

        assert_eq!(
            h.gamepad.written_events(),
            vec![
                HidEvent::new(EV_ABS, ABS_RX, 32767),
                HidEvent::new(EV_ABS, ABS_RY, 32768),
                HidEvent::sync(),
            ]
        );
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn left_stick_without_inversion() {
        let h = harness();
        h.manager.enable_gamepad().unwrap();

        h.manager.update_thumbsticks(&[0x10, 0x00, 0xF0, 0xFF], 0, false);

        assert_eq!(
            h.gamepad.written_events(),
            vec![
                HidEvent::new(EV_ABS, ABS_X, 16),
                HidEvent::new(EV_ABS, ABS_Y, -16),
                HidEvent::sync(),
            ]
        );
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn short_or_unknown_samples_emit_nothing() {
        let h = harness();
        h.manager.enable_gamepad().unwrap();

        h.manager.update_thumbsticks(&[0x01, 0x02, 0x03], 0, false);
        h.manager.update_thumbsticks(&[0, 0, 0, 0], 7, false);
        h.manager.move_mouse(&[0x01], false, 10, 10);

        assert!(h.gamepad.written_events().is_empty());
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn triggers_emit_both_axes_in_one_burst() {
        let h = harness();
        h.manager.enable_gamepad().unwrap();

        h.manager.update_triggers(0, 1023, 5, 5);

        assert_eq!(
            h.gamepad.written_events(),
            vec![
                HidEvent::new(EV_ABS, ABS_Z, 0),
                HidEvent::new(EV_ABS, ABS_RZ, 1023),
                HidEvent::sync(),
            ]
        );
        h.manager.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn press_taps_with_pause() {
        let h = harness();
        h.manager.enable_gamepad().unwrap();

        let start = tokio::time::Instant::now();
        h.manager
            .emit_control(GamepadControl::A, ControlMode::Press)
            .await;
        assert!(start.elapsed() >= TAP_INTERVAL);

        assert_eq!(
            h.gamepad.written_events(),
            vec![
                HidEvent::new(EV_KEY, BTN_SOUTH, 1),
                HidEvent::sync(),
                HidEvent::new(EV_KEY, BTN_SOUTH, 0),
                HidEvent::sync(),
            ]
        );
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn hold_and_release_by_name_and_id() {
        let h = harness();
        h.manager.enable_gamepad().unwrap();

        h.manager
            .emit_control_named("hat_up", ControlMode::Hold)
            .await
            .unwrap();
        h.manager
            .emit_control_id(GamepadControl::HatUp.id(), ControlMode::Release)
            .await
            .unwrap();

        assert_eq!(
            h.gamepad.written_events(),
            vec![
                HidEvent::new(EV_ABS, ABS_HAT0Y, -1),
                HidEvent::sync(),
                HidEvent::new(EV_ABS, ABS_HAT0Y, 0),
                HidEvent::sync(),
            ]
        );

        let err = h
            .manager
            .emit_control_named("warp", ControlMode::Press)
            .await
            .unwrap_err();
        assert!(matches!(err, InputError::Control(_)));
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn controls_without_gamepad_are_dropped() {
        let h = harness();
        h.manager
            .emit_control(GamepadControl::Start, ControlMode::Hold)
            .await;
        h.manager.update_triggers(500, 500, 5, 5);
        assert!(h.gamepad.calls().is_empty());
    }

    #[tokio::test]
    async fn mouse_skips_resting_axis_but_syncs() {
        let h = harness();
        h.manager.enable_mouse().unwrap();

        // x at full deflection, y inside the deadzone
        h.manager.move_mouse(&[0xFF, 0x7F, 0x10, 0x00], false, 15, 15);

        assert_eq!(
            h.mouse.written_events(),
            vec![HidEvent::new(EV_REL, REL_X, 15), HidEvent::sync()]
        );
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn mouse_inversion_flips_y() {
        let h = harness();
        h.manager.enable_mouse().unwrap();

        h.manager.move_mouse(&[0x00, 0x00, 0xFF, 0x7F], true, 15, 12);

        assert_eq!(
            h.mouse.written_events(),
            vec![HidEvent::new(EV_REL, REL_Y, -12), HidEvent::sync()]
        );
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn enabling_twice_recreates_device() {
        let h = harness();
        h.manager.enable_gamepad().unwrap();
        h.manager.enable_gamepad().unwrap();

        let calls = h.gamepad.calls();
        assert_eq!(calls.iter().filter(|c| **c == Call::Create).count(), 2);
        assert_eq!(calls.iter().filter(|c| **c == Call::Destroy).count(), 1);
        h.manager.shutdown();
        assert!(!h.manager.is_gamepad_enabled());
    }

    #[tokio::test]
    async fn disable_without_device_is_noop() {
        let h = harness();
        h.manager.disable_gamepad();
        h.manager.disable_mouse();
        assert!(h.gamepad.calls().is_empty());
        assert!(h.mouse.calls().is_empty());
    }

    #[tokio::test]
    async fn enable_failure_is_propagated() {
        let manager = InputManager::with_opener(
            BridgeConfig::default(),
            Arc::new(HapticRegistry::new()),
            |_| {
                Err(DeviceError::Unavailable {
                    path: UINPUT_PATH.to_string(),
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                })
            },
        );

        let err = manager.enable_gamepad().unwrap_err();
        assert!(matches!(
            err,
            InputError::Device(DeviceError::Unavailable { .. })
        ));
        assert!(!manager.is_gamepad_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn game_rumble_reaches_physical_device_and_stops() {
        let h = harness();
        h.gamepad.push_pending(Pending::Upload(Ok(FfUpload {
            effect: FfEffect::rumble(0, 0xFFFF, 0x8000, 100),
            ..FfUpload::default()
        })));
        h.gamepad
            .push_event(HidEvent::new(EV_UINPUT, UI_FF_UPLOAD, 1));
        h.gamepad.push_event(HidEvent::new(EV_FF, 0, 1));

        h.manager.enable_gamepad().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.target.commands(), vec![(255, 127)]);

        // The game never stops the effect; the safety timer does
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.target.commands(), vec![(255, 127), (0, 0)]);
        h.manager.shutdown();
    }
}
