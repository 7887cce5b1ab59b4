//! Virtual device lifecycle
//!
//! A device moves through three states, enforced at compile time with statum:
//!
//! ```text
//! Opened ──configure()──► Configured ──create()──► Live ──destroy()──► (closed)
//! ```
//!
//! Any failure along the way consumes the device, which drops and closes the
//! kernel handle. No half-built device is left behind.

use super::abi::{
    DeviceCapabilityDescriptor, DESCRIPTOR_SIZE, UI_SET_ABSBIT, UI_SET_EVBIT, UI_SET_FFBIT,
    UI_SET_KEYBIT, UI_SET_RELBIT,
};
use super::codes::{
    EV_ABS, EV_FF, EV_KEY, EV_REL, EV_SYN, FF_RUMBLE, GAMEPAD_AXES, GAMEPAD_BUTTONS, MOUSE_AXES,
    MOUSE_BUTTONS, UINPUT_PATH,
};
use super::sys::{UinputFile, UinputIo};
use serde::{Deserialize, Serialize};
use statum::{machine, state};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The two device profiles this crate emulates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Gamepad,
    Mouse,
}

/// Identity and capability set of one virtual device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceProfile {
    pub kind: DeviceKind,
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Force feedback slots advertised to the kernel (gamepad only)
    pub ff_effects_max: u32,
}

impl DeviceProfile {
    pub fn gamepad(name: &str, vendor_id: u16, product_id: u16) -> Self {
        Self {
            kind: DeviceKind::Gamepad,
            name: name.to_string(),
            vendor_id,
            product_id,
            ff_effects_max: 16,
        }
    }

    pub fn mouse(name: &str, vendor_id: u16, product_id: u16) -> Self {
        Self {
            kind: DeviceKind::Mouse,
            name: name.to_string(),
            vendor_id,
            product_id,
            ff_effects_max: 0,
        }
    }

    /// Event-type and effect-type bits that must all register for the device to exist
    pub fn required_capabilities(&self) -> Vec<(u64, u16, &'static str)> {
        match self.kind {
            DeviceKind::Gamepad => vec![
                (UI_SET_EVBIT, EV_KEY, "EV_KEY"),
                (UI_SET_EVBIT, EV_ABS, "EV_ABS"),
                (UI_SET_EVBIT, EV_SYN, "EV_SYN"),
                (UI_SET_EVBIT, EV_FF, "EV_FF"),
                (UI_SET_FFBIT, FF_RUMBLE, "FF_RUMBLE"),
            ],
            DeviceKind::Mouse => vec![
                (UI_SET_EVBIT, EV_KEY, "EV_KEY"),
                (UI_SET_EVBIT, EV_REL, "EV_REL"),
                (UI_SET_EVBIT, EV_SYN, "EV_SYN"),
            ],
        }
    }

    pub fn button_codes(&self) -> &'static [u16] {
        match self.kind {
            DeviceKind::Gamepad => &GAMEPAD_BUTTONS,
            DeviceKind::Mouse => &MOUSE_BUTTONS,
        }
    }

    /// `(request, axis code)` pairs for per-axis registration
    pub fn axis_registrations(&self) -> Vec<(u64, u16)> {
        match self.kind {
            DeviceKind::Gamepad => GAMEPAD_AXES
                .iter()
                .map(|(axis, _, _)| (UI_SET_ABSBIT, *axis))
                .collect(),
            DeviceKind::Mouse => MOUSE_AXES.iter().map(|axis| (UI_SET_RELBIT, *axis)).collect(),
        }
    }

    pub fn descriptor(&self) -> DeviceCapabilityDescriptor {
        let mut desc = DeviceCapabilityDescriptor::new(&self.name, self.vendor_id, self.product_id)
            .with_ff_effects(self.ff_effects_max);

        if self.kind == DeviceKind::Gamepad {
            for (axis, min, max) in GAMEPAD_AXES {
                desc = desc.with_abs_range(axis, min, max);
            }
        }
        desc
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to open {path}: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to register {capability}: {source}")]
    Capability {
        capability: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write device descriptor: {0}")]
    Descriptor(#[source] io::Error),

    #[error("Short descriptor write: {written} bytes")]
    ShortDescriptor { written: usize },

    #[error("Failed to create device: {0}")]
    Create(#[source] io::Error),
}

#[state]
#[derive(Debug, Clone)]
pub enum DeviceState {
    Opened,     // Handle open, nothing registered
    Configured, // Capability bits registered
    Live,       // Kernel device exists
}

#[machine]
pub struct VirtualDevice<S: DeviceState> {
    io: Arc<dyn UinputIo>,
    profile: DeviceProfile,
    running: Arc<AtomicBool>,
}

impl<S: DeviceState> VirtualDevice<S> {
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }
}

impl VirtualDevice<Opened> {
    /// Opens the uinput control file read-write, non-blocking
    pub fn open(path: impl AsRef<Path>, profile: DeviceProfile) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let file = UinputFile::open(path).map_err(|source| {
            error!(error = %source, "Failed to open {}", path.display());
            DeviceError::Unavailable {
                path: path.display().to_string(),
                source,
            }
        })?;
        Ok(Self::from_io(Arc::new(file), profile))
    }

    /// Wraps an already opened handle
    pub fn from_io(io: Arc<dyn UinputIo>, profile: DeviceProfile) -> Self {
        debug!("Opened handle for {:?} '{}'", profile.kind, profile.name);
        Self::new(io, profile, Arc::new(AtomicBool::new(false)))
    }

    /// Registers event types, buttons and axes
    ///
    /// Event-type and effect-type bits are required; a single failure aborts.
    /// Individual button and axis codes are optional; failures are logged and
    /// the device continues with fewer capabilities.
    pub fn configure(self) -> Result<VirtualDevice<Configured>, DeviceError> {
        for (request, bit, capability) in self.profile.required_capabilities() {
            if let Err(source) = self.io.set_bit(request, bit) {
                error!(error = %source, capability, "Failed to register capability, closing handle");
                return Err(DeviceError::Capability { capability, source });
            }
        }

        let mut skipped = 0;
        for code in self.profile.button_codes() {
            if let Err(e) = self.io.set_bit(UI_SET_KEYBIT, *code) {
                error!(error = %e, code, "Failed to enable button code");
                skipped += 1;
            }
        }
        for (request, axis) in self.profile.axis_registrations() {
            if let Err(e) = self.io.set_bit(request, axis) {
                error!(error = %e, axis, "Failed to enable axis");
                skipped += 1;
            }
        }
        if skipped > 0 {
            warn!(
                "'{}' continues with {} capabilities missing",
                self.profile.name, skipped
            );
        }

        Ok(self.transition())
    }
}

impl VirtualDevice<Configured> {
    /// Writes the capability descriptor and asks the kernel to create the device
    pub fn create(self) -> Result<VirtualDevice<Live>, DeviceError> {
        let descriptor = self.profile.descriptor().encode();

        match self.io.write_record(&descriptor) {
            Ok(DESCRIPTOR_SIZE) => {}
            Ok(written) => {
                error!(written, "Short write of device descriptor, closing handle");
                return Err(DeviceError::ShortDescriptor { written });
            }
            Err(e) => {
                error!(error = %e, "Failed to write device descriptor, closing handle");
                return Err(DeviceError::Descriptor(e));
            }
        }

        if let Err(e) = self.io.dev_create() {
            error!(error = %e, "Failed to create virtual device, closing handle");
            return Err(DeviceError::Create(e));
        }

        self.running.store(true, Ordering::SeqCst);
        info!(
            "Created virtual {:?} '{}' ({:04x}:{:04x})",
            self.profile.kind, self.profile.name, self.profile.vendor_id, self.profile.product_id
        );
        Ok(self.transition())
    }
}

impl VirtualDevice<Live> {
    pub fn handle(&self) -> &dyn UinputIo {
        self.io.as_ref()
    }

    /// Shared handle for the force feedback reader
    pub fn shared_io(&self) -> Arc<dyn UinputIo> {
        Arc::clone(&self.io)
    }

    /// Flag the force feedback reader polls; cleared on destroy
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops readers, destroys the kernel device and closes the handle.
    /// A failing destroy call is logged, never returned.
    pub fn destroy(self) {
        self.running.store(false, Ordering::SeqCst);

        if let Err(e) = self.io.dev_destroy() {
            error!(error = %e, "Failed to destroy virtual {:?}", self.profile.kind);
        }

        info!(
            "Destroyed virtual {:?} '{}'",
            self.profile.kind, self.profile.name
        );
        // Dropping the last Arc closes the handle
    }
}

/// Opens `/dev/uinput` and runs the full creation sequence for `profile`
pub fn create_device(profile: DeviceProfile) -> Result<VirtualDevice<Live>, DeviceError> {
    create_device_at(UINPUT_PATH, profile)
}

pub fn create_device_at(
    path: impl AsRef<Path>,
    profile: DeviceProfile,
) -> Result<VirtualDevice<Live>, DeviceError> {
    VirtualDevice::<Opened>::open(path, profile)?.configure()?.create()
}
