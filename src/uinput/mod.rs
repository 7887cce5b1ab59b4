//! Linux uinput plumbing: kernel records, the handle seam, device lifecycle
//! and event emission

pub mod abi;
pub mod codes;
pub mod device;
pub mod emitter;
pub mod event;
pub mod sys;

pub use device::{create_device, DeviceError, DeviceKind, DeviceProfile, VirtualDevice};
pub use emitter::{emit, emit_burst, EmitError};
pub use event::{CodecError, HidEvent, EVENT_SIZE};
pub use sys::{UinputFile, UinputIo};
