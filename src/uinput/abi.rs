//! Kernel ABI records for `/dev/uinput`
//!
//! Every struct here has an explicit encoder/decoder that writes the exact
//! kernel layout in native byte order. Nothing is reinterpreted in memory.

use super::codes::{ABS_CNT, BUS_VIRTUAL, FF_RUMBLE};

// _IOC encoding (asm-generic)
const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;
const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;
const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const UINPUT_IOCTL_BASE: u8 = b'U';

const fn ioc(dir: u32, nr: u8, size: usize) -> u64 {
    ((dir << IOC_DIRSHIFT)
        | ((UINPUT_IOCTL_BASE as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)) as u64
}

pub const UI_DEV_CREATE: u64 = ioc(IOC_NONE, 1, 0);
pub const UI_DEV_DESTROY: u64 = ioc(IOC_NONE, 2, 0);
pub const UI_SET_EVBIT: u64 = ioc(IOC_WRITE, 100, 4);
pub const UI_SET_KEYBIT: u64 = ioc(IOC_WRITE, 101, 4);
pub const UI_SET_RELBIT: u64 = ioc(IOC_WRITE, 102, 4);
pub const UI_SET_ABSBIT: u64 = ioc(IOC_WRITE, 103, 4);
pub const UI_SET_FFBIT: u64 = ioc(IOC_WRITE, 107, 4);
pub const UI_BEGIN_FF_UPLOAD: u64 = ioc(IOC_READ | IOC_WRITE, 200, FF_UPLOAD_SIZE);
pub const UI_END_FF_UPLOAD: u64 = ioc(IOC_WRITE, 201, FF_UPLOAD_SIZE);
pub const UI_BEGIN_FF_ERASE: u64 = ioc(IOC_READ | IOC_WRITE, 202, FF_ERASE_SIZE);
pub const UI_END_FF_ERASE: u64 = ioc(IOC_WRITE, 203, FF_ERASE_SIZE);

pub const MAX_NAME_SIZE: usize = 80;

/// `uinput_user_dev`: name, input_id, ff_effects_max and four ABS_CNT arrays
pub const DESCRIPTOR_SIZE: usize = MAX_NAME_SIZE + 8 + 4 + 4 * ABS_CNT * 4;

// ff_effect: 14 header bytes, padding, then a pointer-aligned union
// whose largest member is ff_periodic_effect
const FF_UNION_OFFSET: usize = 16;
#[cfg(target_pointer_width = "64")]
const FF_UNION_SIZE: usize = 32;
#[cfg(not(target_pointer_width = "64"))]
const FF_UNION_SIZE: usize = 28;

pub const FF_EFFECT_SIZE: usize = FF_UNION_OFFSET + FF_UNION_SIZE;
pub const FF_UPLOAD_SIZE: usize = 8 + 2 * FF_EFFECT_SIZE;
pub const FF_ERASE_SIZE: usize = 12;

/// Replay length the kernel uses for "play until stopped"
pub const FF_LENGTH_INFINITE: u16 = 0xFFFF;

fn put_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_ne_bytes());
}

fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_ne_bytes());
}

fn put_i32(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_ne_bytes());
}

fn get_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_ne_bytes([buf[off], buf[off + 1]])
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_ne_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn get_i32(buf: &[u8], off: usize) -> i32 {
    i32::from_ne_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Axis calibration for one absolute axis
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AbsRange {
    pub min: i32,
    pub max: i32,
    pub fuzz: i32,
    pub flat: i32,
}

/// Identity and axis calibration written once before device creation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceCapabilityDescriptor {
    pub name: String,
    pub bus_type: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
    pub ff_effects_max: u32,
    pub abs: [AbsRange; ABS_CNT],
}

impl DeviceCapabilityDescriptor {
    pub fn new(name: &str, vendor: u16, product: u16) -> Self {
        Self {
            name: name.to_string(),
            bus_type: BUS_VIRTUAL,
            vendor,
            product,
            version: 1,
            ff_effects_max: 0,
            abs: [AbsRange::default(); ABS_CNT],
        }
    }

    pub fn with_ff_effects(mut self, slots: u32) -> Self {
        self.ff_effects_max = slots;
        self
    }

    /// Sets `min`/`max` for an axis with fuzz and flat left at zero.
    /// Axes outside the kernel's ABS range are ignored.
    pub fn with_abs_range(mut self, axis: u16, min: i32, max: i32) -> Self {
        if let Some(slot) = self.abs.get_mut(axis as usize) {
            *slot = AbsRange {
                min,
                max,
                fuzz: 0,
                flat: 0,
            };
        }
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; DESCRIPTOR_SIZE];

        // Name stays NUL-terminated
        let name = self.name.as_bytes();
        let len = name.len().min(MAX_NAME_SIZE - 1);
        buf[..len].copy_from_slice(&name[..len]);

        let mut off = MAX_NAME_SIZE;
        put_u16(&mut buf, off, self.bus_type);
        put_u16(&mut buf, off + 2, self.vendor);
        put_u16(&mut buf, off + 4, self.product);
        put_u16(&mut buf, off + 6, self.version);
        off += 8;
        put_u32(&mut buf, off, self.ff_effects_max);
        off += 4;

        // absmax, absmin, absfuzz, absflat
        let columns: [fn(&AbsRange) -> i32; 4] = [|r| r.max, |r| r.min, |r| r.fuzz, |r| r.flat];
        for column in columns {
            for range in &self.abs {
                put_i32(&mut buf, off, column(range));
                off += 4;
            }
        }

        buf
    }
}

/// `ff_effect` with the union kept as raw bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FfEffect {
    pub kind: u16,
    pub id: i16,
    pub direction: u16,
    pub trigger_button: u16,
    pub trigger_interval: u16,
    pub replay_length: u16,
    pub replay_delay: u16,
    pub union: [u8; FF_UNION_SIZE],
}

impl Default for FfEffect {
    fn default() -> Self {
        Self {
            kind: 0,
            id: 0,
            direction: 0,
            trigger_button: 0,
            trigger_interval: 0,
            replay_length: 0,
            replay_delay: 0,
            union: [0u8; FF_UNION_SIZE],
        }
    }
}

impl FfEffect {
    /// Builds a rumble effect the way a game would upload it
    pub fn rumble(id: i16, strong: u16, weak: u16, length_ms: u16) -> Self {
        let mut effect = Self {
            kind: FF_RUMBLE,
            id,
            replay_length: length_ms,
            ..Self::default()
        };
        put_u32(&mut effect.union, 0, u32::from(strong) | (u32::from(weak) << 16));
        effect
    }

    /// `(strong, weak)` from the first 32-bit word of the union: low half strong, high half weak
    pub fn rumble_magnitudes(&self) -> (u16, u16) {
        let word = get_u32(&self.union, 0);
        ((word & 0xFFFF) as u16, (word >> 16) as u16)
    }

    fn encode_into(&self, buf: &mut [u8]) {
        put_u16(buf, 0, self.kind);
        put_u16(buf, 2, self.id as u16);
        put_u16(buf, 4, self.direction);
        put_u16(buf, 6, self.trigger_button);
        put_u16(buf, 8, self.trigger_interval);
        put_u16(buf, 10, self.replay_length);
        put_u16(buf, 12, self.replay_delay);
        buf[FF_UNION_OFFSET..FF_EFFECT_SIZE].copy_from_slice(&self.union);
    }

    fn decode_from(buf: &[u8]) -> Self {
        let mut union = [0u8; FF_UNION_SIZE];
        union.copy_from_slice(&buf[FF_UNION_OFFSET..FF_EFFECT_SIZE]);
        Self {
            kind: get_u16(buf, 0),
            id: get_u16(buf, 2) as i16,
            direction: get_u16(buf, 4),
            trigger_button: get_u16(buf, 6),
            trigger_interval: get_u16(buf, 8),
            replay_length: get_u16(buf, 10),
            replay_delay: get_u16(buf, 12),
            union,
        }
    }
}

/// `uinput_ff_upload`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FfUpload {
    pub request_id: u32,
    pub retval: i32,
    pub effect: FfEffect,
    pub old: FfEffect,
}

impl FfUpload {
    pub fn new(request_id: u32) -> Self {
        Self {
            request_id,
            ..Self::default()
        }
    }

    pub fn encode(&self) -> [u8; FF_UPLOAD_SIZE] {
        let mut buf = [0u8; FF_UPLOAD_SIZE];
        put_u32(&mut buf, 0, self.request_id);
        put_i32(&mut buf, 4, self.retval);
        self.effect.encode_into(&mut buf[8..8 + FF_EFFECT_SIZE]);
        self.old.encode_into(&mut buf[8 + FF_EFFECT_SIZE..]);
        buf
    }

    pub fn decode(buf: &[u8; FF_UPLOAD_SIZE]) -> Self {
        Self {
            request_id: get_u32(buf, 0),
            retval: get_i32(buf, 4),
            effect: FfEffect::decode_from(&buf[8..8 + FF_EFFECT_SIZE]),
            old: FfEffect::decode_from(&buf[8 + FF_EFFECT_SIZE..]),
        }
    }
}

/// `uinput_ff_erase`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FfErase {
    pub request_id: u32,
    pub retval: i32,
    pub effect_id: u32,
}

impl FfErase {
    pub fn new(request_id: u32) -> Self {
        Self {
            request_id,
            ..Self::default()
        }
    }

    pub fn encode(&self) -> [u8; FF_ERASE_SIZE] {
        let mut buf = [0u8; FF_ERASE_SIZE];
        put_u32(&mut buf, 0, self.request_id);
        put_i32(&mut buf, 4, self.retval);
        put_u32(&mut buf, 8, self.effect_id);
        buf
    }

    pub fn decode(buf: &[u8; FF_ERASE_SIZE]) -> Self {
        Self {
            request_id: get_u32(buf, 0),
            retval: get_i32(buf, 4),
            effect_id: get_u32(buf, 8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uinput::codes::{ABS_RZ, ABS_X};

    #[test]
    fn ioctl_numbers_match_uinput_header() {
        assert_eq!(UI_DEV_CREATE, 0x5501);
        assert_eq!(UI_DEV_DESTROY, 0x5502);
        assert_eq!(UI_SET_EVBIT, 0x4004_5564);
        assert_eq!(UI_SET_KEYBIT, 0x4004_5565);
        assert_eq!(UI_SET_ABSBIT, 0x4004_5567);
        assert_eq!(UI_SET_FFBIT, 0x4004_556b);
        assert_eq!(UI_BEGIN_FF_ERASE, 0xc00c_55ca);
        assert_eq!(UI_END_FF_ERASE, 0x400c_55cb);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn ff_upload_ioctls_use_104_byte_record() {
        assert_eq!(FF_EFFECT_SIZE, 48);
        assert_eq!(FF_UPLOAD_SIZE, 104);
        assert_eq!(UI_BEGIN_FF_UPLOAD, 0xc068_55c8);
        assert_eq!(UI_END_FF_UPLOAD, 0x4068_55c9);
    }

    #[test]
    fn descriptor_layout() {
        let desc = DeviceCapabilityDescriptor::new("Pad", 0x1b1c, 0x0a3e)
            .with_ff_effects(16)
            .with_abs_range(ABS_X, -32768, 32767)
            .with_abs_range(ABS_RZ, 0, 1023);
        let bytes = desc.encode();

        assert_eq!(bytes.len(), 1116);
        assert_eq!(&bytes[..3], b"Pad");
        assert_eq!(bytes[3], 0);
        assert_eq!(get_u16(&bytes, 80), BUS_VIRTUAL);
        assert_eq!(get_u16(&bytes, 82), 0x1b1c);
        assert_eq!(get_u16(&bytes, 84), 0x0a3e);
        assert_eq!(get_u16(&bytes, 86), 1);
        assert_eq!(get_u32(&bytes, 88), 16);

        let absmax = 92;
        let absmin = absmax + ABS_CNT * 4;
        let absfuzz = absmin + ABS_CNT * 4;
        assert_eq!(get_i32(&bytes, absmax + ABS_X as usize * 4), 32767);
        assert_eq!(get_i32(&bytes, absmin + ABS_X as usize * 4), -32768);
        assert_eq!(get_i32(&bytes, absmax + ABS_RZ as usize * 4), 1023);
        assert_eq!(get_i32(&bytes, absfuzz + ABS_X as usize * 4), 0);
    }

    #[test]
    fn long_names_stay_terminated() {
        let name = "x".repeat(200);
        let bytes = DeviceCapabilityDescriptor::new(&name, 1, 2).encode();
        assert_eq!(bytes[MAX_NAME_SIZE - 1], 0);
        assert_eq!(bytes[MAX_NAME_SIZE - 2], b'x');
    }

    #[test]
    fn rumble_magnitudes_come_from_first_union_word() {
        let mut upload = FfUpload::new(7);
        upload.effect = FfEffect::rumble(3, 0xABCD, 0x1234, 250);

        let decoded = FfUpload::decode(&upload.encode());
        assert_eq!(decoded.request_id, 7);
        assert_eq!(decoded.effect.kind, FF_RUMBLE);
        assert_eq!(decoded.effect.id, 3);
        assert_eq!(decoded.effect.replay_length, 250);
        assert_eq!(decoded.effect.rumble_magnitudes(), (0xABCD, 0x1234));
    }

    #[test]
    fn erase_record_carries_retval() {
        let erase = FfErase {
            request_id: 9,
            retval: -libc::EINVAL,
            effect_id: 4,
        };
        assert_eq!(FfErase::decode(&erase.encode()), erase);
    }
}
