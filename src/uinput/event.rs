//! Fixed-size `input_event` records exchanged with the kernel
//!
//! The kernel layout is a `timeval` followed by `type`, `code` and `value`.
//! Records are encoded field by field in native byte order, which is the
//! byte order the kernel reads and writes on the running machine.

use super::codes::{EV_SYN, SYN_REPORT};

/// Width in bytes of one `timeval` field (`tv_sec` / `tv_usec`)
#[cfg(target_pointer_width = "64")]
const TIME_FIELD_SIZE: usize = 8;
#[cfg(not(target_pointer_width = "64"))]
const TIME_FIELD_SIZE: usize = 4;

/// Size in bytes of one encoded event record
pub const EVENT_SIZE: usize = 2 * TIME_FIELD_SIZE + 8;

const TYPE_OFFSET: usize = 2 * TIME_FIELD_SIZE;
const CODE_OFFSET: usize = TYPE_OFFSET + 2;
const VALUE_OFFSET: usize = CODE_OFFSET + 2;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
}

/// Event timestamp; zero on writes since the kernel stamps injected events itself
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventTime {
    pub sec: i64,
    pub usec: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HidEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
    pub timestamp: EventTime,
}

impl HidEvent {
    pub fn new(kind: u16, code: u16, value: i32) -> Self {
        Self {
            kind,
            code,
            value,
            timestamp: EventTime::default(),
        }
    }

    /// Terminating record of an event burst
    pub fn sync() -> Self {
        Self::new(EV_SYN, SYN_REPORT, 0)
    }

    pub fn is_sync(&self) -> bool {
        self.kind == EV_SYN && self.code == SYN_REPORT
    }

    pub fn encode(&self) -> [u8; EVENT_SIZE] {
        let mut buf = [0u8; EVENT_SIZE];
        write_time_field(&mut buf[..TIME_FIELD_SIZE], self.timestamp.sec);
        write_time_field(
            &mut buf[TIME_FIELD_SIZE..TYPE_OFFSET],
            self.timestamp.usec,
        );
        buf[TYPE_OFFSET..CODE_OFFSET].copy_from_slice(&self.kind.to_ne_bytes());
        buf[CODE_OFFSET..VALUE_OFFSET].copy_from_slice(&self.code.to_ne_bytes());
        buf[VALUE_OFFSET..EVENT_SIZE].copy_from_slice(&self.value.to_ne_bytes());
        buf
    }

    /// Decodes the first record in `bytes`. Fails loudly on anything shorter than one record.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < EVENT_SIZE {
            return Err(CodecError::ShortRead {
                expected: EVENT_SIZE,
                actual: bytes.len(),
            });
        }

        let kind = u16::from_ne_bytes([bytes[TYPE_OFFSET], bytes[TYPE_OFFSET + 1]]);
        let code = u16::from_ne_bytes([bytes[CODE_OFFSET], bytes[CODE_OFFSET + 1]]);
        let value = i32::from_ne_bytes([
            bytes[VALUE_OFFSET],
            bytes[VALUE_OFFSET + 1],
            bytes[VALUE_OFFSET + 2],
            bytes[VALUE_OFFSET + 3],
        ]);

        Ok(Self {
            kind,
            code,
            value,
            timestamp: EventTime {
                sec: read_time_field(&bytes[..TIME_FIELD_SIZE]),
                usec: read_time_field(&bytes[TIME_FIELD_SIZE..TYPE_OFFSET]),
            },
        })
    }
}

#[cfg(target_pointer_width = "64")]
fn write_time_field(dst: &mut [u8], v: i64) {
    dst.copy_from_slice(&v.to_ne_bytes());
}

#[cfg(not(target_pointer_width = "64"))]
fn write_time_field(dst: &mut [u8], v: i64) {
    dst.copy_from_slice(&(v as i32).to_ne_bytes());
}

#[cfg(target_pointer_width = "64")]
fn read_time_field(src: &[u8]) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(src);
    i64::from_ne_bytes(raw)
}

#[cfg(not(target_pointer_width = "64"))]
fn read_time_field(src: &[u8]) -> i64 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(src);
    i32::from_ne_bytes(raw) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uinput::codes::{ABS_RY, EV_ABS, EV_FF};

    #[test]
    fn record_matches_kernel_size() {
        #[cfg(target_pointer_width = "64")]
        assert_eq!(EVENT_SIZE, 24);
        #[cfg(not(target_pointer_width = "64"))]
        assert_eq!(EVENT_SIZE, 16);
    }

    #[test]
    fn fields_land_after_the_timeval() {
        let bytes = HidEvent::new(EV_ABS, ABS_RY, -2).encode();
        assert!(bytes[..TYPE_OFFSET].iter().all(|b| *b == 0));
        assert_eq!(&bytes[TYPE_OFFSET..CODE_OFFSET], &EV_ABS.to_ne_bytes());
        assert_eq!(&bytes[CODE_OFFSET..VALUE_OFFSET], &ABS_RY.to_ne_bytes());
        assert_eq!(&bytes[VALUE_OFFSET..], &(-2i32).to_ne_bytes());
    }

    #[test]
    fn decode_reads_kernel_record() {
        let mut ev = HidEvent::new(EV_FF, 3, 1);
        ev.timestamp = EventTime { sec: 12, usec: 500 };
        let decoded = HidEvent::decode(&ev.encode()).unwrap();
        assert_eq!(decoded, ev);
    }

    #[test]
    fn decode_rejects_short_input() {
        let bytes = HidEvent::sync().encode();
        let err = HidEvent::decode(&bytes[..EVENT_SIZE - 1]).unwrap_err();
        assert_eq!(
            err,
            CodecError::ShortRead {
                expected: EVENT_SIZE,
                actual: EVENT_SIZE - 1
            }
        );
    }

    #[test]
    fn sync_record_is_zero_valued_report() {
        let ev = HidEvent::sync();
        assert!(ev.is_sync());
        assert_eq!(ev.value, 0);
    }
}
