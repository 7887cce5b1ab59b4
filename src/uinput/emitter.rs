//! Writes encoded event records to a virtual device
//!
//! Every logical input change goes out as a burst: one or more value changes
//! followed by exactly one `SYN_REPORT`. A failed write aborts the burst; the
//! caller drops the operation rather than retrying single records.

use super::event::{HidEvent, EVENT_SIZE};
use super::sys::UinputIo;
use std::io;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("Virtual device is not present")]
    NotCreated,

    #[error("Failed to write event: {0}")]
    Write(#[source] io::Error),

    #[error("Short write: only {written} bytes of the event record written")]
    ShortWrite { written: usize },
}

/// Writes a single record. A would-block write drops the record without failing.
pub fn emit(handle: Option<&dyn UinputIo>, event: &HidEvent) -> Result<(), EmitError> {
    let handle = handle.ok_or(EmitError::NotCreated)?;

    match handle.write_record(&event.encode()) {
        Ok(EVENT_SIZE) => Ok(()),
        Ok(written) => Err(EmitError::ShortWrite { written }),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            debug!(
                "Dropped event type={} code={} value={}: device busy",
                event.kind, event.code, event.value
            );
            Ok(())
        }
        Err(e) => Err(EmitError::Write(e)),
    }
}

/// Writes `events` in order and terminates them with one sync report
pub fn emit_burst(handle: Option<&dyn UinputIo>, events: &[HidEvent]) -> Result<(), EmitError> {
    for event in events {
        if let Err(e) = emit(handle, event) {
            error!(error = %e, code = event.code, "Failed to emit event");
            return Err(e);
        }
    }

    emit(handle, &HidEvent::sync()).map_err(|e| {
        error!(error = %e, "Failed to emit sync report");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uinput::codes::{ABS_X, ABS_Y, EV_ABS};
    use crate::uinput::sys::fake::FakeUinput;

    #[test]
    fn emit_without_device_fails() {
        let err = emit(None, &HidEvent::sync()).unwrap_err();
        assert!(matches!(err, EmitError::NotCreated));
    }

    #[test]
    fn burst_ends_with_single_sync() {
        let fake = FakeUinput::default();
        let events = [
            HidEvent::new(EV_ABS, ABS_X, 100),
            HidEvent::new(EV_ABS, ABS_Y, -100),
        ];
        emit_burst(Some(&fake), &events).unwrap();

        let written = fake.written_events();
        assert_eq!(written.len(), 3);
        assert_eq!(&written[..2], &events);
        assert!(written[2].is_sync());
        assert_eq!(written.iter().filter(|e| e.is_sync()).count(), 1);
    }

    #[test]
    fn empty_burst_still_syncs() {
        let fake = FakeUinput::default();
        emit_burst(Some(&fake), &[]).unwrap();
        let written = fake.written_events();
        assert_eq!(written.len(), 1);
        assert!(written[0].is_sync());
    }

    #[test]
    fn would_block_is_not_an_error() {
        let fake = FakeUinput::default();
        *fake.fail_write.lock() = Some(io::ErrorKind::WouldBlock);
        assert!(emit(Some(&fake), &HidEvent::new(EV_ABS, ABS_X, 1)).is_ok());
    }

    #[test]
    fn write_failure_aborts_burst() {
        let fake = FakeUinput::default();
        *fake.fail_write.lock() = Some(io::ErrorKind::BrokenPipe);
        let err = emit_burst(Some(&fake), &[HidEvent::new(EV_ABS, ABS_X, 1)]).unwrap_err();
        assert!(matches!(err, EmitError::Write(_)));
        assert!(fake.written_events().is_empty());
    }
}
