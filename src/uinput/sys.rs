//! Raw calls against an open `/dev/uinput` handle
//!
//! [`UinputIo`] is the seam between device logic and the kernel. The real
//! implementation is [`UinputFile`]; everything above it only sees encoded
//! records and `io::Result`s.

use super::abi::{
    FfErase, FfUpload, UI_BEGIN_FF_ERASE, UI_BEGIN_FF_UPLOAD, UI_DEV_CREATE, UI_DEV_DESTROY,
    UI_END_FF_ERASE, UI_END_FF_UPLOAD,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use tracing::debug;

/// Operations a virtual device needs from its kernel handle
pub trait UinputIo: Send + Sync {
    /// Capability registration (`UI_SET_*BIT`)
    fn set_bit(&self, request: u64, code: u16) -> io::Result<()>;

    fn write_record(&self, bytes: &[u8]) -> io::Result<usize>;

    fn read_record(&self, buf: &mut [u8]) -> io::Result<usize>;

    fn dev_create(&self) -> io::Result<()>;

    fn dev_destroy(&self) -> io::Result<()>;

    /// Fills `upload` with the effect the kernel is registering
    fn begin_ff_upload(&self, upload: &mut FfUpload) -> io::Result<()>;

    fn end_ff_upload(&self, upload: &FfUpload) -> io::Result<()>;

    /// Fills `erase` with the effect id the kernel is removing
    fn begin_ff_erase(&self, erase: &mut FfErase) -> io::Result<()>;

    fn end_ff_erase(&self, erase: &FfErase) -> io::Result<()>;
}

/// `/dev/uinput` opened read-write and non-blocking
#[derive(Debug)]
pub struct UinputFile {
    file: File,
}

impl UinputFile {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path.as_ref())?;
        debug!(
            "Opened {} as fd {}",
            path.as_ref().display(),
            file.as_raw_fd()
        );
        Ok(Self { file })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn ioctl_int(&self, request: u64, arg: libc::c_int) -> io::Result<()> {
        // SAFETY: integer-argument ioctl on an fd owned by self.file
        let rc = unsafe { libc::ioctl(self.raw_fd(), request as libc::c_ulong, arg) };
        check(rc)
    }

    fn ioctl_none(&self, request: u64) -> io::Result<()> {
        // SAFETY: argument-less ioctl on an fd owned by self.file
        let rc = unsafe { libc::ioctl(self.raw_fd(), request as libc::c_ulong) };
        check(rc)
    }

    fn ioctl_buf(&self, request: u64, buf: &mut [u8]) -> io::Result<()> {
        // SAFETY: buf is sized from the same record the request number encodes,
        // and outlives the call
        let rc = unsafe {
            libc::ioctl(
                self.raw_fd(),
                request as libc::c_ulong,
                buf.as_mut_ptr() as *mut libc::c_void,
            )
        };
        check(rc)
    }
}

fn check(rc: libc::c_int) -> io::Result<()> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

impl UinputIo for UinputFile {
    fn set_bit(&self, request: u64, code: u16) -> io::Result<()> {
        self.ioctl_int(request, libc::c_int::from(code))
    }

    fn write_record(&self, bytes: &[u8]) -> io::Result<usize> {
        (&self.file).write(bytes)
    }

    fn read_record(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.file).read(buf)
    }

    fn dev_create(&self) -> io::Result<()> {
        self.ioctl_none(UI_DEV_CREATE)
    }

    fn dev_destroy(&self) -> io::Result<()> {
        self.ioctl_none(UI_DEV_DESTROY)
    }

    fn begin_ff_upload(&self, upload: &mut FfUpload) -> io::Result<()> {
        let mut buf = upload.encode();
        self.ioctl_buf(UI_BEGIN_FF_UPLOAD, &mut buf)?;
        *upload = FfUpload::decode(&buf);
        Ok(())
    }

    fn end_ff_upload(&self, upload: &FfUpload) -> io::Result<()> {
        let mut buf = upload.encode();
        self.ioctl_buf(UI_END_FF_UPLOAD, &mut buf)
    }

    fn begin_ff_erase(&self, erase: &mut FfErase) -> io::Result<()> {
        let mut buf = erase.encode();
        self.ioctl_buf(UI_BEGIN_FF_ERASE, &mut buf)?;
        *erase = FfErase::decode(&buf);
        Ok(())
    }

    fn end_ff_erase(&self, erase: &FfErase) -> io::Result<()> {
        let mut buf = erase.encode();
        self.ioctl_buf(UI_END_FF_ERASE, &mut buf)
    }
}

/// Scripted in-memory handle for exercising device logic without a kernel
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::uinput::event::{HidEvent, EVENT_SIZE};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// What the fake should answer to a begin-upload/erase call
    #[derive(Debug)]
    pub enum Pending {
        Upload(io::Result<FfUpload>),
        Erase(io::Result<FfErase>),
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        SetBit(u64, u16),
        Write(Vec<u8>),
        Create,
        Destroy,
        EndUpload(FfUpload),
        EndErase(FfErase),
    }

    #[derive(Default)]
    pub struct FakeUinput {
        pub calls: Mutex<Vec<Call>>,
        pub reads: Mutex<VecDeque<io::Result<Vec<u8>>>>,
        pub pending: Mutex<VecDeque<Pending>>,
        /// Failing `(request, code)` pairs for `set_bit`
        pub failing_bits: Mutex<Vec<(u64, u16)>>,
        pub fail_write: Mutex<Option<io::ErrorKind>>,
        pub fail_create: Mutex<bool>,
    }

    impl FakeUinput {
        pub fn push_event(&self, ev: HidEvent) {
            self.reads.lock().push_back(Ok(ev.encode().to_vec()));
        }

        pub fn push_read(&self, read: io::Result<Vec<u8>>) {
            self.reads.lock().push_back(read);
        }

        pub fn push_pending(&self, pending: Pending) {
            self.pending.lock().push_back(pending);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        pub fn written_events(&self) -> Vec<HidEvent> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Write(bytes) if bytes.len() == EVENT_SIZE => {
                        HidEvent::decode(&bytes).ok()
                    }
                    _ => None,
                })
                .collect()
        }
    }

    impl UinputIo for FakeUinput {
        fn set_bit(&self, request: u64, code: u16) -> io::Result<()> {
            self.calls.lock().push(Call::SetBit(request, code));
            if self.failing_bits.lock().contains(&(request, code)) {
                return Err(io::Error::from_raw_os_error(libc::EINVAL));
            }
            Ok(())
        }

        fn write_record(&self, bytes: &[u8]) -> io::Result<usize> {
            if let Some(kind) = *self.fail_write.lock() {
                return Err(io::Error::from(kind));
            }
            self.calls.lock().push(Call::Write(bytes.to_vec()));
            Ok(bytes.len())
        }

        fn read_record(&self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.lock().pop_front() {
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
            }
        }

        fn dev_create(&self) -> io::Result<()> {
            self.calls.lock().push(Call::Create);
            if *self.fail_create.lock() {
                return Err(io::Error::from_raw_os_error(libc::EINVAL));
            }
            Ok(())
        }

        fn dev_destroy(&self) -> io::Result<()> {
            self.calls.lock().push(Call::Destroy);
            Ok(())
        }

        fn begin_ff_upload(&self, upload: &mut FfUpload) -> io::Result<()> {
            match self.pending.lock().pop_front() {
                Some(Pending::Upload(Ok(up))) => {
                    *upload = FfUpload {
                        request_id: upload.request_id,
                        ..up
                    };
                    Ok(())
                }
                Some(Pending::Upload(Err(e))) => Err(e),
                _ => Err(io::Error::from_raw_os_error(libc::EINVAL)),
            }
        }

        fn end_ff_upload(&self, upload: &FfUpload) -> io::Result<()> {
            self.calls.lock().push(Call::EndUpload(upload.clone()));
            Ok(())
        }

        fn begin_ff_erase(&self, erase: &mut FfErase) -> io::Result<()> {
            match self.pending.lock().pop_front() {
                Some(Pending::Erase(Ok(er))) => {
                    *erase = FfErase {
                        request_id: erase.request_id,
                        ..er
                    };
                    Ok(())
                }
                Some(Pending::Erase(Err(e))) => Err(e),
                _ => Err(io::Error::from_raw_os_error(libc::EINVAL)),
            }
        }

        fn end_ff_erase(&self, erase: &FfErase) -> io::Result<()> {
            self.calls.lock().push(Call::EndErase(*erase));
            Ok(())
        }
    }
}
