//! Output side of the hardware trigger line.

use crate::error::ExperimentError;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Something that can put an 8-bit event code on the trigger line.
pub trait TriggerPort {
    fn write(&mut self, code: u8) -> io::Result<()>;

    fn describe(&self) -> String {
        "trigger port".into()
    }
}

/// Accepts every code and only logs it. Used when no device is configured.
#[derive(Debug, Default)]
pub struct NullPort;

impl TriggerPort for NullPort {
    fn write(&mut self, code: u8) -> io::Result<()> {
        log::trace!("trigger {code} (no port)");
        Ok(())
    }

    fn describe(&self) -> String {
        "null port".into()
    }
}

/// Keeps every written code in memory. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingPort {
    codes: Arc<Mutex<Vec<u8>>>,
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn codes(&self) -> Vec<u8> {
        self.codes.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl TriggerPort for RecordingPort {
    fn write(&mut self, code: u8) -> io::Result<()> {
        self.codes
            .lock()
            .map_err(|_| io::Error::other("recording port poisoned"))?
            .push(code);
        Ok(())
    }

    fn describe(&self) -> String {
        "recording port".into()
    }
}

/// Linux `ppdev` parallel port (`/dev/parportN`).
#[cfg(target_os = "linux")]
pub struct ParallelPort {
    file: std::fs::File,
    path: std::path::PathBuf,
}

#[cfg(target_os = "linux")]
mod ppdev {
    // _IO('p', 0x8b), _IO('p', 0x8c), _IOW('p', 0x86, unsigned char)
    pub const PPCLAIM: u32 = 0x708b;
    pub const PPRELEASE: u32 = 0x708c;
    pub const PPWDATA: u32 = 0x4001_7086;
}

#[cfg(target_os = "linux")]
impl ParallelPort {
    pub fn open(path: &Path) -> io::Result<Self> {
        use std::os::fd::AsRawFd;

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), ppdev::PPCLAIM as _) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        let mut port = Self {
            file,
            path: path.to_path_buf(),
        };
        port.write(wordface_core::LINE_LOW)?;
        Ok(port)
    }
}

#[cfg(target_os = "linux")]
impl TriggerPort for ParallelPort {
    fn write(&mut self, code: u8) -> io::Result<()> {
        use std::os::fd::AsRawFd;

        let data: libc::c_uchar = code;
        let ptr = &data as *const libc::c_uchar;
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), ppdev::PPWDATA as _, ptr) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("parallel port {}", self.path.display())
    }
}

#[cfg(target_os = "linux")]
impl Drop for ParallelPort {
    fn drop(&mut self) {
        use std::os::fd::AsRawFd;

        let _ = self.write(wordface_core::LINE_LOW);
        unsafe {
            libc::ioctl(self.file.as_raw_fd(), ppdev::PPRELEASE as _);
        }
    }
}

/// Opens the configured device, or a [`NullPort`] when none is given.
pub fn open_port(device: Option<&Path>) -> Result<Box<dyn TriggerPort>, ExperimentError> {
    let Some(path) = device else {
        return Ok(Box::new(NullPort));
    };
    #[cfg(target_os = "linux")]
    {
        let port = ParallelPort::open(path).map_err(|source| ExperimentError::Port {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("opened {}", port.describe());
        Ok(Box::new(port))
    }
    #[cfg(not(target_os = "linux"))]
    {
        Err(ExperimentError::Port {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "parallel port triggers are only supported on Linux",
            ),
        })
    }
}
