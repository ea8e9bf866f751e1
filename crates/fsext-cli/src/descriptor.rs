//! Files opened by the CLI, exposed as C runtime descriptors.

use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use fsext::RawFd;

/// An open file whose descriptor the library calls act on. Closing it
/// releases every lock taken through it.
pub struct Descriptor {
    #[cfg(unix)]
    file: File,
    #[cfg(windows)]
    fd: RawFd,
}

impl Descriptor {
    /// Open `path` read-write, creating it when missing.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_file(file)
    }

    /// Open an existing `path` read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_file(file)
    }

    #[cfg(unix)]
    fn from_file(file: File) -> Result<Self> {
        Ok(Self { file })
    }

    #[cfg(windows)]
    fn from_file(file: File) -> Result<Self> {
        use std::os::windows::io::IntoRawHandle;

        let handle = file.into_raw_handle();
        // SAFETY: the handle was just released by File; the CRT descriptor
        // takes ownership and closes it in Drop.
        let fd = unsafe { libc::open_osfhandle(handle as libc::intptr_t, 0) };
        if fd < 0 {
            anyhow::bail!("Failed to wrap handle: {}", std::io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    #[cfg(unix)]
    pub fn raw(&self) -> RawFd {
        use std::os::unix::io::AsRawFd;
        self.file.as_raw_fd()
    }

    #[cfg(windows)]
    pub fn raw(&self) -> RawFd {
        self.fd
    }
}

#[cfg(windows)]
impl Drop for Descriptor {
    fn drop(&mut self) {
        // SAFETY: fd came from open_osfhandle and is closed exactly once.
        unsafe { libc::close(self.fd) };
    }
}
