//! Windows plumbing shared by the lock, seek and ownership modules.

use std::ffi::OsStr;
use std::io;
use std::iter;
use std::os::windows::ffi::OsStrExt;

use winapi::shared::winerror::ERROR_INVALID_HANDLE;
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::winnt::HANDLE;

use crate::error::{Error, Result};
use crate::RawFd;

/// OS handle behind a C runtime descriptor. The handle stays owned by the
/// descriptor.
pub(crate) fn os_handle(op: &'static str, fd: RawFd) -> Result<HANDLE> {
    // SAFETY: _get_osfhandle validates the descriptor itself.
    let handle = unsafe { libc::get_osfhandle(fd) };
    if handle == -1 || handle as HANDLE == INVALID_HANDLE_VALUE {
        return Err(Error::BadDescriptor {
            op,
            fd,
            source: io::Error::from_raw_os_error(ERROR_INVALID_HANDLE as i32),
        });
    }
    Ok(handle as HANDLE)
}

/// NUL-terminated UTF-16 copy of `s`.
pub(crate) fn wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(iter::once(0)).collect()
}

/// Owned UTF-16 string returned by an API that must be read up to its NUL.
///
/// # Safety
///
/// `ptr` must point to a NUL-terminated UTF-16 buffer.
pub(crate) unsafe fn from_wide_ptr(ptr: *const u16) -> String {
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
}
