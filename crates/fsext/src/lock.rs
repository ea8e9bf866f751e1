//! Whole-file advisory locks.
//!
//! On unix this is `flock(2)`: the lock belongs to the open file
//! description, so two independent `open`s of the same path contend with
//! each other, even inside one process. Windows has no advisory lock; the
//! whole byte range is locked with `LockFileEx`, which keeps the same
//! shared/exclusive and wait/fail-fast semantics but is mandatory for I/O
//! through other handles.

use fsext_config::log_lock_debug;

use crate::completion::{self, Completion};
use crate::error::Result;
use crate::flags::{IntoFlag, LockMode};
use crate::RawFd;

/// Apply or remove an advisory lock on the file open at `fd`.
///
/// Blocking modes wait until the lock is granted. Non-blocking modes fail
/// with [`Error::WouldBlock`](crate::Error::WouldBlock) when a conflicting
/// lock is held elsewhere.
pub fn flock<M: IntoFlag<LockMode>>(fd: RawFd, mode: M) -> Result<()> {
    let mode = mode.into_flag()?;
    log_lock_debug!("flock", fd = fd, mode = mode.symbol());
    sys::flock(fd, mode)
}

/// [`flock`] on the blocking pool. The mode is validated before dispatch.
pub fn flock_async<M: IntoFlag<LockMode>>(fd: RawFd, mode: M) -> Result<Completion<()>> {
    let mode = mode.into_flag()?;
    completion::dispatch("flock", move || flock(fd, mode))
}

#[cfg(unix)]
mod sys {
    use std::io;

    use nix::errno::Errno;

    use crate::error::{Error, Result};
    use crate::flags::LockMode;
    use crate::RawFd;

    pub(super) fn flock(fd: RawFd, mode: LockMode) -> Result<()> {
        // SAFETY: flock only reads its integer arguments.
        Errno::result(unsafe { libc::flock(fd, mode.raw()) })
            .map(drop)
            .map_err(|errno| Error::fd("flock", fd, io::Error::from(errno)))
    }
}

#[cfg(windows)]
mod sys {
    use std::io;
    use std::mem;

    use fsext_config::log_lock_trace;
    use winapi::shared::winerror::ERROR_NOT_LOCKED;
    use winapi::um::fileapi::{LockFileEx, UnlockFileEx};
    use winapi::um::minwinbase::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, OVERLAPPED};

    use crate::error::{Error, Result};
    use crate::flags::LockMode;
    use crate::win::os_handle;
    use crate::RawFd;

    /// Length locked from offset 0, low and high halves.
    const LK_LEN_LOW: u32 = 0xffff_0000;
    const LK_LEN_HIGH: u32 = 0x0000_ffff;

    pub(super) fn flock(fd: RawFd, mode: LockMode) -> Result<()> {
        let handle = os_handle("flock", fd)?;
        // SAFETY: a zeroed OVERLAPPED addresses offset 0 and carries no event.
        let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };

        if mode == LockMode::Unlock {
            // SAFETY: handle was validated above and overlapped outlives the call.
            let ok = unsafe { UnlockFileEx(handle, 0, LK_LEN_LOW, LK_LEN_HIGH, &mut overlapped) };
            if ok == 0 {
                let err = io::Error::last_os_error();
                // Releasing a lock that is not held is not an error for flock.
                if err.raw_os_error() == Some(ERROR_NOT_LOCKED as i32) {
                    log_lock_trace!("unlock of unlocked file", fd = fd);
                    return Ok(());
                }
                return Err(Error::fd("flock", fd, err));
            }
            return Ok(());
        }

        let mut flags = 0;
        if mode.is_exclusive() {
            flags |= LOCKFILE_EXCLUSIVE_LOCK;
        }
        if mode.is_non_blocking() {
            flags |= LOCKFILE_FAIL_IMMEDIATELY;
        }

        // SAFETY: as above.
        let ok = unsafe {
            LockFileEx(handle, flags, 0, LK_LEN_LOW, LK_LEN_HIGH, &mut overlapped)
        };
        if ok == 0 {
            return Err(Error::fd("flock", fd, io::Error::last_os_error()));
        }
        Ok(())
    }
}
