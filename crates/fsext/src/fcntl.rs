//! Descriptor flags and POSIX record locks through `fcntl(2)`.
//!
//! Integer commands (`getfd`, `setfd`) go through [`fcntl`]. The record-lock
//! commands take a `struct flock` and go through [`fcntl_lock`]; handing
//! them an integer is rejected instead of being passed to the kernel as a
//! pointer. Windows has no `fcntl`: both entry points validate their flags
//! and then fail with [`Error::Unsupported`].

use std::os::raw::c_int;

use fsext_config::log_fcntl_debug;
use serde::{Deserialize, Serialize};

use crate::completion::{self, Completion};
use crate::constants;
use crate::error::{Error, Result};
use crate::flags::{FcntlCommand, IntoFlag, SeekOrigin};
use crate::RawFd;

/// Type of a POSIX record lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordLockKind {
    Read,
    Write,
    Unlock,
}

impl RecordLockKind {
    pub fn raw(self) -> c_int {
        match self {
            RecordLockKind::Read => constants::F_RDLCK,
            RecordLockKind::Write => constants::F_WRLCK,
            RecordLockKind::Unlock => constants::F_UNLCK,
        }
    }

    pub fn from_raw(raw: c_int) -> Result<Self> {
        match raw {
            r if r == constants::F_RDLCK => Ok(RecordLockKind::Read),
            r if r == constants::F_WRLCK => Ok(RecordLockKind::Write),
            r if r == constants::F_UNLCK => Ok(RecordLockKind::Unlock),
            other => Err(Error::invalid("fcntl", format!("unknown lock type {other}"))),
        }
    }
}

/// A byte-range lock description, the Rust face of `struct flock`.
///
/// `len == 0` extends the range to the end of the file, however far that
/// grows. `pid` is only meaningful in the record returned by `getlk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLock {
    pub kind: RecordLockKind,
    pub origin: SeekOrigin,
    pub start: i64,
    pub len: i64,
    pub pid: i32,
}

impl RecordLock {
    /// Lock covering the whole file.
    pub fn whole_file(kind: RecordLockKind) -> Self {
        Self::range(kind, 0, 0)
    }

    /// Lock covering `len` bytes from absolute offset `start`.
    pub fn range(kind: RecordLockKind, start: i64, len: i64) -> Self {
        Self {
            kind,
            origin: SeekOrigin::Start,
            start,
            len,
            pid: 0,
        }
    }
}

/// Run an integer-argument `fcntl` command and return the call's result.
///
/// `arg` defaults to 0 when omitted.
pub fn fcntl<C: IntoFlag<FcntlCommand>>(fd: RawFd, cmd: C, arg: Option<c_int>) -> Result<c_int> {
    let cmd = cmd.into_flag()?;
    if cmd.is_record_lock() {
        return Err(Error::invalid(
            "fcntl",
            format!("{cmd} takes a lock record, use fcntl_lock"),
        ));
    }
    let arg = arg.unwrap_or(0);
    log_fcntl_debug!("fcntl", fd = fd, cmd = cmd.symbol(), arg = arg);
    sys::fcntl(fd, cmd, arg)
}

/// [`fcntl`] on the blocking pool.
pub fn fcntl_async<C: IntoFlag<FcntlCommand>>(
    fd: RawFd,
    cmd: C,
    arg: Option<c_int>,
) -> Result<Completion<c_int>> {
    let cmd = cmd.into_flag()?;
    completion::dispatch("fcntl", move || fcntl(fd, cmd, arg))
}

/// Run a record-lock command (`setlk`, `setlkw`, `getlk`).
///
/// Returns the record as the kernel left it: for `getlk` that is the first
/// conflicting lock, or `lock` with kind [`RecordLockKind::Unlock`] when
/// nothing conflicts.
pub fn fcntl_lock<C: IntoFlag<FcntlCommand>>(
    fd: RawFd,
    cmd: C,
    lock: RecordLock,
) -> Result<RecordLock> {
    let cmd = cmd.into_flag()?;
    if !cmd.is_record_lock() {
        return Err(Error::invalid(
            "fcntl",
            format!("{cmd} takes an integer argument, use fcntl"),
        ));
    }
    log_fcntl_debug!(
        "fcntl_lock",
        fd = fd,
        cmd = cmd.symbol(),
        kind = lock.kind.raw(),
        start = lock.start,
        len = lock.len
    );
    sys::fcntl_lock(fd, cmd, lock)
}

/// [`fcntl_lock`] on the blocking pool.
pub fn fcntl_lock_async<C: IntoFlag<FcntlCommand>>(
    fd: RawFd,
    cmd: C,
    lock: RecordLock,
) -> Result<Completion<RecordLock>> {
    let cmd = cmd.into_flag()?;
    completion::dispatch("fcntl", move || fcntl_lock(fd, cmd, lock))
}

#[cfg(unix)]
mod sys {
    use std::io;
    use std::mem;
    use std::os::raw::c_int;

    use nix::errno::Errno;

    use super::{RecordLock, RecordLockKind};
    use crate::error::{Error, Result};
    use crate::flags::{FcntlCommand, SeekOrigin};
    use crate::RawFd;

    pub(super) fn fcntl(fd: RawFd, cmd: FcntlCommand, arg: c_int) -> Result<c_int> {
        // SAFETY: getfd/setfd read only integer arguments.
        Errno::result(unsafe { libc::fcntl(fd, cmd.raw(), arg) })
            .map_err(|errno| Error::fd("fcntl", fd, io::Error::from(errno)))
    }

    pub(super) fn fcntl_lock(fd: RawFd, cmd: FcntlCommand, lock: RecordLock) -> Result<RecordLock> {
        let mut raw = to_raw(lock)?;
        // SAFETY: raw is a valid struct flock that outlives the call.
        Errno::result(unsafe { libc::fcntl(fd, cmd.raw(), &mut raw as *mut libc::flock) })
            .map_err(|errno| Error::fd("fcntl", fd, io::Error::from(errno)))?;
        from_raw(&raw)
    }

    fn to_raw(lock: RecordLock) -> Result<libc::flock> {
        let out_of_range = |what: &str| Error::invalid("fcntl", format!("{what} out of range"));
        // SAFETY: struct flock is plain data; zero is valid for every field.
        let mut raw: libc::flock = unsafe { mem::zeroed() };
        raw.l_type = lock
            .kind
            .raw()
            .try_into()
            .map_err(|_| out_of_range("lock type"))?;
        raw.l_whence = lock
            .origin
            .raw()
            .try_into()
            .map_err(|_| out_of_range("whence"))?;
        raw.l_start = lock.start.try_into().map_err(|_| out_of_range("start"))?;
        raw.l_len = lock.len.try_into().map_err(|_| out_of_range("length"))?;
        raw.l_pid = lock.pid;
        Ok(raw)
    }

    fn from_raw(raw: &libc::flock) -> Result<RecordLock> {
        Ok(RecordLock {
            kind: RecordLockKind::from_raw(c_int::from(raw.l_type))?,
            origin: SeekOrigin::from_raw(c_int::from(raw.l_whence))?,
            start: i64::from(raw.l_start),
            len: i64::from(raw.l_len),
            pid: raw.l_pid,
        })
    }
}

#[cfg(windows)]
mod sys {
    use std::os::raw::c_int;

    use super::RecordLock;
    use crate::error::{Error, Result};
    use crate::flags::FcntlCommand;
    use crate::RawFd;

    pub(super) fn fcntl(_fd: RawFd, _cmd: FcntlCommand, _arg: c_int) -> Result<c_int> {
        Err(Error::Unsupported { op: "fcntl" })
    }

    pub(super) fn fcntl_lock(
        _fd: RawFd,
        _cmd: FcntlCommand,
        _lock: RecordLock,
    ) -> Result<RecordLock> {
        Err(Error::Unsupported { op: "fcntl" })
    }
}
