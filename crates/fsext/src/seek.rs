//! Explicit repositioning of a descriptor's file offset.

use fsext_config::log_seek_debug;

use crate::completion::{self, Completion};
use crate::error::Result;
use crate::flags::{IntoFlag, SeekOrigin};
use crate::RawFd;

/// Move the offset of `fd` and return the new absolute position.
///
/// Seeking past the end is allowed and does not grow the file. A target
/// position before the start fails with
/// [`Error::InvalidArgument`](crate::Error::InvalidArgument).
pub fn seek<O: IntoFlag<SeekOrigin>>(fd: RawFd, offset: i64, origin: O) -> Result<u64> {
    let origin = origin.into_flag()?;
    log_seek_debug!("seek", fd = fd, offset = offset, origin = origin.symbol());
    sys::seek(fd, offset, origin)
}

/// [`seek`] on the blocking pool.
pub fn seek_async<O: IntoFlag<SeekOrigin>>(
    fd: RawFd,
    offset: i64,
    origin: O,
) -> Result<Completion<u64>> {
    let origin = origin.into_flag()?;
    completion::dispatch("seek", move || seek(fd, offset, origin))
}

#[cfg(unix)]
mod sys {
    use std::io;

    use nix::errno::Errno;

    use crate::error::{Error, Result};
    use crate::flags::SeekOrigin;
    use crate::RawFd;

    pub(super) fn seek(fd: RawFd, offset: i64, origin: SeekOrigin) -> Result<u64> {
        let offset = libc::off_t::try_from(offset)
            .map_err(|_| Error::invalid("seek", format!("offset {offset} out of range")))?;
        // SAFETY: lseek only reads its integer arguments.
        let position = Errno::result(unsafe { libc::lseek(fd, offset, origin.raw()) })
            .map_err(|errno| Error::fd("seek", fd, io::Error::from(errno)))?;
        // A successful lseek never returns a negative offset.
        u64::try_from(position)
            .map_err(|_| Error::invalid("seek", format!("negative position {position}")))
    }
}

#[cfg(windows)]
mod sys {
    use std::io;
    use std::mem;

    use winapi::shared::minwindef::DWORD;
    use winapi::shared::ntdef::LARGE_INTEGER;
    use winapi::um::fileapi::SetFilePointerEx;
    use winapi::um::winbase::{FILE_BEGIN, FILE_CURRENT, FILE_END};

    use crate::error::{Error, Result};
    use crate::flags::SeekOrigin;
    use crate::win::os_handle;
    use crate::RawFd;

    pub(super) fn seek(fd: RawFd, offset: i64, origin: SeekOrigin) -> Result<u64> {
        let handle = os_handle("seek", fd)?;
        let method: DWORD = match origin {
            SeekOrigin::Start => FILE_BEGIN,
            SeekOrigin::Current => FILE_CURRENT,
            SeekOrigin::End => FILE_END,
        };

        // SAFETY: LARGE_INTEGER is a plain union of integers.
        let mut distance: LARGE_INTEGER = unsafe { mem::zeroed() };
        let mut position: LARGE_INTEGER = unsafe { mem::zeroed() };
        // SAFETY: QuadPart is the full 64-bit view of the union.
        unsafe { *distance.QuadPart_mut() = offset };

        // SAFETY: handle was validated and position outlives the call.
        let ok = unsafe { SetFilePointerEx(handle, distance, &mut position, method) };
        if ok == 0 {
            return Err(Error::fd("seek", fd, io::Error::last_os_error()));
        }
        // SAFETY: as above.
        let position = unsafe { *position.QuadPart() };
        u64::try_from(position)
            .map_err(|_| Error::invalid("seek", format!("negative position {position}")))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Write;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_seek_positions() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0u8; 10]).unwrap();
        let fd = file.as_raw_fd();

        assert_eq!(seek(fd, 0, "set").unwrap(), 0);
        assert_eq!(seek(fd, 4, SeekOrigin::Current).unwrap(), 4);
        assert_eq!(seek(fd, -3, "cur").unwrap(), 1);
        assert_eq!(seek(fd, -2, "end").unwrap(), 8);
    }

    #[test]
    fn test_seek_past_end_does_not_grow() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"abc").unwrap();

        assert_eq!(seek(file.as_raw_fd(), 100, "end").unwrap(), 103);
        assert_eq!(file.metadata().unwrap().len(), 3);
    }

    #[test]
    fn test_seek_before_start_is_invalid() {
        let file = tempfile::tempfile().unwrap();
        let err = seek(file.as_raw_fd(), -1, "set").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { op: "seek", .. }));
        assert_eq!(err.code(), "EINVAL");
    }

    #[test]
    fn test_seek_rejects_unknown_whence() {
        let file = tempfile::tempfile().unwrap();
        assert!(matches!(
            seek(file.as_raw_fd(), 0, "middle"),
            Err(Error::UnknownFlag { family: "seek", .. })
        ));
        assert!(matches!(
            seek(file.as_raw_fd(), 0, 17),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_seek_bad_descriptor() {
        // Descriptors are handed out lowest-first, so a closed number this
        // high is not reused by tests running alongside.
        let file = tempfile::tempfile().unwrap();
        // SAFETY: F_DUPFD only reads its integer arguments.
        let fd = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_DUPFD, 512) };
        assert!(fd >= 512);
        // SAFETY: fd is the duplicate made above and is closed exactly once.
        assert_eq!(unsafe { libc::close(fd) }, 0);

        let err = seek(fd, 0, "set").unwrap_err();
        assert!(matches!(err, Error::BadDescriptor { op: "seek", .. }));
        assert_eq!(err.code(), "EBADF");

        let err = seek(-1, 0, SeekOrigin::Start).unwrap_err();
        assert!(matches!(err, Error::BadDescriptor { fd: -1, .. }));
    }
}
