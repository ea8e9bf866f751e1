use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::RawFd;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single operation.
///
/// Every variant that came back from the operating system keeps the
/// original `io::Error`, so the numeric code and its symbolic name
/// (`EBADF`, `EWOULDBLOCK`, ...) stay available through [`Error::code`].
#[derive(Debug, Error)]
pub enum Error {
    /// A symbolic flag name that is not part of its family.
    #[error("unknown {family} flag: {name:?}")]
    UnknownFlag { family: &'static str, name: String },

    #[error("{op}: invalid argument: {reason}")]
    InvalidArgument {
        op: &'static str,
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("{op}: bad file descriptor {fd}")]
    BadDescriptor {
        op: &'static str,
        fd: RawFd,
        #[source]
        source: io::Error,
    },

    /// A non-blocking request would have had to wait.
    #[error("{op}: resource temporarily unavailable")]
    WouldBlock {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{op}: {}: no such file or directory", path.display())]
    NotFound {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{op}: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// The operation does not exist on this platform.
    #[error("{op}: not supported on this platform")]
    Unsupported { op: &'static str },

    /// The asynchronous form could not be scheduled or was cancelled.
    #[error("{op}: {reason}")]
    Runtime { op: &'static str, reason: String },
}

impl Error {
    pub(crate) fn unknown_flag(family: &'static str, name: impl Into<String>) -> Self {
        Error::UnknownFlag {
            family,
            name: name.into(),
        }
    }

    pub(crate) fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            op,
            reason: reason.into(),
            source: None,
        }
    }

    /// Classify an OS failure of a call made against descriptor `fd`.
    pub(crate) fn fd(op: &'static str, fd: RawFd, source: io::Error) -> Self {
        if is_bad_descriptor(&source) {
            return Error::BadDescriptor { op, fd, source };
        }
        Self::classify(op, None, source)
    }

    /// Classify an OS failure of a call made against `path`.
    pub(crate) fn path(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::classify(op, Some(path.into()), source)
    }

    fn classify(op: &'static str, path: Option<PathBuf>, source: io::Error) -> Self {
        if is_would_block(&source) {
            return Error::WouldBlock { op, source };
        }
        if is_invalid_argument(&source) {
            return Error::InvalidArgument {
                op,
                reason: source.to_string(),
                source: Some(source),
            };
        }
        match (source.kind(), path) {
            (io::ErrorKind::NotFound, Some(path)) => Error::NotFound { op, path, source },
            _ => Error::Os { op, source },
        }
    }

    /// Name of the operation that failed.
    pub fn op(&self) -> &'static str {
        match self {
            Error::UnknownFlag { .. } => "flag",
            Error::InvalidArgument { op, .. }
            | Error::BadDescriptor { op, .. }
            | Error::WouldBlock { op, .. }
            | Error::NotFound { op, .. }
            | Error::Os { op, .. }
            | Error::Unsupported { op }
            | Error::Runtime { op, .. } => op,
        }
    }

    /// The underlying OS error, when there is one.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Error::InvalidArgument { source, .. } => source.as_ref(),
            Error::BadDescriptor { source, .. }
            | Error::WouldBlock { source, .. }
            | Error::NotFound { source, .. }
            | Error::Os { source, .. } => Some(source),
            Error::UnknownFlag { .. } | Error::Unsupported { .. } | Error::Runtime { .. } => None,
        }
    }

    /// Numeric OS error code, when the failure came from the OS.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_error().and_then(io::Error::raw_os_error)
    }

    /// Symbolic error code in POSIX spelling.
    pub fn code(&self) -> String {
        match self {
            Error::UnknownFlag { .. } => "EINVAL".to_string(),
            Error::Unsupported { .. } => "ENOSYS".to_string(),
            Error::Runtime { .. } => "ECANCELED".to_string(),
            Error::InvalidArgument { source: None, .. } => "EINVAL".to_string(),
            Error::WouldBlock { .. } => "EWOULDBLOCK".to_string(),
            Error::BadDescriptor { .. } => "EBADF".to_string(),
            _ => self
                .raw_os_error()
                .map(errno_name)
                .unwrap_or_else(|| "EIO".to_string()),
        }
    }
}

#[cfg(unix)]
fn errno_name(raw: i32) -> String {
    format!("{:?}", nix::errno::Errno::from_raw(raw))
}

#[cfg(windows)]
fn errno_name(raw: i32) -> String {
    use winapi::shared::winerror;

    let name = match raw as u32 {
        winerror::ERROR_ACCESS_DENIED | winerror::ERROR_NOT_ALL_ASSIGNED => "EPERM",
        winerror::ERROR_FILE_NOT_FOUND | winerror::ERROR_PATH_NOT_FOUND => "ENOENT",
        winerror::ERROR_INVALID_HANDLE => "EBADF",
        winerror::ERROR_LOCK_VIOLATION => "EWOULDBLOCK",
        winerror::ERROR_INVALID_PARAMETER
        | winerror::ERROR_INVALID_SID
        | winerror::ERROR_NEGATIVE_SEEK => "EINVAL",
        winerror::ERROR_CANT_RESOLVE_FILENAME => "ELOOP",
        _ => return format!("WIN32_{raw}"),
    };
    name.to_string()
}

#[cfg(unix)]
fn is_bad_descriptor(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EBADF)
}

#[cfg(windows)]
fn is_bad_descriptor(err: &io::Error) -> bool {
    err.raw_os_error() == Some(winapi::shared::winerror::ERROR_INVALID_HANDLE as i32)
}

#[cfg(unix)]
fn is_would_block(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(windows)]
fn is_would_block(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == Some(winapi::shared::winerror::ERROR_LOCK_VIOLATION as i32)
}

#[cfg(unix)]
fn is_invalid_argument(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EINVAL)
}

#[cfg(windows)]
fn is_invalid_argument(err: &io::Error) -> bool {
    use winapi::shared::winerror;

    matches!(
        err.raw_os_error().map(|raw| raw as u32),
        Some(
            winerror::ERROR_INVALID_PARAMETER
                | winerror::ERROR_INVALID_SID
                | winerror::ERROR_NEGATIVE_SEEK
        )
    )
}
