//! # fsext
//!
//! File-descriptor operations that `std` does not expose: advisory locking
//! (`flock`), file control (`fcntl`), explicit seeking (`lseek`), filesystem
//! statistics (`statvfs`), timestamps (`utime`), and ownership queries that
//! resolve security identities on platforms that have them.
//!
//! Every operation is a thin pass-through to the operating system. The
//! library never takes ownership of a descriptor: callers keep it open for
//! the duration of the call and close it themselves.
//!
//! ## Calling conventions
//!
//! Each operation has a blocking entry point (`flock`, `seek`, ...) and an
//! `*_async` twin that runs the same call on the tokio blocking pool. Flag
//! arguments are validated before anything is dispatched, so an unknown flag
//! fails on the spot in both forms.
//!
//! ```ignore
//! use std::os::unix::io::AsRawFd;
//!
//! let file = std::fs::File::create("/tmp/lockfile")?;
//! fsext::flock(file.as_raw_fd(), "ex")?;
//! fsext::flock_async(file.as_raw_fd(), fsext::LockMode::Unlock)?.await?;
//! ```

pub mod completion;
pub mod constants;
mod error;
pub mod fcntl;
pub mod flags;
pub mod lock;
pub mod ownership;
pub mod seek;
pub mod statvfs;
pub mod utime;
#[cfg(windows)]
mod win;

pub use completion::Completion;
pub use error::{Error, Result};
pub use fcntl::{fcntl, fcntl_async, fcntl_lock, fcntl_lock_async, RecordLock, RecordLockKind};
pub use flags::{FcntlCommand, IntoFlag, LockMode, SeekOrigin};
pub use lock::{flock, flock_async};
pub use ownership::{
    platform_resolver, IdentityResolver, Ownership, PlatformIdentity, PlatformResolver, Stats,
};
pub use seek::{seek, seek_async};
pub use statvfs::{statvfs, statvfs_async, FsStats};
pub use utime::{utime, utime_async};

/// Raw descriptor as handed out by the C runtime.
pub type RawFd = std::os::raw::c_int;
