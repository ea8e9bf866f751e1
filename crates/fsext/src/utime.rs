//! Access and modification timestamps.

use std::path::{Path, PathBuf};

use filetime::FileTime;
use fsext_config::log_stat_debug;

use crate::completion::{self, Completion};
use crate::error::{Error, Result};

/// Set the access and modification times of `path`, in whole seconds since
/// the Unix epoch. Symbolic links are followed.
pub fn utime(path: &Path, atime: i64, mtime: i64) -> Result<()> {
    log_stat_debug!(
        "utime",
        path = &*path.to_string_lossy(),
        atime = atime,
        mtime = mtime
    );
    filetime::set_file_times(
        path,
        FileTime::from_unix_time(atime, 0),
        FileTime::from_unix_time(mtime, 0),
    )
    .map_err(|err| Error::path("utime", path, err))
}

/// [`utime`] on the blocking pool.
pub fn utime_async(path: PathBuf, atime: i64, mtime: i64) -> Result<Completion<()>> {
    completion::dispatch("utime", move || utime(&path, atime, mtime))
}
