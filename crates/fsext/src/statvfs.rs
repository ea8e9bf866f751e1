//! Capacity and inode statistics of a mounted filesystem.

use std::path::{Path, PathBuf};

use fsext_config::log_statvfs_debug;
use serde::Serialize;

use crate::completion::{self, Completion};
use crate::error::Result;

/// The `statvfs(3)` record. Block counts are in units of `fragment_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FsStats {
    pub block_size: u64,
    pub fragment_size: u64,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
    pub files: u64,
    pub files_free: u64,
    pub files_available: u64,
    pub filesystem_id: u64,
    pub flags: u64,
    pub name_max: u64,
}

impl FsStats {
    pub fn total_bytes(&self) -> u64 {
        self.blocks.saturating_mul(self.fragment_size)
    }

    /// Bytes available to unprivileged callers.
    pub fn available_bytes(&self) -> u64 {
        self.blocks_available.saturating_mul(self.fragment_size)
    }

    pub fn free_bytes(&self) -> u64 {
        self.blocks_free.saturating_mul(self.fragment_size)
    }
}

/// Statistics for the filesystem containing `path`, or `/` when `path` is
/// `None` or empty.
pub fn statvfs(path: Option<&Path>) -> Result<FsStats> {
    let path = resolve(path);
    log_statvfs_debug!("statvfs", path = &*path.to_string_lossy());
    sys::statvfs(&path)
}

/// [`statvfs`] on the blocking pool.
pub fn statvfs_async(path: Option<PathBuf>) -> Result<Completion<FsStats>> {
    completion::dispatch("statvfs", move || statvfs(path.as_deref()))
}

fn resolve(path: Option<&Path>) -> PathBuf {
    match path {
        Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
        _ => PathBuf::from(fsext_config::DEFAULT_STATVFS_PATH),
    }
}

#[cfg(unix)]
mod sys {
    use std::io;
    use std::path::Path;

    use super::FsStats;
    use crate::error::{Error, Result};

    // Field widths differ between platforms.
    #[allow(clippy::unnecessary_cast)]
    pub(super) fn statvfs(path: &Path) -> Result<FsStats> {
        let stat = nix::sys::statvfs::statvfs(path)
            .map_err(|errno| Error::path("statvfs", path, io::Error::from(errno)))?;
        Ok(FsStats {
            block_size: stat.block_size() as u64,
            fragment_size: stat.fragment_size() as u64,
            blocks: stat.blocks() as u64,
            blocks_free: stat.blocks_free() as u64,
            blocks_available: stat.blocks_available() as u64,
            files: stat.files() as u64,
            files_free: stat.files_free() as u64,
            files_available: stat.files_available() as u64,
            filesystem_id: stat.filesystem_id() as u64,
            flags: stat.flags().bits() as u64,
            name_max: stat.name_max() as u64,
        })
    }
}

#[cfg(windows)]
mod sys {
    use std::path::Path;

    use super::FsStats;
    use crate::error::{Error, Result};

    pub(super) fn statvfs(_path: &Path) -> Result<FsStats> {
        Err(Error::Unsupported { op: "statvfs" })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_empty_path_means_root() {
        assert_eq!(resolve(None), PathBuf::from("/"));
        assert_eq!(resolve(Some(Path::new(""))), PathBuf::from("/"));
        assert_eq!(resolve(Some(Path::new("/tmp"))), PathBuf::from("/tmp"));
    }

    #[test]
    fn test_root_statistics() {
        let stats = statvfs(None).unwrap();
        assert!(stats.fragment_size > 0);
        assert!(stats.blocks >= stats.blocks_free);
        assert!(stats.blocks_free >= stats.blocks_available);
        assert!(stats.name_max > 0);
    }

    #[test]
    fn test_same_filesystem_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();

        let outer = statvfs(Some(dir.path())).unwrap();
        let inner = statvfs(Some(&nested)).unwrap();
        assert_eq!(outer.filesystem_id, inner.filesystem_id);
        assert_eq!(outer.blocks, inner.blocks);
    }

    #[test]
    fn test_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = statvfs(Some(&dir.path().join("absent"))).unwrap_err();
        assert!(matches!(err, Error::NotFound { op: "statvfs", .. }));
        assert_eq!(err.code(), "ENOENT");
    }
}
