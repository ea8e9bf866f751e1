use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use fsext_config::log_stat_debug;
use nix::errno::Errno;

use super::{fd_metadata, require_change, IdentityResolver, Ownership, Stats};
use crate::error::{Error, Result};
use crate::RawFd;

/// Numeric uid/gid identities, straight from the OS stat and chown calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericIdentityResolver;

impl NumericIdentityResolver {
    pub fn new() -> Self {
        Self
    }
}

fn ownership_of(meta: &fs::Metadata) -> Ownership<u32> {
    Ownership::new(meta.uid(), meta.gid())
}

fn c_path(op: &'static str, path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::invalid(op, format!("{} contains a NUL byte", path.display())))
}

/// `(uid_t)-1` and `(gid_t)-1` leave the id unchanged.
fn ids(owner: Option<u32>, group: Option<u32>) -> (libc::uid_t, libc::gid_t) {
    (
        owner.unwrap_or(libc::uid_t::MAX),
        group.unwrap_or(libc::gid_t::MAX),
    )
}

impl IdentityResolver for NumericIdentityResolver {
    type Identity = u32;

    fn stat(&self, path: &Path) -> Result<Stats<u32>> {
        let meta = fs::metadata(path).map_err(|err| Error::path("stat", path, err))?;
        Ok(Stats::from_metadata(&meta, ownership_of(&meta)))
    }

    fn lstat(&self, path: &Path) -> Result<Stats<u32>> {
        let meta = fs::symlink_metadata(path).map_err(|err| Error::path("lstat", path, err))?;
        Ok(Stats::from_metadata(&meta, ownership_of(&meta)))
    }

    fn fstat(&self, fd: RawFd) -> Result<Stats<u32>> {
        let meta = fd_metadata("fstat", fd)?;
        Ok(Stats::from_metadata(&meta, ownership_of(&meta)))
    }

    fn ownership(&self, path: &Path) -> Result<Ownership<u32>> {
        let meta = fs::metadata(path).map_err(|err| Error::path("getown", path, err))?;
        Ok(ownership_of(&meta))
    }

    fn fownership(&self, fd: RawFd) -> Result<Ownership<u32>> {
        fd_metadata("fgetown", fd).map(|meta| ownership_of(&meta))
    }

    fn chown(&self, path: &Path, owner: Option<u32>, group: Option<u32>) -> Result<()> {
        require_change("chown", &owner, &group)?;
        let c_path = c_path("chown", path)?;
        let (uid, gid) = ids(owner, group);
        log_stat_debug!("chown", path = &*path.to_string_lossy(), uid = uid, gid = gid);
        // SAFETY: c_path is NUL-terminated and outlives the call.
        Errno::result(unsafe { libc::chown(c_path.as_ptr(), uid, gid) })
            .map(drop)
            .map_err(|errno| Error::path("chown", path, io::Error::from(errno)))
    }

    fn lchown(&self, path: &Path, owner: Option<u32>, group: Option<u32>) -> Result<()> {
        require_change("lchown", &owner, &group)?;
        let c_path = c_path("lchown", path)?;
        let (uid, gid) = ids(owner, group);
        // SAFETY: as in chown.
        Errno::result(unsafe { libc::lchown(c_path.as_ptr(), uid, gid) })
            .map(drop)
            .map_err(|errno| Error::path("lchown", path, io::Error::from(errno)))
    }

    fn fchown(&self, fd: RawFd, owner: Option<u32>, group: Option<u32>) -> Result<()> {
        require_change("fchown", &owner, &group)?;
        let (uid, gid) = ids(owner, group);
        // SAFETY: fchown only reads its integer arguments.
        Errno::result(unsafe { libc::fchown(fd, uid, gid) })
            .map(drop)
            .map_err(|errno| Error::fd("fchown", fd, io::Error::from(errno)))
    }
}
