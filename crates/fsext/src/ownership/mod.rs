//! Stat records that carry owner and group identities.
//!
//! A [`Stats`] record is built in two halves: the OS stat call supplies
//! size, mode, times and links, and an [`IdentityResolver`] supplies the
//! owner and group. On unix the identities are the numeric ids already in
//! the stat record. Where identities are security identifiers they come from
//! a separate lookup that does not follow symbolic links, so the resolver
//! walks the link chain itself before asking for them. Both halves then
//! describe the same object.

#[cfg(unix)]
mod numeric;
mod security;
#[cfg(windows)]
mod win32;

use std::fmt;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use filetime::FileTime;
use fsext_config::log_stat_trace;
use serde::Serialize;

use crate::completion::{self, Completion};
use crate::error::{Error, Result};
use crate::RawFd;

#[cfg(unix)]
pub use numeric::NumericIdentityResolver;
pub use security::{SecurityDescriptors, SecurityIdentityResolver, Sid};
#[cfg(windows)]
pub use win32::Win32Security;

/// Resolver used for this platform's native identities.
#[cfg(unix)]
pub type PlatformResolver = NumericIdentityResolver;
#[cfg(windows)]
pub type PlatformResolver = SecurityIdentityResolver<Win32Security>;

pub type PlatformIdentity = <PlatformResolver as IdentityResolver>::Identity;

pub fn platform_resolver() -> PlatformResolver {
    PlatformResolver::default()
}

/// Owner and group of one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Ownership<I> {
    pub owner: I,
    pub group: I,
}

impl<I> Ownership<I> {
    pub fn new(owner: I, group: I) -> Self {
        Self { owner, group }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl From<fs::FileType> for FileKind {
    fn from(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        }
    }
}

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl From<FileTime> for Timestamp {
    fn from(time: FileTime) -> Self {
        Self {
            secs: time.unix_seconds(),
            nanos: time.nanoseconds(),
        }
    }
}

/// A stat record whose owner and group are identities of type `I`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats<I> {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u64,
    pub size: u64,
    pub kind: FileKind,
    pub owner: I,
    pub group: I,
    pub accessed: Timestamp,
    pub modified: Timestamp,
    /// Inode change time on unix, creation time on Windows.
    pub changed: Timestamp,
}

impl<I> Stats<I> {
    /// Combine OS metadata with a separately obtained identity.
    pub fn from_metadata(meta: &Metadata, ownership: Ownership<I>) -> Self {
        let raw = sys::raw_fields(meta);
        Self {
            dev: raw.dev,
            ino: raw.ino,
            mode: raw.mode,
            nlink: raw.nlink,
            size: meta.len(),
            kind: FileKind::from(meta.file_type()),
            owner: ownership.owner,
            group: ownership.group,
            accessed: FileTime::from_last_access_time(meta).into(),
            modified: FileTime::from_last_modification_time(meta).into(),
            changed: raw.changed.into(),
        }
    }

    /// Replace owner and group, keeping every other field.
    pub fn with_ownership<J>(self, ownership: Ownership<J>) -> Stats<J> {
        Stats {
            dev: self.dev,
            ino: self.ino,
            mode: self.mode,
            nlink: self.nlink,
            size: self.size,
            kind: self.kind,
            owner: ownership.owner,
            group: ownership.group,
            accessed: self.accessed,
            modified: self.modified,
            changed: self.changed,
        }
    }

    pub fn ownership(&self) -> Ownership<I>
    where
        I: Clone,
    {
        Ownership::new(self.owner.clone(), self.group.clone())
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// Stat and ownership operations parameterized by identity type.
///
/// `stat` and `chown` follow symbolic links, `lstat` and `lchown` act on
/// the link itself, and the `f*` forms act on an open descriptor. Either
/// `owner` or `group` may be omitted from a change; omitting both is an
/// [`Error::InvalidArgument`].
pub trait IdentityResolver: Send + Sync {
    type Identity: Clone + fmt::Debug + fmt::Display + FromStr + Send + Sync + 'static;

    fn stat(&self, path: &Path) -> Result<Stats<Self::Identity>>;
    fn lstat(&self, path: &Path) -> Result<Stats<Self::Identity>>;
    fn fstat(&self, fd: RawFd) -> Result<Stats<Self::Identity>>;

    /// Owner and group of `path`, following links.
    fn ownership(&self, path: &Path) -> Result<Ownership<Self::Identity>>;
    fn fownership(&self, fd: RawFd) -> Result<Ownership<Self::Identity>>;

    fn chown(
        &self,
        path: &Path,
        owner: Option<Self::Identity>,
        group: Option<Self::Identity>,
    ) -> Result<()>;
    fn lchown(
        &self,
        path: &Path,
        owner: Option<Self::Identity>,
        group: Option<Self::Identity>,
    ) -> Result<()>;
    fn fchown(
        &self,
        fd: RawFd,
        owner: Option<Self::Identity>,
        group: Option<Self::Identity>,
    ) -> Result<()>;

    fn stat_async(&self, path: impl Into<PathBuf>) -> Result<Completion<Stats<Self::Identity>>>
    where
        Self: Clone + 'static,
    {
        let resolver = self.clone();
        let path = path.into();
        completion::dispatch("stat", move || resolver.stat(&path))
    }

    fn lstat_async(&self, path: impl Into<PathBuf>) -> Result<Completion<Stats<Self::Identity>>>
    where
        Self: Clone + 'static,
    {
        let resolver = self.clone();
        let path = path.into();
        completion::dispatch("lstat", move || resolver.lstat(&path))
    }

    fn fstat_async(&self, fd: RawFd) -> Result<Completion<Stats<Self::Identity>>>
    where
        Self: Clone + 'static,
    {
        let resolver = self.clone();
        completion::dispatch("fstat", move || resolver.fstat(fd))
    }

    fn ownership_async(
        &self,
        path: impl Into<PathBuf>,
    ) -> Result<Completion<Ownership<Self::Identity>>>
    where
        Self: Clone + 'static,
    {
        let resolver = self.clone();
        let path = path.into();
        completion::dispatch("getown", move || resolver.ownership(&path))
    }

    fn fownership_async(&self, fd: RawFd) -> Result<Completion<Ownership<Self::Identity>>>
    where
        Self: Clone + 'static,
    {
        let resolver = self.clone();
        completion::dispatch("fgetown", move || resolver.fownership(fd))
    }

    fn chown_async(
        &self,
        path: impl Into<PathBuf>,
        owner: Option<Self::Identity>,
        group: Option<Self::Identity>,
    ) -> Result<Completion<()>>
    where
        Self: Clone + 'static,
    {
        require_change("chown", &owner, &group)?;
        let resolver = self.clone();
        let path = path.into();
        completion::dispatch("chown", move || resolver.chown(&path, owner, group))
    }

    fn lchown_async(
        &self,
        path: impl Into<PathBuf>,
        owner: Option<Self::Identity>,
        group: Option<Self::Identity>,
    ) -> Result<Completion<()>>
    where
        Self: Clone + 'static,
    {
        require_change("lchown", &owner, &group)?;
        let resolver = self.clone();
        let path = path.into();
        completion::dispatch("lchown", move || resolver.lchown(&path, owner, group))
    }

    fn fchown_async(
        &self,
        fd: RawFd,
        owner: Option<Self::Identity>,
        group: Option<Self::Identity>,
    ) -> Result<Completion<()>>
    where
        Self: Clone + 'static,
    {
        require_change("fchown", &owner, &group)?;
        let resolver = self.clone();
        completion::dispatch("fchown", move || resolver.fchown(fd, owner, group))
    }
}

pub(crate) fn require_change<I>(op: &'static str, owner: &Option<I>, group: &Option<I>) -> Result<()> {
    if owner.is_none() && group.is_none() {
        return Err(Error::invalid(op, "owner or group is required"));
    }
    Ok(())
}

/// Where a link stored as `target` inside `link` points. Relative targets
/// are relative to the directory holding the link.
pub fn resolve_link_target(link: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        return target.to_path_buf();
    }
    match link.parent() {
        Some(dir) => dir.join(target),
        None => target.to_path_buf(),
    }
}

/// Walk the symlink chain starting at `path` and return the first
/// non-link path together with its metadata.
pub(crate) fn follow_links(
    op: &'static str,
    path: &Path,
    max_hops: u32,
) -> Result<(PathBuf, Metadata)> {
    let mut current = path.to_path_buf();
    let mut hops = 0;
    loop {
        let meta = fs::symlink_metadata(&current).map_err(|err| Error::path(op, &current, err))?;
        if !meta.file_type().is_symlink() {
            return Ok((current, meta));
        }
        if hops == max_hops {
            return Err(Error::path(op, current, sys::too_many_links()));
        }
        hops += 1;

        let target = fs::read_link(&current).map_err(|err| Error::path(op, &current, err))?;
        let next = resolve_link_target(&current, &target);
        log_stat_trace!(
            "following link",
            link = &*current.to_string_lossy(),
            target = &*next.to_string_lossy(),
            hop = hops
        );
        current = next;
    }
}

/// Metadata of the file open at `fd`. The descriptor is borrowed, never
/// duplicated or closed.
pub(crate) fn fd_metadata(op: &'static str, fd: RawFd) -> Result<Metadata> {
    sys::fd_metadata(op, fd)
}

struct RawFields {
    dev: u64,
    ino: u64,
    mode: u32,
    nlink: u64,
    changed: FileTime,
}

#[cfg(unix)]
mod sys {
    use std::fs::{File, Metadata};
    use std::io;
    use std::mem::ManuallyDrop;
    use std::os::unix::fs::MetadataExt;
    use std::os::unix::io::FromRawFd;

    use filetime::FileTime;
    use nix::errno::Errno;

    use super::RawFields;
    use crate::error::{Error, Result};
    use crate::RawFd;

    pub(super) fn raw_fields(meta: &Metadata) -> RawFields {
        RawFields {
            dev: meta.dev(),
            ino: meta.ino(),
            mode: meta.mode(),
            nlink: meta.nlink(),
            changed: FileTime::from_unix_time(meta.ctime(), meta.ctime_nsec() as u32),
        }
    }

    pub(super) fn too_many_links() -> io::Error {
        io::Error::from_raw_os_error(libc::ELOOP)
    }

    pub(super) fn fd_metadata(op: &'static str, fd: RawFd) -> Result<Metadata> {
        // SAFETY: F_GETFD only reads the descriptor table entry.
        Errno::result(unsafe { libc::fcntl(fd, libc::F_GETFD) })
            .map_err(|errno| Error::fd(op, fd, io::Error::from(errno)))?;
        // SAFETY: fd was just confirmed open and stays owned by the caller;
        // ManuallyDrop keeps it from being closed here.
        let file = ManuallyDrop::new(unsafe { File::from_raw_fd(fd) });
        file.metadata().map_err(|err| Error::fd(op, fd, err))
    }
}

#[cfg(windows)]
mod sys {
    use std::fs::{File, Metadata};
    use std::io;
    use std::mem::ManuallyDrop;
    use std::os::windows::fs::MetadataExt;
    use std::os::windows::io::{FromRawHandle, RawHandle};

    use filetime::FileTime;
    use winapi::shared::winerror::ERROR_CANT_RESOLVE_FILENAME;
    use winapi::um::winnt::FILE_ATTRIBUTE_READONLY;

    use super::RawFields;
    use crate::error::Result;
    use crate::win::os_handle;
    use crate::RawFd;

    const S_IFDIR: u32 = 0o040_000;
    const S_IFREG: u32 = 0o100_000;
    const S_IFLNK: u32 = 0o120_000;

    pub(super) fn raw_fields(meta: &Metadata) -> RawFields {
        let file_type = meta.file_type();
        let kind = if file_type.is_symlink() {
            S_IFLNK
        } else if file_type.is_dir() {
            S_IFDIR
        } else {
            S_IFREG
        };
        let mut perm = if meta.file_attributes() & FILE_ATTRIBUTE_READONLY != 0 {
            0o444
        } else {
            0o666
        };
        if file_type.is_dir() {
            perm |= 0o111;
        }
        RawFields {
            dev: 0,
            ino: 0,
            mode: kind | perm,
            nlink: 1,
            changed: FileTime::from_creation_time(meta)
                .unwrap_or_else(|| FileTime::from_last_modification_time(meta)),
        }
    }

    pub(super) fn too_many_links() -> io::Error {
        io::Error::from_raw_os_error(ERROR_CANT_RESOLVE_FILENAME as i32)
    }

    pub(super) fn fd_metadata(op: &'static str, fd: RawFd) -> Result<Metadata> {
        let handle = os_handle(op, fd)?;
        // SAFETY: the handle stays owned by the descriptor; ManuallyDrop
        // keeps it from being closed here.
        let file = ManuallyDrop::new(unsafe { File::from_raw_handle(handle as RawHandle) });
        file.metadata()
            .map_err(|err| crate::error::Error::fd(op, fd, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_target_uses_link_directory() {
        let resolved = resolve_link_target(Path::new("/a/b/link"), Path::new("target"));
        assert_eq!(resolved, PathBuf::from("/a/b/target"));

        let resolved = resolve_link_target(Path::new("/a/b/link"), Path::new("../c/target"));
        assert_eq!(resolved, PathBuf::from("/a/b/../c/target"));
    }

    #[test]
    fn test_absolute_target_used_as_is() {
        let resolved = resolve_link_target(Path::new("/a/b/link"), Path::new("/x/y"));
        assert_eq!(resolved, PathBuf::from("/x/y"));
    }

    #[test]
    fn test_bare_link_name_resolves_in_working_directory() {
        let resolved = resolve_link_target(Path::new("link"), Path::new("target"));
        assert_eq!(resolved, PathBuf::from("target"));
    }

    #[test]
    fn test_require_change() {
        assert!(require_change::<u32>("chown", &None, &None).is_err());
        assert!(require_change("chown", &Some(1u32), &None).is_ok());
        assert!(require_change("chown", &None, &Some(1u32)).is_ok());
    }

    #[test]
    fn test_with_ownership_keeps_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, b"hello").unwrap();
        let meta = std::fs::metadata(&path).unwrap();

        let stats = Stats::from_metadata(&meta, Ownership::new(1u32, 2u32));
        let merged = stats.clone().with_ownership(Ownership::new("alice", "staff"));

        assert_eq!(merged.size, 5);
        assert_eq!(merged.mode, stats.mode);
        assert_eq!(merged.modified, stats.modified);
        assert_eq!(merged.ownership(), Ownership::new("alice", "staff"));
        assert_eq!(merged.kind, FileKind::File);
    }

    #[cfg(unix)]
    #[test]
    fn test_follow_links_stops_at_loop() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::os::unix::fs::symlink("b", &a).unwrap();
        std::os::unix::fs::symlink("a", &b).unwrap();

        let err = follow_links("stat", &a, 40).unwrap_err();
        assert_eq!(err.code(), "ELOOP");
    }

    #[cfg(unix)]
    #[test]
    fn test_follow_links_chain() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/target"), b"abc").unwrap();
        std::os::unix::fs::symlink("sub/target", dir.path().join("first")).unwrap();
        std::os::unix::fs::symlink("target", dir.path().join("sub/second")).unwrap();
        std::os::unix::fs::symlink("sub/second", dir.path().join("third")).unwrap();

        let (path, meta) = follow_links("stat", &dir.path().join("third"), 40).unwrap();
        assert_eq!(path, dir.path().join("sub/target"));
        assert_eq!(meta.len(), 3);

        let err = follow_links("stat", &dir.path().join("third"), 1).unwrap_err();
        assert_eq!(err.code(), "ELOOP");
    }

    #[cfg(unix)]
    #[test]
    fn test_fd_metadata_negative_descriptor() {
        let err = fd_metadata("fstat", -1).unwrap_err();
        assert!(matches!(err, Error::BadDescriptor { fd: -1, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_fd_metadata_closed_descriptor() {
        use std::os::unix::io::AsRawFd;

        let file = tempfile::tempfile().unwrap();
        // SAFETY: F_DUPFD only reads its integer arguments.
        let fd = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_DUPFD, 700) };
        assert!(fd >= 700);
        // SAFETY: fd is the duplicate made above and is closed exactly once.
        assert_eq!(unsafe { libc::close(fd) }, 0);

        let err = fd_metadata("fstat", fd).unwrap_err();
        assert!(matches!(err, Error::BadDescriptor { op: "fstat", .. }));
        assert_eq!(err.code(), "EBADF");

        let open = fd_metadata("fstat", file.as_raw_fd()).unwrap();
        assert!(open.is_file());
    }
}
