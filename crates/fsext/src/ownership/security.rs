use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use fsext_config::{log_stat_debug, DEFAULT_MAX_LINK_HOPS};
use serde::{Deserialize, Serialize};

use super::{fd_metadata, follow_links, require_change, IdentityResolver, Ownership, Stats};
use crate::error::{Error, Result};
use crate::RawFd;

/// Security identifier in its string form, e.g. `S-1-5-32-544`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sid(String);

impl Sid {
    /// Wrap a string the OS produced; no validation.
    #[cfg_attr(not(windows), allow(dead_code))]
    pub(crate) fn from_os(sid: String) -> Self {
        Sid(sid)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Sid {
    type Err = Error;

    /// Accepts `S-<revision>-<authority>(-<subauthority>)*` with decimal
    /// components.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::invalid("sid", format!("malformed security identifier {s:?}"));
        let rest = s.strip_prefix("S-").ok_or_else(invalid)?;
        let parts: Vec<&str> = rest.split('-').collect();
        if parts.len() < 2 {
            return Err(invalid());
        }
        if parts
            .iter()
            .any(|part| part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(invalid());
        }
        Ok(Sid(s.to_string()))
    }
}

impl TryFrom<String> for Sid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Sid> for String {
    fn from(sid: Sid) -> Self {
        sid.0
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner and group stored in a file's security descriptor.
///
/// Path lookups act on the named object itself and never follow symbolic
/// links; [`SecurityIdentityResolver`] does the following.
pub trait SecurityDescriptors: Send + Sync {
    fn owner_of_path(&self, path: &Path) -> Result<Ownership<Sid>>;
    fn owner_of_fd(&self, fd: RawFd) -> Result<Ownership<Sid>>;
    fn set_owner_of_path(&self, path: &Path, owner: Option<&Sid>, group: Option<&Sid>)
        -> Result<()>;
    fn set_owner_of_fd(&self, fd: RawFd, owner: Option<&Sid>, group: Option<&Sid>) -> Result<()>;
}

/// Resolver whose identities are SIDs read from security descriptors.
pub struct SecurityIdentityResolver<B> {
    backend: Arc<B>,
    max_link_hops: u32,
}

impl<B> Clone for SecurityIdentityResolver<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            max_link_hops: self.max_link_hops,
        }
    }
}

impl<B: fmt::Debug> fmt::Debug for SecurityIdentityResolver<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityIdentityResolver")
            .field("backend", &self.backend)
            .field("max_link_hops", &self.max_link_hops)
            .finish()
    }
}

impl<B: Default> Default for SecurityIdentityResolver<B> {
    fn default() -> Self {
        Self::with_backend(B::default())
    }
}

impl<B> SecurityIdentityResolver<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            max_link_hops: DEFAULT_MAX_LINK_HOPS,
        }
    }

    /// Links followed by `stat`/`chown` before failing with `ELOOP`.
    pub fn with_max_link_hops(mut self, hops: u32) -> Self {
        self.max_link_hops = hops;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: SecurityDescriptors> IdentityResolver for SecurityIdentityResolver<B> {
    type Identity = Sid;

    fn stat(&self, path: &Path) -> Result<Stats<Sid>> {
        let (target, meta) = follow_links("stat", path, self.max_link_hops)?;
        log_stat_debug!(
            "stat",
            path = &*path.to_string_lossy(),
            resolved = &*target.to_string_lossy()
        );
        let ownership = self.backend.owner_of_path(&target)?;
        Ok(Stats::from_metadata(&meta, ownership))
    }

    fn lstat(&self, path: &Path) -> Result<Stats<Sid>> {
        let meta = fs::symlink_metadata(path).map_err(|err| Error::path("lstat", path, err))?;
        let ownership = self.backend.owner_of_path(path)?;
        Ok(Stats::from_metadata(&meta, ownership))
    }

    fn fstat(&self, fd: RawFd) -> Result<Stats<Sid>> {
        let meta = fd_metadata("fstat", fd)?;
        let ownership = self.backend.owner_of_fd(fd)?;
        Ok(Stats::from_metadata(&meta, ownership))
    }

    fn ownership(&self, path: &Path) -> Result<Ownership<Sid>> {
        let (target, _) = follow_links("getown", path, self.max_link_hops)?;
        self.backend.owner_of_path(&target)
    }

    fn fownership(&self, fd: RawFd) -> Result<Ownership<Sid>> {
        self.backend.owner_of_fd(fd)
    }

    fn chown(&self, path: &Path, owner: Option<Sid>, group: Option<Sid>) -> Result<()> {
        require_change("chown", &owner, &group)?;
        let (target, _) = follow_links("chown", path, self.max_link_hops)?;
        log_stat_debug!(
            "chown",
            path = &*path.to_string_lossy(),
            resolved = &*target.to_string_lossy()
        );
        self.backend
            .set_owner_of_path(&target, owner.as_ref(), group.as_ref())
    }

    fn lchown(&self, path: &Path, owner: Option<Sid>, group: Option<Sid>) -> Result<()> {
        require_change("lchown", &owner, &group)?;
        self.backend
            .set_owner_of_path(path, owner.as_ref(), group.as_ref())
    }

    fn fchown(&self, fd: RawFd, owner: Option<Sid>, group: Option<Sid>) -> Result<()> {
        require_change("fchown", &owner, &group)?;
        self.backend
            .set_owner_of_fd(fd, owner.as_ref(), group.as_ref())
    }
}
