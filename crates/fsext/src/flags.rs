//! Typed flag families.
//!
//! Each family accepts three spellings: the enum itself, its short symbolic
//! name (`"ex"`, `"setlk"`, `"cur"`), or the raw platform integer. All three
//! funnel through [`IntoFlag`], which rejects anything outside the family
//! before a system call is attempted.

use std::fmt;
use std::os::raw::c_int;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Error, Result};

/// Conversion of a caller-supplied flag into a typed value.
pub trait IntoFlag<T> {
    fn into_flag(self) -> Result<T>;
}

macro_rules! flag_family {
    ($ty:ty) => {
        impl IntoFlag<$ty> for $ty {
            fn into_flag(self) -> Result<$ty> {
                Ok(self)
            }
        }

        impl IntoFlag<$ty> for &str {
            fn into_flag(self) -> Result<$ty> {
                self.parse()
            }
        }

        impl IntoFlag<$ty> for &String {
            fn into_flag(self) -> Result<$ty> {
                self.parse()
            }
        }

        impl IntoFlag<$ty> for String {
            fn into_flag(self) -> Result<$ty> {
                self.parse()
            }
        }

        impl IntoFlag<$ty> for c_int {
            fn into_flag(self) -> Result<$ty> {
                <$ty>::from_raw(self)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.symbol())
            }
        }
    };
}

/// Advisory lock request for `flock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    #[serde(rename = "sh")]
    Shared,
    #[serde(rename = "ex")]
    Exclusive,
    #[serde(rename = "shnb")]
    SharedNonBlocking,
    #[serde(rename = "exnb")]
    ExclusiveNonBlocking,
    #[serde(rename = "un")]
    Unlock,
}

impl LockMode {
    pub const ALL: [LockMode; 5] = [
        LockMode::Shared,
        LockMode::Exclusive,
        LockMode::SharedNonBlocking,
        LockMode::ExclusiveNonBlocking,
        LockMode::Unlock,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            LockMode::Shared => "sh",
            LockMode::Exclusive => "ex",
            LockMode::SharedNonBlocking => "shnb",
            LockMode::ExclusiveNonBlocking => "exnb",
            LockMode::Unlock => "un",
        }
    }

    pub fn raw(self) -> c_int {
        match self {
            LockMode::Shared => constants::LOCK_SH,
            LockMode::Exclusive => constants::LOCK_EX,
            LockMode::SharedNonBlocking => constants::LOCK_SH | constants::LOCK_NB,
            LockMode::ExclusiveNonBlocking => constants::LOCK_EX | constants::LOCK_NB,
            LockMode::Unlock => constants::LOCK_UN,
        }
    }

    /// Inverse of [`LockMode::raw`]. `LOCK_UN | LOCK_NB` is accepted as an
    /// unlock since releasing never waits.
    pub fn from_raw(raw: c_int) -> Result<Self> {
        LockMode::ALL
            .into_iter()
            .find(|mode| mode.raw() == raw)
            .or_else(|| (raw == constants::LOCK_UN | constants::LOCK_NB).then_some(LockMode::Unlock))
            .ok_or_else(|| Error::invalid("flock", format!("unsupported lock operation {raw:#x}")))
    }

    pub fn is_exclusive(self) -> bool {
        matches!(self, LockMode::Exclusive | LockMode::ExclusiveNonBlocking)
    }

    pub fn is_non_blocking(self) -> bool {
        matches!(
            self,
            LockMode::SharedNonBlocking | LockMode::ExclusiveNonBlocking
        )
    }
}

impl FromStr for LockMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LockMode::ALL
            .into_iter()
            .find(|mode| mode.symbol() == s)
            .ok_or_else(|| Error::unknown_flag("flock", s))
    }
}

flag_family!(LockMode);

/// Command for `fcntl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FcntlCommand {
    GetFd,
    SetFd,
    #[serde(rename = "setlk")]
    SetLock,
    #[serde(rename = "setlkw")]
    SetLockWait,
    #[serde(rename = "getlk")]
    GetLock,
}

impl FcntlCommand {
    pub const ALL: [FcntlCommand; 5] = [
        FcntlCommand::GetFd,
        FcntlCommand::SetFd,
        FcntlCommand::SetLock,
        FcntlCommand::SetLockWait,
        FcntlCommand::GetLock,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            FcntlCommand::GetFd => "getfd",
            FcntlCommand::SetFd => "setfd",
            FcntlCommand::SetLock => "setlk",
            FcntlCommand::SetLockWait => "setlkw",
            FcntlCommand::GetLock => "getlk",
        }
    }

    pub fn raw(self) -> c_int {
        match self {
            FcntlCommand::GetFd => constants::F_GETFD,
            FcntlCommand::SetFd => constants::F_SETFD,
            FcntlCommand::SetLock => constants::F_SETLK,
            FcntlCommand::SetLockWait => constants::F_SETLKW,
            FcntlCommand::GetLock => constants::F_GETLK,
        }
    }

    pub fn from_raw(raw: c_int) -> Result<Self> {
        FcntlCommand::ALL
            .into_iter()
            .find(|cmd| cmd.raw() == raw)
            .ok_or_else(|| Error::invalid("fcntl", format!("unsupported command {raw}")))
    }

    /// Commands whose argument is a lock record rather than an integer.
    pub fn is_record_lock(self) -> bool {
        matches!(
            self,
            FcntlCommand::SetLock | FcntlCommand::SetLockWait | FcntlCommand::GetLock
        )
    }
}

impl FromStr for FcntlCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FcntlCommand::ALL
            .into_iter()
            .find(|cmd| cmd.symbol() == s)
            .ok_or_else(|| Error::unknown_flag("fcntl", s))
    }
}

flag_family!(FcntlCommand);

/// Reference point for `seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeekOrigin {
    #[serde(rename = "set")]
    Start,
    #[serde(rename = "cur")]
    Current,
    #[serde(rename = "end")]
    End,
}

impl SeekOrigin {
    pub const ALL: [SeekOrigin; 3] = [SeekOrigin::Start, SeekOrigin::Current, SeekOrigin::End];

    pub fn symbol(self) -> &'static str {
        match self {
            SeekOrigin::Start => "set",
            SeekOrigin::Current => "cur",
            SeekOrigin::End => "end",
        }
    }

    pub fn raw(self) -> c_int {
        match self {
            SeekOrigin::Start => constants::SEEK_SET,
            SeekOrigin::Current => constants::SEEK_CUR,
            SeekOrigin::End => constants::SEEK_END,
        }
    }

    pub fn from_raw(raw: c_int) -> Result<Self> {
        SeekOrigin::ALL
            .into_iter()
            .find(|origin| origin.raw() == raw)
            .ok_or_else(|| Error::invalid("seek", format!("unsupported whence {raw}")))
    }
}

impl FromStr for SeekOrigin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SeekOrigin::ALL
            .into_iter()
            .find(|origin| origin.symbol() == s)
            .ok_or_else(|| Error::unknown_flag("seek", s))
    }
}

flag_family!(SeekOrigin);
