//! Numeric values of the flags accepted by the raw integer forms.
//!
//! Values come from the host C headers on unix. Windows has neither `flock`
//! nor `fcntl`; the Linux values stand in there so flags still parse and
//! print the same way.

use std::os::raw::c_int;

#[cfg(unix)]
pub const LOCK_SH: c_int = libc::LOCK_SH;
#[cfg(unix)]
pub const LOCK_EX: c_int = libc::LOCK_EX;
#[cfg(unix)]
pub const LOCK_NB: c_int = libc::LOCK_NB;
#[cfg(unix)]
pub const LOCK_UN: c_int = libc::LOCK_UN;

#[cfg(windows)]
pub const LOCK_SH: c_int = 1;
#[cfg(windows)]
pub const LOCK_EX: c_int = 2;
#[cfg(windows)]
pub const LOCK_NB: c_int = 4;
#[cfg(windows)]
pub const LOCK_UN: c_int = 8;

#[cfg(unix)]
pub const F_GETFD: c_int = libc::F_GETFD;
#[cfg(unix)]
pub const F_SETFD: c_int = libc::F_SETFD;
#[cfg(unix)]
pub const F_GETLK: c_int = libc::F_GETLK;
#[cfg(unix)]
pub const F_SETLK: c_int = libc::F_SETLK;
#[cfg(unix)]
pub const F_SETLKW: c_int = libc::F_SETLKW;
#[cfg(unix)]
pub const FD_CLOEXEC: c_int = libc::FD_CLOEXEC;

#[cfg(windows)]
pub const F_GETFD: c_int = 1;
#[cfg(windows)]
pub const F_SETFD: c_int = 2;
#[cfg(windows)]
pub const F_GETLK: c_int = 5;
#[cfg(windows)]
pub const F_SETLK: c_int = 6;
#[cfg(windows)]
pub const F_SETLKW: c_int = 7;
#[cfg(windows)]
pub const FD_CLOEXEC: c_int = 1;

#[cfg(unix)]
pub const F_RDLCK: c_int = libc::F_RDLCK as c_int;
#[cfg(unix)]
pub const F_WRLCK: c_int = libc::F_WRLCK as c_int;
#[cfg(unix)]
pub const F_UNLCK: c_int = libc::F_UNLCK as c_int;

#[cfg(windows)]
pub const F_RDLCK: c_int = 0;
#[cfg(windows)]
pub const F_WRLCK: c_int = 1;
#[cfg(windows)]
pub const F_UNLCK: c_int = 2;

#[cfg(unix)]
pub const SEEK_SET: c_int = libc::SEEK_SET;
#[cfg(unix)]
pub const SEEK_CUR: c_int = libc::SEEK_CUR;
#[cfg(unix)]
pub const SEEK_END: c_int = libc::SEEK_END;

#[cfg(windows)]
pub const SEEK_SET: c_int = 0;
#[cfg(windows)]
pub const SEEK_CUR: c_int = 1;
#[cfg(windows)]
pub const SEEK_END: c_int = 2;

static TABLE: &[(&str, c_int)] = &[
    ("LOCK_SH", LOCK_SH),
    ("LOCK_EX", LOCK_EX),
    ("LOCK_NB", LOCK_NB),
    ("LOCK_UN", LOCK_UN),
    ("F_GETFD", F_GETFD),
    ("F_SETFD", F_SETFD),
    ("F_GETLK", F_GETLK),
    ("F_SETLK", F_SETLK),
    ("F_SETLKW", F_SETLKW),
    ("FD_CLOEXEC", FD_CLOEXEC),
    ("F_RDLCK", F_RDLCK),
    ("F_WRLCK", F_WRLCK),
    ("F_UNLCK", F_UNLCK),
    ("SEEK_SET", SEEK_SET),
    ("SEEK_CUR", SEEK_CUR),
    ("SEEK_END", SEEK_END),
];

/// Every exported constant with its name, in a stable order.
pub fn table() -> &'static [(&'static str, c_int)] {
    TABLE
}

/// Look up a constant by its C name.
pub fn lookup(name: &str) -> Option<c_int> {
    TABLE
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, value)| *value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_bits_are_distinct() {
        let bits = [LOCK_SH, LOCK_EX, LOCK_NB, LOCK_UN];
        for (i, a) in bits.iter().enumerate() {
            for b in &bits[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("SEEK_SET"), Some(SEEK_SET));
        assert_eq!(lookup("SEEK_END"), Some(SEEK_END));
        assert_eq!(lookup("LOCK_BOGUS"), None);
    }

    #[test]
    fn test_table_covers_fcntl() {
        let names: Vec<&str> = table().iter().map(|(name, _)| *name).collect();
        for expected in ["F_GETFD", "F_SETFD", "F_SETLK", "F_SETLKW", "F_GETLK", "FD_CLOEXEC"] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }
}
