//! Security descriptors through the Win32 ACL API.

use std::ffi::OsStr;
use std::io;
use std::ptr;

use fsext_config::{log_stat_trace, log_stat_warn};
use winapi::ctypes::c_void;
use winapi::shared::minwindef::{DWORD, FALSE};
use winapi::shared::ntdef::{HANDLE, LUID};
use winapi::shared::sddl::{ConvertSidToStringSidW, ConvertStringSidToSidW};
use winapi::shared::winerror::{ERROR_NOT_ALL_ASSIGNED, ERROR_SUCCESS};
use winapi::um::accctrl::SE_FILE_OBJECT;
use winapi::um::aclapi::{GetNamedSecurityInfoW, GetSecurityInfo, SetNamedSecurityInfoW, SetSecurityInfo};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::handleapi::CloseHandle;
use winapi::um::processthreadsapi::{GetCurrentProcess, OpenProcessToken};
use winapi::um::securitybaseapi::AdjustTokenPrivileges;
use winapi::um::winbase::{LocalFree, LookupPrivilegeValueW};
use winapi::um::winnt::{
    GROUP_SECURITY_INFORMATION, LUID_AND_ATTRIBUTES, OWNER_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR,
    PSID, SECURITY_INFORMATION, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES,
    TOKEN_QUERY,
};

use super::security::{SecurityDescriptors, Sid};
use super::Ownership;
use crate::error::{Error, Result};
use crate::win::{from_wide_ptr, os_handle, wide};
use crate::RawFd;

/// Privileges that let the caller assign any owner, not just itself.
const TAKE_OWNERSHIP_PRIVILEGES: [&str; 4] = [
    "SeTakeOwnershipPrivilege",
    "SeSecurityPrivilege",
    "SeBackupPrivilege",
    "SeRestorePrivilege",
];

/// The Win32 security-descriptor backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Security;

impl SecurityDescriptors for Win32Security {
    fn owner_of_path(&self, path: &std::path::Path) -> Result<Ownership<Sid>> {
        let name = wide(path.as_os_str());
        let mut owner: PSID = ptr::null_mut();
        let mut group: PSID = ptr::null_mut();
        let mut descriptor: PSECURITY_DESCRIPTOR = ptr::null_mut();

        // SAFETY: name is NUL-terminated; the out pointers point into the
        // returned descriptor, which LocalBox frees.
        let status = unsafe {
            GetNamedSecurityInfoW(
                name.as_ptr(),
                SE_FILE_OBJECT,
                OWNER_SECURITY_INFORMATION | GROUP_SECURITY_INFORMATION,
                &mut owner,
                &mut group,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut descriptor,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(Error::path(
                "getown",
                path,
                io::Error::from_raw_os_error(status as i32),
            ));
        }
        let _descriptor = LocalBox(descriptor);
        Ok(Ownership::new(
            sid_to_string("getown", owner)?,
            sid_to_string("getown", group)?,
        ))
    }

    fn owner_of_fd(&self, fd: RawFd) -> Result<Ownership<Sid>> {
        let handle = os_handle("fgetown", fd)?;
        let mut owner: PSID = ptr::null_mut();
        let mut group: PSID = ptr::null_mut();
        let mut descriptor: PSECURITY_DESCRIPTOR = ptr::null_mut();

        // SAFETY: as in owner_of_path; handle was validated.
        let status = unsafe {
            GetSecurityInfo(
                handle,
                SE_FILE_OBJECT,
                OWNER_SECURITY_INFORMATION | GROUP_SECURITY_INFORMATION,
                &mut owner,
                &mut group,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut descriptor,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(Error::fd(
                "fgetown",
                fd,
                io::Error::from_raw_os_error(status as i32),
            ));
        }
        let _descriptor = LocalBox(descriptor);
        Ok(Ownership::new(
            sid_to_string("fgetown", owner)?,
            sid_to_string("fgetown", group)?,
        ))
    }

    fn set_owner_of_path(
        &self,
        path: &std::path::Path,
        owner: Option<&Sid>,
        group: Option<&Sid>,
    ) -> Result<()> {
        let change = Change::new("chown", owner, group)?;
        let mut name = wide(path.as_os_str());
        let _privileges = PrivilegeGuard::acquire();

        // SAFETY: name is NUL-terminated; the SIDs live until change drops.
        let status = unsafe {
            SetNamedSecurityInfoW(
                name.as_mut_ptr(),
                SE_FILE_OBJECT,
                change.information,
                change.owner(),
                change.group(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(Error::path(
                "chown",
                path,
                io::Error::from_raw_os_error(status as i32),
            ));
        }
        Ok(())
    }

    fn set_owner_of_fd(&self, fd: RawFd, owner: Option<&Sid>, group: Option<&Sid>) -> Result<()> {
        let handle = os_handle("fchown", fd)?;
        let change = Change::new("fchown", owner, group)?;
        let _privileges = PrivilegeGuard::acquire();

        // SAFETY: handle was validated; the SIDs live until change drops.
        let status = unsafe {
            SetSecurityInfo(
                handle,
                SE_FILE_OBJECT,
                change.information,
                change.owner(),
                change.group(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(Error::fd(
                "fchown",
                fd,
                io::Error::from_raw_os_error(status as i32),
            ));
        }
        Ok(())
    }
}

/// Memory the API allocated with `LocalAlloc`.
struct LocalBox(*mut c_void);

impl Drop for LocalBox {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from an API documented to need LocalFree.
            unsafe { LocalFree(self.0) };
        }
    }
}

/// Binary SIDs for one set-owner call.
struct Change {
    information: SECURITY_INFORMATION,
    owner: Option<LocalBox>,
    group: Option<LocalBox>,
}

impl Change {
    fn new(op: &'static str, owner: Option<&Sid>, group: Option<&Sid>) -> Result<Self> {
        let mut information = 0;
        if owner.is_some() {
            information |= OWNER_SECURITY_INFORMATION;
        }
        if group.is_some() {
            information |= GROUP_SECURITY_INFORMATION;
        }
        Ok(Self {
            information,
            owner: owner.map(|sid| string_to_sid(op, sid)).transpose()?,
            group: group.map(|sid| string_to_sid(op, sid)).transpose()?,
        })
    }

    fn owner(&self) -> PSID {
        self.owner.as_ref().map_or(ptr::null_mut(), |sid| sid.0)
    }

    fn group(&self) -> PSID {
        self.group.as_ref().map_or(ptr::null_mut(), |sid| sid.0)
    }
}

fn sid_to_string(op: &'static str, sid: PSID) -> Result<Sid> {
    let mut text: *mut u16 = ptr::null_mut();
    // SAFETY: sid points into a live security descriptor.
    if unsafe { ConvertSidToStringSidW(sid, &mut text) } == 0 {
        return Err(Error::Os {
            op,
            source: io::Error::last_os_error(),
        });
    }
    let text = LocalBox(text.cast());
    // SAFETY: ConvertSidToStringSidW returns a NUL-terminated string.
    let sid = unsafe { from_wide_ptr(text.0 as *const u16) };
    Ok(Sid::from_os(sid))
}

fn string_to_sid(op: &'static str, sid: &Sid) -> Result<LocalBox> {
    let text = wide(OsStr::new(sid.as_str()));
    let mut binary: PSID = ptr::null_mut();
    // SAFETY: text is NUL-terminated; binary is freed by LocalBox.
    if unsafe { ConvertStringSidToSidW(text.as_ptr(), &mut binary) } == 0 {
        let source = io::Error::last_os_error();
        return Err(Error::InvalidArgument {
            op,
            reason: format!("cannot convert {sid}: {source}"),
            source: Some(source),
        });
    }
    Ok(LocalBox(binary))
}

/// Enables the take-ownership privileges for its lifetime.
///
/// A privilege the process does not hold is skipped; the subsequent
/// security call then fails with the OS error that explains why.
struct PrivilegeGuard {
    token: HANDLE,
    enabled: Vec<LUID>,
}

impl PrivilegeGuard {
    fn acquire() -> Self {
        let mut token: HANDLE = ptr::null_mut();
        // SAFETY: GetCurrentProcess returns a pseudo handle; token receives
        // a real handle that Drop closes.
        let opened = unsafe {
            OpenProcessToken(
                GetCurrentProcess(),
                TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
                &mut token,
            )
        };
        if opened == 0 {
            log_stat_warn!(
                "cannot open process token",
                error = &*io::Error::last_os_error().to_string()
            );
            return Self {
                token: ptr::null_mut(),
                enabled: Vec::new(),
            };
        }

        let mut enabled = Vec::new();
        for name in TAKE_OWNERSHIP_PRIVILEGES {
            let Some(luid) = lookup_privilege(name) else {
                continue;
            };
            match set_privilege(token, luid, SE_PRIVILEGE_ENABLED) {
                Ok(()) => enabled.push(luid),
                Err(err) => log_stat_trace!(
                    "privilege not held",
                    privilege = name,
                    error = &*err.to_string()
                ),
            }
        }
        Self { token, enabled }
    }
}

impl Drop for PrivilegeGuard {
    fn drop(&mut self) {
        if self.token.is_null() {
            return;
        }
        for luid in self.enabled.drain(..) {
            if let Err(err) = set_privilege(self.token, luid, 0) {
                log_stat_warn!(
                    "failed to drop take-ownership privilege",
                    error = &*err.to_string()
                );
            }
        }
        // SAFETY: token was opened by acquire and is closed once.
        unsafe { CloseHandle(self.token) };
    }
}

fn lookup_privilege(name: &str) -> Option<LUID> {
    let name = wide(OsStr::new(name));
    // SAFETY: LUID is plain data.
    let mut luid: LUID = unsafe { std::mem::zeroed() };
    // SAFETY: name is NUL-terminated and luid outlives the call.
    let ok = unsafe { LookupPrivilegeValueW(ptr::null(), name.as_ptr(), &mut luid) };
    (ok != 0).then_some(luid)
}

fn set_privilege(token: HANDLE, luid: LUID, attributes: DWORD) -> io::Result<()> {
    let mut privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: attributes,
        }],
    };
    // SAFETY: privileges is a valid single-entry TOKEN_PRIVILEGES.
    let ok = unsafe {
        AdjustTokenPrivileges(
            token,
            FALSE,
            &mut privileges,
            0,
            ptr::null_mut(),
            ptr::null_mut(),
        )
    };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    // AdjustTokenPrivileges succeeds even when the privilege is not held.
    // SAFETY: reads the calling thread's last-error value.
    let last = unsafe { GetLastError() };
    if last == ERROR_NOT_ALL_ASSIGNED {
        return Err(io::Error::from_raw_os_error(last as i32));
    }
    Ok(())
}
