//! The only FFI calls of the crate
//!
//! Each wrapper is safe to call; the `unsafe` blocks stay in this file.

#![allow(unsafe_code)]

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Bytes available to unprivileged users on the volume holding the existing path `path`
pub(super) fn statvfs_available(path: &Path) -> Option<u64> {
    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;

    // SAFETY: statvfs is plain old data; all-zero is a valid bit pattern
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: c_path is NUL-terminated and outlives the call; stat is a valid out pointer
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &raw mut stat) };
    if rc != 0 {
        return None;
    }

    #[allow(clippy::useless_conversion)]
    let available = u64::from(stat.f_bavail).saturating_mul(u64::from(stat.f_frsize));
    Some(available)
}

/// Real user id of the process
pub(super) fn real_uid() -> u32 {
    // SAFETY: getuid takes no arguments, cannot fail and touches no memory
    unsafe { libc::getuid() }
}
