//! `-user`/`-group`/`-uid`/`-gid`/`-ls`/`-printf %u %g` all need to cross
//! between usernames and numeric ids. This wraps the `getpwnam`/`getgrnam`/
//! `getpwuid`/`getgrgid` family directly via `libc`, the same low-level
//! style `findwalk::os::unix` already uses for `stat`/`readdir`.

use std::ffi::{CStr, CString};
use std::mem;
use std::ptr;

/// Resolve a username to a uid. Returns `None` if no such user exists (the
/// caller falls back to parsing the argument as a plain number, matching
/// GNU find's `-user NAME-or-UID` grammar).
pub fn uid_for_name(name: &str) -> Option<u32> {
    let cname = CString::new(name).ok()?;
    let mut pwd: libc::passwd = unsafe { mem::zeroed() };
    let mut buf = vec![0i8; 16 * 1024];
    let mut result: *mut libc::passwd = ptr::null_mut();
    let rc = unsafe {
        libc::getpwnam_r(
            cname.as_ptr(),
            &mut pwd,
            buf.as_mut_ptr(),
            buf.len(),
            &mut result,
        )
    };
    if rc == 0 && !result.is_null() {
        Some(pwd.pw_uid)
    } else {
        None
    }
}

/// Resolve a group name to a gid. See `uid_for_name`.
pub fn gid_for_name(name: &str) -> Option<u32> {
    let cname = CString::new(name).ok()?;
    let mut grp: libc::group = unsafe { mem::zeroed() };
    let mut buf = vec![0i8; 16 * 1024];
    let mut result: *mut libc::group = ptr::null_mut();
    let rc = unsafe {
        libc::getgrnam_r(
            cname.as_ptr(),
            &mut grp,
            buf.as_mut_ptr(),
            buf.len(),
            &mut result,
        )
    };
    if rc == 0 && !result.is_null() {
        Some(grp.gr_gid)
    } else {
        None
    }
}

/// The inverse lookups `-ls`/`-printf %u`/`%g` need: render a uid/gid as a
/// name when possible, falling back to the plain number (as `ls -l` does
/// for an id with no passwd/group entry).
pub fn name_for_uid(uid: u32) -> String {
    let mut pwd: libc::passwd = unsafe { mem::zeroed() };
    let mut buf = vec![0i8; 16 * 1024];
    let mut result: *mut libc::passwd = ptr::null_mut();
    let rc = unsafe {
        libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
    };
    if rc == 0 && !result.is_null() {
        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        name.to_string_lossy().into_owned()
    } else {
        uid.to_string()
    }
}

/// `-nouser`: true when `uid` has no entry in the password database at
/// all (as opposed to belonging to a user whose name just isn't cached).
pub fn uid_has_passwd_entry(uid: u32) -> bool {
    let mut pwd: libc::passwd = unsafe { mem::zeroed() };
    let mut buf = vec![0i8; 16 * 1024];
    let mut result: *mut libc::passwd = ptr::null_mut();
    let rc = unsafe {
        libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
    };
    rc == 0 && !result.is_null()
}

/// `-nogroup`: see `uid_has_passwd_entry`.
pub fn gid_has_group_entry(gid: u32) -> bool {
    let mut grp: libc::group = unsafe { mem::zeroed() };
    let mut buf = vec![0i8; 16 * 1024];
    let mut result: *mut libc::group = ptr::null_mut();
    let rc = unsafe {
        libc::getgrgid_r(gid, &mut grp, buf.as_mut_ptr(), buf.len(), &mut result)
    };
    rc == 0 && !result.is_null()
}

pub fn name_for_gid(gid: u32) -> String {
    let mut grp: libc::group = unsafe { mem::zeroed() };
    let mut buf = vec![0i8; 16 * 1024];
    let mut result: *mut libc::group = ptr::null_mut();
    let rc = unsafe {
        libc::getgrgid_r(gid, &mut grp, buf.as_mut_ptr(), buf.len(), &mut result)
    };
    if rc == 0 && !result.is_null() {
        let name = unsafe { CStr::from_ptr(grp.gr_name) };
        name.to_string_lossy().into_owned()
    } else {
        gid.to_string()
    }
}
