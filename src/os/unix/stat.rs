use std::ffi::{CStr, CString, OsString};
use std::fmt;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStringExt;
use std::os::unix::io::RawFd;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use libc;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
use libc::{fstatat as fstatat64, lstat as lstat64, stat as stat64};
#[cfg(any(target_os = "linux", target_os = "android"))]
use libc::{fstatat64, lstat64, stat64};

use crate::os::unix::FileType;

/// A thin wrapper around the platform's raw `stat` structure.
///
/// This is what `stat_info` in a `FileVisit` gets materialised into once a
/// predicate sets `needs_stat`; it is deliberately not built eagerly for
/// every visited entry.
#[derive(Clone, Copy)]
pub struct Metadata {
    stat: stat64,
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("dev", &self.dev())
            .field("ino", &self.ino())
            .field("mode", &self.mode())
            .field("len", &self.len())
            .finish()
    }
}

impl Metadata {
    pub fn file_type(&self) -> FileType {
        FileType::from_stat_mode(self.stat.st_mode as u64)
    }

    pub fn len(&self) -> u64 {
        self.stat.st_size as u64
    }

    pub fn dev(&self) -> u64 {
        self.stat.st_dev as u64
    }

    pub fn ino(&self) -> u64 {
        self.stat.st_ino as u64
    }

    pub fn mode(&self) -> u64 {
        self.stat.st_mode as u64
    }

    pub fn nlink(&self) -> u64 {
        self.stat.st_nlink as u64
    }

    pub fn uid(&self) -> u32 {
        self.stat.st_uid
    }

    pub fn gid(&self) -> u32 {
        self.stat.st_gid
    }

    pub fn blocks(&self) -> u64 {
        self.stat.st_blocks as u64
    }

    pub fn modified(&self) -> io::Result<SystemTime> {
        let dur = Duration::new(
            self.stat.st_mtime as u64,
            self.stat.st_mtime_nsec as u32,
        );
        Ok(SystemTime::UNIX_EPOCH + dur)
    }

    pub fn accessed(&self) -> io::Result<SystemTime> {
        let dur = Duration::new(
            self.stat.st_atime as u64,
            self.stat.st_atime_nsec as u32,
        );
        Ok(SystemTime::UNIX_EPOCH + dur)
    }

    pub fn changed(&self) -> io::Result<SystemTime> {
        let dur = Duration::new(
            self.stat.st_ctime as u64,
            self.stat.st_ctime_nsec as u32,
        );
        Ok(SystemTime::UNIX_EPOCH + dur)
    }
}

pub fn stat<P: Into<PathBuf>>(path: P) -> io::Result<Metadata> {
    let bytes = path.into().into_os_string().into_vec();
    stat_c(&CString::new(bytes)?)
}

pub fn stat_c(path: &CStr) -> io::Result<Metadata> {
    let mut stat: stat64 = unsafe { mem::zeroed() };
    let res = unsafe { stat64(path.as_ptr(), &mut stat) };
    if res < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(Metadata { stat })
    }
}

pub fn lstat<P: Into<PathBuf>>(path: P) -> io::Result<Metadata> {
    let bytes = path.into().into_os_string().into_vec();
    lstat_c(&CString::new(bytes)?)
}

pub fn lstat_c(path: &CStr) -> io::Result<Metadata> {
    let mut stat: stat64 = unsafe { mem::zeroed() };
    let res = unsafe { lstat64(path.as_ptr(), &mut stat) };
    if res < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(Metadata { stat })
    }
}

/// `stat` of `name` relative to the open directory `parent_dirfd`, following
/// a trailing symlink. This is the FD-relative operation the `Logical`
/// symlink policy and `-L` need: the directory never has to be named by
/// path again once it's open, so a concurrent rename of an ancestor can't
/// redirect the stat to the wrong file.
pub fn statat<N: Into<OsString>>(
    parent_dirfd: RawFd,
    name: N,
) -> io::Result<Metadata> {
    let bytes = name.into().into_vec();
    statat_c(parent_dirfd, &CString::new(bytes)?)
}

pub fn statat_c(parent_dirfd: RawFd, name: &CStr) -> io::Result<Metadata> {
    let mut stat: stat64 = unsafe { mem::zeroed() };
    let res = unsafe { fstatat64(parent_dirfd, name.as_ptr(), &mut stat, 0) };
    if res < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(Metadata { stat })
    }
}

/// `lstat` of `name` relative to `parent_dirfd` — the call the `Physical`
/// symlink policy uses so a symlink is reported as itself and never
/// silently followed.
pub fn lstatat<N: Into<OsString>>(
    parent_dirfd: RawFd,
    name: N,
) -> io::Result<Metadata> {
    let bytes = name.into().into_vec();
    lstatat_c(parent_dirfd, &CString::new(bytes)?)
}

pub fn lstatat_c(parent_dirfd: RawFd, name: &CStr) -> io::Result<Metadata> {
    let mut stat: stat64 = unsafe { mem::zeroed() };
    let res = unsafe {
        fstatat64(
            parent_dirfd,
            name.as_ptr(),
            &mut stat,
            libc::AT_SYMLINK_NOFOLLOW,
        )
    };
    if res < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(Metadata { stat })
    }
}
