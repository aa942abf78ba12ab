use std::cell::RefCell;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::os::unix;
use crate::os::unix::stat::Metadata;

/// A directory entry produced by the walker.
///
/// Unlike `std::fs::DirEntry`, this carries its path pre-joined (so callers
/// never need to rebuild it), its depth relative to the walk's starting
/// point(s), and a lazily materialised `stat(2)` result. The file type
/// reported in the underlying `dirent` (when the platform supports
/// `d_type`) is available without ever calling `stat`.
#[derive(Debug)]
pub struct DirEntry {
    path: PathBuf,
    rel: PathBuf,
    depth: usize,
    dent_type: Option<unix::FileType>,
    ino: u64,
    follow_link: bool,
    metadata: RefCell<Option<Metadata>>,
}

impl DirEntry {
    pub(crate) fn new<R: Into<PathBuf>>(
        path: PathBuf,
        rel: R,
        depth: usize,
        dent_type: Option<unix::FileType>,
        ino: u64,
        follow_link: bool,
    ) -> DirEntry {
        DirEntry {
            path,
            rel: rel.into(),
            depth,
            dent_type,
            ino,
            follow_link,
            metadata: RefCell::new(None),
        }
    }

    /// The full path to this entry, relative to the current directory (or
    /// absolute, if the starting point was absolute).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }

    /// The path used to access this entry relative to its containing
    /// directory's file descriptor, when directory-FD mode is active.
    pub fn access_name(&self) -> &Path {
        &self.rel
    }

    pub fn file_name(&self) -> &OsStr {
        self.path.file_name().unwrap_or_else(|| self.path.as_os_str())
    }

    /// Depth relative to the starting point(s); `0` for the roots
    /// themselves.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The inode number as reported by the raw directory entry (or, for
    /// roots, by an initial `lstat`).
    pub fn ino(&self) -> u64 {
        self.ino
    }

    /// Whether the active traversal policy resolves this entry through its
    /// target (`true`, `metadata()` calls `stat`) or reports the link
    /// itself (`false`, `metadata()` calls `lstat`). `-xtype` needs this to
    /// resolve symlinks through the *opposite* of whatever `-type` already
    /// used.
    pub fn follow_link(&self) -> bool {
        self.follow_link
    }

    /// True if this entry was reached by following a symbolic link (either
    /// because a root argument was a symlink, or the walk's symlink policy
    /// follows links).
    pub fn path_is_symlink(&self) -> bool {
        self.dent_type.map(|ft| ft.is_symlink()).unwrap_or(false)
            || (self.follow_link && self.depth == 0)
    }

    /// The file type as known from the directory entry alone, without a
    /// `stat` call. Returns `None` when the underlying platform's `dirent`
    /// doesn't carry a type tag (or reports `DT_UNKNOWN`).
    pub fn dent_file_type(&self) -> Option<unix::FileType> {
        self.dent_type
    }

    /// Return this entry's metadata, following symlinks according to the
    /// walk's policy. The result is cached after the first call.
    pub fn metadata(&self) -> Result<Metadata, Error> {
        if let Some(meta) = *self.metadata.borrow() {
            return Ok(meta);
        }
        let meta = if self.follow_link {
            unix::stat::stat(self.path.clone())
        } else {
            unix::stat::lstat(self.path.clone())
        }
        .map_err(|err| Error::from_io(self.depth, Some(self.path.clone()), err))?;
        *self.metadata.borrow_mut() = Some(meta);
        Ok(meta)
    }

    pub(crate) fn set_metadata(&self, meta: Metadata) {
        *self.metadata.borrow_mut() = Some(meta);
    }
}

impl Clone for DirEntry {
    fn clone(&self) -> DirEntry {
        DirEntry {
            path: self.path.clone(),
            rel: self.rel.clone(),
            depth: self.depth,
            dent_type: self.dent_type,
            ino: self.ino,
            follow_link: self.follow_link,
            metadata: RefCell::new(*self.metadata.borrow()),
        }
    }
}
