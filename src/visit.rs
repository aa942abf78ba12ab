use std::os::unix::io::RawFd;

use crate::dent::DirEntry;

/// What kind of visit a `FileVisit` represents.
///
/// A directory produces exactly two visits over the course of a walk: one
/// `PreOrder` on the way in, one `PostOrder` on the way back out. Every
/// other entry produces a single `Leaf` visit. The remaining variants
/// report conditions that keep the walk going but that a caller will
/// usually want to surface (as a warning, or by setting a non-zero exit
/// status).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// A directory, on descent.
    PreOrder,
    /// A directory, on ascent (after all of its children have been
    /// visited).
    PostOrder,
    /// Any non-directory entry.
    Leaf,
    /// An I/O error prevented this entry from being fully classified.
    Error,
    /// A directory could not be opened for reading.
    UnreadableDir,
    /// Descending further would revisit a directory already on the
    /// current path (an ancestor shares this entry's `(device, inode)`).
    CycleDetected,
    /// A symlink whose target does not exist, or could not be resolved.
    SymlinkDangling,
    /// The entry's type is known only from the directory entry; a `stat`
    /// was not attempted (and `stat_info` is `None`).
    NoStat,
    /// A `stat` succeeded but no directory-entry type tag was available to
    /// cross-check it against.
    StatOkWithoutStat,
}

/// One call into a caller's predicate tree.
///
/// This is the unit the walker hands back for every path it visits. It
/// bundles the path, its logical depth, why it's being visited (`order`),
/// and whatever type/stat information has been resolved so far.
#[derive(Debug)]
pub struct FileVisit {
    dent: DirEntry,
    order: Order,
    dir_fd: Option<RawFd>,
    errno_hint: Option<i32>,
}

impl FileVisit {
    pub(crate) fn new(
        dent: DirEntry,
        order: Order,
        dir_fd: Option<RawFd>,
        errno_hint: Option<i32>,
    ) -> FileVisit {
        FileVisit { dent, order, dir_fd, errno_hint }
    }

    /// The directory entry this visit is about.
    pub fn entry(&self) -> &DirEntry {
        &self.dent
    }

    pub fn into_entry(self) -> DirEntry {
        self.dent
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// The file descriptor of the containing directory, when
    /// directory-FD mode produced one for this visit.
    pub fn dir_fd(&self) -> Option<RawFd> {
        self.dir_fd
    }

    /// The raw `errno` that produced an `Error`/`UnreadableDir`/
    /// `SymlinkDangling` visit, if any.
    pub fn errno_hint(&self) -> Option<i32> {
        self.errno_hint
    }

    pub fn depth(&self) -> usize {
        self.dent.depth()
    }
}
