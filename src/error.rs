use std::error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// An error produced while walking a directory tree.
///
/// This is never fatal to the walk itself: the iterator always yields an
/// `Err` and keeps going. Callers that want GNU find's behaviour of
/// reporting a non-zero exit status on any error should track whether any
/// `Err` was seen.
#[derive(Debug)]
pub struct Error {
    depth: usize,
    inner: ErrorInner,
}

#[derive(Debug)]
enum ErrorInner {
    Io { path: Option<PathBuf>, err: io::Error },
    Loop { ancestor: PathBuf, child: PathBuf },
}

impl Error {
    pub(crate) fn from_io(depth: usize, path: Option<PathBuf>, err: io::Error) -> Error {
        Error { depth, inner: ErrorInner::Io { path, err } }
    }

    pub(crate) fn from_loop(depth: usize, ancestor: &Path, child: &Path) -> Error {
        Error {
            depth,
            inner: ErrorInner::Loop {
                ancestor: ancestor.to_path_buf(),
                child: child.to_path_buf(),
            },
        }
    }

    /// Returns the path associated with this error, if one is available.
    pub fn path(&self) -> Option<&Path> {
        match self.inner {
            ErrorInner::Io { ref path, .. } => path.as_ref().map(|p| p.as_path()),
            ErrorInner::Loop { ref child, .. } => Some(child),
        }
    }

    /// Returns the ancestor path that a symlink cycle points back to.
    pub fn loop_ancestor(&self) -> Option<&Path> {
        match self.inner {
            ErrorInner::Loop { ref ancestor, .. } => Some(ancestor),
            ErrorInner::Io { .. } => None,
        }
    }

    /// The depth at which this error occurred relative to the root(s)
    /// originally given to the walker.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True when this error came from a symlink cycle rather than an
    /// underlying I/O failure.
    pub fn is_loop(&self) -> bool {
        matches!(self.inner, ErrorInner::Loop { .. })
    }

    pub fn io_error(&self) -> Option<&io::Error> {
        match self.inner {
            ErrorInner::Io { ref err, .. } => Some(err),
            ErrorInner::Loop { .. } => None,
        }
    }

    pub fn into_io_error(self) -> Option<io::Error> {
        match self.inner {
            ErrorInner::Io { err, .. } => Some(err),
            ErrorInner::Loop { .. } => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.inner {
            ErrorInner::Io { path: Some(ref path), ref err } => {
                write!(f, "{}: {}", path.display(), err)
            }
            ErrorInner::Io { path: None, ref err } => err.fmt(f),
            ErrorInner::Loop { ref ancestor, ref child } => write!(
                f,
                "File system loop found: \
                 {} is a descendant of {}",
                child.display(),
                ancestor.display()
            ),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.inner {
            ErrorInner::Io { ref err, .. } => Some(err),
            ErrorInner::Loop { .. } => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(walk_err: Error) -> io::Error {
        match walk_err.inner {
            ErrorInner::Io { err, .. } => err,
            ErrorInner::Loop { .. } => {
                io::Error::new(io::ErrorKind::Other, walk_err)
            }
        }
    }
}
