use std::ffi::OsString;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use crate::config::{SymlinkPolicy, WalkConfig};
use crate::dent::DirEntry;
use crate::os::unix;
use crate::visit::{FileVisit, Order};

/// A builder for a directory-FD-relative, symlink-policy-aware recursive
/// walk, in the vein of GNU find's traversal engine.
///
/// `WalkDir` itself is inert; call `.into_iter()` (or use it directly in a
/// `for` loop, since it implements `IntoIterator`) to get the actual
/// iterator of `FileVisit`s.
#[derive(Debug)]
pub struct WalkDir {
    root: PathBuf,
    opts: WalkConfig,
}

impl WalkDir {
    pub fn new<P: AsRef<Path>>(root: P) -> WalkDir {
        WalkDir { root: root.as_ref().to_path_buf(), opts: WalkConfig::default() }
    }

    /// How to treat symbolic links. Defaults to `SymlinkPolicy::Physical`.
    pub fn symlink_policy(mut self, policy: SymlinkPolicy) -> WalkDir {
        self.opts.symlink_policy = policy;
        self
    }

    /// The maximum number of simultaneously open directory file
    /// descriptors. A value of `0` is silently bumped to `1`.
    pub fn max_open(mut self, mut n: usize) -> WalkDir {
        if n == 0 {
            n = 1;
        }
        self.opts.max_open = n;
        self
    }

    /// Suppress evaluation-relevant visits above this depth (the walker
    /// itself still traverses through them; it's the caller's evaluator
    /// that's expected to honor this the same way it honors `max_depth`).
    pub fn min_depth(mut self, n: usize) -> WalkDir {
        self.opts.min_depth = n;
        self
    }

    /// Do not descend into directories beyond this depth. The boundary
    /// entry itself is still visited.
    pub fn max_depth(mut self, n: usize) -> WalkDir {
        self.opts.max_depth = n;
        self
    }

    /// Refuse to descend into directories on a different device than the
    /// one the walk started on (`-xdev` / `-mount`).
    pub fn same_file_system(mut self, yes: bool) -> WalkDir {
        self.opts.stay_on_fs = yes;
        self
    }

    pub fn min_depth_get(&self) -> usize {
        self.opts.min_depth
    }

    pub fn max_depth_get(&self) -> usize {
        self.opts.max_depth
    }
}

impl IntoIterator for WalkDir {
    type Item = FileVisit;
    type IntoIter = IntoIter;

    fn into_iter(self) -> IntoIter {
        IntoIter {
            opts: self.opts,
            root: Some(self.root),
            stack: Vec::new(),
            root_dev: None,
        }
    }
}

struct StackFrame {
    /// `None` once the directory's contents have been fully consumed, or
    /// if it was never opened at all (because descent was refused by
    /// `max_depth` or `same_file_system`).
    dir: Option<unix::Dir>,
    dent: DirEntry,
    key: (u64, u64),
}

/// The iterator driving a `WalkDir`. See the crate documentation for the
/// shape of what it yields.
pub struct IntoIter {
    opts: WalkConfig,
    root: Option<PathBuf>,
    stack: Vec<StackFrame>,
    root_dev: Option<u64>,
}

impl IntoIter {
    fn follow_link(&self, depth: usize) -> bool {
        match self.opts.symlink_policy {
            SymlinkPolicy::Physical => false,
            SymlinkPolicy::Logical => true,
            SymlinkPolicy::ArgOnly => depth == 0,
        }
    }

    fn cycle_key(&self, key: (u64, u64)) -> bool {
        self.stack.iter().any(|f| f.key == key)
    }

    fn visit_root(&mut self, path: PathBuf) -> FileVisit {
        let depth = 0;
        let follow = self.follow_link(depth);
        let meta = if follow { unix::stat::stat(path.clone()) } else { unix::stat::lstat(path.clone()) };
        let meta = match meta {
            Ok(meta) => meta,
            Err(err) => {
                let dent = DirEntry::new(path.clone(), path.clone(), depth, None, 0, follow);
                return FileVisit::new(dent, Order::Error, None, err.raw_os_error());
            }
        };
        let ft = meta.file_type();
        let dent = DirEntry::new(path.clone(), path.clone(), depth, Some(ft), meta.ino(), follow);
        dent.set_metadata(meta);

        if !ft.is_dir() {
            return FileVisit::new(dent, Order::Leaf, None, None);
        }
        if self.opts.stay_on_fs {
            self.root_dev = Some(meta.dev());
        }
        self.push_dir_frame(dent, (meta.dev(), meta.ino()), depth)
    }

    /// Open (or decline to open, per `max_depth`/`same_file_system`) the
    /// directory named by `dent` and push it on the stack. Always returns
    /// the `PreOrder` visit for it.
    fn push_dir_frame(
        &mut self,
        dent: DirEntry,
        key: (u64, u64),
        depth: usize,
    ) -> FileVisit {
        if self.cycle_key(key) {
            return FileVisit::new(dent, Order::CycleDetected, None, None);
        }

        let crosses_fs = self.opts.stay_on_fs
            && self.root_dev.map(|d| d != key.0).unwrap_or(false);
        let refuse_descent = depth >= self.opts.max_depth || crosses_fs;

        if refuse_descent {
            self.stack.push(StackFrame { dir: None, dent: dent.clone(), key });
            return FileVisit::new(dent, Order::PreOrder, None, None);
        }

        // Every frame currently on the stack holds one open directory FD;
        // once that count would reach `max_open`, fall back to a
        // path-based `open` instead of the FD-relative `openat`. This
        // reopens the TOCTOU window `openat` exists to close, but an
        // exhausted FD budget would otherwise fail the walk outright.
        let near_open_limit = self.stack.len() + 1 >= self.opts.max_open;
        let opened = if depth == 0 {
            unix::Dir::open(dent.path().to_path_buf())
        } else if near_open_limit {
            unix::Dir::open(dent.path().to_path_buf())
        } else {
            let parent_fd = self.stack.last().unwrap().dir.as_ref().unwrap().as_raw_fd();
            unix::Dir::openat(parent_fd, dent.access_name().as_os_str().to_os_string())
        };
        match opened {
            Ok(dir) => {
                let dir_fd = dir.as_raw_fd();
                self.stack.push(StackFrame { dir: Some(dir), dent: dent.clone(), key });
                FileVisit::new(dent, Order::PreOrder, Some(dir_fd), None)
            }
            Err(err) => {
                self.stack.push(StackFrame { dir: None, dent: dent.clone(), key });
                FileVisit::new(dent, Order::UnreadableDir, None, err.raw_os_error())
            }
        }
    }

    /// Classify a single raw directory entry read from the top frame, and
    /// decide whether it's a directory that should be descended into.
    fn classify_child(
        &mut self,
        parent_fd: RawFd,
        name: OsString,
        parent_path: &Path,
        depth: usize,
        raw_type: Option<unix::FileType>,
        raw_ino: u64,
    ) -> FileVisit {
        let full_path = parent_path.join(&name);
        let follow = self.follow_link(depth);
        let is_symlink_per_dent = raw_type.map(|t| t.is_symlink()).unwrap_or(false);
        let maybe_dir = raw_type.map(|t| t.is_dir()).unwrap_or(true);
        let needs_stat = raw_type.is_none() || maybe_dir || (is_symlink_per_dent && follow);

        if !needs_stat {
            let dent = DirEntry::new(full_path, name, depth, raw_type, raw_ino, follow);
            return FileVisit::new(dent, Order::Leaf, Some(parent_fd), None);
        }

        let stat_res = if follow {
            unix::stat::statat(parent_fd, name.clone())
        } else {
            unix::stat::lstatat(parent_fd, name.clone())
        };
        match stat_res {
            Ok(meta) => {
                let ft = meta.file_type();
                let dent =
                    DirEntry::new(full_path, name, depth, Some(ft), meta.ino(), follow);
                dent.set_metadata(meta);
                if ft.is_dir() {
                    self.push_dir_frame(dent, (meta.dev(), meta.ino()), depth)
                } else {
                    FileVisit::new(dent, Order::Leaf, Some(parent_fd), None)
                }
            }
            Err(err) => {
                let order =
                    if is_symlink_per_dent { Order::SymlinkDangling } else { Order::Error };
                let dent = DirEntry::new(full_path, name, depth, raw_type, raw_ino, follow);
                FileVisit::new(dent, order, Some(parent_fd), err.raw_os_error())
            }
        }
    }

    /// Discard the directory at the top of the traversal stack without
    /// reading any more of its children. Meant to be called right after
    /// receiving that directory's `PreOrder` visit; the matching
    /// `PostOrder` visit is still produced on the next call to `next()`,
    /// but nothing under it is ever visited. This is the hook `-prune`
    /// needs: the caller's evaluator sets its own flag on a `Prune`
    /// match, then calls this before asking the iterator for the next
    /// visit.
    pub fn skip_current_dir(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.dir = None;
        }
    }

    fn advance(&mut self) -> FileVisit {
        loop {
            let top_len = self.stack.len();
            debug_assert!(top_len > 0);
            let depth = self.stack[top_len - 1].dent.depth() + 1;
            let parent_path = self.stack[top_len - 1].dent.path().to_path_buf();

            let read_result = {
                let frame = &mut self.stack[top_len - 1];
                match frame.dir {
                    None => None,
                    Some(ref mut dir) => dir.read(),
                }
            };

            match read_result {
                None => {
                    // Exhausted, or never opened: pop and emit PostOrder.
                    let frame = self.stack.pop().unwrap();
                    let dir_fd = self.stack.last().and_then(|f| {
                        f.dir.as_ref().map(|d| d.as_raw_fd())
                    });
                    return FileVisit::new(frame.dent, Order::PostOrder, dir_fd, None);
                }
                Some(Err(err)) => {
                    let frame = &mut self.stack[top_len - 1];
                    frame.dir = None;
                    let dent = DirEntry::new(
                        parent_path.clone(),
                        OsString::new(),
                        depth,
                        None,
                        0,
                        false,
                    );
                    let errno = err.raw_os_error();
                    return FileVisit::new(dent, Order::Error, None, errno);
                }
                Some(Ok(raw)) => {
                    let name = raw.file_name_os().to_os_string();
                    if name == "." || name == ".." {
                        continue;
                    }
                    let raw_type = raw.file_type();
                    let ino = raw.ino();
                    let parent_fd =
                        self.stack[top_len - 1].dir.as_ref().unwrap().as_raw_fd();
                    return self.classify_child(
                        parent_fd,
                        name,
                        &parent_path,
                        depth,
                        raw_type,
                        ino,
                    );
                }
            }
        }
    }
}

impl Iterator for IntoIter {
    type Item = FileVisit;

    fn next(&mut self) -> Option<FileVisit> {
        if let Some(root) = self.root.take() {
            return Some(self.visit_root(root));
        }
        if self.stack.is_empty() {
            return None;
        }
        Some(self.advance())
    }
}
