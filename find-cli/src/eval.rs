//! The expression evaluator (§4.F): walks a (possibly optimised)
//! `PredicateNode` tree against one visited entry, with strict
//! short-circuit semantics for `-a`/`-o`/`!`/`,` and side effects
//! dispatched into `action::ActionRuntime`.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::time::SystemTime;

use findwalk::os::unix::stat as unix_stat;
use findwalk::os::unix::stat::Metadata;
use findwalk::DirEntry;

use crate::action::ActionRuntime;
use crate::config::Config;
use crate::fnmatch;
use crate::predicate::{AccessMode, PermMatch, Primary, PredicateNode, PrimaryKind, TimeField};
use crate::primitives::Cmp;
use crate::state::TraversalState;
use crate::users;

/// If nothing in the tree carries an explicit action, GNU find's default
/// is as if `-print` had been and-ed onto the end of the whole expression:
/// it only fires when the expression as a whole already matched.
pub fn wrap_default_print(tree: PredicateNode) -> PredicateNode {
    if tree.has_explicit_action() {
        tree
    } else {
        PredicateNode::And(Box::new(tree), Box::new(PredicateNode::primary(PrimaryKind::Print)))
    }
}

pub struct Evaluator<'a> {
    config: &'a Config,
    fstypes: &'a findwalk::FsTypeTable,
    actions: &'a ActionRuntime,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        config: &'a Config,
        fstypes: &'a findwalk::FsTypeTable,
        actions: &'a ActionRuntime,
    ) -> Evaluator<'a> {
        Evaluator { config, fstypes, actions }
    }

    pub fn evaluate(
        &self,
        node: &PredicateNode,
        entry: &DirEntry,
        dir_fd: Option<RawFd>,
        state: &mut TraversalState,
    ) -> bool {
        match node {
            PredicateNode::Primary(p) => self.eval_primary(p, entry, dir_fd, state),
            PredicateNode::Not(inner) => !self.evaluate(inner, entry, dir_fd, state),
            PredicateNode::And(a, b) => {
                self.evaluate(a, entry, dir_fd, state) && self.evaluate(b, entry, dir_fd, state)
            }
            PredicateNode::Or(a, b) => {
                self.evaluate(a, entry, dir_fd, state) || self.evaluate(b, entry, dir_fd, state)
            }
            PredicateNode::Comma(a, b) => {
                self.evaluate(a, entry, dir_fd, state);
                self.evaluate(b, entry, dir_fd, state)
            }
        }
    }

    fn meta(&self, entry: &DirEntry, state: &mut TraversalState) -> Option<Metadata> {
        match entry.metadata() {
            Ok(m) => Some(m),
            Err(err) => {
                eprintln!("find: `{}': {}", entry.path().display(), err);
                state.record_nonfatal();
                None
            }
        }
    }

    fn eval_primary(
        &self,
        p: &Primary,
        entry: &DirEntry,
        dir_fd: Option<RawFd>,
        state: &mut TraversalState,
    ) -> bool {
        use PrimaryKind::*;
        match &p.kind {
            Name(pat) => {
                glob_match(pat, &entry.file_name().to_string_lossy(), false, true)
            }
            IName(pat) => {
                glob_match(pat, &entry.file_name().to_string_lossy(), true, true)
            }
            Path(pat) => glob_match(pat, &entry.path().to_string_lossy(), false, false),
            IPath(pat) => glob_match(pat, &entry.path().to_string_lossy(), true, false),
            Regex(re) => re.is_match(&entry.path().to_string_lossy()),
            IRegex(re) => re.is_match(&entry.path().to_string_lossy()),
            LName(pat) => self.eval_link_target(entry, state, |target| {
                glob_match(pat, &target, false, false)
            }),
            ILName(pat) => {
                self.eval_link_target(entry, state, |target| glob_match(pat, &target, true, false))
            }
            Type(letters) => entry
                .dent_file_type()
                .map(|ft| letters.iter().any(|l| type_letter_matches(*l, ft)))
                .or_else(|| {
                    self.meta(entry, state).map(|m| {
                        letters.iter().any(|l| type_letter_matches(*l, m.file_type()))
                    })
                })
                .unwrap_or(false),
            XType(letters) => {
                // The type the entry would have if symlinks were resolved
                // through the *opposite* of the active traversal policy:
                // for a non-symlink this is the same as `-type`. The active
                // policy already decided `stat` vs `lstat` for `entry`
                // (`entry.follow_link()`), so `-xtype` does the other one.
                let opposite_follow = !entry.follow_link();
                let result = if opposite_follow {
                    unix_stat::stat(entry.path().to_path_buf())
                } else {
                    unix_stat::lstat(entry.path().to_path_buf())
                };
                match result {
                    Ok(m) => letters.iter().any(|l| type_letter_matches(*l, m.file_type())),
                    // A symlink whose target doesn't exist: following it
                    // (the opposite of `-P`'s default non-following
                    // policy) fails to stat, so it reports as a link
                    // itself, same as GNU find's dangling-link behavior.
                    Err(_) if opposite_follow => {
                        letters.iter().any(|l| matches!(l, crate::primitives::TypeLetter::Symlink))
                    }
                    Err(_) => false,
                }
            }
            Size(cmp, bytes) => self
                .meta(entry, state)
                .map(|m| cmp.matches(m.len() as i64, *bytes as i64))
                .unwrap_or(false),
            INum(arg) => self
                .meta(entry, state)
                .map(|m| arg.cmp.matches(m.ino() as i64, arg.value))
                .unwrap_or(false),
            Links(arg) => self
                .meta(entry, state)
                .map(|m| arg.cmp.matches(m.nlink() as i64, arg.value))
                .unwrap_or(false),
            User(_, uid) => {
                self.meta(entry, state).map(|m| m.uid() == *uid).unwrap_or(false)
            }
            Group(_, gid) => {
                self.meta(entry, state).map(|m| m.gid() == *gid).unwrap_or(false)
            }
            Uid(arg) => self
                .meta(entry, state)
                .map(|m| arg.cmp.matches(m.uid() as i64, arg.value))
                .unwrap_or(false),
            Gid(arg) => self
                .meta(entry, state)
                .map(|m| arg.cmp.matches(m.gid() as i64, arg.value))
                .unwrap_or(false),
            Perm { mode_file, mode_dir, how } => match self.meta(entry, state) {
                Some(m) => {
                    let wanted = if m.file_type().is_dir() { *mode_dir } else { *mode_file };
                    let actual = (m.mode() & 0o7777) as u32;
                    match how {
                        PermMatch::Exact => actual == wanted,
                        PermMatch::AllOf => actual & wanted == wanted,
                        PermMatch::AnyOf => wanted == 0 || actual & wanted != 0,
                    }
                }
                None => false,
            },
            Empty => self.eval_empty(entry, state),
            NoUser => self
                .meta(entry, state)
                .map(|m| !users::uid_has_passwd_entry(m.uid()))
                .unwrap_or(false),
            NoGroup => self
                .meta(entry, state)
                .map(|m| !users::gid_has_group_entry(m.gid()))
                .unwrap_or(false),
            Newer(reference) => self
                .meta(entry, state)
                .and_then(|m| m.modified().ok())
                .map(|mtime| mtime > *reference)
                .unwrap_or(false),
            NewerXY { x, reference, .. } => match self.meta(entry, state) {
                Some(m) => time_field(&m, *x).map(|t| t > *reference).unwrap_or(false),
                None => false,
            },
            Amin(cmp, hi) => self.eval_time(entry, state, *cmp, *hi, 60, |m| m.accessed()),
            Atime(cmp, hi) => self.eval_time(entry, state, *cmp, *hi, 86400, |m| m.accessed()),
            Cmin(cmp, hi) => self.eval_time(entry, state, *cmp, *hi, 60, |m| m.changed()),
            Ctime(cmp, hi) => self.eval_time(entry, state, *cmp, *hi, 86400, |m| m.changed()),
            Mmin(cmp, hi) => self.eval_time(entry, state, *cmp, *hi, 60, |m| m.modified()),
            Mtime(cmp, hi) => self.eval_time(entry, state, *cmp, *hi, 86400, |m| m.modified()),
            Used(cmp, days) => match self.meta(entry, state) {
                Some(m) => match (m.accessed().ok(), m.changed().ok()) {
                    (Some(a), Some(c)) => {
                        let age_days = a
                            .duration_since(c)
                            .map(|d| d.as_secs() / 86400)
                            .unwrap_or(0) as i64;
                        cmp.matches(age_days, *days)
                    }
                    _ => false,
                },
                None => false,
            },
            SameFile { dev, ino } => {
                self.meta(entry, state).map(|m| m.dev() == *dev && m.ino() == *ino).unwrap_or(false)
            }
            FsType(name) => self
                .meta(entry, state)
                .map(|m| self.fstypes.lookup(m.dev()) == name.as_str())
                .unwrap_or(false),
            Context(_) => false, // no SELinux binding in this build's stack
            AccessCheck(mode) => check_access(entry.path(), *mode),
            True => true,
            False => false,
            Quit => {
                state.quit = true;
                true
            }
            Prune => {
                state.stop_at_current_level = true;
                true
            }
            Delete => {
                let is_dir = entry
                    .dent_file_type()
                    .map(|ft| ft.is_dir())
                    .or_else(|| self.meta(entry, state).map(|m| m.file_type().is_dir()))
                    .unwrap_or(false);
                match self.actions.delete(entry, dir_fd, is_dir) {
                    Ok(()) => true,
                    Err(err) => {
                        eprintln!("find: cannot delete `{}': {}", entry.path().display(), err);
                        state.record_nonfatal();
                        false
                    }
                }
            }
            Print => self.report_io(self.actions.print(entry), state),
            Print0 => self.report_io(self.actions.print0(entry), state),
            PrintF(fmt) => {
                let rel = state.rel_pathname.clone();
                self.report_io(self.actions.printf(fmt, entry, &rel), state)
            }
            FPrint(file) => self.report_io(self.actions.fprint(file, entry), state),
            FPrintF(file, fmt) => {
                let rel = state.rel_pathname.clone();
                self.report_io(self.actions.fprintf(file, fmt, entry, &rel), state)
            }
            FLS(file) => self.report_io(self.actions.fls(file, entry), state),
            Ls => self.report_io(self.actions.ls(entry), state),
            Exec(recipe) | ExecDir(recipe) => {
                let per_directory = matches!(&p.kind, ExecDir(_));
                let cwd = self.exec_cwd(entry, per_directory);
                let path_arg = self.exec_path_arg(entry, per_directory);
                match self.actions.exec(recipe, &cwd, &path_arg) {
                    Some(status) => {
                        if status != 0 {
                            state.record_nonfatal();
                        }
                        status == 0
                    }
                    None => true, // batched and not yet flushed; assume success
                }
            }
            Ok(recipe) | OkDir(recipe) => {
                let per_directory = matches!(&p.kind, OkDir(_));
                let cwd = self.exec_cwd(entry, per_directory);
                let path_arg = self.exec_path_arg(entry, per_directory);
                match self.actions.exec(recipe, &cwd, &path_arg) {
                    Some(status) => status == 0,
                    None => false, // declined at the confirmation prompt
                }
            }
        }
    }

    fn exec_cwd(&self, entry: &DirEntry, per_directory: bool) -> std::path::PathBuf {
        if per_directory {
            entry.path().parent().map(|p| p.to_path_buf()).unwrap_or_default()
        } else {
            std::env::current_dir().unwrap_or_default()
        }
    }

    /// `-execdir`/`-okdir` already run with the matched entry's own
    /// directory as `cwd`, so `{}` there is the bare file name; `-exec`/
    /// `-ok` run from wherever `find` itself started, so `{}` needs the
    /// full (or relative-to-start) path.
    fn exec_path_arg(&self, entry: &DirEntry, per_directory: bool) -> String {
        if per_directory {
            entry.file_name().to_string_lossy().into_owned()
        } else {
            entry.path().to_string_lossy().into_owned()
        }
    }

    fn report_io(&self, result: std::io::Result<()>, state: &mut TraversalState) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                eprintln!("find: write error: {}", err);
                state.record_nonfatal();
                false
            }
        }
    }

    fn eval_empty(&self, entry: &DirEntry, state: &mut TraversalState) -> bool {
        let is_dir = entry
            .dent_file_type()
            .map(|ft| ft.is_dir())
            .or_else(|| self.meta(entry, state).map(|m| m.file_type().is_dir()))
            .unwrap_or(false);
        if is_dir {
            match std::fs::read_dir(entry.path()) {
                Ok(mut iter) => iter.next().is_none(),
                Err(_) => false,
            }
        } else {
            self.meta(entry, state).map(|m| m.len() == 0).unwrap_or(false)
        }
    }

    fn eval_link_target(
        &self,
        entry: &DirEntry,
        _state: &mut TraversalState,
        pred: impl Fn(String) -> bool,
    ) -> bool {
        match std::fs::read_link(entry.path()) {
            Ok(target) => pred(target.to_string_lossy().into_owned()),
            Err(_) => false,
        }
    }

    /// Shared body for the six `-Xmin`/`-Xtime` primaries: `hi` is
    /// `reference - N*unit` (the upper, more-recent edge of the "exactly N
    /// units ago" bucket); the lower edge is `hi - unit`.
    fn eval_time(
        &self,
        entry: &DirEntry,
        state: &mut TraversalState,
        cmp: Cmp,
        hi: SystemTime,
        unit_secs: u64,
        field: impl Fn(&Metadata) -> std::io::Result<SystemTime>,
    ) -> bool {
        let meta = match self.meta(entry, state) {
            Some(m) => m,
            None => return false,
        };
        let actual = match field(&meta) {
            Ok(t) => t,
            Err(_) => return false,
        };
        let lo = hi
            .checked_sub(std::time::Duration::from_secs(unit_secs))
            .unwrap_or(std::time::UNIX_EPOCH);
        match cmp {
            // `+N` means "at least N+1 units old": strictly older than the
            // lower edge of the "exactly N units ago" bucket, not just
            // older than its upper edge.
            Cmp::Greater => actual <= lo,
            Cmp::Less => actual > hi,
            Cmp::Equal => actual > lo && actual <= hi,
        }
    }
}

/// `pathname`: true for `-name`/`-iname`, where `*`/`?` must not cross a
/// `/` boundary; false for `-path`/`-ipath`/`-lname`/`-ilname`, which match
/// against a full path or link target.
fn glob_match(pattern: &str, candidate: &str, case_insensitive: bool, pathname: bool) -> bool {
    let mut flags = if case_insensitive { fnmatch::Flags::CASEFOLD } else { fnmatch::Flags::empty() };
    if pathname {
        flags = flags | fnmatch::Flags::PATHNAME;
    }
    fnmatch::fnmatch(pattern, candidate, flags)
}

fn type_letter_matches(letter: crate::primitives::TypeLetter, ft: findwalk::os::unix::FileType) -> bool {
    use crate::primitives::TypeLetter::*;
    match letter {
        BlockDevice => ft.is_block_device(),
        CharDevice => ft.is_char_device(),
        Directory => ft.is_dir(),
        RegularFile => ft.is_file(),
        Symlink => ft.is_symlink(),
        Fifo => ft.is_fifo(),
        Socket => ft.is_socket(),
        Door => false,
    }
}

fn time_field(meta: &Metadata, field: TimeField) -> Option<SystemTime> {
    match field {
        TimeField::Access => meta.accessed().ok(),
        TimeField::Ctime => meta.changed().ok(),
        TimeField::Mtime => meta.modified().ok(),
        // No birthtime in this `stat` wrapper; GNU find itself falls back
        // to ctime when the platform doesn't report one.
        TimeField::BirthOrCtimeFallback => meta.changed().ok(),
        TimeField::Literal => None, // only ever parsed as the `Y` half
    }
}

fn check_access(path: &Path, mode: AccessMode) -> bool {
    let bits = match mode {
        AccessMode::Readable => libc::R_OK,
        AccessMode::Writable => libc::W_OK,
        AccessMode::Executable => libc::X_OK,
    };
    let cpath = match CString::new(path.as_os_str().as_bytes()) {
        Ok(c) => c,
        Err(_) => return false,
    };
    unsafe { libc::access(cpath.as_ptr(), bits) == 0 }
}
