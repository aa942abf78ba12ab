//! Side-effecting primaries (§4.G): `-print`/`-print0`/`-printf`, their
//! `-f*` file-redirected counterparts, `-ls`/`-fls`, `-delete`, and the
//! dispatch into `exec::ExecBatcher` for `-exec`/`-ok`/`-execdir`/`-okdir`.
//!
//! Every sink (`stdout`, or a `-fprint`/-fprintf`/`-fls` target) is opened
//! at most once and kept open for the life of the run, the same "open
//! lazily, keep the handle" approach GNU find's `print_offload_fopen`
//! uses — re-running the same search with several `-fprint FILE` clauses
//! pointed at the same path must not truncate it between them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::path::Path;
use std::rc::Rc;
use std::time::SystemTime;

use bstr::ByteSlice;

use crate::exec::ExecBatcher;
use crate::predicate::{ExecRecipe, ExecScope, PredicateNode};
use crate::state::TraversalState;
use crate::users;
use findwalk::DirEntry;
use findwalk::os::unix::FileType;
use findwalk::os::unix::stat::Metadata;

/// A lazily-opened, kept-open output destination.
struct Sink {
    file: RefCell<File>,
}

pub struct ActionRuntime {
    stdout: RefCell<io::Stdout>,
    stdout_is_tty: bool,
    sinks: RefCell<HashMap<String, Sink>>,
    /// Every `Plus`-terminated `-execdir`/`-okdir` recipe in the tree,
    /// collected once so a directory change can flush them all without
    /// re-walking the predicate tree.
    dir_recipes: Vec<Rc<ExecRecipe>>,
    /// Every `Plus`-terminated `-exec`/`-ok` recipe; these only need
    /// flushing once, at the very end of the run.
    global_recipes: Vec<Rc<ExecRecipe>>,
}

impl ActionRuntime {
    pub fn new(tree: &PredicateNode) -> ActionRuntime {
        let mut all = Vec::new();
        tree.collect_exec_recipes(&mut all);
        let (dir_recipes, global_recipes) =
            all.into_iter().partition(|r| r.scope == ExecScope::PerDirectory);
        ActionRuntime {
            stdout: RefCell::new(io::stdout()),
            stdout_is_tty: atty::is(atty::Stream::Stdout),
            sinks: RefCell::new(HashMap::new()),
            dir_recipes,
            global_recipes,
        }
    }

    fn sink_write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let mut sinks = self.sinks.borrow_mut();
        if !sinks.contains_key(path) {
            let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
            sinks.insert(path.to_string(), Sink { file: RefCell::new(file) });
        }
        sinks.get(path).unwrap().file.borrow_mut().write_all(bytes)
    }

    fn stdout_write(&self, bytes: &[u8]) -> io::Result<()> {
        self.stdout.borrow_mut().write_all(bytes)
    }

    pub fn print(&self, entry: &DirEntry) -> io::Result<()> {
        let line = quote_path(entry.path(), self.stdout_is_tty);
        self.stdout_write(&line)?;
        self.stdout_write(b"\n")
    }

    pub fn print0(&self, entry: &DirEntry) -> io::Result<()> {
        use std::os::unix::ffi::OsStrExt;
        self.stdout_write(entry.path().as_os_str().as_bytes())?;
        self.stdout_write(b"\0")
    }

    pub fn fprint(&self, file: &str, entry: &DirEntry) -> io::Result<()> {
        let line = quote_path(entry.path(), false);
        self.sink_write(file, &line)?;
        self.sink_write(file, b"\n")
    }

    pub fn printf(&self, fmt: &str, entry: &DirEntry, rel: &Path) -> io::Result<()> {
        let rendered = render_format(fmt, entry, rel);
        self.stdout_write(rendered.as_bytes())
    }

    pub fn fprintf(&self, file: &str, fmt: &str, entry: &DirEntry, rel: &Path) -> io::Result<()> {
        let rendered = render_format(fmt, entry, rel);
        self.sink_write(file, rendered.as_bytes())
    }

    pub fn ls(&self, entry: &DirEntry) -> io::Result<()> {
        let line = render_ls_line(entry)?;
        self.stdout_write(line.as_bytes())?;
        self.stdout_write(b"\n")
    }

    pub fn fls(&self, file: &str, entry: &DirEntry) -> io::Result<()> {
        let line = render_ls_line(entry)?;
        self.sink_write(file, line.as_bytes())?;
        self.sink_write(file, b"\n")
    }

    /// `-delete`: remove the entry in place. Directories (visited
    /// post-order, since `-delete` forces depth-first traversal) go
    /// through `rmdirat`; everything else through `unlinkat`. Falls back
    /// to plain `remove_file`/`remove_dir` when no directory FD is
    /// available (FD-exhaustion fallback).
    pub fn delete(
        &self,
        entry: &DirEntry,
        dir_fd: Option<RawFd>,
        is_dir: bool,
    ) -> io::Result<()> {
        if let Some(fd) = dir_fd {
            let name = entry.access_name().as_os_str().to_owned();
            if is_dir {
                findwalk::os::unix::rmdirat(fd, name)
            } else {
                findwalk::os::unix::unlinkat(fd, name)
            }
        } else if is_dir {
            std::fs::remove_dir(entry.path())
        } else {
            std::fs::remove_file(entry.path())
        }
    }

    pub fn exec(&self, recipe: &ExecRecipe, cwd: &Path, path: &str) -> Option<i32> {
        match recipe.terminator {
            crate::predicate::Terminator::Semicolon => ExecBatcher::run_once(recipe, cwd, path),
            crate::predicate::Terminator::Plus => ExecBatcher::append(recipe, cwd, path),
        }
    }

    /// Flush every outstanding `-execdir`/`-okdir` batch, called when the
    /// traversal is about to leave the directory they accumulated matches
    /// in (`cwd` is that directory).
    pub fn flush_dir_scoped(&self, cwd: &Path, state: &mut TraversalState) {
        for recipe in &self.dir_recipes {
            if let Some(status) = ExecBatcher::flush(recipe, cwd) {
                if status != 0 {
                    state.record_nonfatal();
                }
            }
        }
    }

    /// Flush every recipe still outstanding, `-execdir`/`-okdir` included,
    /// called once at the very end of the run so nothing is left pending.
    pub fn flush_all(&self, cwd: &Path, state: &mut TraversalState) {
        for recipe in self.dir_recipes.iter().chain(self.global_recipes.iter()) {
            if let Some(status) = ExecBatcher::flush(recipe, cwd) {
                if status != 0 {
                    state.record_nonfatal();
                }
            }
        }
    }
}

/// `print_quoted`-style quoting, modeled on the original `lib/printquoted.c`:
/// substitute non-printable or shell-dangerous bytes with `?` only when the
/// destination is a terminal. A pipe or redirected file gets the raw bytes
/// untouched, since nothing there will misinterpret control characters as
/// terminal escapes. Paths are arbitrary bytes, not necessarily valid UTF-8,
/// so this works over `&[u8]` via `bstr` rather than forcing a lossy
/// from-`char` round trip that would corrupt multi-byte sequences.
fn quote_path(path: &Path, is_tty: bool) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    let bytes = path.as_os_str().as_bytes();
    if !is_tty {
        return bytes.to_vec();
    }
    bytes
        .bytes()
        .map(|b| if b == b'\n' || b == b'\t' || (b >= 0x20 && b < 0x7f) { b } else { b'?' })
        .collect()
}

fn type_letter(ft: FileType) -> char {
    if ft.is_dir() {
        'd'
    } else if ft.is_symlink() {
        'l'
    } else if ft.is_block_device() {
        'b'
    } else if ft.is_char_device() {
        'c'
    } else if ft.is_fifo() {
        'p'
    } else if ft.is_socket() {
        's'
    } else if ft.is_file() {
        'f'
    } else {
        '?'
    }
}

fn mode_string(mode: u64) -> String {
    let ft = FileType::from_stat_mode(mode);
    let mut s = String::with_capacity(10);
    s.push(type_letter(ft));
    let triplets: [(u64, u64, u64, u64, char, char); 3] = [
        (0o400, 0o200, 0o100, 0o4000, 's', 'S'),
        (0o040, 0o020, 0o010, 0o2000, 's', 'S'),
        (0o004, 0o002, 0o001, 0o1000, 't', 'T'),
    ];
    for (r, w, x, special, on_x, on_no_x) in triplets {
        s.push(if mode & r != 0 { 'r' } else { '-' });
        s.push(if mode & w != 0 { 'w' } else { '-' });
        let has_x = mode & x != 0;
        let has_special = mode & special != 0;
        s.push(match (has_special, has_x) {
            (true, true) => on_x,
            (true, false) => on_no_x,
            (false, true) => 'x',
            (false, false) => '-',
        });
    }
    s
}

fn render_ls_line(entry: &DirEntry) -> io::Result<String> {
    let meta = entry.metadata()?;
    let blocks = meta.blocks() / 2; // 512-byte blocks -> 1K blocks, as `ls -s` reports
    let mode = mode_string(meta.mode());
    let user = users::name_for_uid(meta.uid());
    let group = users::name_for_gid(meta.gid());
    let mtime = format_time(meta.modified().unwrap_or(SystemTime::UNIX_EPOCH));
    Ok(format!(
        "{:>8} {} {:>3} {:<8} {:<8} {:>8} {} {}",
        blocks,
        mode,
        meta.nlink(),
        user,
        group,
        meta.len(),
        mtime,
        entry.path().display(),
    ))
}

fn format_time(t: SystemTime) -> String {
    let secs = t.duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    format!("@{}", secs)
}

/// `%Tk`/`%Ak`/`%Ck`-style sub-directive: `k` picks which representation of
/// the timestamp to render. Only `@` (seconds since the epoch, matching
/// `format_time`'s own `%t`) is implemented; every other GNU find `strftime`
/// conversion character is out of scope without a calendar dependency (see
/// `primitives::parse_datetime`'s equivalent note) and falls back to `@`.
fn format_time_k(t: SystemTime, _k: char) -> String {
    format_time(t)
}

/// `-printf`/`-fprintf` format mini-language: a reasonable, commonly-used
/// subset of GNU find's directives, each introduced by `%`. Unrecognised
/// directives pass through literally (matching GNU find's own leniency),
/// and `\n`/`\t`/`\r`/`\\`/octal backslash escapes are honoured same as the
/// shell would expect in a quoted format string.
fn render_format(fmt: &str, entry: &DirEntry, rel: &Path) -> String {
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some(d @ '0'..='7') => {
                    let mut digits = String::new();
                    digits.push(d);
                    while digits.len() < 3 {
                        match chars.peek() {
                            Some(&n @ '0'..='7') => {
                                digits.push(n);
                                chars.next();
                            }
                            _ => break,
                        }
                    }
                    let byte = u8::from_str_radix(&digits, 8).unwrap_or(0);
                    out.push(byte as char);
                }
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '%' => match chars.next() {
                Some('%') => out.push('%'),
                Some('p') => out.push_str(&entry.path().display().to_string()),
                Some('P') => out.push_str(&rel.display().to_string()),
                Some('f') => out.push_str(&entry.file_name().to_string_lossy()),
                Some('h') => out.push_str(
                    &entry.path().parent().map(|p| p.display().to_string()).unwrap_or_default(),
                ),
                Some('d') => out.push_str(&entry.depth().to_string()),
                Some('l') => {
                    let target = std::fs::read_link(entry.path())
                        .map(|t| t.display().to_string())
                        .unwrap_or_default();
                    out.push_str(&target);
                }
                Some(y @ ('y' | 'Y')) => {
                    let letter = if y == 'y' {
                        entry.dent_file_type().map(type_letter)
                    } else {
                        None
                    }
                    .or_else(|| entry.metadata().ok().map(|m| type_letter(m.file_type())))
                    .unwrap_or('?');
                    out.push(letter);
                }
                Some(other @ ('m' | 'M' | 's' | 'u' | 'g' | 'U' | 'G' | 'i' | 'n' | 't')) => {
                    push_stat_directive(&mut out, other, entry);
                }
                Some(field @ ('T' | 'A' | 'C')) => {
                    let k = chars.next().unwrap_or('@');
                    push_time_field_directive(&mut out, field, k, entry);
                }
                Some(other) => {
                    out.push('%');
                    out.push(other);
                }
                None => out.push('%'),
            },
            other => out.push(other),
        }
    }
    out
}

fn push_stat_directive(out: &mut String, directive: char, entry: &DirEntry) {
    let meta: Option<Metadata> = entry.metadata().ok();
    match (directive, meta) {
        ('m', Some(m)) => out.push_str(&format!("{:o}", m.mode() & 0o7777)),
        ('M', Some(m)) => out.push_str(&mode_string(m.mode())),
        ('s', Some(m)) => out.push_str(&m.len().to_string()),
        ('u', Some(m)) => out.push_str(&users::name_for_uid(m.uid())),
        ('g', Some(m)) => out.push_str(&users::name_for_gid(m.gid())),
        ('U', Some(m)) => out.push_str(&m.uid().to_string()),
        ('G', Some(m)) => out.push_str(&m.gid().to_string()),
        ('i', Some(m)) => out.push_str(&m.ino().to_string()),
        ('n', Some(m)) => out.push_str(&m.nlink().to_string()),
        ('t', Some(m)) => {
            out.push_str(&format_time(m.modified().unwrap_or(SystemTime::UNIX_EPOCH)))
        }
        (_, None) => out.push('?'),
        _ => {}
    }
}

/// `%T`/`%A`/`%C` followed by a conversion character `k`: mtime/atime/ctime
/// respectively, rendered via `format_time_k`.
fn push_time_field_directive(out: &mut String, field: char, k: char, entry: &DirEntry) {
    let meta: Option<Metadata> = entry.metadata().ok();
    let t = meta.and_then(|m| match field {
        'T' => m.modified().ok(),
        'A' => m.accessed().ok(),
        'C' => m.changed().ok(),
        _ => None,
    });
    match t {
        Some(t) => out.push_str(&format_time_k(t, k)),
        None => out.push('?'),
    }
}
