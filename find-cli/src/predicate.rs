use std::cell::{Cell, RefCell};
use std::time::SystemTime;

use regex::Regex;

use crate::primitives::{Cmp, NumericArg, TypeLetter};

/// How a `-perm` argument's mode should be compared against the file's
/// actual mode bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermMatch {
    /// `-perm MODE`: mode bits must match exactly.
    Exact,
    /// `-perm -MODE`: every bit set in MODE must be set in the file.
    AllOf,
    /// `-perm /MODE`: at least one bit set in MODE must be set in the
    /// file (a bare `MODE` with no bits at all always matches).
    AnyOf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    Readable,
    Writable,
    Executable,
}

/// The `X` half of `-newerXY`: which timestamp of the reference file (or
/// literal time, for `-newerXt`) to compare against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeField {
    Access,
    BirthOrCtimeFallback,
    Ctime,
    Mtime,
    /// Only valid as the `Y` half: the reference argument is itself a
    /// timestamp string (`-newerXt`), not a file to stat.
    Literal,
}

/// Terminator style for `-exec`/`-ok`/`-execdir`/`-okdir`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminator {
    Semicolon,
    Plus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecScope {
    /// `-exec`/`-ok`: runs in the directory `find` was started in.
    Global,
    /// `-execdir`/`-okdir`: runs in the matched entry's own directory.
    PerDirectory,
}

/// A parsed `-exec ... ;`/`-exec ... +`/`-ok ...`/`-execdir ...`/
/// `-okdir ...` recipe.
///
/// `Plus`-terminated recipes accumulate matches across visits, so the
/// recipe owns its own pending-batch state via interior mutability; the
/// tree holds an `Rc` to it and `ActionRuntime` keeps a second `Rc` so it
/// can flush every outstanding recipe on a directory-depth change and at
/// program end, without having to re-walk the predicate tree to find them.
#[derive(Debug)]
pub struct ExecRecipe {
    pub terminator: Terminator,
    pub scope: ExecScope,
    pub confirm: bool,
    pub initial_argv: Vec<String>,
    /// Index into `initial_argv` of each element that contains `{}` as a
    /// substring (for `Semicolon`) or that equals `{}` exactly (for
    /// `Plus`, where exactly one such element must exist, at the end).
    pub brace_positions: Vec<usize>,
    pub pending: RefCell<Vec<String>>,
    pub pending_bytes: Cell<usize>,
    pub last_run_failed: Cell<bool>,
}

impl ExecRecipe {
    pub fn new(
        terminator: Terminator,
        scope: ExecScope,
        confirm: bool,
        initial_argv: Vec<String>,
    ) -> ExecRecipe {
        let brace_positions = initial_argv
            .iter()
            .enumerate()
            .filter(|(_, a)| a.contains("{}"))
            .map(|(i, _)| i)
            .collect();
        ExecRecipe {
            terminator,
            scope,
            confirm,
            initial_argv,
            brace_positions,
            pending: RefCell::new(Vec::new()),
            pending_bytes: Cell::new(0),
            last_run_failed: Cell::new(false),
        }
    }
}

/// One primary: a leaf test or action. `kind` carries the primary's own
/// parsed arguments; the rest of the fields are flags the optimiser and
/// evaluator need and that the parser fills in once, at construction.
#[derive(Clone, Debug)]
pub struct Primary {
    pub kind: PrimaryKind,
    pub needs_stat: bool,
    pub needs_type: bool,
    pub has_side_effects: bool,
    pub inhibits_default_print: bool,
    pub estimated_success_rate: f64,
}

impl Primary {
    pub fn new(kind: PrimaryKind) -> Primary {
        let needs_stat = kind.needs_stat();
        let needs_type = kind.needs_type();
        let has_side_effects = kind.has_side_effects();
        let inhibits_default_print = kind.inhibits_default_print();
        let estimated_success_rate = kind.estimated_success_rate();
        Primary {
            kind,
            needs_stat,
            needs_type,
            has_side_effects,
            inhibits_default_print,
            estimated_success_rate,
        }
    }
}

#[derive(Clone, Debug)]
pub enum PrimaryKind {
    Name(String),
    IName(String),
    Path(String),
    IPath(String),
    Regex(Box<Regex>),
    IRegex(Box<Regex>),
    Type(Vec<TypeLetter>),
    XType(Vec<TypeLetter>),
    Size(Cmp, u64),
    INum(NumericArg),
    Links(NumericArg),
    User(String, u32),
    Group(String, u32),
    Uid(NumericArg),
    Gid(NumericArg),
    Perm { mode_file: u32, mode_dir: u32, how: PermMatch },
    Empty,
    NoUser,
    NoGroup,
    Newer(SystemTime),
    NewerXY { x: TimeField, y: TimeField, reference: SystemTime },
    Amin(Cmp, SystemTime),
    Atime(Cmp, SystemTime),
    Cmin(Cmp, SystemTime),
    Ctime(Cmp, SystemTime),
    Mmin(Cmp, SystemTime),
    Mtime(Cmp, SystemTime),
    Used(Cmp, i64),
    LName(String),
    ILName(String),
    /// `-samefile`: the `(device, inode)` pair of the reference file,
    /// captured once at parse time so evaluation never has to re-stat it.
    SameFile { dev: u64, ino: u64 },
    FsType(String),
    Context(String),
    AccessCheck(AccessMode),
    True,
    False,
    Quit,
    Prune,
    Delete,
    Print,
    Print0,
    PrintF(String),
    FPrint(String),
    FPrintF(String, String),
    FLS(String),
    Ls,
    Exec(std::rc::Rc<ExecRecipe>),
    Ok(std::rc::Rc<ExecRecipe>),
    ExecDir(std::rc::Rc<ExecRecipe>),
    OkDir(std::rc::Rc<ExecRecipe>),
}

impl PrimaryKind {
    fn needs_stat(&self) -> bool {
        use PrimaryKind::*;
        !matches!(
            self,
            Name(_) | IName(_) | Path(_) | IPath(_) | Regex(_) | IRegex(_)
                | True | False | Quit | Prune | Print | Print0 | PrintF(_)
                | FPrint(_) | FPrintF(_, _) | Context(_)
        )
    }

    fn needs_type(&self) -> bool {
        matches!(self, PrimaryKind::Type(_) | PrimaryKind::XType(_))
    }

    fn has_side_effects(&self) -> bool {
        use PrimaryKind::*;
        matches!(
            self,
            Quit | Prune | Delete | Print | Print0 | PrintF(_) | FPrint(_)
                | FPrintF(_, _) | FLS(_) | Ls | Exec(_) | Ok(_) | ExecDir(_)
                | OkDir(_)
        )
    }

    fn inhibits_default_print(&self) -> bool {
        use PrimaryKind::*;
        matches!(
            self,
            Print | Print0 | PrintF(_) | FPrint(_) | FPrintF(_, _) | FLS(_)
                | Ls | Exec(_) | Ok(_) | ExecDir(_) | OkDir(_) | Delete
        )
    }

    /// A rough prior used only to order side-effect-free tests within a
    /// reorderable run (see the optimiser); not part of any documented
    /// contract.
    fn estimated_success_rate(&self) -> f64 {
        use PrimaryKind::*;
        match self {
            True => 1.0,
            False => 0.0,
            Name(_) | IName(_) => 0.1,
            Path(_) | IPath(_) => 0.1,
            Regex(_) | IRegex(_) => 0.2,
            Type(_) => 0.5,
            XType(_) => 0.5,
            Empty => 0.3,
            _ => 0.5,
        }
    }
}

/// The predicate expression tree: tests, actions, and the operators that
/// combine them. Binary operators own their children by value since the
/// tree is strictly acyclic.
#[derive(Clone, Debug)]
pub enum PredicateNode {
    Primary(Primary),
    Not(Box<PredicateNode>),
    And(Box<PredicateNode>, Box<PredicateNode>),
    Or(Box<PredicateNode>, Box<PredicateNode>),
    Comma(Box<PredicateNode>, Box<PredicateNode>),
}

impl PredicateNode {
    pub fn primary(kind: PrimaryKind) -> PredicateNode {
        PredicateNode::Primary(Primary::new(kind))
    }

    /// Whether anything in this subtree has a side effect, used by the
    /// optimiser to decide whether a run of sibling nodes may be freely
    /// reordered.
    pub fn has_side_effects(&self) -> bool {
        match self {
            PredicateNode::Primary(p) => p.has_side_effects,
            PredicateNode::Not(inner) => inner.has_side_effects(),
            PredicateNode::And(a, b) | PredicateNode::Or(a, b) | PredicateNode::Comma(a, b) => {
                a.has_side_effects() || b.has_side_effects()
            }
        }
    }

    /// True if any node in this tree sets `inhibits_default_print`
    /// (i.e. the user specified their own action).
    pub fn has_explicit_action(&self) -> bool {
        match self {
            PredicateNode::Primary(p) => p.inhibits_default_print,
            PredicateNode::Not(inner) => inner.has_explicit_action(),
            PredicateNode::And(a, b) | PredicateNode::Or(a, b) | PredicateNode::Comma(a, b) => {
                a.has_explicit_action() || b.has_explicit_action()
            }
        }
    }

    /// Collect every `Plus`-terminated exec recipe anywhere in this tree,
    /// so `ActionRuntime` can flush them on directory-depth changes without
    /// re-walking the tree each time.
    pub fn collect_exec_recipes(&self, out: &mut Vec<std::rc::Rc<ExecRecipe>>) {
        match self {
            PredicateNode::Primary(p) => match &p.kind {
                PrimaryKind::Exec(r)
                | PrimaryKind::Ok(r)
                | PrimaryKind::ExecDir(r)
                | PrimaryKind::OkDir(r) => {
                    if r.terminator == Terminator::Plus {
                        out.push(r.clone());
                    }
                }
                _ => {}
            },
            PredicateNode::Not(inner) => inner.collect_exec_recipes(out),
            PredicateNode::And(a, b) | PredicateNode::Or(a, b) | PredicateNode::Comma(a, b) => {
                a.collect_exec_recipes(out);
                b.collect_exec_recipes(out);
            }
        }
    }
}
