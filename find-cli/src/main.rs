// This is the front end over `findwalk`: parse the handful of leading
// flags that look like ordinary options (`-H`/`-L`/`-P`/`-D`/`-O`) with
// clap, same as `walkdir-list`'s `main()` does, then hand every remaining
// token — starting points and the expression both — to the hand-rolled
// parser in `parser.rs`. `ftsfind.c`'s own `main()` splits the same way
// between getopt and its predicate table.

mod action;
mod config;
mod error;
mod eval;
mod exec;
mod fnmatch;
mod mode;
mod optimiser;
mod parser;
mod predicate;
mod primitives;
mod regexflavor;
mod state;
mod users;

use std::ffi::OsStr;
use std::io::{self, Read as _};
use std::path::{Path, PathBuf};
use std::process;
use std::time::SystemTime;

use clap::{App, AppSettings, Arg};

use action::ActionRuntime;
use config::Config;
use error::FatalError;
use eval::Evaluator;
use predicate::{PredicateNode, PrimaryKind};
use state::TraversalState;

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(2);
        }
    }
}

/// The `Ok` side is the process exit code for a run that reached the
/// traversal loop (`0` clean, `1` a non-fatal error was recorded along the
/// way); the `Err` side is a parse or startup failure, which `main` always
/// exits `2` for, matching §7's fatal-vs-non-fatal split.
fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let now = SystemTime::now();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let matches = App::new("find")
        .setting(AppSettings::TrailingVarArg)
        .setting(AppSettings::DisableVersion)
        .max_term_width(100)
        .arg(Arg::with_name("H").short("H").help(
            "Do not follow symbolic links, except when processing command \
             line arguments",
        ))
        .arg(Arg::with_name("L").short("L").overrides_with("H").help(
            "Follow symbolic links",
        ))
        .arg(Arg::with_name("P").short("P").overrides_with("L").overrides_with("H").help(
            "Never follow symbolic links (default)",
        ))
        .arg(
            Arg::with_name("D")
                .short("D")
                .takes_value(true)
                .help("Print diagnostic information for debugging"),
        )
        .arg(
            Arg::with_name("O")
                .short("O")
                .takes_value(true)
                .help("Optimisation level (0-3); default 1"),
        )
        .arg(Arg::with_name("rest").multiple(true).allow_hyphen_values(true))
        .get_matches_from(std::iter::once("find".to_string()).chain(argv));

    let symlink_policy = if matches.is_present("L") {
        findwalk::SymlinkPolicy::Logical
    } else if matches.is_present("H") {
        findwalk::SymlinkPolicy::ArgOnly
    } else {
        findwalk::SymlinkPolicy::Physical
    };
    let debug = match matches.value_of("D") {
        Some(spec) => config::DebugFlags::parse(spec).map_err(FatalError)?,
        None => config::DebugFlags::default(),
    };
    let opt_level: u8 = match matches.value_of("O") {
        Some(s) => s
            .parse()
            .map_err(|_| FatalError(format!("invalid argument `{}' to -O", s)))?,
        None => 1,
    };

    let raw: Vec<String> = matches
        .values_of("rest")
        .map(|v| v.map(|s| s.to_string()).collect())
        .unwrap_or_default();
    let (mut start_points, expr_tokens) = split_start_points(&raw);

    let mut config = Config::new(now);
    config.symlink_policy = symlink_policy;
    config.opt_level = opt_level;
    config.debug = debug;

    let (tree, config) = parser::parse(&expr_tokens, config)?;

    if let Some(from) = config.files0_from.clone() {
        if !start_points.is_empty() {
            return Err(Box::new(FatalError(
                "cannot combine explicit starting points with `-files0-from'".into(),
            )));
        }
        start_points = read_files0_from(&from)?;
    } else if start_points.is_empty() {
        start_points.push(PathBuf::from("."));
    }

    if uses_per_directory_exec(&tree) {
        validate_execdir_path_security()?;
    }

    let fstypes = findwalk::FsTypeTable::load();
    let tree = optimiser::optimise(tree, &config, &fstypes);
    let tree = eval::wrap_default_print(tree);
    let actions = ActionRuntime::new(&tree);
    let evaluator = Evaluator::new(&config, &fstypes, &actions);

    let mut state = TraversalState::new();
    'starts: for start in &start_points {
        let walker = findwalk::WalkDir::new(start)
            .symlink_policy(config.symlink_policy)
            .min_depth(config.min_depth)
            .max_depth(config.max_depth)
            .same_file_system(config.stay_on_fs);
        let mut iter = walker.into_iter();
        while let Some(visit) = iter.next() {
            let order = visit.order();
            state.curdepth = visit.depth();
            state.rel_pathname = relative_to_start(visit.entry().path(), start);

            match order {
                findwalk::Order::PreOrder => {
                    if !config.depth_first && in_depth_range(&config, visit.depth()) {
                        evaluator.evaluate(&tree, visit.entry(), visit.dir_fd(), &mut state);
                    }
                    if state.stop_at_current_level {
                        iter.skip_current_dir();
                        state.stop_at_current_level = false;
                    }
                }
                findwalk::Order::PostOrder => {
                    if config.depth_first && in_depth_range(&config, visit.depth()) {
                        evaluator.evaluate(&tree, visit.entry(), visit.dir_fd(), &mut state);
                    }
                    actions.flush_dir_scoped(visit.entry().path(), &mut state);
                }
                findwalk::Order::Leaf => {
                    if in_depth_range(&config, visit.depth()) {
                        evaluator.evaluate(&tree, visit.entry(), visit.dir_fd(), &mut state);
                    }
                }
                findwalk::Order::Error
                | findwalk::Order::UnreadableDir
                | findwalk::Order::CycleDetected
                | findwalk::Order::SymlinkDangling => {
                    report_visit_problem(&visit, &config, &mut state);
                }
                findwalk::Order::NoStat | findwalk::Order::StatOkWithoutStat => {
                    // Every visit `classify_child`/`push_dir_frame` produce
                    // in this build resolves to one of the orders handled
                    // above; these two are reserved for traversal engines
                    // that can report a type without a matching stat call
                    // (or vice versa), which this walker's Unix backend
                    // never does.
                }
            }

            if state.quit {
                break 'starts;
            }
        }
    }

    let cwd = std::env::current_dir().unwrap_or_default();
    actions.flush_all(&cwd, &mut state);

    Ok(state.exit_status)
}

/// Leading arguments that don't look like an expression token (an option,
/// `(`, `)`, or `!`) are starting points, same convention `ftsfind.c` uses:
/// the first expression-shaped token ends the starting-point list.
fn split_start_points(raw: &[String]) -> (Vec<PathBuf>, Vec<String>) {
    let mut split = 0;
    for tok in raw {
        if looks_like_expression_token(tok) {
            break;
        }
        split += 1;
    }
    let starts = raw[..split].iter().map(PathBuf::from).collect();
    let rest = raw[split..].to_vec();
    (starts, rest)
}

fn looks_like_expression_token(tok: &str) -> bool {
    tok.starts_with('-') || tok == "(" || tok == ")" || tok == "!" || tok == ","
}

fn in_depth_range(config: &Config, depth: usize) -> bool {
    depth >= config.min_depth && depth <= config.max_depth
}

fn relative_to_start(path: &Path, start: &Path) -> PathBuf {
    path.strip_prefix(start).unwrap_or(path).to_path_buf()
}

/// Surface a traversal-engine condition that isn't itself a predicate
/// match: an unreadable directory, a detected symlink cycle, a dangling
/// symlink, or a plain I/O error mid-readdir. `-ignore_readdir_race`
/// silently absorbs the one case GNU find itself tolerates: a directory
/// entry that disappeared between being listed and being examined.
fn report_visit_problem(
    visit: &findwalk::FileVisit,
    config: &Config,
    state: &mut TraversalState,
) {
    if config.ignore_readdir_race && visit.errno_hint() == Some(libc::ENOENT) {
        return;
    }
    let path = visit.entry().path().display();
    let what = match visit.order() {
        findwalk::Order::UnreadableDir => "cannot open directory",
        findwalk::Order::CycleDetected => "filesystem loop detected",
        findwalk::Order::SymlinkDangling => "cannot stat symbolic link target for",
        _ => "cannot examine",
    };
    match visit.errno_hint() {
        Some(errno) => {
            let err = io::Error::from_raw_os_error(errno);
            eprintln!("find: {} `{}': {}", what, path, err);
        }
        None => eprintln!("find: {} `{}'", what, path),
    }
    state.record_nonfatal();
}

fn uses_per_directory_exec(node: &PredicateNode) -> bool {
    match node {
        PredicateNode::Primary(p) => {
            matches!(p.kind, PrimaryKind::ExecDir(_) | PrimaryKind::OkDir(_))
        }
        PredicateNode::Not(inner) => uses_per_directory_exec(inner),
        PredicateNode::And(a, b) | PredicateNode::Or(a, b) | PredicateNode::Comma(a, b) => {
            uses_per_directory_exec(a) || uses_per_directory_exec(b)
        }
    }
}

/// `-execdir`/`-okdir` resolve their utility name by searching `PATH`
/// relative to the matched entry's own directory; a relative or empty
/// entry in `PATH` would let a file planted in a scanned directory shadow
/// the intended utility. GNU find refuses to honour either primary at all
/// when `PATH` contains one, and so do we.
fn validate_execdir_path_security() -> Result<(), FatalError> {
    let path = std::env::var_os("PATH").unwrap_or_default();
    for entry in std::env::split_paths(&path) {
        if entry.as_os_str().is_empty() || entry.is_relative() {
            return Err(FatalError(
                "The environment variable PATH is insecure for use with \
                 `-execdir'/`-okdir' (contains a relative or empty entry)"
                    .to_string(),
            ));
        }
    }
    Ok(())
}

/// `-files0-from FILE`: read NUL-separated starting points from `FILE`, or
/// from standard input when `FILE` is `-`. Mirrors GNU find's own
/// `-files0-from` reader, including its refusal of an empty list.
fn read_files0_from(from: &str) -> Result<Vec<PathBuf>, FatalError> {
    use std::os::unix::ffi::OsStrExt;

    let mut buf = Vec::new();
    if from == "-" {
        io::stdin()
            .lock()
            .read_to_end(&mut buf)
            .map_err(|e| FatalError(format!("error reading standard input: {}", e)))?;
    } else {
        let mut f = std::fs::File::open(from)
            .map_err(|e| FatalError(format!("cannot open `{}' for reading: {}", from, e)))?;
        f.read_to_end(&mut buf)
            .map_err(|e| FatalError(format!("error reading `{}': {}", from, e)))?;
    }

    let paths: Vec<PathBuf> = buf
        .split(|&b| b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| PathBuf::from(OsStr::from_bytes(chunk)))
        .collect();
    if paths.is_empty() {
        return Err(FatalError(format!("`{}' contains no starting points", from)));
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_points_stop_at_first_expression_token() {
        let raw: Vec<String> =
            ["a", "b", "-name", "*.rs"].iter().map(|s| s.to_string()).collect();
        let (starts, expr) = split_start_points(&raw);
        assert_eq!(starts, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(expr, vec!["-name".to_string(), "*.rs".to_string()]);
    }

    #[test]
    fn no_starting_points_leaves_the_whole_line_as_expression() {
        let raw: Vec<String> = ["-type", "f"].iter().map(|s| s.to_string()).collect();
        let (starts, expr) = split_start_points(&raw);
        assert!(starts.is_empty());
        assert_eq!(expr, raw);
    }

    #[test]
    fn parenthesized_expression_is_not_mistaken_for_a_start_point() {
        let raw: Vec<String> =
            ["(", "-true", ")"].iter().map(|s| s.to_string()).collect();
        let (starts, expr) = split_start_points(&raw);
        assert!(starts.is_empty());
        assert_eq!(expr, raw);
    }

    #[test]
    fn depth_range_is_inclusive_on_both_ends() {
        let mut config = Config::new(SystemTime::now());
        config.min_depth = 1;
        config.max_depth = 3;
        assert!(!in_depth_range(&config, 0));
        assert!(in_depth_range(&config, 1));
        assert!(in_depth_range(&config, 3));
        assert!(!in_depth_range(&config, 4));
    }

    #[test]
    fn relative_path_strips_the_starting_point_prefix() {
        let start = Path::new("/tmp/walk");
        let full = Path::new("/tmp/walk/a/b");
        assert_eq!(relative_to_start(full, start), PathBuf::from("a/b"));
    }

    #[test]
    fn relative_path_falls_back_to_the_full_path_outside_the_start() {
        let start = Path::new("/tmp/elsewhere");
        let full = Path::new("/tmp/walk/a/b");
        assert_eq!(relative_to_start(full, start), full);
    }
}
