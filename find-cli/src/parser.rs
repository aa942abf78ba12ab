//! The expression compiler (§4.D): turns the argv slice following the
//! starting points into a `PredicateNode` tree plus a refined `Config`.
//!
//! This is a hand-rolled recursive-descent parser over the raw `Vec<String>`
//! that clap's `TrailingVarArg` setting hands back uninterpreted (see
//! `main.rs`) — `find`'s primaries don't fit clap's flag model, the same
//! division of labor `ftsfind.c`'s `main()` uses between getopt-style
//! leading flags and its own primary table.

use std::rc::Rc;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::ParseError;
use crate::mode;
use crate::predicate::{
    AccessMode, ExecRecipe, ExecScope, PrimaryKind, PredicateNode,
    TimeField, Terminator,
};
use crate::primitives::{self, Cmp};
use crate::regexflavor;
use crate::users;

/// A read-only cursor over the token slice; every `build_*` helper advances
/// it by consuming the arguments its own primary owns.
struct Cursor<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [String]) -> Cursor<'a> {
        Cursor { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(|s| s.as_str())
    }

    fn advance(&mut self) -> Option<&'a str> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Consume and return the next token verbatim, whatever it looks like
    /// (primaries that take a literal `{}`/`;`/`+`-shaped argument, or
    /// exec's own argv, call this directly instead of `advance`, since
    /// `advance` and this do the same thing — kept as two names so call
    /// sites read as "next primary-name token" vs "next opaque argument").
    fn take_arg(&mut self, owner: &str) -> Result<String, ParseError> {
        self.advance()
            .map(|s| s.to_string())
            .ok_or_else(|| format!("missing argument to `{}'", owner).into())
    }
}

/// Parser-local bookkeeping that doesn't belong on `Config` because it's
/// only needed while building the tree, not during evaluation.
#[derive(Default)]
struct ParserState {
    use_daystart: bool,
    saw_non_global_test: bool,
    saw_prune: bool,
    saw_delete: bool,
    saw_confirm_exec: bool,
}

/// Parse `tokens` (the expression portion of argv, after leading options
/// and starting points have been stripped by `main`) into a predicate tree,
/// applying any global-option mutations to `config` along the way.
pub fn parse(
    tokens: &[String],
    mut config: Config,
) -> Result<(PredicateNode, Config), ParseError> {
    let mut cursor = Cursor::new(tokens);
    let mut state = ParserState::default();

    if cursor.peek().is_none() {
        return Ok((PredicateNode::primary(PrimaryKind::True), config));
    }

    let tree = parse_comma(&mut cursor, &mut config, &mut state)?;
    if let Some(extra) = cursor.peek() {
        return Err(format!("unexpected extra argument `{}'", extra).into());
    }
    if state.saw_delete && state.saw_prune && !config.explicit_depth {
        return Err(
            "`-delete' and `-prune' may not be used together unless `-depth' \
             was given explicitly"
                .into(),
        );
    }
    if state.saw_confirm_exec {
        if let Some(ref from) = config.files0_from {
            if from == "-" {
                return Err(
                    "`-ok'/`-okdir' cannot be used when reading starting \
                     points from standard input via `-files0-from -'"
                        .into(),
                );
            }
        }
    }
    Ok((tree, config))
}

fn parse_comma(
    cursor: &mut Cursor,
    config: &mut Config,
    state: &mut ParserState,
) -> Result<PredicateNode, ParseError> {
    let mut left = parse_or(cursor, config, state)?;
    while cursor.peek() == Some(",") {
        cursor.advance();
        let right = parse_or(cursor, config, state)?;
        left = PredicateNode::Comma(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_or(
    cursor: &mut Cursor,
    config: &mut Config,
    state: &mut ParserState,
) -> Result<PredicateNode, ParseError> {
    let mut left = parse_and(cursor, config, state)?;
    while matches!(cursor.peek(), Some("-o") | Some("-or")) {
        cursor.advance();
        let right = parse_and(cursor, config, state)?;
        left = PredicateNode::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_and(
    cursor: &mut Cursor,
    config: &mut Config,
    state: &mut ParserState,
) -> Result<PredicateNode, ParseError> {
    let mut left = parse_unary(cursor, config, state)?;
    loop {
        match cursor.peek() {
            None | Some(")") | Some(",") | Some("-o") | Some("-or") => break,
            Some("-a") | Some("-and") => {
                cursor.advance();
            }
            _ => {} // implicit AND: fall through and parse the next operand
        }
        if cursor.peek().is_none() {
            break;
        }
        let right = parse_unary(cursor, config, state)?;
        left = PredicateNode::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_unary(
    cursor: &mut Cursor,
    config: &mut Config,
    state: &mut ParserState,
) -> Result<PredicateNode, ParseError> {
    let mut negate = false;
    while matches!(cursor.peek(), Some("!") | Some("-not")) {
        cursor.advance();
        negate = !negate;
    }
    let node = parse_group_or_primary(cursor, config, state)?;
    Ok(if negate { PredicateNode::Not(Box::new(node)) } else { node })
}

fn parse_group_or_primary(
    cursor: &mut Cursor,
    config: &mut Config,
    state: &mut ParserState,
) -> Result<PredicateNode, ParseError> {
    match cursor.peek() {
        Some("(") => {
            cursor.advance();
            let inner = parse_comma(cursor, config, state)?;
            match cursor.advance() {
                Some(")") => Ok(inner),
                _ => Err("unbalanced parentheses".into()),
            }
        }
        Some(")") => Err("unexpected `)'".into()),
        Some(_) => parse_primary(cursor, config, state),
        None => Err("expected an expression".into()),
    }
}

/// Consume one or more leading global/positional options (which never
/// enter the tree) and then the actual primary they were in front of.
fn parse_primary(
    cursor: &mut Cursor,
    config: &mut Config,
    state: &mut ParserState,
) -> Result<PredicateNode, ParseError> {
    loop {
        let tok = cursor.advance().ok_or("expected an expression")?.to_string();

        if apply_global_option(&tok, cursor, config)? {
            if state.saw_non_global_test && config.warnings {
                eprintln!(
                    "find: warning: you have specified the global option \
                     `{}' after the first test, action or global option; \
                     its effect is not confined to this immediate rule",
                    tok
                );
            }
            continue;
        }
        if apply_positional_option(&tok, config, state)? {
            continue;
        }

        state.saw_non_global_test = true;
        return build_primary(&tok, cursor, config, state);
    }
}

/// Global options mutate `Config` and never enter the tree. Returns
/// `Ok(true)` if `tok` was consumed as one.
fn apply_global_option(
    tok: &str,
    cursor: &mut Cursor,
    config: &mut Config,
) -> Result<bool, ParseError> {
    match tok {
        "-maxdepth" => {
            let arg = cursor.take_arg(tok)?;
            config.max_depth = arg
                .parse()
                .map_err(|_| format!("invalid argument `{}' to -maxdepth", arg))?;
        }
        "-mindepth" => {
            let arg = cursor.take_arg(tok)?;
            config.min_depth = arg
                .parse()
                .map_err(|_| format!("invalid argument `{}' to -mindepth", arg))?;
        }
        "-xdev" | "-mount" => config.stay_on_fs = true,
        "-files0-from" => {
            config.files0_from = Some(cursor.take_arg(tok)?);
        }
        "-noleaf" => config.no_leaf_check = true,
        "-ignore_readdir_race" => config.ignore_readdir_race = true,
        "-noignore_readdir_race" => config.ignore_readdir_race = false,
        "-regextype" => {
            let arg = cursor.take_arg(tok)?;
            config.regex_flavor = regexflavor::RegexFlavor::parse(&arg)?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Positional options affect subsequent tests only; they're re-applied
/// live as the parser walks left to right, so earlier primaries in the
/// same expression are unaffected (matching GNU find's documented
/// behaviour for `-daystart`/`-follow`/`-warn`/`-nowarn`).
fn apply_positional_option(
    tok: &str,
    config: &mut Config,
    state: &mut ParserState,
) -> Result<bool, ParseError> {
    match tok {
        "-daystart" => state.use_daystart = !state.use_daystart,
        "-follow" => config.symlink_policy = findwalk::SymlinkPolicy::Logical,
        "-warn" => config.warnings = true,
        "-nowarn" => config.warnings = false,
        "-d" | "-depth" => {
            config.depth_first = true;
            config.explicit_depth = true;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn time_reference(config: &Config, state: &ParserState) -> std::time::SystemTime {
    if state.use_daystart { config.cur_day_start } else { config.now }
}

fn build_primary(
    tok: &str,
    cursor: &mut Cursor,
    config: &mut Config,
    state: &mut ParserState,
) -> Result<PredicateNode, ParseError> {
    let kind = match tok {
        "-name" => PrimaryKind::Name(cursor.take_arg(tok)?),
        "-iname" => PrimaryKind::IName(cursor.take_arg(tok)?),
        "-path" | "-wholename" => PrimaryKind::Path(cursor.take_arg(tok)?),
        "-ipath" | "-iwholename" => PrimaryKind::IPath(cursor.take_arg(tok)?),
        "-lname" => PrimaryKind::LName(cursor.take_arg(tok)?),
        "-ilname" => PrimaryKind::ILName(cursor.take_arg(tok)?),
        "-regex" => {
            let pat = cursor.take_arg(tok)?;
            let re = regexflavor::compile(&pat, config.regex_flavor, false)?;
            PrimaryKind::Regex(Box::new(re))
        }
        "-iregex" => {
            let pat = cursor.take_arg(tok)?;
            let re = regexflavor::compile(&pat, config.regex_flavor, true)?;
            PrimaryKind::IRegex(Box::new(re))
        }
        "-type" => {
            let arg = cursor.take_arg(tok)?;
            PrimaryKind::Type(primitives::parse_type_letters(&arg)?)
        }
        "-xtype" => {
            let arg = cursor.take_arg(tok)?;
            PrimaryKind::XType(primitives::parse_type_letters(&arg)?)
        }
        "-size" => {
            let arg = cursor.take_arg(tok)?;
            let (cmp, bytes) = primitives::parse_size(&arg)?;
            PrimaryKind::Size(cmp, bytes)
        }
        "-inum" => {
            let arg = cursor.take_arg(tok)?;
            PrimaryKind::INum(primitives::parse_numeric(&arg)?)
        }
        "-links" => {
            let arg = cursor.take_arg(tok)?;
            PrimaryKind::Links(primitives::parse_numeric(&arg)?)
        }
        "-user" => {
            let arg = cursor.take_arg(tok)?;
            let uid = users::uid_for_name(&arg)
                .or_else(|| arg.parse().ok())
                .ok_or_else(|| format!("`{}' is not the name of a known user", arg))?;
            PrimaryKind::User(arg, uid)
        }
        "-group" => {
            let arg = cursor.take_arg(tok)?;
            let gid = users::gid_for_name(&arg)
                .or_else(|| arg.parse().ok())
                .ok_or_else(|| format!("`{}' is not the name of a known group", arg))?;
            PrimaryKind::Group(arg, gid)
        }
        "-uid" => {
            let arg = cursor.take_arg(tok)?;
            PrimaryKind::Uid(primitives::parse_numeric(&arg)?)
        }
        "-gid" => {
            let arg = cursor.take_arg(tok)?;
            PrimaryKind::Gid(primitives::parse_numeric(&arg)?)
        }
        "-perm" => {
            let arg = cursor.take_arg(tok)?;
            let (how, mode_file, mode_dir) = mode::parse_perm_arg(&arg)?;
            PrimaryKind::Perm { mode_file, mode_dir, how }
        }
        "-empty" => PrimaryKind::Empty,
        "-nouser" => PrimaryKind::NoUser,
        "-nogroup" => PrimaryKind::NoGroup,
        "-newer" => {
            let arg = cursor.take_arg(tok)?;
            let meta = findwalk::os::unix::stat::stat(PathBuf::from(&arg))
                .map_err(|e| format!("cannot stat `{}': {}", arg, e))?;
            let mtime = meta
                .modified()
                .map_err(|e| format!("cannot read mtime of `{}': {}", arg, e))?;
            PrimaryKind::Newer(mtime)
        }
        "-samefile" => {
            let arg = cursor.take_arg(tok)?;
            let meta = findwalk::os::unix::stat::stat(PathBuf::from(&arg))
                .map_err(|e| format!("cannot stat `{}': {}", arg, e))?;
            PrimaryKind::SameFile { dev: meta.dev(), ino: meta.ino() }
        }
        "-fstype" => PrimaryKind::FsType(cursor.take_arg(tok)?),
        "-context" => PrimaryKind::Context(cursor.take_arg(tok)?),
        "-readable" => PrimaryKind::AccessCheck(AccessMode::Readable),
        "-writable" => PrimaryKind::AccessCheck(AccessMode::Writable),
        "-executable" => PrimaryKind::AccessCheck(AccessMode::Executable),
        "-amin" => build_time(cursor, config, state, tok, 60, PrimaryKind::Amin)?,
        "-atime" => build_time(cursor, config, state, tok, 86400, PrimaryKind::Atime)?,
        "-cmin" => build_time(cursor, config, state, tok, 60, PrimaryKind::Cmin)?,
        "-ctime" => build_time(cursor, config, state, tok, 86400, PrimaryKind::Ctime)?,
        "-mmin" => build_time(cursor, config, state, tok, 60, PrimaryKind::Mmin)?,
        "-mtime" => build_time(cursor, config, state, tok, 86400, PrimaryKind::Mtime)?,
        "-used" => {
            let arg = cursor.take_arg(tok)?;
            let numeric = primitives::parse_numeric(&arg)?;
            PrimaryKind::Used(numeric.cmp, numeric.value)
        }
        "-true" => PrimaryKind::True,
        "-false" => PrimaryKind::False,
        "-quit" => PrimaryKind::Quit,
        "-prune" => {
            state.saw_prune = true;
            PrimaryKind::Prune
        }
        "-delete" => {
            state.saw_delete = true;
            config.depth_first = true;
            PrimaryKind::Delete
        }
        "-print" => PrimaryKind::Print,
        "-print0" => PrimaryKind::Print0,
        "-printf" => PrimaryKind::PrintF(cursor.take_arg(tok)?),
        "-fprint" => PrimaryKind::FPrint(cursor.take_arg(tok)?),
        "-fprintf" => {
            let file = cursor.take_arg(tok)?;
            let fmt = cursor.take_arg(tok)?;
            PrimaryKind::FPrintF(file, fmt)
        }
        "-fls" => PrimaryKind::FLS(cursor.take_arg(tok)?),
        "-ls" => PrimaryKind::Ls,
        "-exec" => PrimaryKind::Exec(build_exec_recipe(
            cursor,
            ExecScope::Global,
            false,
        )?),
        "-ok" => {
            state.saw_confirm_exec = true;
            PrimaryKind::Ok(build_exec_recipe(cursor, ExecScope::Global, true)?)
        }
        "-execdir" => PrimaryKind::ExecDir(build_exec_recipe(
            cursor,
            ExecScope::PerDirectory,
            false,
        )?),
        "-okdir" => {
            state.saw_confirm_exec = true;
            PrimaryKind::OkDir(build_exec_recipe(
                cursor,
                ExecScope::PerDirectory,
                true,
            )?)
        }
        other => {
            if let Some((x, y)) = parse_newerxy_letters(other) {
                return Ok(PredicateNode::primary(build_newerxy(
                    cursor, config, x, y,
                )?));
            }
            return Err(format!("unknown predicate `{}'", other).into());
        }
    };
    Ok(PredicateNode::primary(kind))
}

fn build_time(
    cursor: &mut Cursor,
    config: &Config,
    state: &ParserState,
    name: &str,
    unit_seconds: u64,
    ctor: fn(Cmp, std::time::SystemTime) -> PrimaryKind,
) -> Result<PrimaryKind, ParseError> {
    let arg = cursor.take_arg(name)?;
    let reference = time_reference(config, state);
    let (cmp, threshold) = primitives::parse_time_offset(&arg, reference, unit_seconds)?;
    Ok(ctor(cmp, threshold))
}

/// `"-newerXY"` is a family of 20-ish primary names generated from two
/// letters baked into the option name itself rather than taken as a
/// separate argument; `X` selects which timestamp of the file being tested
/// to compare, `Y` selects which timestamp of the reference (or, for `t`,
/// that the reference is a literal time string).
fn parse_newerxy_letters(tok: &str) -> Option<(char, char)> {
    let rest = tok.strip_prefix("-newer")?;
    let mut chars = rest.chars();
    let x = chars.next()?;
    let y = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    if !matches!(x, 'a' | 'B' | 'c' | 'm') {
        return None;
    }
    if !matches!(y, 'a' | 'B' | 'c' | 'm' | 't') {
        return None;
    }
    Some((x, y))
}

fn time_field_letter(c: char) -> TimeField {
    match c {
        'a' => TimeField::Access,
        'B' => TimeField::BirthOrCtimeFallback,
        'c' => TimeField::Ctime,
        'm' => TimeField::Mtime,
        't' => TimeField::Literal,
        _ => unreachable!("validated by parse_newerxy_letters"),
    }
}

fn build_newerxy(
    cursor: &mut Cursor,
    config: &Config,
    x: char,
    y: char,
) -> Result<PrimaryKind, ParseError> {
    let arg = cursor.take_arg("-newerXY")?;
    let reference = if y == 't' {
        primitives::parse_datetime(&arg, config.now)?
    } else {
        let meta = findwalk::os::unix::stat::stat(PathBuf::from(&arg))
            .map_err(|e| format!("cannot stat `{}': {}", arg, e))?;
        match y {
            'a' => meta.accessed(),
            'c' => meta.changed(),
            // No birthtime on this platform's `stat`; fall back to ctime,
            // matching GNU find's own documented fallback for `-newerXB`.
            'B' => meta.changed(),
            'm' => meta.modified(),
            _ => unreachable!(),
        }
        .map_err(|e| format!("cannot read timestamp of `{}': {}", arg, e))?
    };
    Ok(PrimaryKind::NewerXY {
        x: time_field_letter(x),
        y: time_field_letter(y),
        reference,
    })
}

fn build_exec_recipe(
    cursor: &mut Cursor,
    scope: ExecScope,
    confirm: bool,
) -> Result<Rc<ExecRecipe>, ParseError> {
    let primary_name = match (scope, confirm) {
        (ExecScope::Global, false) => "-exec",
        (ExecScope::Global, true) => "-ok",
        (ExecScope::PerDirectory, false) => "-execdir",
        (ExecScope::PerDirectory, true) => "-okdir",
    };
    let mut argv: Vec<String> = Vec::new();
    loop {
        let tok = cursor
            .advance()
            .ok_or_else(|| format!("{}: missing terminating `;'", primary_name))?;
        if tok == ";" {
            let recipe =
                ExecRecipe::new(Terminator::Semicolon, scope, confirm, argv);
            validate_exec_recipe(&recipe, scope)?;
            return Ok(Rc::new(recipe));
        }
        if tok == "+" && argv.last().map(|a| a == "{}").unwrap_or(false) {
            if confirm {
                return Err(
                    format!("{}: the `+' terminator is not supported", primary_name)
                        .into(),
                );
            }
            argv.pop();
            if argv.iter().any(|a| a.contains("{}")) {
                return Err(format!(
                    "{}: only one instance of `{{}}' is supported with `+'",
                    primary_name
                )
                .into());
            }
            let recipe = ExecRecipe::new(Terminator::Plus, scope, confirm, argv);
            validate_exec_recipe(&recipe, scope)?;
            return Ok(Rc::new(recipe));
        }
        argv.push(tok.to_string());
    }
}

fn validate_exec_recipe(
    recipe: &ExecRecipe,
    scope: ExecScope,
) -> Result<(), ParseError> {
    if recipe.initial_argv.is_empty() {
        return Err("missing command for `-exec'-family primary".into());
    }
    if scope == ExecScope::PerDirectory && recipe.initial_argv[0].contains("{}") {
        return Err(
            "`{}' is not allowed in the utility name for `-execdir'/`-okdir'"
                .into(),
        );
    }
    Ok(())
}
