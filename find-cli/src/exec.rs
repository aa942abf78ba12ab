//! Batched and single-shot execution of `-exec`/`-ok`/`-execdir`/`-okdir`.

use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::predicate::{ExecRecipe, Terminator};

/// Headroom subtracted from `ARG_MAX` to leave room for the utility's own
/// environment growth, mirroring GNU find's fixed safety margin.
const ARG_MAX_HEADROOM: usize = 2 * 1024;

/// A conservative cap on the number of arguments in a single batch, in
/// addition to the byte budget; `ARG_MAX` alone doesn't bound argument
/// *count* on some platforms.
const MAX_BATCH_ARGS: usize = 10_000;

fn arg_max() -> usize {
    let lim = unsafe { libc::sysconf(libc::_SC_ARG_MAX) };
    if lim > 0 {
        lim as usize
    } else {
        128 * 1024
    }
}

/// Stateless driver over `ExecRecipe`'s own pending-batch fields. There's
/// one of these conceptually per recipe, but since all the mutable state
/// lives on the recipe itself (see `predicate::ExecRecipe`), the "batcher"
/// here is just a namespace for the functions that touch it.
pub struct ExecBatcher;

impl ExecBatcher {
    /// Append `path` to `recipe`'s pending batch, flushing first if
    /// appending would overflow the byte or count budget. Returns the
    /// exit code of a flush that happened as a side effect, if any.
    pub fn append(recipe: &ExecRecipe, cwd: &Path, path: &str) -> Option<i32> {
        debug_assert_eq!(recipe.terminator, Terminator::Plus);
        let budget = arg_max().saturating_sub(ARG_MAX_HEADROOM);
        let added = path.len() + 1;
        let would_overflow = recipe.pending_bytes.get() + added > budget
            || recipe.pending.borrow().len() >= MAX_BATCH_ARGS;
        let flushed = if would_overflow { Self::flush(recipe, cwd) } else { None };
        recipe.pending.borrow_mut().push(path.to_string());
        recipe.pending_bytes.set(recipe.pending_bytes.get() + added);
        flushed
    }

    /// Run whatever is pending for `recipe`, if anything, and clear it.
    /// Called on every directory-depth change and once more at program
    /// end so no batch is left unexecuted.
    pub fn flush(recipe: &ExecRecipe, cwd: &Path) -> Option<i32> {
        let batch = {
            let mut pending = recipe.pending.borrow_mut();
            if pending.is_empty() {
                return None;
            }
            std::mem::take(&mut *pending)
        };
        recipe.pending_bytes.set(0);
        let status = Self::run_batch(recipe, cwd, &batch);
        recipe.last_run_failed.set(status != 0);
        Some(status)
    }

    /// Run a single `Semicolon`-terminated invocation (or confirm-and-run
    /// for `-ok`/`-okdir`), substituting every `{}` in the recipe's
    /// argument list with `path`.
    pub fn run_once(recipe: &ExecRecipe, cwd: &Path, path: &str) -> Option<i32> {
        let argv: Vec<String> =
            recipe.initial_argv.iter().map(|a| a.replace("{}", path)).collect();
        if recipe.confirm && !Self::confirm(&argv) {
            return None;
        }
        let status = Self::spawn(cwd, &argv, recipe.confirm);
        recipe.last_run_failed.set(status != 0);
        Some(status)
    }

    fn run_batch(recipe: &ExecRecipe, cwd: &Path, paths: &[String]) -> i32 {
        let mut argv = recipe.initial_argv.clone();
        match recipe.brace_positions.first() {
            Some(&brace_idx) if brace_idx < argv.len() => {
                argv.splice(brace_idx..=brace_idx, paths.iter().cloned());
            }
            _ => argv.extend(paths.iter().cloned()),
        }
        Self::spawn(cwd, &argv, false)
    }

    fn confirm(argv: &[String]) -> bool {
        eprint!("{} ? ", argv.join(" "));
        let _ = io::stderr().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().chars().next(), Some('y') | Some('Y'))
    }

    fn spawn(cwd: &Path, argv: &[String], confirm: bool) -> i32 {
        if argv.is_empty() {
            return 0;
        }
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        if cwd.as_os_str().len() > 0 {
            cmd.current_dir(cwd);
        }
        if confirm {
            // -ok*'s confirmation prompt already consumed a line of
            // stdin; the child must not see the rest.
            cmd.stdin(Stdio::null());
        }
        match cmd.status() {
            Ok(status) => status.code().unwrap_or(1),
            Err(err) => {
                eprintln!("find: `{}': {}", argv[0], err);
                1
            }
        }
    }
}
