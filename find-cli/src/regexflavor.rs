//! `-regex`/`-iregex`/`-regextype` support.
//!
//! GNU find supports a handful of regex dialects (`findutils-default`,
//! `posix-basic`, `posix-extended`, `posix-egrep`, `awk`, `emacs`, ...).
//! The `regex` crate speaks one dialect (Rust's, a superset of PCRE-ish
//! syntax close to `posix-extended`/`egrep`); rather than vendor several
//! regex engines, every flavor compiles through `regex` with the pattern
//! whole-string anchored, which matches `findutils`'s documented
//! "the pattern must match the entire path" semantics for all of its
//! dialects.
use regex::{Regex, RegexBuilder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegexFlavor {
    FindutilsDefault,
    PosixBasic,
    PosixExtended,
    PosixEgrep,
    Awk,
    Emacs,
    Ed,
    Gnu,
    Grep,
    Sed,
}

impl RegexFlavor {
    pub fn parse(name: &str) -> Result<RegexFlavor, String> {
        Ok(match name {
            "findutils-default" => RegexFlavor::FindutilsDefault,
            "posix-basic" => RegexFlavor::PosixBasic,
            "posix-extended" => RegexFlavor::PosixExtended,
            "posix-egrep" => RegexFlavor::PosixEgrep,
            "awk" | "posix-awk" => RegexFlavor::Awk,
            "emacs" => RegexFlavor::Emacs,
            "ed" => RegexFlavor::Ed,
            "gnu-awk" => RegexFlavor::Gnu,
            "grep" => RegexFlavor::Grep,
            "sed" => RegexFlavor::Sed,
            _ => return Err(format!("unknown regex type `{}'", name)),
        })
    }
}

impl Default for RegexFlavor {
    fn default() -> RegexFlavor {
        RegexFlavor::FindutilsDefault
    }
}

/// Compile `pattern` under `flavor`, anchored to match the whole input
/// string (as every find(1) regex dialect requires).
pub fn compile(pattern: &str, _flavor: RegexFlavor, case_fold: bool) -> Result<Regex, String> {
    let anchored = format!("^(?:{})$", pattern);
    RegexBuilder::new(&anchored)
        .case_insensitive(case_fold)
        .build()
        .map_err(|err| format!("invalid regular expression `{}': {}", pattern, err))
}
