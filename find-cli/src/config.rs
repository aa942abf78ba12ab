use std::time::SystemTime;

use findwalk::SymlinkPolicy;

use crate::regexflavor::RegexFlavor;

/// `-D` debug flags. Only a subset actually changes behavior here (most
/// just gate extra `eprintln!` diagnostics); the rest are accepted for
/// command-line compatibility and otherwise ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct DebugFlags {
    pub exec: bool,
    pub opt: bool,
    pub rates: bool,
    pub search: bool,
    pub stat: bool,
    pub time: bool,
    pub tree: bool,
}

impl DebugFlags {
    pub fn parse(spec: &str) -> Result<DebugFlags, String> {
        let mut flags = DebugFlags::default();
        for word in spec.split(',') {
            match word {
                "exec" => flags.exec = true,
                "opt" => flags.opt = true,
                "rates" => flags.rates = true,
                "search" => flags.search = true,
                "stat" => flags.stat = true,
                "time" => flags.time = true,
                "tree" => flags.tree = true,
                "all" | "help" => {}
                other => return Err(format!("unknown debug option `{}'", other)),
            }
        }
        Ok(flags)
    }
}

/// Everything built from command line flags before evaluation starts.
/// Immutable for the life of the run, same as `findwalk`'s internal
/// config that it's partially derived from.
#[derive(Clone)]
pub struct Config {
    pub symlink_policy: SymlinkPolicy,
    pub min_depth: usize,
    pub max_depth: usize,
    pub stay_on_fs: bool,
    pub ignore_readdir_race: bool,
    pub files0_from: Option<String>,
    pub regex_flavor: RegexFlavor,
    pub opt_level: u8,
    pub warnings: bool,
    pub posixly_correct: bool,
    /// The instant captured once at startup; every `-*time`/`-*min`
    /// predicate in a single run compares against this same value, never
    /// against a freshly sampled clock.
    pub now: SystemTime,
    /// Midnight of the day containing `now`; the reference `-daystart`
    /// switches subsequent time primaries to use instead of `now`.
    pub cur_day_start: SystemTime,
    pub no_leaf_check: bool,
    /// True once `-d`/`-depth` was given explicitly; `-delete` is allowed
    /// to imply post-order traversal only when this was already the
    /// user's choice or gets turned on as a side effect of `-delete`
    /// itself (tracked separately by the parser).
    pub explicit_depth: bool,
    pub depth_first: bool,
    pub debug: DebugFlags,
}

impl Config {
    pub fn new(now: SystemTime) -> Config {
        Config {
            symlink_policy: SymlinkPolicy::Physical,
            min_depth: 0,
            max_depth: usize::MAX,
            stay_on_fs: false,
            ignore_readdir_race: false,
            files0_from: None,
            regex_flavor: RegexFlavor::default(),
            opt_level: 1,
            warnings: true,
            posixly_correct: std::env::var_os("POSIXLY_CORRECT").is_some(),
            now,
            cur_day_start: day_start(now),
            no_leaf_check: false,
            explicit_depth: false,
            depth_first: false,
            debug: DebugFlags::default(),
        }
    }
}

/// Round `now` back to midnight, local-ish: since this crate doesn't carry
/// a timezone/calendar dependency, "midnight" is approximated as the start
/// of the current day in UTC-since-epoch terms, matching the precision the
/// rest of the engine's `SystemTime` arithmetic already works in.
fn day_start(now: SystemTime) -> SystemTime {
    use std::time::{Duration, UNIX_EPOCH};
    let secs = now.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    UNIX_EPOCH + Duration::from_secs(secs - secs % 86400)
}
