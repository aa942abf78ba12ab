//! Parsing helpers for the small typed-argument languages `find`'s
//! primaries use: `+N`/`-N`/`N` numeric comparisons, size suffixes, type
//! letters, and relative time expressions.

use std::time::{Duration, SystemTime};

/// The three-way comparison a numeric argument can request: GNU find's
/// `+N` (strictly greater), `-N` (strictly less), and bare `N` (equal).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Greater,
    Less,
    Equal,
}

impl Cmp {
    pub fn matches(self, actual: i64, reference: i64) -> bool {
        match self {
            Cmp::Greater => actual > reference,
            Cmp::Less => actual < reference,
            Cmp::Equal => actual == reference,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NumericArg {
    pub cmp: Cmp,
    pub value: i64,
}

/// Parse a `+N`/`-N`/`N` style numeric argument, as used by `-links`,
/// `-inum`, `-uid`, `-gid`, and the `-Xmin`/`-Xtime` family.
pub fn parse_numeric(arg: &str) -> Result<NumericArg, String> {
    let (cmp, rest) = match arg.as_bytes().first() {
        Some(b'+') => (Cmp::Greater, &arg[1..]),
        Some(b'-') => (Cmp::Less, &arg[1..]),
        _ => (Cmp::Equal, arg),
    };
    let value: i64 =
        rest.parse().map_err(|_| format!("invalid numeric argument `{}'", arg))?;
    Ok(NumericArg { cmp, value })
}

/// Parse a `-size` argument: an optional `+`/`-` prefix, a decimal number,
/// and an optional unit suffix (`b` 512-byte blocks (default), `c` bytes,
/// `w` 2-byte words, `k` KiB, `M` MiB, `G` GiB). Returns the comparison and
/// the reference value already converted to bytes.
pub fn parse_size(arg: &str) -> Result<(Cmp, u64), String> {
    let (cmp, rest) = match arg.as_bytes().first() {
        Some(b'+') => (Cmp::Greater, &arg[1..]),
        Some(b'-') => (Cmp::Less, &arg[1..]),
        _ => (Cmp::Equal, arg),
    };
    let (digits, mult) = match rest.as_bytes().last() {
        Some(b'c') => (&rest[..rest.len() - 1], 1u64),
        Some(b'w') => (&rest[..rest.len() - 1], 2u64),
        Some(b'k') => (&rest[..rest.len() - 1], 1024u64),
        Some(b'M') => (&rest[..rest.len() - 1], 1024 * 1024u64),
        Some(b'G') => (&rest[..rest.len() - 1], 1024 * 1024 * 1024u64),
        Some(b'b') => (&rest[..rest.len() - 1], 512u64),
        _ => (rest, 512u64),
    };
    let n: u64 = digits.parse().map_err(|_| format!("invalid size `{}'", arg))?;
    Ok((cmp, n.saturating_mul(mult)))
}

/// The seven file type letters `find -type` accepts, plus directory `D`
/// for Solaris-style doors (accepted, always false on this platform).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeLetter {
    BlockDevice,
    CharDevice,
    Directory,
    RegularFile,
    Symlink,
    Fifo,
    Socket,
    Door,
}

pub fn parse_type_letters(arg: &str) -> Result<Vec<TypeLetter>, String> {
    arg.split(',')
        .map(|s| {
            let s = s.trim();
            match s {
                "b" => Ok(TypeLetter::BlockDevice),
                "c" => Ok(TypeLetter::CharDevice),
                "d" => Ok(TypeLetter::Directory),
                "f" => Ok(TypeLetter::RegularFile),
                "l" => Ok(TypeLetter::Symlink),
                "p" => Ok(TypeLetter::Fifo),
                "s" => Ok(TypeLetter::Socket),
                "D" => Ok(TypeLetter::Door),
                _ => Err(format!("unknown file type `{}'", s)),
            }
        })
        .collect()
}

/// Parse a relative time expression such as `-mtime -7`, `-mmin +30`, or
/// `-atime 0`, given a reference instant (`cur_day_start` for `-daystart`
/// semantics, otherwise "now"). `unit_seconds` is 86400 for day-granularity
/// primaries and 60 for minute-granularity ones.
pub fn parse_time_offset(
    arg: &str,
    reference: SystemTime,
    unit_seconds: u64,
) -> Result<(Cmp, SystemTime), String> {
    let numeric = parse_numeric(arg)?;
    if numeric.value < 0 {
        return Err(format!("invalid time value `{}'", arg));
    }
    let offset = Duration::from_secs(numeric.value as u64 * unit_seconds);
    let threshold = reference
        .checked_sub(offset)
        .ok_or_else(|| "arithmetic overflow computing reference time".to_string())?;
    Ok((numeric.cmp, threshold))
}

/// Parse the literal-timestamp form `-newerXt` needs for its `Y` argument.
/// This is the §6 `parse_datetime(str, reference) -> Timestamp | Error`
/// collaborator, scoped down to what the traversal core itself requires:
/// `@N` (an epoch offset, seconds since `1970-01-01 UTC`, as GNU find's own
/// `@`-prefixed form accepts) and the two keywords `now`/`today`. A full
/// natural-language calendar parser is out of scope for this core; see
/// `SPEC_FULL.md`'s ambient-stack note on why this stays self-contained
/// rather than pulling in a date crate.
pub fn parse_datetime(arg: &str, reference: SystemTime) -> Result<SystemTime, String> {
    if let Some(epoch) = arg.strip_prefix('@') {
        let secs: i64 =
            epoch.parse().map_err(|_| format!("invalid date/time `{}'", arg))?;
        return if secs >= 0 {
            reference_epoch_add(secs as u64)
        } else {
            SystemTime::UNIX_EPOCH
                .checked_sub(Duration::from_secs((-secs) as u64))
                .ok_or_else(|| "arithmetic overflow computing reference time".to_string())
        };
    }
    match arg {
        "now" => Ok(reference),
        "today" => Ok(reference),
        _ => Err(format!(
            "invalid date/time `{}': only `@N' epoch seconds, `now', and \
             `today' are understood",
            arg
        )),
    }
}

fn reference_epoch_add(secs: u64) -> Result<SystemTime, String> {
    SystemTime::UNIX_EPOCH
        .checked_add(Duration::from_secs(secs))
        .ok_or_else(|| "arithmetic overflow computing reference time".to_string())
}
