//! The error categories §7 requires to be distinguishable by the caller:
//! parse and startup errors are fatal (exit `>1`); target-file, cycle, and
//! action errors are recorded and the traversal continues (exit `1`).
//!
//! This stays a hand-rolled `Display`-only pair of enums, in the same
//! spirit as `findwalk::Error` (see `src/error.rs`), rather than reaching
//! for an error crate: the whole point of keeping Parse/Startup separate
//! from the rest is so `main` can pick an exit code, and a single opaque
//! boxed error can't carry that distinction without a downcast.

use std::fmt;

/// An error raised while tokenizing or building the predicate tree.
/// Always fatal; `main` exits `2` on one of these.
#[derive(Debug)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "find: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

impl From<String> for ParseError {
    fn from(s: String) -> ParseError {
        ParseError(s)
    }
}

impl<'a> From<&'a str> for ParseError {
    fn from(s: &'a str) -> ParseError {
        ParseError(s.to_string())
    }
}

/// A startup error: something that keeps the program from ever reaching
/// the traversal loop (bad `-files0-from`, insecure `PATH` with
/// `-execdir`/`-okdir`, a sink that can't be opened). Also fatal.
#[derive(Debug)]
pub struct FatalError(pub String);

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "find: {}", self.0)
    }
}

impl std::error::Error for FatalError {}

impl From<String> for FatalError {
    fn from(s: String) -> FatalError {
        FatalError(s)
    }
}

impl<'a> From<&'a str> for FatalError {
    fn from(s: &'a str) -> FatalError {
        FatalError(s.to_string())
    }
}
