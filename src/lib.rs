/*!
A directory-FD-relative, symlink-policy-aware recursive directory walker.

This crate is the traversal engine underneath the `find` binary in this
workspace: it does no predicate evaluation and has no notion of
command-line flags, but it does own all of the low-level Unix plumbing a
`find(1)`-style tool needs to traverse a tree safely — opening directories
once and reading their children through `openat`/`fstatat`/`fdopendir`
relative to that open descriptor, and tracking a `(device, inode)`
ancestor set to detect symlink cycles.

```no_run
use findwalk::{SymlinkPolicy, WalkDir};

for visit in WalkDir::new(".").symlink_policy(SymlinkPolicy::Physical) {
    println!("{}", visit.entry().path().display());
}
```
*/

#![allow(clippy::needless_return)]

mod config;
mod dent;
mod error;
pub mod fstype;
pub mod os;
mod visit;
mod walk;

pub use crate::config::SymlinkPolicy;
pub use crate::dent::DirEntry;
pub use crate::error::Error;
pub use crate::fstype::FsTypeTable;
pub use crate::visit::{FileVisit, Order};
pub use crate::walk::{IntoIter, WalkDir};

#[cfg(test)]
mod tests;
