//! Best-effort file system type lookup, modeled on GNU find's
//! `fstype.c`: read the kernel's mount table once, build a `dev -> fstype`
//! map keyed by `stat`'d mount points, and fall back to `"unknown"` for
//! anything not found (a remounted or just-mounted file system, a
//! namespace the process can't see, etc).

use std::collections::HashMap;
use std::fs;

use crate::os::unix::stat;

/// A cached mapping from device number to file system type name, good for
/// the lifetime of one walk. Re-reading `/proc/mounts` per entry would be
/// far too slow for `-fstype`.
#[derive(Debug)]
pub struct FsTypeTable {
    by_dev: HashMap<u64, String>,
}

impl FsTypeTable {
    /// Build the table by reading `/proc/mounts` (falling back to
    /// `/etc/mtab` when that's unavailable) and `stat`ing every mount
    /// point listed there.
    pub fn load() -> FsTypeTable {
        let mut by_dev = HashMap::new();
        let text = fs::read_to_string("/proc/mounts")
            .or_else(|_| fs::read_to_string("/etc/mtab"))
            .unwrap_or_default();
        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let _device = match fields.next() {
                Some(d) => d,
                None => continue,
            };
            let mount_point = match fields.next() {
                Some(m) => m,
                None => continue,
            };
            let fstype = match fields.next() {
                Some(t) => t,
                None => continue,
            };
            if let Ok(meta) = stat::stat(mount_point) {
                by_dev.entry(meta.dev()).or_insert_with(|| fstype.to_string());
            }
        }
        FsTypeTable { by_dev }
    }

    /// Look up the file system type for the device a given `stat` result
    /// belongs to. Returns `"unknown"` when the device isn't present in
    /// the mount table (e.g. it was mounted after the table was built).
    pub fn lookup(&self, dev: u64) -> &str {
        self.by_dev.get(&dev).map(|s| s.as_str()).unwrap_or("unknown")
    }

    /// True when `name` appears anywhere in the mount table, regardless of
    /// which device it's attached to. Used by the optimiser to fold a
    /// `-fstype` test that names a file system not present on this host
    /// down to `False`.
    pub fn contains(&self, name: &str) -> bool {
        self.by_dev.values().any(|v| v == name)
    }
}

impl Default for FsTypeTable {
    fn default() -> FsTypeTable {
        FsTypeTable::load()
    }
}
