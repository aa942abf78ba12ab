//! Scratch-directory helpers shared by the unit tests in this crate.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A directory created fresh in the OS temp directory, removed on drop.
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new empty scratch directory under `std::env::temp_dir()`,
    /// namespaced by the running process id and a monotonic counter so
    /// that concurrent test threads never collide.
    pub fn tmp() -> Dir {
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = env::temp_dir()
            .join("findwalk-tests")
            .join(format!("{}-{}", std::process::id(), count));
        fs::create_dir_all(&path).unwrap();
        Dir { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Join a relative path onto this directory.
    pub fn join<P: AsRef<Path>>(&self, p: P) -> PathBuf {
        self.path.join(p)
    }

    /// Create every directory in `dirs`, relative to this scratch
    /// directory, including all intermediate components.
    pub fn mkdirp<P: AsRef<Path>>(&self, dirs: &[P]) {
        for d in dirs {
            fs::create_dir_all(self.join(d)).unwrap();
        }
    }

    /// Create every file in `files`, relative to this scratch directory,
    /// each containing its own path as its contents (useful for sanity
    /// checks without needing to track contents separately).
    pub fn touch_all<P: AsRef<Path>>(&self, files: &[P]) {
        for f in files {
            let full = self.join(f);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&full, full.to_string_lossy().as_bytes()).unwrap();
        }
    }

    /// Create a symlink at `link` pointing at `target`, both relative to
    /// this scratch directory.
    #[cfg(unix)]
    pub fn symlink<P: AsRef<Path>, Q: AsRef<Path>>(&self, target: P, link: Q) {
        std::os::unix::fs::symlink(self.join(target), self.join(link)).unwrap();
    }
}

impl Drop for Dir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Skip the annotated test body (by returning early) when this platform
/// can't create symlinks — e.g. an unprivileged account on some CI images.
#[macro_export]
macro_rules! skip_if_no_symlinks {
    ($dir:expr) => {{
        let probe_target = $dir.join("__symlink_probe_target");
        let probe_link = $dir.join("__symlink_probe_link");
        std::fs::write(&probe_target, b"x").unwrap();
        if std::os::unix::fs::symlink(&probe_target, &probe_link).is_err() {
            return;
        }
        let _ = std::fs::remove_file(&probe_link);
        let _ = std::fs::remove_file(&probe_target);
    }};
}
