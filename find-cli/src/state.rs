use std::path::PathBuf;

/// Mutable, single-threaded state threaded through evaluation of one
/// traversal. Everything here changes visit-to-visit; it's kept separate
/// from `Config`, which never changes once parsing is done.
pub struct TraversalState {
    /// Sticky: once set non-zero, stays non-zero for the rest of the run.
    pub exit_status: i32,
    pub curdepth: usize,
    pub rel_pathname: PathBuf,
    /// Set by `-prune`; consulted by the caller driving the walk to skip
    /// descending into the directory just evaluated.
    pub stop_at_current_level: bool,
    /// Set by `-quit`; consulted after every visit to stop the whole walk.
    pub quit: bool,
    /// Number of `-execdir`/`-okdir` batches not yet flushed.
    pub execdirs_outstanding: usize,
}

impl TraversalState {
    pub fn new() -> TraversalState {
        TraversalState {
            exit_status: 0,
            curdepth: 0,
            rel_pathname: PathBuf::new(),
            stop_at_current_level: false,
            quit: false,
            execdirs_outstanding: 0,
        }
    }

    pub fn record_nonfatal(&mut self) {
        if self.exit_status == 0 {
            self.exit_status = 1;
        }
    }

    pub fn record_fatal(&mut self, code: i32) {
        self.exit_status = code;
    }
}

impl Default for TraversalState {
    fn default() -> TraversalState {
        TraversalState::new()
    }
}
