//! Walk policy: the caller-tunable knobs for one traversal.

use std::fmt;

use chrono::{DateTime, Local};

/// Callback receiving non-fatal traversal warnings as human-readable
/// messages tagged with the offending path.
pub type ErrorSink = Box<dyn FnMut(&str) + Send>;

/// Plain configuration record handed to the walker. Defaults: do not
/// follow symlinks, descend into archives, keep going on errors, separate
/// member paths with `//`, capture the wall clock now.
pub struct WalkPolicy {
    /// Traverse symlinked directories (with cycle detection)
    pub follow_symlinks: bool,
    /// Skip the archive probe entirely
    pub no_archive: bool,
    /// Only test archive containers themselves; never their members
    pub archives_only: bool,
    /// Terminate the walk after the first traversal error
    pub stop_on_error: bool,
    /// Bound on directory recursion depth; root entries are depth 0
    pub max_depth: Option<usize>,
    /// Inserted between container path and member path in `path`
    pub archive_separator: String,
    /// Receives each non-fatal error; warnings are also logged
    pub error_sink: Option<ErrorSink>,
    /// Capture instant for `today` and the weekday anchors
    pub now: DateTime<Local>,
}

impl Default for WalkPolicy {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            no_archive: false,
            archives_only: false,
            stop_on_error: false,
            max_depth: None,
            archive_separator: "//".to_string(),
            error_sink: None,
            now: Local::now(),
        }
    }
}

impl fmt::Debug for WalkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalkPolicy")
            .field("follow_symlinks", &self.follow_symlinks)
            .field("no_archive", &self.no_archive)
            .field("archives_only", &self.archives_only)
            .field("stop_on_error", &self.stop_on_error)
            .field("max_depth", &self.max_depth)
            .field("archive_separator", &self.archive_separator)
            .field("error_sink", &self.error_sink.is_some())
            .field("now", &self.now)
            .finish()
    }
}
