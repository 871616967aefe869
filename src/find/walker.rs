//! Depth-first walker yielding filter matches as a pull-based iterator.
//!
//! Each call to `next()` advances the deepest active directory frame;
//! dropping the iterator is cancellation. Within a directory, entries are
//! visited in byte-lexicographic name order and every entry (including the
//! directory's own subdirectories) receives a row before any descent
//! happens; archive members are tested right after their container.
//! Traversal errors go to the policy error sink and the walk continues
//! unless `stop_on_error` is set; query errors (type mismatches, malformed
//! date literals) terminate the stream as a final `Err` item.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use tracing::{debug, warn};

use crate::error::{Error, WalkError};
use crate::filter::FilterExpression;
use crate::find::archive::{self, ArchiveKind, Capabilities};
use crate::find::entry::{DayAnchors, EntryKind, FileRecord, MatchRecord, RowView};
use crate::find::policy::WalkPolicy;

/// Identity of a visited directory for symlink-cycle detection
#[cfg(unix)]
type DirId = (u64, u64);
#[cfg(not(unix))]
type DirId = PathBuf;

struct Frame {
    entries: std::vec::IntoIter<(PathBuf, FileRecord)>,
    subdirs: std::vec::IntoIter<PathBuf>,
    depth: usize,
}

enum Step {
    Entry(PathBuf, FileRecord),
    Descend(PathBuf, usize),
    Pop,
    Root(PathBuf),
    Finished,
}

/// Lazy traversal of a set of roots against a compiled filter.
///
/// Yields `Ok(MatchRecord)` per match in deterministic order, and at most
/// one terminal `Err` when a query error occurs or `stop_on_error`
/// promotes a traversal error.
pub struct Walker {
    filter: FilterExpression,
    policy: WalkPolicy,
    anchors: DayAnchors,
    caps: Capabilities,
    roots: VecDeque<PathBuf>,
    frames: Vec<Frame>,
    queue: VecDeque<MatchRecord>,
    visited: HashSet<DirId>,
    warned_sevenz: bool,
    warned_rar: bool,
    fatal: Option<Error>,
    done: bool,
}

impl Walker {
    /// Build a walker over `roots`. Construction is cheap; all traversal
    /// happens during iteration.
    pub fn new<I, P>(roots: I, filter: FilterExpression, policy: WalkPolicy) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let anchors = DayAnchors::new(policy.now);
        Self {
            filter,
            policy,
            anchors,
            caps: Capabilities::default(),
            roots: roots.into_iter().map(Into::into).collect(),
            frames: Vec::new(),
            queue: VecDeque::new(),
            visited: HashSet::new(),
            warned_sevenz: false,
            warned_rar: false,
            fatal: None,
            done: false,
        }
    }

    /// Forward a non-fatal error to the sink (and the log).
    fn report(&mut self, err: &WalkError) {
        warn!("{err}");
        if let Some(sink) = self.policy.error_sink.as_mut() {
            sink(&err.to_string());
        }
    }

    /// Report a traversal error, promoting it to fatal under
    /// `stop_on_error`.
    fn trip(&mut self, err: WalkError) {
        self.report(&err);
        if self.policy.stop_on_error {
            self.fatal = Some(err.into());
        }
    }

    fn start_root(&mut self, root: PathBuf) {
        // roots are always resolved, even when symlinks are not followed
        match fs::metadata(&root) {
            Err(e) => self.trip(WalkError::Stat {
                path: root,
                reason: e.to_string(),
            }),
            Ok(meta) if meta.is_dir() => self.open_dir(root, 0),
            Ok(meta) => {
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| root.to_string_lossy().into_owned());
                let record = FileRecord::fs(
                    name,
                    root.to_string_lossy().into_owned(),
                    meta.len(),
                    mtime_of(&meta),
                    EntryKind::File,
                );
                self.process_entry(&root, &record);
            }
        }
    }

    fn open_dir(&mut self, dir: PathBuf, depth: usize) {
        if let Some(max) = self.policy.max_depth {
            if depth > max {
                return;
            }
        }
        if self.policy.follow_symlinks {
            match dir_id(&dir) {
                Ok(id) => {
                    if !self.visited.insert(id) {
                        debug!("already visited, skipping: {}", dir.display());
                        return;
                    }
                }
                Err(e) => {
                    self.trip(WalkError::Stat {
                        path: dir,
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }

        debug!("reading directory: {}", dir.display());
        let read = match fs::read_dir(&dir) {
            Ok(read) => read,
            Err(e) => {
                self.trip(WalkError::ReadDir {
                    path: dir,
                    reason: e.to_string(),
                });
                return;
            }
        };

        let mut items = Vec::new();
        for entry in read {
            match entry {
                Ok(entry) => items.push(entry),
                Err(e) => {
                    self.trip(WalkError::ReadDir {
                        path: dir.clone(),
                        reason: e.to_string(),
                    });
                    if self.fatal.is_some() {
                        return;
                    }
                }
            }
        }
        // byte-lexicographic sibling order keeps runs reproducible
        items.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut rows = Vec::with_capacity(items.len());
        let mut subdirs = Vec::new();
        for item in items {
            let path = item.path();
            let classified = match classify(&item, self.policy.follow_symlinks) {
                Ok(Some(pair)) => pair,
                Ok(None) => continue, // sockets, fifos, devices
                Err(e) => {
                    self.trip(WalkError::Stat {
                        path,
                        reason: e.to_string(),
                    });
                    if self.fatal.is_some() {
                        return;
                    }
                    continue;
                }
            };
            let (kind, meta) = classified;
            let record = FileRecord::fs(
                item.file_name().to_string_lossy().into_owned(),
                path.to_string_lossy().into_owned(),
                meta.len(),
                mtime_of(&meta),
                kind,
            );
            if kind == EntryKind::Dir {
                subdirs.push(path.clone());
            }
            rows.push((path, record));
        }

        self.frames.push(Frame {
            entries: rows.into_iter(),
            subdirs: subdirs.into_iter(),
            depth,
        });
    }

    fn process_entry(&mut self, path: &Path, record: &FileRecord) {
        let format = archive::detect(&record.name);

        if self.policy.archives_only {
            if record.kind == EntryKind::File && format.is_some() {
                self.test_and_queue(record);
            }
            return;
        }

        self.test_and_queue(record);
        if self.fatal.is_some() {
            return;
        }

        if record.kind == EntryKind::File && !self.policy.no_archive {
            if let Some(format) = format {
                self.descend_archive(path, format, record);
            }
        }
    }

    fn test_and_queue(&mut self, record: &FileRecord) {
        let row = RowView {
            record,
            anchors: &self.anchors,
        };
        match self.filter.matches(&row) {
            Ok(true) => self.queue.push_back(MatchRecord::from_record(record)),
            Ok(false) => {}
            Err(e) => self.fatal = Some(e.into()),
        }
    }

    fn descend_archive(
        &mut self,
        path: &Path,
        format: archive::ArchiveFormat,
        container: &FileRecord,
    ) {
        let kind = format.kind();
        if !self.caps.supports(kind) {
            let already = match kind {
                ArchiveKind::SevenZ => std::mem::replace(&mut self.warned_sevenz, true),
                ArchiveKind::Rar => std::mem::replace(&mut self.warned_rar, true),
                _ => true,
            };
            if !already {
                let feature = if kind == ArchiveKind::SevenZ { "sevenz" } else { "rar" };
                self.report(&WalkError::MissingBackend {
                    kind: kind.as_str(),
                    feature,
                    path: path.to_path_buf(),
                });
            }
            return;
        }

        let members = match archive::scan(path, format) {
            Ok(members) => members,
            Err(e) => {
                self.trip(e);
                return;
            }
        };
        for member in &members {
            let record = FileRecord::member(
                &container.path,
                kind,
                &self.policy.archive_separator,
                member,
            );
            self.test_and_queue(&record);
            if self.fatal.is_some() {
                return;
            }
        }
    }
}

impl Iterator for Walker {
    type Item = Result<MatchRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.queue.pop_front() {
                return Some(Ok(record));
            }
            if let Some(err) = self.fatal.take() {
                self.done = true;
                self.frames.clear();
                return Some(Err(err));
            }
            if self.done {
                return None;
            }

            let step = if let Some(frame) = self.frames.last_mut() {
                if let Some((path, record)) = frame.entries.next() {
                    Step::Entry(path, record)
                } else if let Some(dir) = frame.subdirs.next() {
                    Step::Descend(dir, frame.depth + 1)
                } else {
                    Step::Pop
                }
            } else if let Some(root) = self.roots.pop_front() {
                Step::Root(root)
            } else {
                Step::Finished
            };

            match step {
                Step::Entry(path, record) => self.process_entry(&path, &record),
                Step::Descend(dir, depth) => self.open_dir(dir, depth),
                Step::Pop => {
                    self.frames.pop();
                }
                Step::Root(root) => self.start_root(root),
                Step::Finished => self.done = true,
            }
        }
    }
}

fn mtime_of(meta: &fs::Metadata) -> Option<NaiveDateTime> {
    meta.modified()
        .ok()
        .map(|t| DateTime::<Local>::from(t).naive_local())
}

/// Entry classification per symlink policy. `None` drops entries that are
/// neither regular files, directories, nor symlinks.
fn classify(
    entry: &fs::DirEntry,
    follow_symlinks: bool,
) -> std::io::Result<Option<(EntryKind, fs::Metadata)>> {
    let file_type = entry.file_type()?;
    if file_type.is_symlink() {
        if follow_symlinks {
            // resolve the target; broken links surface as stat errors
            let meta = fs::metadata(entry.path())?;
            let kind = if meta.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            return Ok(Some((kind, meta)));
        }
        return Ok(Some((EntryKind::Link, entry.metadata()?)));
    }
    if file_type.is_dir() {
        return Ok(Some((EntryKind::Dir, entry.metadata()?)));
    }
    if file_type.is_file() {
        return Ok(Some((EntryKind::File, entry.metadata()?)));
    }
    Ok(None)
}

#[cfg(unix)]
fn dir_id(path: &Path) -> std::io::Result<DirId> {
    use std::os::unix::fs::MetadataExt;
    let meta = fs::metadata(path)?;
    Ok((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn dir_id(path: &Path) -> std::io::Result<DirId> {
    fs::canonicalize(path)
}
