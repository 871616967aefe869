//! Candidate rows: the attribute bags the filter evaluates.
//!
//! A [`FileRecord`] describes one filesystem entry or one archive member.
//! Bound to the walk's [`DayAnchors`] through a [`RowView`], it exposes
//! the attribute set of the dialect: `name`, `path`, `size`, `date`,
//! `time`, `ext`, `ext2`, `type`, `archive`, `container`, `today` and the
//! weekday anchors `mo..su`.

use std::fmt;

use chrono::{DateTime, Datelike, Days, Local, NaiveDateTime};

use crate::filter::eval::Row;
use crate::filter::value::Value;
use crate::find::archive::{ArchiveKind, Member};

/// Filesystem entry classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Link,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Dir => "dir",
            EntryKind::Link => "link",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compound suffixes recognized for `ext2`
const COMPOUND_EXTS: [&str; 3] = ["tar.gz", "tar.bz2", "tar.xz"];

/// One filesystem entry or archive member under test
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Final path component
    pub name: String,
    /// Full external path; for members, `container` + separator + member path
    pub path: String,
    /// Uncompressed bytes; 0 for directories
    pub size: u64,
    /// Modification instant in local time; `None` when the container did
    /// not record one
    pub mtime: Option<NaiveDateTime>,
    pub kind: EntryKind,
    /// Container kind when this row is an archive member
    pub archive: Option<ArchiveKind>,
    /// Container path when this row is an archive member
    pub container: Option<String>,
}

impl FileRecord {
    /// Row for a directory entry. Directories always report size 0.
    pub fn fs(
        name: impl Into<String>,
        path: impl Into<String>,
        size: u64,
        mtime: Option<NaiveDateTime>,
        kind: EntryKind,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size: if kind == EntryKind::Dir { 0 } else { size },
            mtime,
            kind,
            archive: None,
            container: None,
        }
    }

    /// Row for an archive member. Members are always files; directory
    /// members never reach this point.
    pub fn member(container: &str, kind: ArchiveKind, separator: &str, member: &Member) -> Self {
        let name = member
            .path
            .rsplit('/')
            .find(|part| !part.is_empty())
            .unwrap_or(member.path.as_str())
            .to_string();
        Self {
            name,
            path: format!("{container}{separator}{}", member.path),
            size: member.size,
            mtime: member.mtime,
            kind: EntryKind::File,
            archive: Some(kind),
            container: Some(container.to_string()),
        }
    }

    fn mtime_or_epoch(&self) -> NaiveDateTime {
        self.mtime.unwrap_or(NaiveDateTime::UNIX_EPOCH)
    }

    /// `YYYY-MM-DD` of the modification time
    pub fn date(&self) -> String {
        self.mtime_or_epoch().format("%Y-%m-%d").to_string()
    }

    /// `HH:MM:SS` of the modification time
    pub fn time(&self) -> String {
        self.mtime_or_epoch().format("%H:%M:%S").to_string()
    }

    /// Last suffix after `.`, lowercased; empty when there is none. A
    /// leading dot alone does not count (`.bashrc` has no extension).
    pub fn ext(&self) -> String {
        let lower = self.name.to_lowercase();
        match lower.rfind('.') {
            Some(idx) if idx > 0 => lower[idx + 1..].to_string(),
            _ => String::new(),
        }
    }

    /// Compound suffix for the recognized set (`tar.gz`, `tar.bz2`,
    /// `tar.xz`); otherwise equal to [`ext`](Self::ext).
    pub fn ext2(&self) -> String {
        let lower = self.name.to_lowercase();
        for compound in COMPOUND_EXTS {
            if lower.len() > compound.len() + 1 && lower.ends_with(compound) {
                let dot = lower.len() - compound.len() - 1;
                if lower.as_bytes()[dot] == b'.' {
                    return compound.to_string();
                }
            }
        }
        self.ext()
    }
}

/// Weekday identifier names, Monday first
const WEEKDAY_IDENTS: [&str; 7] = ["mo", "tu", "we", "th", "fr", "sa", "su"];

/// Date anchors captured once per walk: `today` and the most recent
/// occurrence (today included) of each weekday. Stable for the lifetime of
/// one walker invocation.
#[derive(Debug, Clone)]
pub struct DayAnchors {
    today: String,
    weekdays: [String; 7],
}

impl DayAnchors {
    pub fn new(now: DateTime<Local>) -> Self {
        let date = now.date_naive();
        let current = date.weekday().num_days_from_monday() as u64;
        let weekdays = std::array::from_fn(|target| {
            let back = (current + 7 - target as u64) % 7;
            let anchor = date.checked_sub_days(Days::new(back)).unwrap_or(date);
            anchor.format("%Y-%m-%d").to_string()
        });
        Self {
            today: date.format("%Y-%m-%d").to_string(),
            weekdays,
        }
    }

    pub fn today(&self) -> &str {
        &self.today
    }

    /// Anchor date for a weekday identifier (`mo`..`su`), if it is one.
    pub fn weekday(&self, ident: &str) -> Option<&str> {
        WEEKDAY_IDENTS
            .iter()
            .position(|w| *w == ident)
            .map(|idx| self.weekdays[idx].as_str())
    }
}

/// A record bound to the walk's day anchors, ready for evaluation
pub struct RowView<'a> {
    pub record: &'a FileRecord,
    pub anchors: &'a DayAnchors,
}

impl Row for RowView<'_> {
    fn value(&self, name: &str) -> Option<Value> {
        let r = self.record;
        Some(match name {
            "name" => Value::Text(r.name.clone()),
            "path" => Value::Text(r.path.clone()),
            "size" => Value::Int(r.size as i64),
            "date" => Value::Text(r.date()),
            "time" => Value::Text(r.time()),
            "ext" => Value::Text(r.ext()),
            "ext2" => Value::Text(r.ext2()),
            "type" => Value::Text(r.kind.as_str().to_string()),
            "archive" => Value::Text(r.archive.map(|a| a.as_str()).unwrap_or("").to_string()),
            "container" => Value::Text(r.container.clone().unwrap_or_default()),
            "today" => Value::Text(self.anchors.today().to_string()),
            other => return self.anchors.weekday(other).map(Value::text),
        })
    }
}

/// Snapshot of a matching row, safe to keep beyond the walker step that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub name: String,
    pub path: String,
    pub container: String,
    pub size: u64,
    pub mtime_date: String,
    pub mtime_time: String,
    pub ext: String,
    pub ext2: String,
    pub entry_type: EntryKind,
    pub archive: String,
}

impl MatchRecord {
    /// Canonical field order for serialized output
    pub const FIELDS: [&'static str; 10] = [
        "name",
        "path",
        "container",
        "size",
        "mtime_date",
        "mtime_time",
        "ext",
        "ext2",
        "type",
        "archive",
    ];

    pub(crate) fn from_record(r: &FileRecord) -> Self {
        Self {
            name: r.name.clone(),
            path: r.path.clone(),
            container: r.container.clone().unwrap_or_default(),
            size: r.size,
            mtime_date: r.date(),
            mtime_time: r.time(),
            ext: r.ext(),
            ext2: r.ext2(),
            entry_type: r.kind,
            archive: r.archive.map(|a| a.as_str()).unwrap_or("").to_string(),
        }
    }
}
