//! arcfind - Archive-Aware File Finder
//!
//! A file-finding engine that tests an SQL-WHERE-style predicate against
//! filesystem trees, transparently descending into archive containers
//! (tar family, zip, optionally 7z and rar) so that files inside archives
//! are first-class candidates alongside files on disk.
//!
//! # Features
//!
//! - **SQL-WHERE dialect**: comparisons, `LIKE`/`ILIKE`/`RLIKE`, `IN`,
//!   `BETWEEN`, `IS NULL`, three-valued logic, size suffixes (`10M`), and
//!   date/time prefix comparisons against the candidate's mtime.
//!
//! - **Metadata rows**: each candidate exposes `name`, `path`, `size`,
//!   `date`, `time`, `ext`, `ext2`, `type`, `archive`, `container`,
//!   `today`, and the weekday anchors `mo`..`su`. Predicates touch
//!   metadata only; content is never read.
//!
//! - **Archive descent**: containers are detected by suffix (including
//!   `tar.gz`-style compound extensions) and their members enumerated
//!   without extraction. Members appear as `container//member` paths.
//!
//! - **Pull-based walker**: a lazy iterator with deterministic order,
//!   symlink-cycle protection, and non-fatal error routing to a
//!   caller-supplied sink.
//!
//! # Example
//!
//! ```no_run
//! use arcfind::{compile, WalkPolicy, Walker};
//!
//! let filter = compile("ext = 'log' AND size > 1M")?;
//! let walker = Walker::new(vec!["/var/log"], filter, WalkPolicy::default());
//! for matched in walker {
//!     let matched = matched?;
//!     println!("{} ({} bytes)", matched.path, matched.size);
//! }
//! # Ok::<(), arcfind::Error>(())
//! ```

pub mod error;
pub mod filter;
pub mod find;

pub use error::{Error, EvalError, ParseError, Result, WalkError};
pub use filter::{compile, format_size, parse_size, FilterExpression, Row, Value};
pub use find::{
    find, ArchiveKind, EntryKind, FileRecord, MatchRecord, WalkPolicy, Walker,
};
