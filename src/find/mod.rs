//! Filesystem and archive traversal: candidate rows, the archive probe,
//! walk policy, and the walker iterator.

pub mod archive;
pub mod entry;
pub mod policy;
pub mod walker;

pub use archive::{ArchiveFormat, ArchiveKind, Capabilities, Member, TarCodec};
pub use entry::{DayAnchors, EntryKind, FileRecord, MatchRecord, RowView};
pub use policy::{ErrorSink, WalkPolicy};
pub use walker::Walker;

use std::path::PathBuf;

use crate::error::ParseError;
use crate::filter::compile;

/// Compile `query` and walk `roots` with it: the one-call entry point.
pub fn find<I, P>(roots: I, query: &str, policy: WalkPolicy) -> Result<Walker, ParseError>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    Ok(Walker::new(roots, compile(query)?, policy))
}
