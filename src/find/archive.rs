//! Archive container detection and member enumeration.
//!
//! Detection is by filename suffix; magic-number sniffing could be layered
//! on without changing the contract. Containers are scanned without
//! extracting content: only one archive handle is open at a time, fully
//! read and closed before the walk moves on. Directory members are
//! filtered out. The 7z and rar backends are optional cargo features; a
//! build without them reports the container through the error sink and
//! skips it.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use tracing::debug;

use crate::error::WalkError;

/// Container kind, as exposed through the `archive` row attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    Zip,
    SevenZ,
    Rar,
}

impl ArchiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::Tar => "tar",
            ArchiveKind::Zip => "zip",
            ArchiveKind::SevenZ => "7z",
            ArchiveKind::Rar => "rar",
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compression applied around a tar stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarCodec {
    Plain,
    Gzip,
    Bzip2,
    Xz,
}

/// Container format resolved from a file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar(TarCodec),
    Zip,
    SevenZ,
    Rar,
}

impl ArchiveFormat {
    pub fn kind(&self) -> ArchiveKind {
        match self {
            ArchiveFormat::Tar(_) => ArchiveKind::Tar,
            ArchiveFormat::Zip => ArchiveKind::Zip,
            ArchiveFormat::SevenZ => ArchiveKind::SevenZ,
            ArchiveFormat::Rar => ArchiveKind::Rar,
        }
    }
}

/// Decide whether `name` looks like a supported container.
pub fn detect(name: &str) -> Option<ArchiveFormat> {
    let lower = name.to_ascii_lowercase();
    let table: [(&str, ArchiveFormat); 10] = [
        (".tar.gz", ArchiveFormat::Tar(TarCodec::Gzip)),
        (".tgz", ArchiveFormat::Tar(TarCodec::Gzip)),
        (".tar.bz2", ArchiveFormat::Tar(TarCodec::Bzip2)),
        (".tbz2", ArchiveFormat::Tar(TarCodec::Bzip2)),
        (".tar.xz", ArchiveFormat::Tar(TarCodec::Xz)),
        (".txz", ArchiveFormat::Tar(TarCodec::Xz)),
        (".tar", ArchiveFormat::Tar(TarCodec::Plain)),
        (".zip", ArchiveFormat::Zip),
        (".7z", ArchiveFormat::SevenZ),
        (".rar", ArchiveFormat::Rar),
    ];
    table
        .iter()
        .find(|(suffix, _)| lower.ends_with(suffix))
        .map(|(_, format)| *format)
}

/// One enumerated archive member. `path` is the member's internal path
/// with forward slashes; directories are already filtered out.
#[derive(Debug, Clone)]
pub struct Member {
    pub path: String,
    pub size: u64,
    pub mtime: Option<NaiveDateTime>,
}

/// Which optional backends this build can open
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub sevenz: bool,
    pub rar: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            sevenz: cfg!(feature = "sevenz"),
            rar: cfg!(feature = "rar"),
        }
    }
}

impl Capabilities {
    pub fn supports(&self, kind: ArchiveKind) -> bool {
        match kind {
            ArchiveKind::Tar | ArchiveKind::Zip => true,
            ArchiveKind::SevenZ => self.sevenz,
            ArchiveKind::Rar => self.rar,
        }
    }
}

/// Enumerate the members of the container at `path`. The container is
/// fully scanned and its handle closed before this returns.
pub fn scan(path: &Path, format: ArchiveFormat) -> Result<Vec<Member>, WalkError> {
    debug!("scanning {} container: {}", format.kind(), path.display());
    match format {
        ArchiveFormat::Tar(codec) => scan_tar(path, codec),
        ArchiveFormat::Zip => scan_zip(path),
        ArchiveFormat::SevenZ => scan_sevenz(path),
        ArchiveFormat::Rar => scan_rar(path),
    }
}

fn archive_err(path: &Path, reason: impl fmt::Display) -> WalkError {
    WalkError::Archive {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn local_mtime(epoch_secs: i64) -> Option<NaiveDateTime> {
    Local
        .timestamp_opt(epoch_secs, 0)
        .single()
        .map(|dt| dt.naive_local())
}

fn scan_tar(path: &Path, codec: TarCodec) -> Result<Vec<Member>, WalkError> {
    let file = File::open(path).map_err(|e| archive_err(path, e))?;
    let reader: Box<dyn Read> = match codec {
        TarCodec::Plain => Box::new(file),
        TarCodec::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
        TarCodec::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
        TarCodec::Xz => Box::new(xz2::read::XzDecoder::new(file)),
    };
    let mut archive = tar::Archive::new(reader);
    let mut members = Vec::new();
    for entry in archive.entries().map_err(|e| archive_err(path, e))? {
        let entry = entry.map_err(|e| archive_err(path, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let member_path = entry
            .path()
            .map_err(|e| archive_err(path, e))?
            .to_string_lossy()
            .trim_end_matches('/')
            .to_string();
        let mtime = entry
            .header()
            .mtime()
            .ok()
            .filter(|secs| *secs != 0)
            .and_then(|secs| local_mtime(secs as i64));
        members.push(Member {
            path: member_path,
            size: entry.size(),
            mtime,
        });
    }
    Ok(members)
}

fn scan_zip(path: &Path) -> Result<Vec<Member>, WalkError> {
    let file = File::open(path).map_err(|e| archive_err(path, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| archive_err(path, e))?;
    let mut members = Vec::new();
    for index in 0..zip.len() {
        let entry = zip.by_index(index).map_err(|e| archive_err(path, e))?;
        if entry.is_dir() {
            continue;
        }
        let mtime = entry.last_modified().and_then(|dt| {
            NaiveDate::from_ymd_opt(dt.year() as i32, dt.month() as u32, dt.day() as u32)?
                .and_hms_opt(dt.hour() as u32, dt.minute() as u32, dt.second() as u32)
        });
        members.push(Member {
            path: entry.name().trim_end_matches('/').to_string(),
            size: entry.size(),
            mtime,
        });
    }
    Ok(members)
}

#[cfg(feature = "sevenz")]
fn scan_sevenz(path: &Path) -> Result<Vec<Member>, WalkError> {
    let reader = sevenz_rust::SevenZReader::open(path, sevenz_rust::Password::empty())
        .map_err(|e| archive_err(path, e))?;
    let mut members = Vec::new();
    for entry in &reader.archive().files {
        if entry.is_directory() {
            continue;
        }
        members.push(Member {
            path: entry.name().replace('\\', "/"),
            size: entry.size(),
            mtime: None,
        });
    }
    Ok(members)
}

#[cfg(not(feature = "sevenz"))]
fn scan_sevenz(path: &Path) -> Result<Vec<Member>, WalkError> {
    Err(WalkError::MissingBackend {
        kind: "7z",
        feature: "sevenz",
        path: path.to_path_buf(),
    })
}

#[cfg(feature = "rar")]
fn scan_rar(path: &Path) -> Result<Vec<Member>, WalkError> {
    let archive = unrar::Archive::new(path)
        .open_for_listing()
        .map_err(|e| archive_err(path, e))?;
    let mut members = Vec::new();
    for header in archive {
        let header = header.map_err(|e| archive_err(path, e))?;
        if !header.is_file() {
            continue;
        }
        members.push(Member {
            path: header.filename.to_string_lossy().replace('\\', "/"),
            size: header.unpacked_size as u64,
            mtime: None,
        });
    }
    Ok(members)
}

#[cfg(not(feature = "rar"))]
fn scan_rar(path: &Path) -> Result<Vec<Member>, WalkError> {
    Err(WalkError::MissingBackend {
        kind: "rar",
        feature: "rar",
        path: path.to_path_buf(),
    })
}
