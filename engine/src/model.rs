//! Core data model for organizing runs.
//!
//! - RunConfig: what to organize, where to, and how
//! - FileEntry: one enumerated source file with its available timestamps
//! - TransferResult: the outcome for one source entry
//! - RunSummary: counts accumulated over a run

use crate::checksums::ChecksumAlgorithm;
use crate::error::{EngineError, ErrorKind, FileError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

/// Folder-name template selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// DD-MM-YYYY
    #[default]
    DayMonthYear,
    /// MM-DD-YYYY
    MonthDayYear,
    /// YYYY-MM-DD
    YearMonthDay,
}

impl DateFormat {
    /// The human-readable template, e.g. `DD-MM-YYYY`.
    pub fn template(&self) -> &'static str {
        match self {
            DateFormat::DayMonthYear => "DD-MM-YYYY",
            DateFormat::MonthDayYear => "MM-DD-YYYY",
            DateFormat::YearMonthDay => "YYYY-MM-DD",
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template())
    }
}

impl FromStr for DateFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dd-mm-yyyy" | "dmy" | "day-month-year" => Ok(DateFormat::DayMonthYear),
            "mm-dd-yyyy" | "mdy" | "month-day-year" => Ok(DateFormat::MonthDayYear),
            "yyyy-mm-dd" | "ymd" | "year-month-day" => Ok(DateFormat::YearMonthDay),
            _ => Err(format!(
                "invalid date format '{}'; expected DD-MM-YYYY, MM-DD-YYYY or YYYY-MM-DD",
                s
            )),
        }
    }
}

/// Whether the source file is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Copy files; source remains unchanged
    #[default]
    Copy,
    /// Copy, verify, then delete the source
    Move,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Copy => write!(f, "copy"),
            TransferMode::Move => write!(f, "move"),
        }
    }
}

impl FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copy" => Ok(TransferMode::Copy),
            "move" => Ok(TransferMode::Move),
            _ => Err(format!("invalid mode '{}'; expected copy or move", s)),
        }
    }
}

/// Everything one run needs. Supplied once by the caller and never mutated by
/// the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub date_format: DateFormat,
    pub mode: TransferMode,
    /// Descend into subdirectories of the source root instead of skipping them
    #[serde(default)]
    pub recursive: bool,
    /// Checksum used to recognise byte-identical files and verify moves
    #[serde(default)]
    pub compare_with: ChecksumAlgorithm,
    /// Process files whose name starts with a dot
    #[serde(default = "default_include_hidden")]
    pub include_hidden: bool,
}

fn default_include_hidden() -> bool {
    true
}

impl RunConfig {
    pub fn new<S, D>(
        source_root: S,
        destination_root: D,
        date_format: DateFormat,
        mode: TransferMode,
    ) -> Self
    where
        S: Into<PathBuf>,
        D: Into<PathBuf>,
    {
        RunConfig {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            date_format,
            mode,
            recursive: false,
            compare_with: ChecksumAlgorithm::default(),
            include_hidden: true,
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_compare_with(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.compare_with = algorithm;
        self
    }

    pub fn with_include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Check the run-level invariants before any file is touched.
    ///
    /// The source root must be an existing directory, the destination must be
    /// a different directory, and the destination must not lie inside the
    /// source tree. The destination itself may not exist yet.
    pub fn validate(&self) -> Result<(), EngineError> {
        match fs::metadata(&self.source_root) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(EngineError::SourceNotDirectory {
                    path: self.source_root.clone(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(EngineError::SourceNotFound {
                    path: self.source_root.clone(),
                })
            }
            Err(e) => {
                return Err(EngineError::SourceAccessDenied {
                    path: self.source_root.clone(),
                    source: e,
                })
            }
        }

        if self.destination_root.as_os_str().is_empty() {
            return Err(EngineError::InvalidPath {
                path: self.destination_root.clone(),
                reason: "destination path is empty".to_string(),
            });
        }

        if let Ok(metadata) = fs::metadata(&self.destination_root) {
            if !metadata.is_dir() {
                return Err(EngineError::InvalidPath {
                    path: self.destination_root.clone(),
                    reason: "destination exists but is not a directory".to_string(),
                });
            }
        }

        let source = fs::canonicalize(&self.source_root).map_err(|e| {
            EngineError::SourceAccessDenied {
                path: self.source_root.clone(),
                source: e,
            }
        })?;
        let destination = resolve_lenient(&self.destination_root).map_err(|e| {
            EngineError::InvalidPath {
                path: self.destination_root.clone(),
                reason: e.to_string(),
            }
        })?;

        if source == destination {
            return Err(EngineError::SameDirectory {
                path: self.source_root.clone(),
            });
        }
        if destination.starts_with(&source) {
            return Err(EngineError::DestinationInsideSource {
                source_root: self.source_root.clone(),
                destination_root: self.destination_root.clone(),
            });
        }

        Ok(())
    }
}

/// Canonicalize the longest existing ancestor of `path` and re-append the
/// components that do not exist yet.
fn resolve_lenient(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        match fs::canonicalize(existing) {
            Ok(mut resolved) => {
                for component in missing.iter().rev() {
                    resolved.push(component);
                }
                return Ok(resolved);
            }
            Err(e) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Err(e),
            },
        }
    }
}

/// Raw embedded timestamp text, as read from the file's own metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedDate {
    /// Name of the metadata reader that produced the value
    pub reader: &'static str,
    /// Unparsed value, e.g. `2024:01:15 10:21:33`
    pub raw: String,
}

/// One source file. Immutable once enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    /// Filesystem creation (birth) time; not every platform reports one
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub embedded: Option<EmbeddedDate>,
}

impl FileEntry {
    pub fn from_metadata(path: PathBuf, metadata: &fs::Metadata) -> Self {
        FileEntry {
            path,
            size: metadata.len(),
            created: metadata.created().ok(),
            modified: metadata.modified().ok(),
            embedded: None,
        }
    }

    pub fn with_embedded(mut self, embedded: Option<EmbeddedDate>) -> Self {
        self.embedded = embedded;
        self
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }
}

/// Which source produced a file's date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    /// Capture date embedded in the file (e.g. EXIF)
    Embedded,
    /// Filesystem creation time
    Created,
    /// Filesystem last-modified time
    Modified,
    /// Nothing was available; the epoch day was used
    Fallback,
}

impl fmt::Display for DateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateSource::Embedded => write!(f, "embedded capture date"),
            DateSource::Created => write!(f, "file creation time"),
            DateSource::Modified => write!(f, "file modification time"),
            DateSource::Fallback => write!(f, "fallback date"),
        }
    }
}

/// The state of one entry once the run is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Copied or moved into its date folder
    Succeeded,
    /// Deliberately left alone; see `SkipReason`
    Skipped,
    /// Error occurred; see `error_kind` and `error_message`
    Failed,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Succeeded => write!(f, "succeeded"),
            TransferStatus::Skipped => write!(f, "skipped"),
            TransferStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Directory, symlink or other non-regular entry
    NotAFile,
    /// A byte-identical file is already filed at the destination
    Duplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAFile => write!(f, "not a file"),
            SkipReason::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// Outcome for a single source entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub source_path: PathBuf,
    /// Final destination, or the existing duplicate for `Skipped(Duplicate)`
    pub destination_path: Option<PathBuf>,
    pub status: TransferStatus,
    pub skip_reason: Option<SkipReason>,
    pub error_kind: Option<ErrorKind>,
    /// OS error code if status is Failed and one is available
    pub error_code: Option<i32>,
    pub error_message: Option<String>,
    pub date: Option<NaiveDate>,
    pub date_source: Option<DateSource>,
    pub bytes_written: u64,
}

impl TransferResult {
    fn new(source_path: PathBuf, status: TransferStatus) -> Self {
        TransferResult {
            source_path,
            destination_path: None,
            status,
            skip_reason: None,
            error_kind: None,
            error_code: None,
            error_message: None,
            date: None,
            date_source: None,
            bytes_written: 0,
        }
    }

    pub fn succeeded(source_path: PathBuf, destination_path: PathBuf, bytes_written: u64) -> Self {
        TransferResult {
            destination_path: Some(destination_path),
            bytes_written,
            ..Self::new(source_path, TransferStatus::Succeeded)
        }
    }

    pub fn skipped(source_path: PathBuf, reason: SkipReason) -> Self {
        TransferResult {
            skip_reason: Some(reason),
            ..Self::new(source_path, TransferStatus::Skipped)
        }
    }

    pub fn failed(source_path: PathBuf, error: &FileError) -> Self {
        TransferResult {
            error_kind: Some(error.kind()),
            error_code: error.raw_os_error(),
            error_message: Some(error.to_string()),
            ..Self::new(source_path, TransferStatus::Failed)
        }
    }

    pub fn at(mut self, destination_path: PathBuf) -> Self {
        self.destination_path = Some(destination_path);
        self
    }

    pub fn dated(mut self, date: NaiveDate, source: DateSource) -> Self {
        self.date = Some(date);
        self.date_source = Some(source);
        self
    }

    pub fn is_duplicate(&self) -> bool {
        self.skip_reason == Some(SkipReason::Duplicate)
    }

    /// One-line description for display: status plus reason or error.
    pub fn describe(&self) -> String {
        match (self.status, self.skip_reason, &self.error_message) {
            (TransferStatus::Skipped, Some(reason), _) => format!("skipped ({})", reason),
            (TransferStatus::Failed, _, Some(message)) => format!("failed: {}", message),
            (status, _, _) => status.to_string(),
        }
    }
}

/// Counts accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub succeeded: usize,
    /// All skips, duplicates included
    pub skipped: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub bytes_written: u64,
    /// True if the run stopped on its cancel flag before the last entry
    pub cancelled: bool,
}

impl RunSummary {
    pub fn record(&mut self, result: &TransferResult) {
        match result.status {
            TransferStatus::Succeeded => self.succeeded += 1,
            TransferStatus::Skipped => {
                self.skipped += 1;
                if result.is_duplicate() {
                    self.duplicates += 1;
                }
            }
            TransferStatus::Failed => self.failed += 1,
        }
        self.bytes_written += result.bytes_written;
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
