//! # DateSort Engine - Date-Based File Organizer Library
//!
//! A headless engine that sorts the files of a directory into one folder per
//! calendar day. Designed as the foundation for multiple front ends (CLI,
//! automation).
//!
//! ## Overview
//!
//! For every file in the source directory the engine:
//! - Resolves a date (embedded capture date, then creation time, then
//!   modification time)
//! - Names a date folder from it (`DD-MM-YYYY`, `MM-DD-YYYY` or `YYYY-MM-DD`)
//! - Picks a free file name, recognising files that are already filed
//! - Copies or moves the file, never overwriting and never losing data
//!
//! Per-file errors are isolated: they are reported as failed results and the
//! run carries on.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use datesort_engine::{DateFormat, Organizer, RunConfig, TransferMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::new(
//!     "/photos/inbox",
//!     "/photos/by-date",
//!     DateFormat::YearMonthDay,
//!     TransferMode::Copy,
//! );
//!
//! let organizer = Organizer::new();
//! let mut run = organizer.run(config)?;
//! for result in run.by_ref() {
//!     println!("{}: {}", result.source_path.display(), result.describe());
//! }
//! println!("{:?}", run.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Run configuration, file entries, results and summaries
//! - **error**: Run-level and per-file error types
//! - **date**: Date resolution from prioritised sources
//! - **metadata**: Embedded capture-date readers (EXIF)
//! - **naming**: Date folder names
//! - **collision**: Destination name selection and duplicate detection
//! - **fs_ops**: Enumeration, staged copy and safe move
//! - **checksums**: Content hashing for duplicate detection and verification
//! - **job**: Run orchestration
//! - **worker**: Background runs with channel events

pub mod checksums;
pub mod collision;
pub mod date;
pub mod error;
pub mod fs_ops;
pub mod job;
pub mod metadata;
pub mod model;
pub mod naming;
pub mod worker;

// Re-export main types and functions
pub use checksums::{compute_file_checksum, ChecksumAlgorithm, ChecksumValue};
pub use collision::{CollisionResolver, Placement};
pub use date::{DateExtractor, DateResolver, ResolvedDate};
pub use error::{EngineError, ErrorKind, FileError};
pub use fs_ops::{FileOps, LocalFs};
pub use job::{count_candidates, CancelFlag, Organizer, PlannedFile, Run};
pub use metadata::{CaptureDateReader, MetadataProbe};
pub use model::{
    DateFormat, DateSource, RunConfig, RunSummary, SkipReason, TransferMode, TransferResult,
    TransferStatus,
};
pub use naming::folder_name;
pub use worker::{spawn_run, RunEvent, RunHandle};
