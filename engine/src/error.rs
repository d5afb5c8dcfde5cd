//! Error types for the organizer engine.
//!
//! There are two levels of error. `EngineError` covers configuration and
//! run-level problems that stop a run before any file is processed.
//! `FileError` covers a single file; the run turns it into a failed
//! `TransferResult` and moves on to the next file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source directory does not exist
    #[error("source directory not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Source exists but is not a directory
    #[error("source is not a directory: {}", path.display())]
    SourceNotDirectory { path: PathBuf },

    /// Source directory cannot be inspected
    #[error("source directory access denied: {}", path.display())]
    SourceAccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Source and destination resolve to the same directory
    #[error("source and destination are the same directory: {}", path.display())]
    SameDirectory { path: PathBuf },

    /// Destination lies inside the source tree
    #[error(
        "destination {} is inside source {}",
        destination_root.display(),
        source_root.display()
    )]
    DestinationInsideSource {
        source_root: PathBuf,
        destination_root: PathBuf,
    },

    /// Path is empty or otherwise unusable
    #[error("invalid path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Listing the source directory failed
    #[error("failed to enumerate directory: {}", path.display())]
    EnumerationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::SourceAccessDenied { source, .. } | Self::EnumerationFailed { source, .. } => {
                source.raw_os_error()
            }
            _ => None,
        }
    }
}

/// Classification of a per-file failure, as reported in `TransferResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The source file could not be opened or stat'd
    UnreadableSource,
    /// The date folder or the destination file could not be created
    DestinationUnwritable,
    /// The copy, verification, rename or source removal failed
    TransferFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreadableSource => write!(f, "unreadable source"),
            Self::DestinationUnwritable => write!(f, "destination unwritable"),
            Self::TransferFailed => write!(f, "transfer failed"),
        }
    }
}

/// A failure confined to one file.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot read {}: {source}", path.display())]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("transfer {} -> {} failed: {source}", from.display(), to.display())]
    TransferFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("copy of {} at {} does not match the source", from.display(), to.display())]
    VerificationMismatch { from: PathBuf, to: PathBuf },
}

impl FileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnreadableSource { .. } => ErrorKind::UnreadableSource,
            Self::DestinationUnwritable { .. } => ErrorKind::DestinationUnwritable,
            Self::TransferFailed { .. } | Self::VerificationMismatch { .. } => {
                ErrorKind::TransferFailed
            }
        }
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::UnreadableSource { source, .. }
            | Self::DestinationUnwritable { source, .. }
            | Self::TransferFailed { source, .. } => source.raw_os_error(),
            Self::VerificationMismatch { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_kinds() {
        let io_err = || io::Error::new(io::ErrorKind::PermissionDenied, "denied");

        let unreadable = FileError::UnreadableSource {
            path: PathBuf::from("a.jpg"),
            source: io_err(),
        };
        assert_eq!(unreadable.kind(), ErrorKind::UnreadableSource);

        let mismatch = FileError::VerificationMismatch {
            from: PathBuf::from("a.jpg"),
            to: PathBuf::from("out/a.jpg"),
        };
        assert_eq!(mismatch.kind(), ErrorKind::TransferFailed);
        assert_eq!(mismatch.raw_os_error(), None);
    }

    #[test]
    fn test_messages_name_the_paths() {
        let err = EngineError::DestinationInsideSource {
            source_root: PathBuf::from("/photos"),
            destination_root: PathBuf::from("/photos/sorted"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/photos/sorted"));
        assert!(msg.contains("inside source"));
    }
}
