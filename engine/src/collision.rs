//! Destination name selection.
//!
//! A file keeps its own name inside the date folder unless that name is
//! taken. A taken name holding the same bytes means the file is already
//! filed; otherwise the first free `name (n).ext` is used.

use crate::checksums::{compute_file_checksum, ChecksumAlgorithm, ChecksumValue};
use crate::error::FileError;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where an incoming file belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Nothing exists at this path; transfer here
    Vacant(PathBuf),
    /// A byte-identical file already exists at this path
    Duplicate(PathBuf),
}

impl Placement {
    pub fn path(&self) -> &Path {
        match self {
            Placement::Vacant(path) | Placement::Duplicate(path) => path,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionResolver {
    algorithm: ChecksumAlgorithm,
}

impl CollisionResolver {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        CollisionResolver { algorithm }
    }

    /// Decide where `incoming` goes, given its preferred path `candidate`.
    ///
    /// Probes `candidate`, then `stem (1).ext`, `stem (2).ext` and so on.
    /// Every occupied probe is compared by content with the incoming file,
    /// so a file filed under a suffixed name by an earlier run is still
    /// recognised as a duplicate. Never returns an occupied path as `Vacant`.
    pub fn resolve(&self, candidate: &Path, incoming: &Path) -> Result<Placement, FileError> {
        let incoming_size = fs::metadata(incoming)
            .map_err(|e| FileError::UnreadableSource {
                path: incoming.to_path_buf(),
                source: e,
            })?
            .len();
        let mut incoming_sum: Option<ChecksumValue> = None;

        for n in 0u64.. {
            let probe = if n == 0 {
                candidate.to_path_buf()
            } else {
                disambiguated(candidate, n)
            };

            let existing = match fs::symlink_metadata(&probe) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if n > 0 {
                        debug!(candidate = %candidate.display(), chosen = %probe.display(), "name taken; using suffix");
                    }
                    return Ok(Placement::Vacant(probe));
                }
                Err(e) => {
                    return Err(FileError::DestinationUnwritable {
                        path: probe,
                        source: e,
                    })
                }
            };

            if !existing.is_file() || existing.len() != incoming_size {
                continue;
            }

            if incoming_sum.is_none() {
                let sum = compute_file_checksum(incoming, self.algorithm).map_err(|e| {
                    FileError::UnreadableSource {
                        path: incoming.to_path_buf(),
                        source: e,
                    }
                })?;
                incoming_sum = Some(sum);
            }

            match compute_file_checksum(&probe, self.algorithm) {
                Ok(existing_sum) if incoming_sum.as_ref() == Some(&existing_sum) => {
                    debug!(path = %probe.display(), checksum = %existing_sum, "identical file already present");
                    return Ok(Placement::Duplicate(probe));
                }
                Ok(_) => {}
                // An unreadable occupant is still an occupant; try the next name
                Err(e) => {
                    debug!(path = %probe.display(), error = %e, "cannot compare existing file")
                }
            }
        }

        // 0u64.. only ends on overflow
        Err(FileError::DestinationUnwritable {
            path: candidate.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Other, "no free destination name"),
        })
    }
}

/// `dir/stem (n).ext` for `dir/stem.ext`.
///
/// Only the last extension is split off, and a leading-dot name such as
/// `.profile` is all stem.
pub fn disambiguated(candidate: &Path, n: u64) -> PathBuf {
    let mut name = OsString::new();
    name.push(candidate.file_stem().unwrap_or_default());
    name.push(format!(" ({})", n));
    if let Some(ext) = candidate.extension() {
        name.push(".");
        name.push(ext);
    }
    candidate.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disambiguated_names() {
        assert_eq!(
            disambiguated(Path::new("out/15-01-2024/photo.jpg"), 1),
            PathBuf::from("out/15-01-2024/photo (1).jpg")
        );
        assert_eq!(
            disambiguated(Path::new("out/archive.tar.gz"), 12),
            PathBuf::from("out/archive.tar (12).gz")
        );
        assert_eq!(disambiguated(Path::new("out/README"), 2), PathBuf::from("out/README (2)"));
        assert_eq!(disambiguated(Path::new("out/.profile"), 1), PathBuf::from("out/.profile (1)"));
    }

    #[test]
    fn test_free_candidate_is_vacant() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let incoming = temp_dir.path().join("photo.jpg");
        fs::write(&incoming, b"pixels").unwrap();
        let candidate = temp_dir.path().join("out").join("photo.jpg");

        let placement = CollisionResolver::default()
            .resolve(&candidate, &incoming)
            .expect("resolve should succeed");
        assert_eq!(placement, Placement::Vacant(candidate));
    }

    #[test]
    fn test_different_content_gets_suffix() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();
        let incoming = temp_dir.path().join("photo.jpg");
        fs::write(&incoming, b"new pixels").unwrap();
        fs::write(out.join("photo.jpg"), b"old pixels").unwrap();

        let placement = CollisionResolver::default()
            .resolve(&out.join("photo.jpg"), &incoming)
            .expect("resolve should succeed");
        assert_eq!(placement, Placement::Vacant(out.join("photo (1).jpg")));
    }

    #[test]
    fn test_never_returns_an_occupied_path() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();
        let incoming = temp_dir.path().join("photo.jpg");
        fs::write(&incoming, b"incoming").unwrap();
        fs::write(out.join("photo.jpg"), b"one").unwrap();
        fs::write(out.join("photo (1).jpg"), b"two").unwrap();
        fs::create_dir(out.join("photo (2).jpg")).unwrap();

        let placement = CollisionResolver::default()
            .resolve(&out.join("photo.jpg"), &incoming)
            .expect("resolve should succeed");
        assert_eq!(placement, Placement::Vacant(out.join("photo (3).jpg")));
        assert!(!placement.path().exists());
    }

    #[test]
    fn test_identical_content_is_duplicate() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();
        let incoming = temp_dir.path().join("photo.jpg");
        fs::write(&incoming, b"same pixels").unwrap();
        fs::write(out.join("photo.jpg"), b"same pixels").unwrap();

        let placement = CollisionResolver::new(ChecksumAlgorithm::Md5)
            .resolve(&out.join("photo.jpg"), &incoming)
            .expect("resolve should succeed");
        assert_eq!(placement, Placement::Duplicate(out.join("photo.jpg")));
    }

    #[test]
    fn test_duplicate_found_under_suffixed_name() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();
        let incoming = temp_dir.path().join("photo.jpg");
        fs::write(&incoming, b"second camera").unwrap();
        fs::write(out.join("photo.jpg"), b"first camera!").unwrap();
        fs::write(out.join("photo (1).jpg"), b"second camera").unwrap();

        let placement = CollisionResolver::default()
            .resolve(&out.join("photo.jpg"), &incoming)
            .expect("resolve should succeed");
        assert_eq!(placement, Placement::Duplicate(out.join("photo (1).jpg")));
    }

    #[test]
    fn test_missing_incoming_is_unreadable() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = CollisionResolver::default()
            .resolve(&temp_dir.path().join("out.jpg"), &temp_dir.path().join("gone.jpg"))
            .expect_err("missing incoming file must fail");
        assert_eq!(err.kind(), crate::error::ErrorKind::UnreadableSource);
    }
}
