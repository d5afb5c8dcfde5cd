//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Enumerating the source directory
//! - Copying files through a staging file with metadata preservation
//! - Creating date folders on demand
//!
//! All mutating calls go through the `FileOps` trait so a run can be driven
//! against an alternative implementation (tests use one to inject failures).

use crate::checksums::{self, ChecksumAlgorithm};
use crate::error::{EngineError, FileError};
use crate::model::TransferMode;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// One entry found while enumerating the source root.
#[derive(Debug)]
pub enum SourceEntry {
    /// A regular file to be organized
    File(PathBuf),
    /// A directory, symlink or other non-regular entry
    NotAFile(PathBuf),
    /// An entry (or, when recursing, a subdirectory) that could not be inspected
    Unreadable { path: PathBuf, error: io::Error },
}

impl SourceEntry {
    pub fn path(&self) -> &Path {
        match self {
            SourceEntry::File(path) | SourceEntry::NotAFile(path) => path,
            SourceEntry::Unreadable { path, .. } => path,
        }
    }
}

/// Enumerate the source directory.
///
/// Without `recursive`, only direct children are listed and subdirectories
/// come back as `NotAFile`. With it, subdirectories are descended into
/// instead. Entries of each directory are sorted by name. Symlinks are never
/// followed.
///
/// # Errors
/// Returns EngineError only if the root itself cannot be listed.
pub fn enumerate_source(
    source: &Path,
    recursive: bool,
    include_hidden: bool,
) -> Result<Vec<SourceEntry>, EngineError> {
    let mut entries = Vec::new();

    fn recurse(
        dir: &Path,
        recursive: bool,
        include_hidden: bool,
        entries: &mut Vec<SourceEntry>,
    ) -> io::Result<()> {
        let mut children: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<_>>()?;
        children.sort_by_key(|entry| entry.file_name());

        for child in children {
            let path = child.path();
            if !include_hidden && is_hidden(&child.file_name()) {
                continue;
            }

            match child.file_type() {
                Ok(file_type) if file_type.is_file() => entries.push(SourceEntry::File(path)),
                Ok(file_type) if file_type.is_dir() && recursive => {
                    if let Err(error) = recurse(&path, recursive, include_hidden, entries) {
                        entries.push(SourceEntry::Unreadable { path, error });
                    }
                }
                Ok(_) => entries.push(SourceEntry::NotAFile(path)),
                Err(error) => entries.push(SourceEntry::Unreadable { path, error }),
            }
        }
        Ok(())
    }

    recurse(source, recursive, include_hidden, &mut entries).map_err(|e| {
        EngineError::EnumerationFailed {
            path: source.to_path_buf(),
            source: e,
        }
    })?;
    Ok(entries)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// The filesystem calls a run makes. Every method defaults to the real
/// filesystem; implementors override only what they need to change.
pub trait FileOps: Send + Sync {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    /// Copy file contents and preserve the modification time.
    ///
    /// # Returns
    /// Number of bytes copied
    fn copy(&self, src: &Path, dst: &Path) -> Result<u64, FileError> {
        copy_file_with_metadata(src, dst)
    }

    /// Whether `dst` holds exactly the bytes of `src`.
    fn verify(&self, src: &Path, dst: &Path, algorithm: ChecksumAlgorithm) -> io::Result<bool> {
        checksums::files_identical(src, dst, algorithm)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// The local filesystem, unmodified.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileOps for LocalFs {}

/// Copy a file from source to destination with metadata preservation.
///
/// # Errors
/// `UnreadableSource` if the source cannot be opened or read,
/// `DestinationUnwritable` if the destination cannot be created or written.
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, FileError> {
    let unreadable = |e| FileError::UnreadableSource {
        path: src.to_path_buf(),
        source: e,
    };

    let mut src_file = fs::File::open(src).map_err(unreadable)?;
    let src_mtime = src_file.metadata().map_err(unreadable)?.modified().ok();

    let mut dst_file = fs::File::create(dst).map_err(|e| FileError::DestinationUnwritable {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            FileError::DestinationUnwritable {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            FileError::TransferFailed {
                from: src.to_path_buf(),
                to: dst.to_path_buf(),
                source: e,
            }
        }
    })?;

    dst_file.sync_all().map_err(|e| FileError::TransferFailed {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    drop(dst_file);

    if let Some(mtime) = src_mtime {
        if let Err(e) = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime)) {
            debug!(path = %dst.display(), error = %e, "could not preserve modification time");
        }
    }

    Ok(bytes_copied)
}

/// Make sure `dir` exists as a directory, creating it (and parents) if needed.
pub fn ensure_dir(ops: &dyn FileOps, dir: &Path) -> Result<(), FileError> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(FileError::DestinationUnwritable {
            path: dir.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            ops.create_dir_all(dir)
                .map_err(|e| FileError::DestinationUnwritable {
                    path: dir.to_path_buf(),
                    source: e,
                })
        }
        Err(e) => Err(FileError::DestinationUnwritable {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}

/// Hidden sibling of `dst` that a copy is written to before being renamed
/// into place.
pub fn staging_path(dst: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(dst.file_name().unwrap_or_default());
    name.push(format!(".{}.partial", Uuid::new_v4().simple()));
    dst.with_file_name(name)
}

/// Transfer `src` to `dst`, which must not exist yet.
///
/// The data is written to a staging file next to `dst` and renamed into
/// place only once complete. For `Move` the staged copy is verified against
/// the source before the rename, and the source is removed last. Any failure
/// before the removal leaves the source untouched and removes the staging
/// file.
///
/// # Returns
/// Number of bytes written
pub fn transfer(
    ops: &dyn FileOps,
    src: &Path,
    dst: &Path,
    mode: TransferMode,
    algorithm: ChecksumAlgorithm,
) -> Result<u64, FileError> {
    let staging = staging_path(dst);
    let discard = |staging: &Path| {
        if let Err(e) = ops.remove_file(staging) {
            if e.kind() != io::ErrorKind::NotFound {
                debug!(path = %staging.display(), error = %e, "could not remove staging file");
            }
        }
    };

    let bytes = match ops.copy(src, &staging) {
        Ok(bytes) => bytes,
        Err(e) => {
            discard(&staging);
            return Err(e);
        }
    };

    if mode == TransferMode::Move {
        match ops.verify(src, &staging, algorithm) {
            Ok(true) => {}
            Ok(false) => {
                discard(&staging);
                return Err(FileError::VerificationMismatch {
                    from: src.to_path_buf(),
                    to: dst.to_path_buf(),
                });
            }
            Err(e) => {
                discard(&staging);
                return Err(FileError::TransferFailed {
                    from: src.to_path_buf(),
                    to: dst.to_path_buf(),
                    source: e,
                });
            }
        }
    }

    // Never replace a file that appeared since collision resolution
    if dst.exists() {
        discard(&staging);
        return Err(FileError::TransferFailed {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "destination appeared during transfer",
            ),
        });
    }

    if let Err(e) = ops.rename(&staging, dst) {
        discard(&staging);
        return Err(FileError::TransferFailed {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            source: e,
        });
    }

    if mode == TransferMode::Move {
        ops.remove_file(src).map_err(|e| FileError::TransferFailed {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            source: io::Error::new(
                e.kind(),
                format!("copied, but the source could not be removed: {}", e),
            ),
        })?;
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct FailingVerify;

    impl FileOps for FailingVerify {
        fn verify(&self, _: &Path, _: &Path, _: ChecksumAlgorithm) -> io::Result<bool> {
            Err(io::Error::new(io::ErrorKind::Other, "injected verify failure"))
        }
    }

    struct CorruptingCopy;

    impl FileOps for CorruptingCopy {
        fn copy(&self, _src: &Path, dst: &Path) -> Result<u64, FileError> {
            fs::write(dst, b"corrupted").expect("Failed to write corrupted copy");
            Ok(9)
        }
    }

    fn dir_listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("Failed to list dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_enumerate_flat_directory() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path();

        let mut file1 = fs::File::create(src.join("b.txt")).expect("Failed to create file1");
        file1.write_all(b"test data 1").expect("Failed to write file1");
        drop(file1);
        fs::write(src.join("a.txt"), b"test data 2").expect("Failed to write file2");
        fs::create_dir(src.join("subdir")).expect("Failed to create subdir");
        fs::write(src.join("subdir").join("nested.txt"), b"x").expect("Failed to write nested");

        let entries = enumerate_source(src, false, true).expect("Failed to enumerate");

        let names: Vec<_> = entries
            .iter()
            .map(|e| e.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt", "subdir"]);
        assert!(matches!(entries[0], SourceEntry::File(_)));
        assert!(matches!(entries[2], SourceEntry::NotAFile(_)));
    }

    #[test]
    fn test_enumerate_recursive_descends() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path();
        fs::write(src.join("top.txt"), b"1").unwrap();
        fs::create_dir_all(src.join("x").join("y")).unwrap();
        fs::write(src.join("x").join("y").join("deep.txt"), b"2").unwrap();

        let entries = enumerate_source(src, true, true).expect("Failed to enumerate");

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| matches!(e, SourceEntry::File(_))));
    }

    #[test]
    fn test_enumerate_can_exclude_hidden() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path();
        fs::write(src.join(".DS_Store"), b"junk").unwrap();
        fs::write(src.join("photo.jpg"), b"img").unwrap();

        assert_eq!(enumerate_source(src, false, true).unwrap().len(), 2);
        let visible = enumerate_source(src, false, false).unwrap();
        assert_eq!(visible.len(), 1);
        assert!(visible[0].path().ends_with("photo.jpg"));
    }

    #[test]
    fn test_enumerate_nonexistent_source() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = enumerate_source(&temp_dir.path().join("nonexistent"), false, true);
        assert!(matches!(result, Err(EngineError::EnumerationFailed { .. })));
    }

    #[test]
    fn test_copy_file_with_metadata() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src_file = temp_dir.path().join("source.txt");
        let dst_file = temp_dir.path().join("dest.txt");
        fs::write(&src_file, b"test content").expect("Failed to write source");
        let mtime = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src_file, mtime).expect("Failed to set mtime");

        let bytes = copy_file_with_metadata(&src_file, &dst_file).expect("Failed to copy");
        assert_eq!(bytes, 12);
        assert_eq!(fs::read_to_string(&dst_file).unwrap(), "test content");

        let copied = filetime::FileTime::from_last_modification_time(&fs::metadata(&dst_file).unwrap());
        assert_eq!(copied.unix_seconds(), 1_600_000_000);
    }

    #[test]
    fn test_copy_missing_source_is_unreadable() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = copy_file_with_metadata(&temp_dir.path().join("gone"), &temp_dir.path().join("out"))
            .expect_err("copy of a missing file must fail");
        assert_eq!(err.kind(), crate::error::ErrorKind::UnreadableSource);
    }

    #[test]
    fn test_ensure_dir_creates_and_is_idempotent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("15-01-2024");

        ensure_dir(&LocalFs, &dir).expect("Failed to create dir");
        ensure_dir(&LocalFs, &dir).expect("Second call should be a no-op");
        assert!(dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_rejects_file_in_the_way() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let blocker = temp_dir.path().join("15-01-2024");
        fs::write(&blocker, b"not a dir").unwrap();

        let err = ensure_dir(&LocalFs, &blocker).expect_err("file in the way must fail");
        assert_eq!(err.kind(), crate::error::ErrorKind::DestinationUnwritable);
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let staging = staging_path(Path::new("/out/15-01-2024/photo.jpg"));
        assert_eq!(staging.parent(), Some(Path::new("/out/15-01-2024")));
        let name = staging.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".photo.jpg."));
        assert!(name.ends_with(".partial"));
    }

    #[test]
    fn test_copy_transfer_keeps_source_and_leaves_no_staging() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("photo.jpg");
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(&src, b"pixels").unwrap();

        let bytes = transfer(&LocalFs, &src, &out.join("photo.jpg"), TransferMode::Copy, ChecksumAlgorithm::Blake3)
            .expect("copy should succeed");

        assert_eq!(bytes, 6);
        assert!(src.exists());
        assert_eq!(dir_listing(&out), ["photo.jpg"]);
    }

    #[test]
    fn test_move_transfer_removes_source() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("photo.jpg");
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(&src, b"pixels").unwrap();

        transfer(&LocalFs, &src, &out.join("photo.jpg"), TransferMode::Move, ChecksumAlgorithm::Sha256)
            .expect("move should succeed");

        assert!(!src.exists());
        assert_eq!(fs::read(out.join("photo.jpg")).unwrap(), b"pixels");
    }

    #[test]
    fn test_move_keeps_source_when_verify_fails() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("photo.jpg");
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(&src, b"pixels").unwrap();

        let err = transfer(&FailingVerify, &src, &out.join("photo.jpg"), TransferMode::Move, ChecksumAlgorithm::Blake3)
            .expect_err("injected failure must surface");

        assert_eq!(err.kind(), crate::error::ErrorKind::TransferFailed);
        assert_eq!(fs::read(&src).unwrap(), b"pixels");
        assert!(dir_listing(&out).is_empty(), "staging copy must be cleaned up");
    }

    #[test]
    fn test_move_keeps_source_when_copy_is_corrupt() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("photo.jpg");
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(&src, b"original pixels").unwrap();

        let err = transfer(&CorruptingCopy, &src, &out.join("photo.jpg"), TransferMode::Move, ChecksumAlgorithm::Blake3)
            .expect_err("mismatch must surface");

        assert!(matches!(err, FileError::VerificationMismatch { .. }));
        assert!(src.exists());
        assert!(dir_listing(&out).is_empty());
    }

    #[test]
    fn test_transfer_refuses_to_overwrite() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("photo.jpg");
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(&src, b"new").unwrap();
        fs::write(out.join("photo.jpg"), b"someone else's file").unwrap();

        let err = transfer(&LocalFs, &src, &out.join("photo.jpg"), TransferMode::Move, ChecksumAlgorithm::Blake3)
            .expect_err("existing destination must not be replaced");

        assert_eq!(err.kind(), crate::error::ErrorKind::TransferFailed);
        assert!(src.exists());
        assert_eq!(fs::read(out.join("photo.jpg")).unwrap(), b"someone else's file");
        assert_eq!(dir_listing(&out), ["photo.jpg"]);
    }
}
