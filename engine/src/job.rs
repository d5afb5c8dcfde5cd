//! Run orchestration module.
//!
//! This module ties the pieces together:
//! - Validating a `RunConfig` and enumerating the source root
//! - Resolving each file's date and date folder
//! - Resolving name collisions and transferring the file
//!
//! A run is a lazy `Iterator` of `TransferResult`s; nothing is touched until
//! the caller pulls the next result. Per-file errors become `Failed` results
//! and never stop the run.

use crate::collision::{CollisionResolver, Placement};
use crate::date::DateResolver;
use crate::error::{EngineError, FileError};
use crate::fs_ops::{self, FileOps, LocalFs, SourceEntry};
use crate::metadata::MetadataProbe;
use crate::model::{DateSource, FileEntry, RunConfig, RunSummary, SkipReason, TransferResult, TransferStatus};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, info_span, warn, Span};
use uuid::Uuid;

/// Shared stop request, checked between files.
///
/// Clones share the same flag. A request set before or during a run stops
/// that run; the run clears the flag when it ends, so the next run starts
/// fresh.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Withdraw a pending request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Where a file would go, computed without touching the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    pub source_path: PathBuf,
    /// Date folder name, e.g. `15-01-2024`
    pub folder: String,
    pub date: NaiveDate,
    pub date_source: DateSource,
    pub size: u64,
}

/// Organizes files into date folders.
///
/// Holds the pluggable parts of a run: how dates are resolved, which embedded
/// metadata is read, and the filesystem calls used for writing.
pub struct Organizer {
    resolver: DateResolver,
    probe: MetadataProbe,
    ops: Box<dyn FileOps>,
    cancel: CancelFlag,
}

impl Default for Organizer {
    fn default() -> Self {
        Organizer {
            resolver: DateResolver::default(),
            probe: MetadataProbe::default(),
            ops: Box::new(LocalFs),
            cancel: CancelFlag::new(),
        }
    }
}

impl Organizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: DateResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_probe(mut self, probe: MetadataProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_file_ops(mut self, ops: impl FileOps + 'static) -> Self {
        self.ops = Box::new(ops);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle that stops any run of this organizer between two files.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Start a run.
    ///
    /// Validates the configuration and enumerates the source root; nothing
    /// is written until the returned `Run` is iterated.
    ///
    /// # Errors
    /// Returns EngineError if the configuration is invalid or the source root
    /// cannot be listed.
    pub fn run(&self, config: RunConfig) -> Result<Run<'_>, EngineError> {
        config.validate()?;
        let entries =
            fs_ops::enumerate_source(&config.source_root, config.recursive, config.include_hidden)?;

        let id = Uuid::new_v4();
        let span = info_span!("run", run_id = %id);
        span.in_scope(|| {
            info!(
                source = %config.source_root.display(),
                destination = %config.destination_root.display(),
                mode = %config.mode,
                format = %config.date_format,
                entries = entries.len(),
                "run started"
            )
        });

        Ok(Run {
            organizer: self,
            collisions: CollisionResolver::new(config.compare_with),
            config,
            entries: entries.into_iter(),
            id,
            span,
            summary: RunSummary::default(),
            finished: false,
        })
    }

    /// Group the regular files of the source root by the date folder they
    /// would land in, without creating or moving anything.
    ///
    /// Files that cannot be stat'd are left out.
    pub fn preview(
        &self,
        config: &RunConfig,
    ) -> Result<BTreeMap<String, Vec<PlannedFile>>, EngineError> {
        config.validate()?;
        let entries =
            fs_ops::enumerate_source(&config.source_root, config.recursive, config.include_hidden)?;

        let mut plan: BTreeMap<String, Vec<PlannedFile>> = BTreeMap::new();
        for entry in entries {
            let SourceEntry::File(path) = entry else {
                continue;
            };
            match self.plan(&path, config) {
                Ok(planned) => plan.entry(planned.folder.clone()).or_default().push(planned),
                Err(e) => warn!(path = %path.display(), error = %e, "cannot plan file"),
            }
        }
        Ok(plan)
    }

    fn plan(&self, path: &Path, config: &RunConfig) -> Result<PlannedFile, FileError> {
        let metadata = fs::metadata(path).map_err(|e| FileError::UnreadableSource {
            path: path.to_path_buf(),
            source: e,
        })?;
        let entry = FileEntry::from_metadata(path.to_path_buf(), &metadata)
            .with_embedded(self.probe.probe(path));
        let resolved = self.resolver.resolve_with_source(&entry);

        Ok(PlannedFile {
            folder: config.date_format.folder_name(resolved.date),
            date: resolved.date,
            date_source: resolved.source,
            size: entry.size,
            source_path: entry.path,
        })
    }
}

/// Number of regular files a run over `config` would process.
pub fn count_candidates(config: &RunConfig) -> Result<usize, EngineError> {
    config.validate()?;
    let entries =
        fs_ops::enumerate_source(&config.source_root, config.recursive, config.include_hidden)?;
    Ok(entries
        .iter()
        .filter(|entry| matches!(entry, SourceEntry::File(_)))
        .count())
}

/// One pass over the source root, yielding a result per entry.
///
/// Finite and not restartable. Stops early, between files, when the
/// organizer's cancel flag is set.
pub struct Run<'a> {
    organizer: &'a Organizer,
    config: RunConfig,
    collisions: CollisionResolver,
    entries: std::vec::IntoIter<SourceEntry>,
    id: Uuid,
    span: Span,
    summary: RunSummary,
    finished: bool,
}

impl<'a> Run<'a> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Counts for the results yielded so far.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Entries not yet processed.
    pub fn remaining(&self) -> usize {
        if self.finished {
            0
        } else {
            self.entries.len()
        }
    }

    /// Drive the run to the end and return its summary.
    pub fn finish(mut self) -> RunSummary {
        for _ in self.by_ref() {}
        self.summary
    }

    fn process(&self, entry: SourceEntry) -> TransferResult {
        match entry {
            SourceEntry::File(path) => self.organize(path),
            SourceEntry::NotAFile(path) => TransferResult::skipped(path, SkipReason::NotAFile),
            SourceEntry::Unreadable { path, error } => {
                let err = FileError::UnreadableSource {
                    path: path.clone(),
                    source: error,
                };
                TransferResult::failed(path, &err)
            }
        }
    }

    fn organize(&self, path: PathBuf) -> TransferResult {
        let planned = match self.organizer.plan(&path, &self.config) {
            Ok(planned) => planned,
            Err(e) => return TransferResult::failed(path, &e),
        };
        let (date, source) = (planned.date, planned.date_source);
        let ops = self.organizer.ops.as_ref();

        let folder = self.config.destination_root.join(&planned.folder);
        if let Err(e) = fs_ops::ensure_dir(ops, &folder) {
            return TransferResult::failed(path, &e).dated(date, source);
        }

        let candidate = folder.join(path.file_name().unwrap_or_default());
        let target = match self.collisions.resolve(&candidate, &path) {
            Ok(Placement::Vacant(target)) => target,
            Ok(Placement::Duplicate(existing)) => {
                return TransferResult::skipped(path, SkipReason::Duplicate)
                    .at(existing)
                    .dated(date, source)
            }
            Err(e) => return TransferResult::failed(path, &e).dated(date, source),
        };

        match fs_ops::transfer(ops, &path, &target, self.config.mode, self.config.compare_with) {
            Ok(bytes) => TransferResult::succeeded(path, target, bytes).dated(date, source),
            Err(e) => TransferResult::failed(path, &e).at(target).dated(date, source),
        }
    }

    fn log_result(result: &TransferResult) {
        let source = result.source_path.display();
        match result.status {
            TransferStatus::Succeeded => info!(
                source = %source,
                destination = ?result.destination_path,
                bytes = result.bytes_written,
                date_source = ?result.date_source,
                "file organized"
            ),
            TransferStatus::Skipped => info!(
                source = %source,
                reason = ?result.skip_reason,
                existing = ?result.destination_path,
                "file skipped"
            ),
            TransferStatus::Failed => warn!(
                source = %source,
                kind = ?result.error_kind,
                os_error = ?result.error_code,
                error = result.error_message.as_deref().unwrap_or_default(),
                "file failed"
            ),
        }
    }

    fn complete(&mut self) {
        self.finished = true;
        self.organizer.cancel.reset();
        let summary = &self.summary;
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            duplicates = summary.duplicates,
            failed = summary.failed,
            bytes = summary.bytes_written,
            cancelled = summary.cancelled,
            "run finished"
        );
    }
}

impl Iterator for Run<'_> {
    type Item = TransferResult;

    fn next(&mut self) -> Option<TransferResult> {
        if self.finished {
            return None;
        }
        let span = self.span.clone();
        let _enter = span.enter();

        if self.organizer.cancel.is_cancelled() && !self.entries.as_slice().is_empty() {
            self.summary.cancelled = true;
            info!(remaining = self.entries.len(), "run cancelled");
            self.complete();
            return None;
        }

        let Some(entry) = self.entries.next() else {
            self.complete();
            return None;
        };

        let result = self.process(entry);
        Self::log_result(&result);
        self.summary.record(&result);
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}
