//! Date resolution.
//!
//! A file's date comes from the first source, in priority order, that yields
//! one. Sources are `DateExtractor` implementations; the default order is the
//! embedded capture date, then the filesystem creation time, then the
//! last-modified time. Resolution never fails: when nothing is available the
//! epoch day is used.

use crate::model::{DateSource, FileEntry};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use std::time::SystemTime;
use tracing::debug;

/// Timestamp layouts accepted for embedded dates, most specific first.
const EMBEDDED_DATETIME_FORMATS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];
const EMBEDDED_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y:%m:%d"];

/// One source of a file's date.
pub trait DateExtractor: Send + Sync {
    fn source(&self) -> DateSource;

    /// The calendar day this source reports, or `None` if it has nothing
    /// usable for this entry.
    fn extract(&self, entry: &FileEntry) -> Option<NaiveDate>;
}

/// Date embedded in the file itself (e.g. EXIF DateTimeOriginal).
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedCaptureDate;

impl DateExtractor for EmbeddedCaptureDate {
    fn source(&self) -> DateSource {
        DateSource::Embedded
    }

    fn extract(&self, entry: &FileEntry) -> Option<NaiveDate> {
        let embedded = entry.embedded.as_ref()?;
        let parsed = parse_embedded_date(&embedded.raw);
        if parsed.is_none() {
            debug!(
                path = %entry.path.display(),
                reader = embedded.reader,
                raw = %embedded.raw,
                "malformed embedded date; falling back"
            );
        }
        parsed
    }
}

/// Filesystem creation (birth) time.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreationTime;

impl DateExtractor for CreationTime {
    fn source(&self) -> DateSource {
        DateSource::Created
    }

    fn extract(&self, entry: &FileEntry) -> Option<NaiveDate> {
        entry.created.map(local_date)
    }
}

/// Filesystem last-modified time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModificationTime;

impl DateExtractor for ModificationTime {
    fn source(&self) -> DateSource {
        DateSource::Modified
    }

    fn extract(&self, entry: &FileEntry) -> Option<NaiveDate> {
        entry.modified.map(local_date)
    }
}

/// A date together with the source that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    pub source: DateSource,
}

pub struct DateResolver {
    extractors: Vec<Box<dyn DateExtractor>>,
}

impl DateResolver {
    /// Build a resolver that tries `extractors` in the given order.
    pub fn new(extractors: Vec<Box<dyn DateExtractor>>) -> Self {
        DateResolver { extractors }
    }

    pub fn resolve(&self, entry: &FileEntry) -> NaiveDate {
        self.resolve_with_source(entry).date
    }

    pub fn resolve_with_source(&self, entry: &FileEntry) -> ResolvedDate {
        self.extractors
            .iter()
            .find_map(|extractor| {
                extractor.extract(entry).map(|date| ResolvedDate {
                    date,
                    source: extractor.source(),
                })
            })
            .unwrap_or_else(|| {
                debug!(path = %entry.path.display(), "no date source available; using fallback");
                ResolvedDate {
                    date: fallback_date(),
                    source: DateSource::Fallback,
                }
            })
    }
}

impl Default for DateResolver {
    fn default() -> Self {
        DateResolver::new(vec![
            Box::new(EmbeddedCaptureDate),
            Box::new(CreationTime),
            Box::new(ModificationTime),
        ])
    }
}

/// The day used when no source yields a date: 1970-01-01.
pub fn fallback_date() -> NaiveDate {
    NaiveDate::default()
}

/// Parse an embedded timestamp down to its calendar day.
///
/// Accepts the EXIF layout `YYYY:MM:DD HH:MM:SS` plus the common ISO-like
/// variants; surrounding whitespace, quotes and NUL padding are ignored. The
/// EXIF "unknown" value of all zeros does not parse.
pub fn parse_embedded_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\0');
    if text.is_empty() {
        return None;
    }

    EMBEDDED_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|datetime| datetime.date())
        .or_else(|| {
            EMBEDDED_DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        })
}

fn local_date(time: SystemTime) -> NaiveDate {
    DateTime::<Local>::from(time).date_naive()
}
