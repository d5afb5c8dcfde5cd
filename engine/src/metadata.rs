//! Embedded capture-date readers.
//!
//! Each reader knows one family of file formats and returns the raw
//! timestamp text it finds. A reader prefers a value that parses; if none
//! does it still hands one back, and the date resolver treats it as missing.

use crate::date::parse_embedded_date;
use crate::model::EmbeddedDate;
use exif::{In, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// A capability for reading a capture timestamp out of a file's own metadata.
pub trait CaptureDateReader: Send + Sync {
    /// Short name recorded alongside the value, e.g. `exif`.
    fn name(&self) -> &'static str;

    /// Whether this reader understands the file at `path` (usually by extension).
    fn supports(&self, path: &Path) -> bool;

    /// Raw timestamp text, or `None` if the file carries none or cannot be read.
    fn read(&self, path: &Path) -> Option<String>;
}

/// Extensions of containers kamadak-exif can pull an EXIF block out of.
const EXIF_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "jfif", "tif", "tiff", "png", "webp", "heic", "heif", "avif",
];

/// Capture tags in order of preference.
const CAPTURE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

/// EXIF capture date from image containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifCaptureReader;

impl CaptureDateReader for ExifCaptureReader {
    fn name(&self) -> &'static str {
        "exif"
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| EXIF_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn read(&self, path: &Path) -> Option<String> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot open file for exif");
                return None;
            }
        };

        let exif = match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
            Ok(exif) => exif,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no usable exif block");
                return None;
            }
        };

        let candidates: Vec<(Tag, String)> = CAPTURE_TAGS
            .iter()
            .filter_map(|tag| {
                let field = exif.get_field(*tag, In::PRIMARY)?;
                let text = match &field.value {
                    Value::Ascii(values) => values
                        .iter()
                        .map(|raw| String::from_utf8_lossy(raw).trim().to_string())
                        .find(|text| !text.is_empty())?,
                    // Wrong type for a date tag; its rendering never parses
                    _ => field.display_value().to_string(),
                };
                Some((*tag, text))
            })
            .collect();

        // Cameras write all zeros for an unknown DateTimeOriginal; fall
        // through to the next tag instead of giving up on embedded data
        if let Some((tag, text)) = candidates
            .iter()
            .find(|(_, text)| parse_embedded_date(text).is_some())
        {
            debug!(path = %path.display(), tag = %tag, "embedded capture date found");
            return Some(text.clone());
        }
        candidates.into_iter().next().map(|(_, text)| text)
    }
}

/// An ordered set of readers; the first one that supports a file and finds a
/// value wins.
pub struct MetadataProbe {
    readers: Vec<Box<dyn CaptureDateReader>>,
}

impl MetadataProbe {
    pub fn new(readers: Vec<Box<dyn CaptureDateReader>>) -> Self {
        MetadataProbe { readers }
    }

    /// A probe that never reads embedded metadata.
    pub fn none() -> Self {
        MetadataProbe { readers: Vec::new() }
    }

    pub fn probe(&self, path: &Path) -> Option<EmbeddedDate> {
        self.readers
            .iter()
            .filter(|reader| reader.supports(path))
            .find_map(|reader| {
                reader.read(path).map(|raw| EmbeddedDate {
                    reader: reader.name(),
                    raw,
                })
            })
    }
}

impl Default for MetadataProbe {
    fn default() -> Self {
        MetadataProbe::new(vec![Box::new(ExifCaptureReader)])
    }
}
