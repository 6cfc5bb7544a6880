//! EXIF date resolution for images

use crate::error::{Error, Result};
use crate::time::parse::parse_exif_datetime;
use crate::time::{ExtractedTime, TimeSource};
use exif::{In, Reader, Tag, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, trace};

/// EXIF date fields, declared in resolution priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExifDateField {
    /// When the original image was taken
    DateTimeOriginal,
    /// When the image was digitized
    DateTimeDigitized,
    /// Generic date/time, usually the last in-camera modification
    DateTime,
}

impl ExifDateField {
    /// Fields in the order they are tried
    pub const PRIORITY: [ExifDateField; 3] = [
        ExifDateField::DateTimeOriginal,
        ExifDateField::DateTimeDigitized,
        ExifDateField::DateTime,
    ];

    fn tag(self) -> Tag {
        match self {
            ExifDateField::DateTimeOriginal => Tag::DateTimeOriginal,
            ExifDateField::DateTimeDigitized => Tag::DateTimeDigitized,
            ExifDateField::DateTime => Tag::DateTime,
        }
    }

    fn time_source(self) -> TimeSource {
        match self {
            ExifDateField::DateTimeOriginal => TimeSource::ExifOriginal,
            ExifDateField::DateTimeDigitized => TimeSource::ExifDigitized,
            ExifDateField::DateTime => TimeSource::ExifDateTime,
        }
    }
}

/// Raw text of the EXIF date fields present in one image
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PhotoTags {
    fields: BTreeMap<ExifDateField, String>,
}

impl PhotoTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for fakes
    pub fn with_field(mut self, field: ExifDateField, raw: impl Into<String>) -> Self {
        self.insert(field, raw);
        self
    }

    pub fn insert(&mut self, field: ExifDateField, raw: impl Into<String>) {
        self.fields.insert(field, raw.into());
    }

    /// Raw value of `field`, or `None` when the image does not carry it
    pub fn get(&self, field: ExifDateField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }
}

/// Reads EXIF date fields from an image file
pub trait PhotoMetadataReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<PhotoTags>;
}

/// [`PhotoMetadataReader`] backed by `kamadak-exif`
#[derive(Debug, Default, Clone, Copy)]
pub struct KamadakExifReader;

impl PhotoMetadataReader for KamadakExifReader {
    fn read(&self, path: &Path) -> Result<PhotoTags> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let exif = Reader::new()
            .read_from_container(&mut reader)
            .map_err(|e| Error::ExifRead {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut tags = PhotoTags::new();
        for field in ExifDateField::PRIORITY {
            if let Some(entry) = exif.get_field(field.tag(), In::PRIMARY)
                && let Some(text) = ascii_text(&entry.value)
            {
                tags.insert(field, text);
            }
        }

        Ok(tags)
    }
}

fn ascii_text(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Resolves an image's capture date from its EXIF fields
pub struct PhotoDateResolver {
    reader: Box<dyn PhotoMetadataReader>,
}

impl Default for PhotoDateResolver {
    fn default() -> Self {
        Self::new(KamadakExifReader)
    }
}

impl PhotoDateResolver {
    pub fn new(reader: impl PhotoMetadataReader + 'static) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    /// Try the EXIF fields in priority order.
    ///
    /// Returns `None` when the file cannot be opened as an image, carries no
    /// EXIF block, or none of the fields hold a well-formed date.
    pub fn resolve_metadata(&self, path: &Path) -> Option<ExtractedTime> {
        let tags = match self.reader.read(path) {
            Ok(tags) => tags,
            Err(e) => {
                debug!(?path, error = %e, "EXIF unavailable");
                return None;
            }
        };

        for field in ExifDateField::PRIORITY {
            match tags.get(field).map(|raw| (raw, parse_exif_datetime(raw))) {
                Some((_, Some(timestamp))) => {
                    trace!(?path, ?field, %timestamp, "Found EXIF date");
                    return Some(ExtractedTime {
                        timestamp,
                        source: field.time_source(),
                    });
                }
                Some((raw, None)) => trace!(?path, ?field, raw, "Malformed EXIF date"),
                None => trace!(?path, ?field, "EXIF field absent"),
            }
        }

        None
    }
}
