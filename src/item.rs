//! Classified media file with its resolved date

use crate::classify::MediaKind;
use crate::fs::Filesystem;
use crate::time::{DateResolver, TimeSource};
use chrono::NaiveDateTime;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// A media file found during traversal.
///
/// The date is resolved once, in [`FoundItem::resolve`], and the destination
/// folder is always derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundItem {
    kind: MediaKind,
    source_path: PathBuf,
    date_taken: NaiveDateTime,
    time_source: TimeSource,
}

impl FoundItem {
    pub fn new(
        kind: MediaKind,
        source_path: impl Into<PathBuf>,
        date_taken: NaiveDateTime,
        time_source: TimeSource,
    ) -> Self {
        Self {
            kind,
            source_path: source_path.into(),
            date_taken,
            time_source,
        }
    }

    /// Resolve the date of `path` and build the item.
    ///
    /// `None` when even the file system time is unreadable.
    pub fn resolve(
        kind: MediaKind,
        path: &Path,
        resolver: &DateResolver,
        fs: &dyn Filesystem,
    ) -> Option<Self> {
        let time = resolver.resolve(kind, path, fs)?;
        Some(Self::new(kind, path, time.timestamp, time.source))
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn date_taken(&self) -> NaiveDateTime {
        self.date_taken
    }

    pub fn time_source(&self) -> TimeSource {
        self.time_source
    }

    /// Destination folder name, `YYYY-MM-DD`
    pub fn destination_sub_path(&self) -> String {
        self.date_taken.format("%Y-%m-%d").to_string()
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.source_path.file_name()
    }
}
