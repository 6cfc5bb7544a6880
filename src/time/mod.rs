//! Time extraction module
//!
//! This module resolves the capture date of a media file through an ordered
//! fallback chain:
//! - EXIF metadata for photos
//! - shell properties and container tags for videos
//! - file system last-write time, which always answers for an existing file

pub mod container;
pub mod exif;
pub mod parse;
pub mod probe;
pub mod video;

use crate::classify::MediaKind;
use crate::config::{Config, MetadataProvider};
use crate::error::Result;
use crate::fs::{Filesystem, StdFilesystem};
use chrono::{DateTime, Local, NaiveDateTime};
use std::path::Path;
use tracing::{debug, warn};

pub use exif::PhotoDateResolver;
pub use video::VideoDateResolver;

/// Source of the extracted timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// EXIF DateTimeOriginal
    ExifOriginal,
    /// EXIF DateTimeDigitized
    ExifDigitized,
    /// EXIF DateTime
    ExifDateTime,
    /// Shell "Media created" property
    ShellMediaCreated,
    /// Shell "Date taken" property
    ShellDateTaken,
    /// `com.apple.quicktime` creation date box
    ContainerCreationDate,
    /// Container "date tagged" value
    ContainerDateTagged,
    /// Container "year" value (January 1)
    ContainerYear,
    /// File system last-write time
    FileSystem,
}

/// Result of timestamp extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedTime {
    /// The extracted timestamp, in local time
    pub timestamp: NaiveDateTime,
    /// Source of the timestamp
    pub source: TimeSource,
}

/// Last-write time of `path` in local time
pub fn file_system_time(path: &Path, fs: &dyn Filesystem) -> Result<NaiveDateTime> {
    let modified = fs.modified(path)?;
    let datetime: DateTime<Local> = modified.into();
    Ok(datetime.naive_local())
}

/// Date resolution for every media kind
pub struct DateResolver {
    photo: PhotoDateResolver,
    video: VideoDateResolver,
}

impl Default for DateResolver {
    fn default() -> Self {
        Self::new(PhotoDateResolver::default(), VideoDateResolver::default())
    }
}

impl DateResolver {
    pub fn new(photo: PhotoDateResolver, video: VideoDateResolver) -> Self {
        Self { photo, video }
    }

    /// Build the resolvers selected by configuration
    pub fn from_config(config: &Config) -> Self {
        let shell: Box<dyn video::ShellMetadataProvider> = match config.metadata_provider {
            MetadataProvider::Ffprobe => Box::new(probe::FfprobeProvider::new()),
            MetadataProvider::Auto if probe::is_ffprobe_available() => {
                Box::new(probe::FfprobeProvider::new())
            }
            MetadataProvider::Auto | MetadataProvider::None => Box::new(probe::NoShellProvider),
        };
        debug!(provider = ?config.metadata_provider, "Configured video metadata provider");

        Self::new(
            PhotoDateResolver::default(),
            VideoDateResolver::from_boxed(shell, Box::new(container::Mp4TagReader)),
        )
    }

    /// Resolve the capture date of `path`.
    ///
    /// Falls back to the last-write time when no metadata source answers.
    /// Returns `None` only if that time cannot be read either, which means
    /// the file no longer exists.
    pub fn resolve(&self, kind: MediaKind, path: &Path, fs: &dyn Filesystem) -> Option<ExtractedTime> {
        let from_metadata = match kind {
            MediaKind::Photo => self.photo.resolve_metadata(path),
            MediaKind::Video => self.video.resolve_metadata(path),
        };
        if let Some(time) = from_metadata {
            debug!(?path, source = ?time.source, timestamp = %time.timestamp, "Resolved date from metadata");
            return Some(time);
        }

        match file_system_time(path, fs) {
            Ok(timestamp) => {
                debug!(?path, %timestamp, "Using file system modification time as fallback");
                Some(ExtractedTime {
                    timestamp,
                    source: TimeSource::FileSystem,
                })
            }
            Err(e) => {
                warn!(?path, error = %e, "Cannot read file system time");
                None
            }
        }
    }
}

/// Resolve a photo's capture date with the default EXIF reader
pub fn resolve_photo_date(path: &Path) -> Option<NaiveDateTime> {
    DateResolver::default()
        .resolve(MediaKind::Photo, path, &StdFilesystem)
        .map(|time| time.timestamp)
}

/// Resolve a video's recording date with the default container reader
pub fn resolve_video_date(path: &Path) -> Option<NaiveDateTime> {
    DateResolver::default()
        .resolve(MediaKind::Video, path, &StdFilesystem)
        .map(|time| time.timestamp)
}
