//! Error types for the media organizer

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media organizer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media organizer
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("Failed to extract video metadata from {path}: {message}")]
    VideoMetadata { path: PathBuf, message: String },

    #[error("Unsupported container format: {path}")]
    UnsupportedContainer { path: PathBuf },

    #[error("FFprobe not found. Please install FFmpeg and ensure ffprobe is in PATH")]
    FfprobeNotFound,

    #[error("Source directory {path} cannot be read: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination directory {path} is not accessible: {source}")]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination {destination} is inside source {source_dir}")]
    DestinationInsideSource {
        source_dir: PathBuf,
        destination: PathBuf,
    },

    #[error("An organize run is already active")]
    RunInProgress,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
