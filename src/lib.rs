//! Media Organizer - sorts photos and videos into date folders
//!
//! This library moves media files from a source tree into
//! `destination/YYYY-MM-DD/` folders with support for:
//! - EXIF date extraction for images
//! - shell property and container tag dates for videos
//! - file system time as the last fallback
//! - collision-free renaming (`name_1.ext`, `name_2.ext`, ...)
//! - cooperative cancellation and per-directory failure isolation

pub mod cancel;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod item;
pub mod organize;
pub mod report;
pub mod time;

pub use cancel::CancellationToken;
pub use classify::{ItemClassifier, MediaKind};
pub use cli::Cli;
pub use config::{Config, ConfigError, MetadataProvider};
pub use error::{Error, Result};
pub use fs::{DirListing, Filesystem, StdFilesystem};
pub use item::FoundItem;
pub use organize::{Organizer, RunHandle, RunSummary, resolve_collision};
pub use report::{ChannelReporter, LogBuffer, LogEntry, Reporter, RunEvent};
pub use time::{DateResolver, ExtractedTime, TimeSource, resolve_photo_date, resolve_video_date};
