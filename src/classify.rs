//! Media classification by file extension

use crate::config::Config;
use std::path::Path;

/// Kind of media a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }
}

/// Default photo extensions
pub const DEFAULT_PHOTO_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "heic"];

/// Default video extensions
pub const DEFAULT_VIDEO_EXTENSIONS: [&str; 7] = ["mov", "mp4", "m4v", "avi", "mkv", "wmv", "webm"];

/// Maps file paths to a [`MediaKind`]
#[derive(Debug, Clone)]
pub struct ItemClassifier {
    photo_extensions: Vec<String>,
    video_extensions: Vec<String>,
}

impl Default for ItemClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PHOTO_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS)
    }
}

impl ItemClassifier {
    /// Build a classifier from extension lists.
    ///
    /// Extensions are matched case-insensitively and may carry a leading dot.
    pub fn new<P, V>(photo: P, video: V) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        Self {
            photo_extensions: photo.into_iter().map(normalize_extension).collect(),
            video_extensions: video.into_iter().map(normalize_extension).collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.photo_extensions, &config.video_extensions)
    }

    /// Kind implied by the extension alone
    pub fn kind_of_extension(&self, path: &Path) -> Option<MediaKind> {
        let ext = path.extension()?.to_str()?.to_lowercase();

        if self.video_extensions.contains(&ext) {
            Some(MediaKind::Video)
        } else if self.photo_extensions.contains(&ext) {
            Some(MediaKind::Photo)
        } else {
            None
        }
    }

    /// Classify an existing file.
    ///
    /// Returns `None` for unrecognized extensions and for paths that are not
    /// regular files. Neither case is an error.
    pub fn classify(&self, path: &Path) -> Option<MediaKind> {
        if !path.is_file() {
            return None;
        }
        self.kind_of_extension(path)
    }
}

fn normalize_extension(ext: impl AsRef<str>) -> String {
    ext.as_ref().trim_start_matches('.').to_lowercase()
}
