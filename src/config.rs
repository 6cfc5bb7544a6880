//! Configuration types for the media organizer

use crate::classify::{DEFAULT_PHOTO_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS};
use crate::report::LogBuffer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where video shell properties come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MetadataProvider {
    /// Use ffprobe when it is installed, otherwise skip shell properties
    #[default]
    Auto,
    /// Always query ffprobe
    Ffprobe,
    /// Skip shell properties; rely on container tags and file times
    None,
}

/// Configuration for the media organizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory to take media files from
    pub source_dir: Option<PathBuf>,

    /// Directory that receives the date folders
    pub destination_dir: Option<PathBuf>,

    /// Photo extensions, without the leading dot
    pub photo_extensions: Vec<String>,

    /// Video extensions, without the leading dot
    pub video_extensions: Vec<String>,

    /// Video shell metadata provider
    pub metadata_provider: MetadataProvider,

    /// Number of log lines kept in memory
    pub log_capacity: usize,

    /// Restore the source modification time after a move
    pub restore_modified_time: bool,

    /// Verbose output
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: None,
            destination_dir: None,
            photo_extensions: DEFAULT_PHOTO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            video_extensions: DEFAULT_VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            metadata_provider: MetadataProvider::default(),
            log_capacity: LogBuffer::DEFAULT_CAPACITY,
            restore_modified_time: true,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Sample configuration file content
    pub fn sample_config() -> String {
        r#"# Media Organizer Configuration File
# This file uses TOML format (https://toml.io)

# Directory to take photos and videos from
source_dir = "D:/Camera Uploads"

# Directory that receives one folder per day (YYYY-MM-DD)
# Must not be inside source_dir
destination_dir = "D:/Sorted"

# Extensions are matched case-insensitively
photo_extensions = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "heic"]
video_extensions = ["mov", "mp4", "m4v", "avi", "mkv", "wmv", "webm"]

# Video "Media created" / "Date taken" properties: "auto", "ffprobe" or "none"
# - auto: use ffprobe when it is on PATH
# - ffprobe: always use ffprobe
# - none: only container tags and file times
metadata_provider = "auto"

# Log lines kept in memory during a run (oldest are dropped first)
log_capacity = 5000

# Keep the original modification time on moved files
restore_modified_time = true

# Verbose output - show debug logging
verbose = false
"#
        .to_string()
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to write configuration file
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to serialize configuration
    SerializeError { source: toml::ser::Error },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::WriteError { path, source } => {
                write!(f, "Failed to write config file '{}': {}", path.display(), source)
            }
            ConfigError::SerializeError { source } => {
                write!(f, "Failed to serialize config: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::WriteError { source, .. } => Some(source),
            ConfigError::SerializeError { source } => Some(source),
        }
    }
}
