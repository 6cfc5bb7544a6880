//! CLI argument parsing with clap

use crate::config::{Config, MetadataProvider};
use clap::Parser;
use std::path::PathBuf;

/// Media Organizer - sorts photos and videos into one folder per day
///
/// Dates come from EXIF for photos, from shell properties and container
/// tags for videos, and from the file modification time when nothing else
/// is available.
#[derive(Parser, Debug)]
#[command(name = "media-organizer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// Settings from the file are used as defaults; CLI arguments override them.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Directory to take media files from
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Directory that receives the date folders
    #[arg(short, long)]
    pub destination: Option<PathBuf>,

    /// Where video "Media created" and "Date taken" come from
    #[arg(long, value_enum)]
    pub metadata_provider: Option<MetadataProvider>,

    /// Write the log file here instead of <exe dir>/Log
    #[arg(long, env = "MEDIA_ORGANIZER_LOG")]
    pub log_file: Option<PathBuf>,

    /// Output log format as JSON
    #[arg(long)]
    pub json_log: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Merge CLI arguments with config from file.
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref source) = self.source {
            config.source_dir = Some(source.clone());
        }
        if let Some(ref destination) = self.destination {
            config.destination_dir = Some(destination.clone());
        }
        if let Some(provider) = self.metadata_provider {
            config.metadata_provider = provider;
        }
        if self.verbose {
            config.verbose = true;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
