//! Shell metadata providers
//!
//! The resolver asks a provider for display properties such as "Media
//! created". Two implementations live here: FFprobe, which reads the same
//! container tags a desktop shell shows, and a provider that never answers.

use crate::error::{Error, Result};
use crate::time::parse::parse_container_datetime;
use crate::time::video::{ShellMetadataProvider, ShellProperty};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, OnceLock};
use tracing::trace;

/// Cached FFprobe availability check
static FFPROBE_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Check if ffprobe is available (cached)
pub fn is_ffprobe_available() -> bool {
    *FFPROBE_AVAILABLE.get_or_init(|| Command::new("ffprobe").arg("-version").output().is_ok())
}

/// Provider that reports every property as unset
#[derive(Debug, Default, Clone, Copy)]
pub struct NoShellProvider;

impl ShellMetadataProvider for NoShellProvider {
    fn property(
        &self,
        _dir: &Path,
        _file_name: &OsStr,
        _property: ShellProperty,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Tag keys that back each shell property, in priority order
fn tag_keys(property: ShellProperty) -> &'static [&'static str] {
    match property {
        ShellProperty::MediaCreated => &["creation_time"],
        ShellProperty::DateTaken => &["date", "date_recorded"],
    }
}

/// Provider backed by `ffprobe -show_format -show_streams`.
///
/// The last probe is cached so asking for both properties of one file runs
/// ffprobe once. UTC tag values are rendered in local time, the way a shell
/// displays them.
#[derive(Debug, Default)]
pub struct FfprobeProvider {
    last: Mutex<Option<(PathBuf, serde_json::Value)>>,
}

impl FfprobeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn probe(&self, path: &Path) -> Result<serde_json::Value> {
        if let Ok(last) = self.last.lock()
            && let Some((cached_path, json)) = last.as_ref()
            && cached_path == path
        {
            return Ok(json.clone());
        }

        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .map_err(|e| Error::VideoMetadata {
                path: path.to_path_buf(),
                message: format!("Failed to execute ffprobe: {}", e),
            })?;

        if !output.status.success() {
            return Err(Error::VideoMetadata {
                path: path.to_path_buf(),
                message: format!(
                    "FFprobe failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        trace!(?path, "FFprobe output: {}", json);

        if let Ok(mut last) = self.last.lock() {
            *last = Some((path.to_path_buf(), json.clone()));
        }
        Ok(json)
    }
}

impl ShellMetadataProvider for FfprobeProvider {
    fn property(
        &self,
        dir: &Path,
        file_name: &OsStr,
        property: ShellProperty,
    ) -> Result<Option<String>> {
        if !is_ffprobe_available() {
            return Err(Error::FfprobeNotFound);
        }

        let json = self.probe(&dir.join(file_name))?;
        Ok(find_tag(&json, tag_keys(property)).map(display_value))
    }
}

/// Find the first matching tag in format tags, then in stream tags
fn find_tag<'a>(json: &'a serde_json::Value, keys: &[&str]) -> Option<&'a str> {
    let lookup = |tags: &'a serde_json::Value| {
        keys.iter().find_map(|key| {
            tags.get(*key)
                .or_else(|| tags.get(key.to_uppercase()))
                .and_then(|v| v.as_str())
        })
    };

    if let Some(tags) = json.get("format").and_then(|f| f.get("tags"))
        && let Some(value) = lookup(tags)
    {
        return Some(value);
    }

    json.get("streams")
        .and_then(|s| s.as_array())?
        .iter()
        .filter_map(|stream| stream.get("tags"))
        .find_map(lookup)
}

fn display_value(raw: &str) -> String {
    match parse_container_datetime(raw) {
        Some(local) => local.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => raw.to_string(),
    }
}
