//! Video date resolution
//!
//! Sources are tried in order:
//! 1. shell property "Media created"
//! 2. shell property "Date taken"
//! 3. the `com.apple.quicktime` / `creationdate` vendor box
//! 4. the container's generic "date tagged" value
//! 5. the container's "year" value, as January 1 of that year
//!
//! Each source fails on its own; a broken provider never stops the chain.

use crate::error::Result;
use crate::time::container::Mp4TagReader;
use crate::time::parse::{DateCulture, parse_container_datetime, parse_shell_datetime};
use crate::time::probe::NoShellProvider;
use crate::time::{ExtractedTime, TimeSource};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, trace};

/// Namespace of Apple's QuickTime metadata keys
pub const QUICKTIME_NAMESPACE: &str = "com.apple.quicktime";

/// Key holding the recording date inside [`QUICKTIME_NAMESPACE`]
pub const CREATION_DATE_KEY: &str = "creationdate";

/// A year tag is trusted only strictly inside this range
const YEAR_RANGE: (u32, u32) = (1900, 2100);

/// Named properties a shell metadata provider can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellProperty {
    MediaCreated,
    DateTaken,
}

impl ShellProperty {
    /// Properties in the order they are tried
    pub const PRIORITY: [ShellProperty; 2] = [ShellProperty::MediaCreated, ShellProperty::DateTaken];

    pub fn display_name(self) -> &'static str {
        match self {
            ShellProperty::MediaCreated => "Media created",
            ShellProperty::DateTaken => "Date taken",
        }
    }

    fn time_source(self) -> TimeSource {
        match self {
            ShellProperty::MediaCreated => TimeSource::ShellMediaCreated,
            ShellProperty::DateTaken => TimeSource::ShellDateTaken,
        }
    }
}

/// Platform metadata provider that renders file properties as display strings.
///
/// `Ok(None)` means the property is not set for this file; `Err` means the
/// provider itself could not be reached.
pub trait ShellMetadataProvider: Send + Sync {
    fn property(
        &self,
        dir: &Path,
        file_name: &OsStr,
        property: ShellProperty,
    ) -> Result<Option<String>>;
}

/// Tags read from a video container
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContainerTags {
    /// Generic "date tagged" value
    pub date_tagged: Option<NaiveDateTime>,
    /// Generic "year" value
    pub year: Option<u32>,
    /// Namespaced vendor boxes keyed by (namespace, name)
    dash_boxes: HashMap<(String, String), String>,
}

impl ContainerTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a namespaced vendor box
    pub fn dash_box(&self, namespace: &str, name: &str) -> Option<&str> {
        self.dash_boxes
            .get(&(namespace.to_string(), name.to_string()))
            .map(String::as_str)
    }

    /// Record a vendor box; the first value seen for a key is kept
    pub fn insert_dash_box(
        &mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.dash_boxes
            .entry((namespace.into(), name.into()))
            .or_insert_with(|| value.into());
    }
}

/// Reads embedded tags from a video container
pub trait ContainerTagReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<ContainerTags>;
}

/// Resolves a video's recording date
pub struct VideoDateResolver {
    shell: Box<dyn ShellMetadataProvider>,
    container: Box<dyn ContainerTagReader>,
    culture: DateCulture,
}

impl Default for VideoDateResolver {
    fn default() -> Self {
        Self::new(NoShellProvider, Mp4TagReader)
    }
}

impl VideoDateResolver {
    pub fn new(
        shell: impl ShellMetadataProvider + 'static,
        container: impl ContainerTagReader + 'static,
    ) -> Self {
        Self::from_boxed(Box::new(shell), Box::new(container))
    }

    pub fn from_boxed(
        shell: Box<dyn ShellMetadataProvider>,
        container: Box<dyn ContainerTagReader>,
    ) -> Self {
        Self {
            shell,
            container,
            culture: DateCulture::current(),
        }
    }

    /// Override the culture used for the first shell parse attempt
    pub fn with_culture(mut self, culture: DateCulture) -> Self {
        self.culture = culture;
        self
    }

    /// Try the shell and container sources in order.
    pub fn resolve_metadata(&self, path: &Path) -> Option<ExtractedTime> {
        self.from_shell(path).or_else(|| self.from_container(path))
    }

    fn from_shell(&self, path: &Path) -> Option<ExtractedTime> {
        let file_name = path.file_name()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        for property in ShellProperty::PRIORITY {
            let raw = match self.shell.property(dir, file_name, property) {
                Ok(Some(raw)) if !raw.trim().is_empty() => raw,
                Ok(_) => {
                    trace!(?path, property = property.display_name(), "Shell property empty");
                    continue;
                }
                Err(e) => {
                    debug!(?path, property = property.display_name(), error = %e, "Shell provider unavailable");
                    continue;
                }
            };

            if let Some(timestamp) = parse_shell_datetime(&raw, self.culture) {
                trace!(?path, property = property.display_name(), %timestamp, "Found shell date");
                return Some(ExtractedTime {
                    timestamp,
                    source: property.time_source(),
                });
            }
            trace!(?path, property = property.display_name(), raw = %raw, "Unparsable shell date");
        }

        None
    }

    fn from_container(&self, path: &Path) -> Option<ExtractedTime> {
        let tags = match self.container.read(path) {
            Ok(tags) => tags,
            Err(e) => {
                debug!(?path, error = %e, "Container tags unavailable");
                return None;
            }
        };

        if let Some(raw) = tags.dash_box(QUICKTIME_NAMESPACE, CREATION_DATE_KEY) {
            if let Some(timestamp) = parse_container_datetime(raw) {
                trace!(?path, %timestamp, "Found QuickTime creation date");
                return Some(ExtractedTime {
                    timestamp,
                    source: TimeSource::ContainerCreationDate,
                });
            }
            trace!(?path, raw, "Unparsable QuickTime creation date");
        }

        if let Some(timestamp) = tags.date_tagged {
            trace!(?path, %timestamp, "Found container date tagged");
            return Some(ExtractedTime {
                timestamp,
                source: TimeSource::ContainerDateTagged,
            });
        }

        if let Some(year) = tags.year
            && year > YEAR_RANGE.0
            && year < YEAR_RANGE.1
            && let Some(timestamp) =
                NaiveDate::from_ymd_opt(year as i32, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            trace!(?path, year, "Using container year");
            return Some(ExtractedTime {
                timestamp,
                source: TimeSource::ContainerYear,
            });
        }

        None
    }
}
