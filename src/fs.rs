//! File system access used by the organizer.
//!
//! The engine only touches the disk through [`Filesystem`], which keeps
//! "not found" distinct from other I/O failures and lets tests inject
//! permission errors without depending on the user running the tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Entries of one directory, split by kind and sorted by name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirListing {
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
}

/// File system operations required by an organize run.
pub trait Filesystem: Send + Sync {
    /// Enumerate the direct children of `dir`.
    fn list_dir(&self, dir: &Path) -> io::Result<DirListing>;

    /// Last-write time of a file.
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Overwrite the last-write time of a file.
    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()>;

    /// Create a directory and its parents; succeeds if it already exists.
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;

    /// Relocate a file in a single operation.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// `Ok(false)` only when nothing occupies `path`.
    fn exists(&self, path: &Path) -> io::Result<bool>;
}

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFilesystem;

impl Filesystem for StdFilesystem {
    fn list_dir(&self, dir: &Path) -> io::Result<DirListing> {
        let mut listing = DirListing::default();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();

            // Symlinks are neither followed nor moved
            if file_type.is_symlink() {
                debug!(?path, "Skipping symbolic link");
            } else if file_type.is_dir() {
                listing.dirs.push(path);
            } else if file_type.is_file() {
                listing.files.push(path);
            }
        }

        listing.files.sort();
        listing.dirs.sort();
        Ok(listing)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()> {
        filetime::set_file_mtime(path, filetime::FileTime::from_system_time(time))
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        match fs::symlink_metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
