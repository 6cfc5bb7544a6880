//! Organizer engine
//!
//! Walks a source tree depth-first (files before subdirectories), resolves
//! each media file's date and moves it to `destination/YYYY-MM-DD/`.
//!
//! Failures stay local: an unreadable directory skips only its own subtree
//! and a failed move only counts one error. Cancellation is polled before
//! each file and before each subdirectory.

use crate::cancel::CancellationToken;
use crate::classify::ItemClassifier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fs::{DirListing, Filesystem, StdFilesystem};
use crate::item::FoundItem;
use crate::report::{ChannelReporter, Reporter, RunEvent};
use crate::time::DateResolver;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;
use tracing::{Level, debug, error, info, span, warn};
use walkdir::WalkDir;

/// Counters of one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Files moved
    pub processed: usize,
    /// Files that could not be moved
    pub errors: usize,
    /// The run stopped at a cancellation checkpoint
    pub cancelled: bool,
}

impl RunSummary {
    fn closing_line(&self) -> String {
        if self.cancelled {
            format!(
                "Operation cancelled by user. Processed {} files with {} errors.",
                self.processed, self.errors
            )
        } else {
            format!(
                "Complete! Processed {} files with {} errors.",
                self.processed, self.errors
            )
        }
    }

    /// Closing line when the run could not start
    fn aborted_line(&self) -> String {
        format!(
            "Aborted. Processed {} files with {} errors.",
            self.processed, self.errors
        )
    }
}

/// Mutable state of a run, owned by the thread doing the traversal
struct RunContext<'r> {
    destination: &'r Path,
    cancel: &'r CancellationToken,
    reporter: &'r mut dyn Reporter,
    summary: RunSummary,
}

impl RunContext<'_> {
    /// Cancellation checkpoint
    fn should_stop(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            self.summary.cancelled = true;
        }
        self.summary.cancelled
    }

    fn log(&mut self, message: &str) {
        self.reporter.on_log_entry(message, false);
    }

    fn progress(&mut self) {
        self.reporter
            .on_progress(self.summary.processed, self.summary.errors);
    }
}

/// Clears the running flag when dropped
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Handle to a run started with [`Organizer::spawn`]
pub struct RunHandle {
    token: CancellationToken,
    events: Receiver<RunEvent>,
    handle: JoinHandle<Result<RunSummary>>,
}

impl RunHandle {
    /// Ask the run to stop at its next checkpoint
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Events in emission order; the channel closes when the worker exits
    pub fn events(&self) -> &Receiver<RunEvent> {
        &self.events
    }

    /// Wait for the worker to finish
    pub fn join(self) -> Result<RunSummary> {
        self.handle
            .join()
            .map_err(|_| Error::Io(io::Error::other("organize worker panicked")))?
    }
}

/// Sorts media files into date folders
pub struct Organizer {
    classifier: ItemClassifier,
    resolver: DateResolver,
    fs: Box<dyn Filesystem>,
    restore_modified_time: bool,
    running: AtomicBool,
}

impl Default for Organizer {
    fn default() -> Self {
        Self::new(ItemClassifier::default(), DateResolver::default(), StdFilesystem)
    }
}

impl Organizer {
    pub fn new(
        classifier: ItemClassifier,
        resolver: DateResolver,
        fs: impl Filesystem + 'static,
    ) -> Self {
        Self {
            classifier,
            resolver,
            fs: Box::new(fs),
            restore_modified_time: true,
            running: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ItemClassifier::from_config(config),
            DateResolver::from_config(config),
            StdFilesystem,
        )
        .with_restore_modified_time(config.restore_modified_time)
    }

    /// Put back the source's modification time when a move changes it
    pub fn with_restore_modified_time(mut self, restore: bool) -> Self {
        self.restore_modified_time = restore;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn claim(&self) -> Result<()> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| Error::RunInProgress)
    }

    /// Number of classifiable files under `source`, for progress totals
    pub fn count_media(&self, source: &Path) -> usize {
        WalkDir::new(source)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.classifier.kind_of_extension(e.path()).is_some())
            .count()
    }

    /// Organize `source` into `destination` on the calling thread.
    ///
    /// Returns `Err` only when the run cannot start: missing source,
    /// destination that cannot be created or lies inside the source, or
    /// another run already active on this organizer.
    pub fn run(
        &self,
        source: &Path,
        destination: &Path,
        cancel: &CancellationToken,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary> {
        self.claim()?;
        let _guard = RunGuard {
            running: &self.running,
        };
        self.execute(source, destination, cancel, reporter)
    }

    /// Start a run on a background thread.
    ///
    /// Events arrive on [`RunHandle::events`]. Exactly one
    /// [`RunEvent::Finished`] ends every run, aborted ones included, and is
    /// sent after this organizer accepts new runs.
    pub fn spawn(
        self: &Arc<Self>,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Result<RunHandle> {
        self.claim()?;

        let source = source.into();
        let destination = destination.into();
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();

        let organizer = Arc::clone(self);
        let worker_token = token.clone();
        let spawned = thread::Builder::new()
            .name("organize-run".into())
            .spawn(move || {
                let mut reporter = ChannelReporter::new(tx);
                let guard = RunGuard {
                    running: &organizer.running,
                };
                let result = organizer.execute(&source, &destination, &worker_token, &mut reporter);
                drop(guard);

                reporter.finish(result.as_ref().copied().unwrap_or_default());
                result
            });

        match spawned {
            Ok(handle) => Ok(RunHandle {
                token,
                events: rx,
                handle,
            }),
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    fn execute(
        &self,
        source: &Path,
        destination: &Path,
        cancel: &CancellationToken,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary> {
        let _span = span!(Level::INFO, "organize_run", ?source, ?destination).entered();

        if let Err(e) = self.prepare(source, destination) {
            error!(error = %e, "Cannot start organize run");
            reporter.on_log_entry(&format!("Error: {}", e), true);
            reporter.on_log_entry(&RunSummary::default().aborted_line(), true);
            return Err(e);
        }

        info!("Starting organization");
        reporter.on_log_entry(
            &format!(
                "Starting organization of {} into {}",
                source.display(),
                destination.display()
            ),
            true,
        );

        let mut ctx = RunContext {
            destination,
            cancel,
            reporter,
            summary: RunSummary::default(),
        };
        if !ctx.should_stop() {
            self.visit_dir(source, &mut ctx);
        }

        let summary = ctx.summary;
        if summary.cancelled {
            warn!(processed = summary.processed, errors = summary.errors, "Organize run cancelled");
        } else {
            info!(processed = summary.processed, errors = summary.errors, "Organize run complete");
        }
        ctx.reporter.on_log_entry(&summary.closing_line(), true);

        Ok(summary)
    }

    /// Top-level checks. A source root that exists but cannot be listed is
    /// left to the traversal, which reports it like any other denied folder.
    fn prepare(&self, source: &Path, destination: &Path) -> Result<()> {
        let source_missing = |e: io::Error| Error::SourceUnavailable {
            path: source.to_path_buf(),
            source: e,
        };
        if !self.fs.exists(source).map_err(source_missing)? {
            return Err(source_missing(io::Error::new(
                io::ErrorKind::NotFound,
                "no such directory",
            )));
        }

        let source_dir = canonical_or_absolute(source);
        let target = canonical_or_absolute(destination);
        if target.starts_with(&source_dir) {
            return Err(Error::DestinationInsideSource {
                source_dir,
                destination: target,
            });
        }

        self.fs
            .create_dir_all(destination)
            .map_err(|e| Error::DestinationUnavailable {
                path: destination.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn visit_dir(&self, dir: &Path, ctx: &mut RunContext<'_>) {
        match self.fs.list_dir(dir) {
            Ok(listing) => self.visit_listing(listing, ctx),
            Err(e) => {
                warn!(?dir, error = %e, "Skipping unreadable directory");
                ctx.log(&format!("Access denied: {}", dir.display()));
            }
        }
    }

    fn visit_listing(&self, listing: DirListing, ctx: &mut RunContext<'_>) {
        for file in &listing.files {
            if ctx.should_stop() {
                return;
            }
            self.process_file(file, ctx);
        }

        for dir in &listing.dirs {
            if ctx.should_stop() {
                return;
            }
            self.visit_dir(dir, ctx);
        }
    }

    fn process_file(&self, path: &Path, ctx: &mut RunContext<'_>) {
        let Some(kind) = self.classifier.classify(path) else {
            return;
        };
        let _span = span!(Level::DEBUG, "process_file", ?path, kind = kind.label()).entered();
        let name = display_name(path);

        let Some(item) = FoundItem::resolve(kind, path, &self.resolver, &*self.fs) else {
            // Only possible when the file vanished after listing
            error!(?path, "Cannot resolve date");
            ctx.summary.errors += 1;
            ctx.log(&format!("Error: {} - file is no longer readable", name));
            ctx.progress();
            return;
        };

        match self.move_item(&item, ctx.destination) {
            Ok(target) => {
                ctx.summary.processed += 1;
                info!(
                    source = ?path,
                    destination = ?target,
                    date = %item.date_taken(),
                    time_source = ?item.time_source(),
                    "Moved file"
                );

                let new_name = display_name(&target);
                let line = if new_name == name {
                    format!("{} -> {}", name, item.destination_sub_path())
                } else {
                    format!("{} -> {} (as {})", name, item.destination_sub_path(), new_name)
                };
                ctx.log(&line);
            }
            Err(e) => {
                ctx.summary.errors += 1;
                error!(?path, error = %e, "Failed to move file");
                ctx.log(&format!("Error: {} - {}", name, e));
            }
        }
        ctx.progress();
    }

    /// Move one file; on error the source is left where it was
    fn move_item(&self, item: &FoundItem, destination: &Path) -> io::Result<PathBuf> {
        let file_name = item
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

        let target_dir = destination.join(item.destination_sub_path());
        let target = resolve_collision(&*self.fs, &target_dir.join(file_name))?;

        self.fs.create_dir_all(&target_dir)?;
        let original_mtime = self.fs.modified(item.source_path()).ok();
        self.fs.rename(item.source_path(), &target)?;

        if self.restore_modified_time
            && let Some(mtime) = original_mtime
        {
            self.restore_mtime(&target, mtime);
        }

        Ok(target)
    }

    fn restore_mtime(&self, path: &Path, mtime: SystemTime) {
        if matches!(self.fs.modified(path), Ok(current) if current == mtime) {
            return;
        }
        match self.fs.set_modified(path, mtime) {
            Ok(()) => debug!(?path, "Restored modification time"),
            Err(e) => warn!(?path, error = %e, "Failed to restore modification time"),
        }
    }
}

/// First free path among `name.ext`, `name_1.ext`, `name_2.ext`, ...
pub fn resolve_collision(fs: &dyn Filesystem, path: &Path) -> io::Result<PathBuf> {
    if !fs.exists(path)? {
        return Ok(path.to_path_buf());
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path.file_stem().map(OsString::from).unwrap_or_default();
    let extension = path.extension();

    let mut n: u64 = 1;
    loop {
        let mut name = stem.clone();
        name.push(format!("_{}", n));
        if let Some(ext) = extension {
            name.push(".");
            name.push(ext);
        }

        let candidate = parent.join(name);
        if !fs.exists(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Canonical form of `path`, resolving the existing part of a path that is
/// not fully created yet
fn canonical_or_absolute(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}
