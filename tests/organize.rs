//! End-to-end organize runs on scratch trees

use chrono::{Local, NaiveDate, TimeZone};
use media_organizer::{
    CancellationToken, DateResolver, DirListing, Filesystem, ItemClassifier, LogBuffer, Organizer,
    Reporter, RunEvent, RunSummary, StdFilesystem,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tempfile::TempDir;

/// Real file system with injected failures
#[derive(Default)]
struct FaultyFs {
    denied_dirs: Vec<PathBuf>,
    failing_renames: Vec<String>,
}

impl Filesystem for FaultyFs {
    fn list_dir(&self, dir: &Path) -> io::Result<DirListing> {
        if self.denied_dirs.iter().any(|d| d == dir) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
        }
        StdFilesystem.list_dir(dir)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        StdFilesystem.modified(path)
    }

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()> {
        StdFilesystem.set_modified(path, time)
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        StdFilesystem.create_dir_all(dir)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let name = from.file_name().unwrap().to_string_lossy();
        if self.failing_renames.iter().any(|n| *n == name) {
            return Err(io::Error::other("cross-device link"));
        }
        StdFilesystem.rename(from, to)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        StdFilesystem.exists(path)
    }
}

/// Real file system whose first listing waits for a go signal
struct GatedFs {
    gate: Mutex<Option<Receiver<()>>>,
}

impl Filesystem for GatedFs {
    fn list_dir(&self, dir: &Path) -> io::Result<DirListing> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(rx) = gate {
            let _ = rx.recv();
        }
        StdFilesystem.list_dir(dir)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        StdFilesystem.modified(path)
    }

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()> {
        StdFilesystem.set_modified(path, time)
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        StdFilesystem.create_dir_all(dir)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        StdFilesystem.rename(from, to)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        StdFilesystem.exists(path)
    }
}

/// Reporter that records everything and cancels after a number of moves
struct Recorder {
    log: LogBuffer,
    progress: Vec<(usize, usize)>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            log: LogBuffer::default(),
            progress: Vec::new(),
            cancel_after: None,
        }
    }

    fn cancelling_after(processed: usize, token: CancellationToken) -> Self {
        Self {
            cancel_after: Some((processed, token)),
            ..Self::new()
        }
    }

    fn messages(&self) -> Vec<String> {
        self.log.iter().map(|e| e.message.clone()).collect()
    }
}

impl Reporter for Recorder {
    fn on_log_entry(&mut self, message: &str, highlight: bool) {
        self.log.on_log_entry(message, highlight);
    }

    fn on_progress(&mut self, processed: usize, errors: usize) {
        self.progress.push((processed, errors));
        if let Some((limit, token)) = &self.cancel_after
            && processed >= *limit
        {
            token.cancel();
        }
    }
}

fn organizer_with(fs: FaultyFs) -> Organizer {
    Organizer::new(ItemClassifier::default(), DateResolver::default(), fs)
}

fn write_with_mtime(path: &Path, contents: &[u8], y: i32, m: u32, d: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
    let noon = NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let local = Local.from_local_datetime(&noon).single().unwrap();
    let time: SystemTime = local.into();
    filetime::set_file_mtime(path, filetime::FileTime::from_system_time(time)).unwrap();
}

/// Minimal JPEG whose EXIF block holds only DateTimeOriginal
fn jpeg_with_original_date(date: &str) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    // IFD0 with a single Exif IFD pointer
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x8769u16.to_le_bytes());
    tiff.extend_from_slice(&4u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&26u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    // Exif IFD with DateTimeOriginal
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x9003u16.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes());
    tiff.extend_from_slice(&20u32.to_le_bytes());
    tiff.extend_from_slice(&44u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff.extend_from_slice(date.as_bytes());
    tiff.push(0);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

struct Scratch {
    _tmp: TempDir,
    src: PathBuf,
    dst: PathBuf,
}

fn scratch() -> Scratch {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    fs::create_dir(&src).unwrap();
    Scratch { _tmp: tmp, src, dst }
}

#[test]
fn photo_with_exif_goes_to_capture_date() {
    let s = scratch();
    let bytes = jpeg_with_original_date("2021:05:03 10:15:00");
    // File time disagrees with EXIF on purpose
    write_with_mtime(&s.src.join("img.jpg"), &bytes, 2024, 2, 2);

    let mut recorder = Recorder::new();
    let summary = Organizer::default()
        .run(&s.src, &s.dst, &CancellationToken::new(), &mut recorder)
        .unwrap();

    assert_eq!(summary.processed, 1);
    let moved = s.dst.join("2021-05-03").join("img.jpg");
    assert_eq!(fs::read(&moved).unwrap(), bytes);
    assert!(!s.src.join("img.jpg").exists());
    assert!(
        recorder
            .messages()
            .contains(&"img.jpg -> 2021-05-03".to_string())
    );
}

#[test]
fn video_without_metadata_uses_file_time() {
    let s = scratch();
    write_with_mtime(&s.src.join("clip.mp4"), b"not a container", 2020, 1, 1);

    let summary = Organizer::default()
        .run(&s.src, &s.dst, &CancellationToken::new(), &mut Recorder::new())
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(
        fs::read(s.dst.join("2020-01-01/clip.mp4")).unwrap(),
        b"not a container"
    );
}

#[test]
fn colliding_names_get_numbered_suffixes() {
    let s = scratch();
    write_with_mtime(&s.src.join("a.jpg"), b"first", 2022, 8, 1);
    write_with_mtime(&s.src.join("one/a.jpg"), b"second", 2022, 8, 1);
    write_with_mtime(&s.src.join("two/a.jpg"), b"third", 2022, 8, 1);

    let mut recorder = Recorder::new();
    let summary = Organizer::default()
        .run(&s.src, &s.dst, &CancellationToken::new(), &mut recorder)
        .unwrap();

    assert_eq!(summary.processed, 3);
    let day = s.dst.join("2022-08-01");
    assert_eq!(fs::read(day.join("a.jpg")).unwrap(), b"first");
    assert_eq!(fs::read(day.join("a_1.jpg")).unwrap(), b"second");
    assert_eq!(fs::read(day.join("a_2.jpg")).unwrap(), b"third");
    assert_eq!(fs::read_dir(&day).unwrap().count(), 3);
    assert!(
        recorder
            .messages()
            .contains(&"a.jpg -> 2022-08-01 (as a_1.jpg)".to_string())
    );
}

#[test]
fn existing_destination_file_is_never_overwritten() {
    let s = scratch();
    write_with_mtime(&s.src.join("b.png"), b"new", 2019, 3, 3);
    fs::create_dir_all(s.dst.join("2019-03-03")).unwrap();
    fs::write(s.dst.join("2019-03-03/b.png"), b"old").unwrap();

    Organizer::default()
        .run(&s.src, &s.dst, &CancellationToken::new(), &mut Recorder::new())
        .unwrap();

    assert_eq!(fs::read(s.dst.join("2019-03-03/b.png")).unwrap(), b"old");
    assert_eq!(fs::read(s.dst.join("2019-03-03/b_1.png")).unwrap(), b"new");
}

#[test]
fn denied_directory_skips_only_its_subtree() {
    let s = scratch();
    write_with_mtime(&s.src.join("locked/hidden.jpg"), b"h", 2021, 1, 1);
    write_with_mtime(&s.src.join("ok/visible.jpg"), b"v", 2021, 1, 2);

    let fs_impl = FaultyFs {
        denied_dirs: vec![s.src.join("locked")],
        ..FaultyFs::default()
    };
    let mut recorder = Recorder::new();
    let summary = organizer_with(fs_impl)
        .run(&s.src, &s.dst, &CancellationToken::new(), &mut recorder)
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            processed: 1,
            errors: 0,
            cancelled: false
        }
    );
    assert!(s.src.join("locked/hidden.jpg").exists());
    assert!(s.dst.join("2021-01-02/visible.jpg").exists());

    let messages = recorder.messages();
    let denied: Vec<_> = messages
        .iter()
        .filter(|m| m.starts_with("Access denied: "))
        .collect();
    assert_eq!(
        denied,
        vec![&format!("Access denied: {}", s.src.join("locked").display())]
    );
    assert!(!messages.iter().any(|m| m.contains("hidden.jpg")));
}

#[test]
fn failed_move_counts_error_and_keeps_source() {
    let s = scratch();
    write_with_mtime(&s.src.join("a.jpg"), b"a", 2021, 1, 1);
    write_with_mtime(&s.src.join("b.jpg"), b"b", 2021, 1, 1);

    let fs_impl = FaultyFs {
        failing_renames: vec!["a.jpg".into()],
        ..FaultyFs::default()
    };
    let mut recorder = Recorder::new();
    let summary = organizer_with(fs_impl)
        .run(&s.src, &s.dst, &CancellationToken::new(), &mut recorder)
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(fs::read(s.src.join("a.jpg")).unwrap(), b"a");
    assert!(!s.dst.join("2021-01-01/a.jpg").exists());
    assert!(s.dst.join("2021-01-01/b.jpg").exists());

    assert_eq!(recorder.progress, vec![(0, 1), (1, 1)]);
    let messages = recorder.messages();
    assert!(messages.iter().any(|m| m.starts_with("Error: a.jpg - ")));
    assert_eq!(
        messages.last().unwrap(),
        "Complete! Processed 1 files with 1 errors."
    );
}

#[test]
fn cancellation_stops_at_next_checkpoint() {
    let s = scratch();
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        write_with_mtime(&s.src.join(name), name.as_bytes(), 2023, 4, 5);
    }
    write_with_mtime(&s.src.join("sub/d.jpg"), b"d", 2023, 4, 5);

    let token = CancellationToken::new();
    let mut recorder = Recorder::cancelling_after(1, token.clone());
    let summary = Organizer::default()
        .run(&s.src, &s.dst, &token, &mut recorder)
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 1);
    assert!(s.dst.join("2023-04-05/a.jpg").exists());
    for untouched in ["b.jpg", "c.jpg", "sub/d.jpg"] {
        assert!(s.src.join(untouched).exists(), "{} was moved", untouched);
    }
    assert_eq!(recorder.progress, vec![(1, 0)]);
    assert_eq!(
        recorder.messages().last().unwrap(),
        "Operation cancelled by user. Processed 1 files with 0 errors."
    );
}

#[test]
fn rerun_is_stable_for_moved_files() {
    let s = scratch();
    write_with_mtime(&s.src.join("clip.mov"), b"clip", 2017, 7, 7);

    let organizer = Organizer::default();
    organizer
        .run(&s.src, &s.dst, &CancellationToken::new(), &mut Recorder::new())
        .unwrap();
    let moved = s.dst.join("2017-07-07/clip.mov");
    assert_eq!(
        media_organizer::resolve_video_date(&moved).unwrap().date(),
        NaiveDate::from_ymd_opt(2017, 7, 7).unwrap()
    );

    // Moving the sorted tree again lands in the same day folder
    let again = s._tmp.path().join("again");
    let summary = organizer
        .run(&s.dst, &again, &CancellationToken::new(), &mut Recorder::new())
        .unwrap();
    assert_eq!(summary.processed, 1);
    assert!(again.join("2017-07-07/clip.mov").exists());
}

#[test]
fn unreadable_source_root_is_skipped_not_aborted() {
    let s = scratch();
    write_with_mtime(&s.src.join("a.jpg"), b"a", 2021, 1, 1);

    let fs_impl = FaultyFs {
        denied_dirs: vec![s.src.clone()],
        ..FaultyFs::default()
    };
    let mut recorder = Recorder::new();
    let summary = organizer_with(fs_impl)
        .run(&s.src, &s.dst, &CancellationToken::new(), &mut recorder)
        .unwrap();

    assert_eq!(summary, RunSummary::default());
    assert!(s.src.join("a.jpg").exists());
    let messages = recorder.messages();
    assert_eq!(
        &messages[1..],
        &[
            format!("Access denied: {}", s.src.display()),
            "Complete! Processed 0 files with 0 errors.".to_string(),
        ]
    );
}

#[test]
fn spawned_run_cancelled_through_handle() {
    let s = scratch();
    for name in ["a.jpg", "b.jpg"] {
        write_with_mtime(&s.src.join(name), name.as_bytes(), 2023, 4, 5);
    }

    let (go, gate) = mpsc::channel();
    let fs_impl = GatedFs {
        gate: Mutex::new(Some(gate)),
    };
    let organizer = Arc::new(Organizer::new(
        ItemClassifier::default(),
        DateResolver::default(),
        fs_impl,
    ));

    let handle = organizer.spawn(&s.src, &s.dst).unwrap();
    handle.cancel();
    go.send(()).unwrap();

    let events: Vec<RunEvent> = handle.events().iter().collect();
    let summary = handle.join().unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 0);
    assert!(s.src.join("a.jpg").exists());
    assert!(s.src.join("b.jpg").exists());
    assert_eq!(events.last(), Some(&RunEvent::Finished(summary)));
}
