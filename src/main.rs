//! Media Organizer - sorts photos and videos into date folders
//!
//! Runs the organizer on a background thread, prints its log lines as they
//! arrive and cancels cleanly on Ctrl-C.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use media_organizer::{Cli, Config, LogBuffer, Organizer, RunEvent, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// CLI Output Module
mod cli_output {
    //! Colors and layout for terminal output.

    use crossterm::{
        ExecutableCommand,
        cursor::MoveToColumn,
        style::{Color, Print, Stylize, style},
        terminal::{Clear, ClearType},
    };
    use media_organizer::LogEntry;
    use std::io::stdout;

    /// CLI theme colors
    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    pub fn print_separator() {
        let _ = stdout().execute(Print(&format!("{}\n", "─".repeat(60))));
    }

    /// Centered title
    pub fn print_title(title: &str) {
        let width: usize = 60;
        let padding = width.saturating_sub(title.len()) / 2;
        let left_pad = " ".repeat(padding.saturating_sub(1));

        let _ = stdout().execute(Print(&format!(
            "{}{} {}{}\n",
            left_pad,
            "╔".bold(),
            title.bold(),
            "╗".bold(),
        )));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_warning(msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(CliTheme::WARNING).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_stat(key: &str, value: &str, color: Color) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(key).with(CliTheme::HINT)));
        let _ = stdout().execute(Print(": "));
        let _ = stdout().execute(Print(style(value).with(color).bold()));
        let _ = stdout().execute(Print("\n"));
    }

    /// One reporter line, replacing the status line
    pub fn print_entry(entry: &LogEntry) {
        clear_status();
        let time = style(entry.time.format("%H:%M:%S").to_string()).with(CliTheme::HINT);
        let _ = stdout().execute(Print(time));
        let _ = stdout().execute(Print(" "));

        if entry.highlight {
            let _ = stdout().execute(Print(style(&entry.message).with(CliTheme::ACCENT).bold()));
        } else if entry.message.starts_with("Error: ") {
            let _ = stdout().execute(Print(style(&entry.message).with(CliTheme::ERROR)));
        } else if entry.message.starts_with("Access denied: ") {
            let _ = stdout().execute(Print(style(&entry.message).with(CliTheme::WARNING)));
        } else {
            let _ = stdout().execute(Print(&entry.message));
        }
        let _ = stdout().execute(Print("\n"));
    }

    /// Progress line, overwritten by the next output
    pub fn print_status(done: usize, total: usize, errors: usize) {
        clear_status();
        let counter = style(format!("  {}/{}", done, total)).with(CliTheme::ACCENT);
        let _ = stdout().execute(Print(counter));
        if errors > 0 {
            let _ = stdout().execute(Print(
                style(format!("  {} errors", errors)).with(CliTheme::ERROR),
            ));
        }
    }

    pub fn clear_status() {
        let _ = stdout().execute(MoveToColumn(0));
        let _ = stdout().execute(Clear(ClearType::CurrentLine));
    }

    pub fn print_log_path(path: &str) {
        let _ = stdout().execute(Print("\n"));
        let _ = stdout().execute(Print(style("  📁 ").with(CliTheme::ACCENT)));
        let _ = stdout().execute(Print(style("Log file: ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", path)));
    }

    pub fn print_blank() {
        let _ = stdout().execute(Print("\n"));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    let exe_dir = get_executable_dir()?;
    let (config, config_file) = load_config(&cli, &exe_dir)?;

    // Verbosity may come from the config file, so logging starts after loading it
    let log_path = get_log_path(&exe_dir, &cli);
    let _guard = setup_logging(config.verbose, cli.json_log, &log_path)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Media Organizer starting");
    if let Some(path) = config_file {
        info!(config_file = %path.display(), "Loaded configuration from file");
    }
    if config.verbose {
        info!(?config, "Configuration loaded");
    }
    info!(log_file = %log_path.display(), "Log file location");

    let (source, destination) = match (&config.source_dir, &config.destination_dir) {
        (Some(source), Some(destination)) => (source.clone(), destination.clone()),
        _ => anyhow::bail!("Both a source (-s) and a destination (-d) directory are required"),
    };

    let organizer = Arc::new(Organizer::from_config(&config));
    let total = organizer.count_media(&source);
    info!(total, ?source, "Found media files");

    let handle = organizer.spawn(&source, &destination)?;
    let token = handle.cancellation_token();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current file");
        token.cancel();
    })?;

    let mut log = LogBuffer::new(config.log_capacity);
    for event in handle.events() {
        match event {
            RunEvent::Log { message, highlight } => {
                cli_output::print_entry(log.push(message, highlight));
            }
            RunEvent::Progress { processed, errors } => {
                cli_output::print_status(processed + errors, total, errors);
            }
            RunEvent::Finished(_) => cli_output::clear_status(),
        }
    }
    cli_output::clear_status();

    match handle.join() {
        Ok(summary) => {
            print_summary(&summary, total, &log);
            cli_output::print_log_path(&log_path.display().to_string());
            info!(log_file = %log_path.display(), "Organization finished. Log saved to");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Organization failed");
            cli_output::print_error(&e.to_string());
            cli_output::print_log_path(&log_path.display().to_string());
            std::process::exit(1);
        }
    }
}

fn print_summary(summary: &RunSummary, total: usize, log: &LogBuffer) {
    use cli_output::*;

    print_blank();
    print_separator();
    if summary.cancelled {
        print_title("Organization Cancelled");
    } else {
        print_title("Organization Complete");
    }
    print_separator();

    print_blank();
    print_stat("Found", &total.to_string(), CliTheme::ACCENT);
    print_stat("Moved", &summary.processed.to_string(), CliTheme::SUCCESS);
    print_stat("Errors", &summary.errors.to_string(), CliTheme::ERROR);
    print_blank();

    let failures: Vec<_> = log
        .iter()
        .filter(|e| e.message.starts_with("Error: "))
        .collect();
    if !failures.is_empty() {
        print_separator();
        for entry in failures {
            print_error(entry.message.trim_start_matches("Error: "));
        }
    }

    if summary.cancelled {
        print_separator();
        print_warning("Files already moved stay in the destination");
    }
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Determine the log file path from `--log-file`, the config name or a timestamp
fn get_log_path(exe_dir: &Path, cli: &Cli) -> PathBuf {
    if let Some(ref log_file) = cli.log_file {
        return log_file.clone();
    }

    let log_dir = exe_dir.join("Log");
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    if let Some(config_name) = cli.config_name() {
        log_dir
            .join(&config_name)
            .join(format!("{}_{}.log", config_name, timestamp))
    } else {
        log_dir.join(format!("OrganizeRun_{}.log", timestamp))
    }
}

/// Resolve config path - `-C camera` finds `camera.toml` here or in `<exe dir>/Config`
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    if config_path.exists() {
        return config_path.to_path_buf();
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.to_path_buf()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());
    let mut in_config_dir = exe_dir.join("Config").join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path.to_path_buf()
}

/// Load configuration from file or CLI arguments, with the file actually read
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<(Config, Option<PathBuf>)> {
    match cli.config {
        Some(ref config_path) => {
            let resolved_path = resolve_config_path(exe_dir, config_path);
            let file_config = Config::load_from_file(&resolved_path)?;
            Ok((cli.merge_with_config(file_config), Some(resolved_path)))
        }
        None => Ok((cli.to_config(), None)),
    }
}

/// Setup logging (file + console)
///
/// The console only shows warnings unless verbose output is on (`--verbose`
/// or `verbose = true` in the config file).
fn setup_logging(verbose: bool, json_log: bool, log_path: &Path) -> Result<WorkerGuard> {
    let level = if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(console_level),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(console_level),
            )
            .init();
    }

    Ok(guard)
}
