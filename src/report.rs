//! Progress reporting for organize runs
//!
//! The engine calls a [`Reporter`] once per event, in order, from the thread
//! doing the work. [`ChannelReporter`] forwards those calls to another thread
//! as [`RunEvent`]s, and [`LogBuffer`] keeps the most recent log lines.

use crate::organize::RunSummary;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::mpsc::Sender;

/// Receiver of run events
pub trait Reporter {
    /// One human-readable line per outcome
    fn on_log_entry(&mut self, message: &str, highlight: bool);

    /// Running totals after each counted file
    fn on_progress(&mut self, processed: usize, errors: usize);
}

/// Event emitted by a background run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Log { message: String, highlight: bool },
    Progress { processed: usize, errors: usize },
    /// Sent exactly once, after the traversal has stopped
    Finished(RunSummary),
}

/// [`Reporter`] that forwards events over an mpsc channel.
///
/// A dropped receiver is ignored; the run keeps going without an audience.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: Sender<RunEvent>,
}

impl ChannelReporter {
    pub fn new(tx: Sender<RunEvent>) -> Self {
        Self { tx }
    }

    pub fn finish(&self, summary: RunSummary) {
        let _ = self.tx.send(RunEvent::Finished(summary));
    }
}

impl Reporter for ChannelReporter {
    fn on_log_entry(&mut self, message: &str, highlight: bool) {
        let _ = self.tx.send(RunEvent::Log {
            message: message.to_string(),
            highlight,
        });
    }

    fn on_progress(&mut self, processed: usize, errors: usize) {
        let _ = self.tx.send(RunEvent::Progress { processed, errors });
    }
}

/// One buffered log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub time: DateTime<Local>,
    pub message: String,
    pub highlight: bool,
}

/// Fixed-capacity log ring; the oldest entry is evicted first
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    pub const DEFAULT_CAPACITY: usize = 5000;

    /// A capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY)),
            capacity,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, highlight: bool) -> &LogEntry {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            time: Local::now(),
            message: message.into(),
            highlight,
        });
        // Just pushed
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Reporter for LogBuffer {
    fn on_log_entry(&mut self, message: &str, highlight: bool) {
        self.push(message, highlight);
    }

    fn on_progress(&mut self, _processed: usize, _errors: usize) {}
}
