//! Destinations for human-readable progress lines.
//!
//! The supervisor narrates what it is doing ("Started DOSEmu", "From
//! dosdebug: ...") to a [`LogSink`]. How those lines are shown is up to the
//! front end: a scrollback panel, the terminal, or the tracing subscriber.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Severity of a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("INFO"),
            Self::Warn => f.write_str("WARN"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

/// Consumer of plain-text progress and error lines.
pub trait LogSink: Send + Sync {
    /// Accept one line. `text` may itself contain newlines when it carries
    /// multi-line companion output.
    fn line(&self, level: LogLevel, text: &str);

    fn info(&self, text: &str) {
        self.line(LogLevel::Info, text);
    }

    fn warn(&self, text: &str) {
        self.line(LogLevel::Warn, text);
    }

    fn error(&self, text: &str) {
        self.line(LogLevel::Error, text);
    }
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn LogSink>;

/// Forwards lines to `tracing`, so they end up wherever the subscriber
/// sends them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn line(&self, level: LogLevel, text: &str) {
        match level {
            LogLevel::Info => tracing::info!(target: "dosemu_supervisor::session", "{text}"),
            LogLevel::Warn => tracing::warn!(target: "dosemu_supervisor::session", "{text}"),
            LogLevel::Error => tracing::error!(target: "dosemu_supervisor::session", "{text}"),
        }
    }
}

/// A recorded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub text: String,
}

/// Default number of lines a [`MemorySink`] keeps.
pub const DEFAULT_SCROLLBACK: usize = 1000;

/// Bounded in-memory scrollback.
#[derive(Debug)]
pub struct MemorySink {
    lines: Mutex<VecDeque<LogLine>>,
    capacity: usize,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SCROLLBACK)
    }

    /// Keep at most `capacity` lines, dropping the oldest first.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of the recorded lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Whether any recorded line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.count(needle) > 0
    }

    /// Number of recorded lines containing `needle`.
    #[must_use]
    pub fn count(&self, needle: &str) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|l| l.text.contains(needle))
            .count()
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemorySink {
    fn line(&self, level: LogLevel, text: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(LogLine {
            level,
            text: text.to_string(),
        });
    }
}
