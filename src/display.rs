//! Colored terminal output for supervisor progress lines.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::sink::{LogLevel, LogSink};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Prints progress lines to stdout and errors to stderr, each prefixed
/// with a timestamp and a colored tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    /// Disable colors, e.g. when output is not a terminal.
    pub plain: bool,
}

impl ConsoleSink {
    #[must_use]
    pub fn new(plain: bool) -> Self {
        Self { plain }
    }
}

/// Render a line the way [`ConsoleSink`] prints it, minus the timestamp.
#[must_use]
pub fn format_line(level: LogLevel, text: &str, plain: bool) -> String {
    let tag = match level {
        LogLevel::Info => "[DOSEMU]",
        LogLevel::Warn => "[WARN]",
        LogLevel::Error => "[ERROR]",
    };
    let body = text.trim_end_matches('\n');
    if plain {
        return format!("{tag} {body}");
    }
    match level {
        LogLevel::Info => format!("{} {body}", tag.blue().bold()),
        LogLevel::Warn => format!("{} {}", tag.yellow().bold(), body.yellow()),
        LogLevel::Error => format!("{} {}", tag.red().bold(), body.red()),
    }
}

impl LogSink for ConsoleSink {
    fn line(&self, level: LogLevel, text: &str) {
        let ts = timestamp();
        let ts = if self.plain {
            ts
        } else {
            ts.dimmed().to_string()
        };
        let rendered = format_line(level, text, self.plain);
        if level == LogLevel::Error {
            eprintln!("{ts} {rendered}");
            let _ = io::stderr().flush();
        } else {
            println!("{ts} {rendered}");
            let _ = io::stdout().flush();
        }
    }
}

/// Print a one-line status summary, as used by `check`.
pub fn print_check(label: &str, ok: bool, detail: &str) {
    if ok {
        println!("{} {label}: {detail}", "[OK]".green().bold());
    } else {
        println!("{} {label}: {}", "[FAIL]".red().bold(), detail.red());
    }
    let _ = io::stdout().flush();
}
