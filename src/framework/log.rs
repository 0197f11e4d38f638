//! The harness log channel
//!
//! Every line is prefixed with a millisecond timestamp so the output of a
//! failed run can be lined up with the cluster's own logs.

use std::fmt;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Timestamp layout, e.g. `Oct 18 06:52:01.042`
const STAMP_FORMAT: &str = "%b %e %H:%M:%S%.3f";

/// Current local time in the harness log layout
pub fn now_stamp() -> String {
    chrono::Local::now().format(STAMP_FORMAT).to_string()
}

/// Severity of a harness log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
        })
    }
}

/// Render a line as `<stamp>: <LEVEL>: <message>`
pub fn format_line(level: LogLevel, message: &str) -> String {
    format!("{}: {}: {}", now_stamp(), level, message)
}

/// Render a line as `<stamp>: <message>`, for outputs that print the level themselves
pub fn stamped(message: &str) -> String {
    format!("{}: {}", now_stamp(), message)
}

/// Destination for harness log lines
///
/// Injected into [`super::Framework`] so tests can capture what a command
/// logged without touching global state.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards stamped lines to `tracing`, which adds the level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        let line = stamped(message);
        match level {
            LogLevel::Info => tracing::info!("{}", line),
            LogLevel::Warn => tracing::warn!("{}", line),
        }
    }
}

/// Writes stamped lines to any writer
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn log(&self, level: LogLevel, message: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(writer, "{}", format_line(level, message)) {
            tracing::debug!("Failed to write harness log line: {}", e);
        }
    }
}

/// Keeps stamped lines in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|line| line.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format_line(level, message));
    }
}
