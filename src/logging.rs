// src/logging.rs

//! Detection log sink trait and implementations
//!
//! Detection output is an observable protocol: consumers match on the
//! `pass:`/`skip:`/`fail:` prefixes and the `======== ... ========`
//! section headers, and message order is significant. The `Logger`
//! trait keeps that stream pluggable:
//!
//! - `TracingLogger`: forwards to the `tracing` macros
//! - `MemoryLogger`: append-ordered capture with level filtering,
//!   used by tests and embedders that want the raw protocol

use std::sync::Mutex;

/// Log severity, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Append-ordered log sink for detection output
///
/// Implementations must be safe for a single writer shared behind an
/// `Arc` (detection itself is single-threaded).
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Logger that forwards to the `tracing` macros
#[derive(Debug, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
    }
}

/// In-memory logger capturing messages at or above a threshold level
#[derive(Debug, Default)]
pub struct MemoryLogger {
    level: LogLevel,
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    /// Capture everything from debug up
    pub fn new() -> Self {
        Self::with_level(LogLevel::Debug)
    }

    /// Capture only messages at or above `level`
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Captured entries in append order
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.lock().unwrap().clone()
    }

    /// All captured messages joined with trailing newlines
    pub fn messages(&self) -> String {
        let entries = self.entries.lock().unwrap();
        let mut out = String::new();
        for (_, message) in entries.iter() {
            out.push_str(message);
            out.push('\n');
        }
        out
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if level < self.level {
            return;
        }
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}
