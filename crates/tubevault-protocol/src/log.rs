//! Structured log entries for the frontend log endpoint.
//!
//! The backend expects short field names (`ts`, `cat`, `msg`), so the serde
//! names differ from the Rust field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single structured log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was created.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Subsystem that produced the entry (e.g. `router`).
    #[serde(rename = "cat")]
    pub category: String,
    /// Machine-readable entry type (e.g. `unknown_route`).
    #[serde(rename = "type")]
    pub kind: String,
    /// URL the entry refers to.
    pub url: String,
    /// Human-readable message.
    #[serde(rename = "msg")]
    pub message: String,
}

impl LogEntry {
    /// Create a new entry stamped with the current time.
    #[must_use]
    pub fn new(
        level: LogLevel,
        category: impl Into<String>,
        kind: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            category: category.into(),
            kind: kind.into(),
            url: url.into(),
            message: message.into(),
        }
    }
}
