//! Structured logging of store round-trips.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// A single store round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLog {
    /// Upper-case command name (e.g. `GET`, `INCRBY`).
    pub op: String,
    /// Key or argument summary.
    pub content: String,
    /// Round-trip duration.
    #[serde(rename = "elapsed_us", serialize_with = "as_micros")]
    pub elapsed: Duration,
}

fn as_micros<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_micros() as u64)
}

impl CommandLog {
    /// Build a log entry from a command name and its arguments.
    ///
    /// Read-style commands list their arguments; write-style commands render
    /// as `key:: arg, arg`.
    pub fn from_args(command: &str, args: &[String], elapsed: Duration) -> Self {
        let op = command.to_ascii_uppercase();
        let content = match op.as_str() {
            "SET" | "SETNX" | "INCRBY" | "DECRBY" if !args.is_empty() => {
                format!("{}:: {}", args[0], args[1..].join(", "))
            }
            _ => args.join(" "),
        };
        Self {
            op,
            content,
            elapsed,
        }
    }

    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_human())
    }

    /// Format as human-readable string.
    pub fn to_human(&self) -> String {
        let mut s = format!("[Redis] {}", self.op);
        if !self.content.is_empty() {
            s.push_str(&format!(" `{}`", self.content));
        }
        s.push_str(&format!(" ({}us)", self.elapsed.as_micros()));
        s
    }
}

impl fmt::Display for CommandLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_human())
    }
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (for production/log aggregation).
    Json,
    /// Human-readable format (for development).
    #[default]
    Human,
}

/// Receives one event per store round-trip.
pub trait CommandSink: Send + Sync {
    /// Record a completed command.
    fn record(&self, log: &CommandLog);
}

/// Forwards command logs to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl CommandSink for TracingSink {
    fn record(&self, log: &CommandLog) {
        tracing::debug!(
            target: "kvstash::command",
            op = %log.op,
            content = %log.content,
            elapsed_us = log.elapsed.as_micros() as u64,
            "store command"
        );
    }
}

/// Writes command logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink {
    format: LogFormat,
}

impl StderrSink {
    /// Create a sink with the given output format.
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }

    /// Render a log line in this sink's format.
    pub fn render(&self, log: &CommandLog) -> String {
        match self.format {
            LogFormat::Json => log.to_json(),
            LogFormat::Human => log.to_human(),
        }
    }
}

impl CommandSink for StderrSink {
    fn record(&self, log: &CommandLog) {
        eprintln!("{}", self.render(log));
    }
}

/// Keeps every command log in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<CommandLog>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded entries.
    pub fn entries(&self) -> Vec<CommandLog> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Recorded command names, in order.
    pub fn ops(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.op).collect()
    }

    /// Drop all recorded entries.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl CommandSink for MemorySink {
    fn record(&self, log: &CommandLog) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(log.clone());
        }
    }
}

impl<T: CommandSink + ?Sized> CommandSink for std::sync::Arc<T> {
    fn record(&self, log: &CommandLog) {
        (**self).record(log)
    }
}
