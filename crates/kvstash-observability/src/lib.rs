//! Observability for the kvstash cache layer.
//!
//! This crate provides:
//! - `CommandLog` - One store round-trip (command name, arguments, duration)
//! - `CommandSink` - Destination for command logs
//! - `TracingSink` / `StderrSink` / `MemorySink` - Built-in sinks

mod logging;

pub use logging::*;
