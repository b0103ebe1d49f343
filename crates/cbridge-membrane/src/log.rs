//! Structured JSONL logging for boundary events.
//!
//! Provides:
//! - [`LogEntry`]: one JSON object per event with required + optional fields.
//! - [`LogEmitter`]: writes entries to a file, stderr, or an in-memory buffer,
//!   dropping anything below its minimum level.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::registry::TokenId;

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse from string (case-insensitive). Unknown values map to `Warn`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "error" => Self::Error,
            _ => Self::Warn,
        }
    }
}

/// Outcome of the logged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    /// Foreign operation name (`alloc`, `compress`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            op: None,
            token: None,
            outcome: None,
            latency_ns: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: TokenId) -> Self {
        self.token = Some(token.get());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    #[must_use]
    pub fn with_latency_ns(mut self, ns: u64) -> Self {
        self.latency_ns = Some(ns);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

enum Sink {
    Discard,
    Writer(Box<dyn Write + Send>),
    Buffer(Arc<Mutex<Vec<u8>>>),
}

struct EmitterState {
    sink: Sink,
    seq: u64,
}

/// Writes structured JSONL log entries. Safe to share between threads.
pub struct LogEmitter {
    state: Mutex<EmitterState>,
    run_id: String,
    min_level: LogLevel,
}

impl LogEmitter {
    fn with_sink(sink: Sink, run_id: &str, min_level: LogLevel) -> Self {
        Self {
            state: Mutex::new(EmitterState { sink, seq: 0 }),
            run_id: run_id.to_string(),
            min_level,
        }
    }

    /// An emitter that drops everything.
    #[must_use]
    pub fn discard() -> Self {
        Self::with_sink(Sink::Discard, "discard", LogLevel::Error)
    }

    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, run_id: &str, min_level: LogLevel) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::with_sink(
            Sink::Writer(Box::new(std::io::BufWriter::new(file))),
            run_id,
            min_level,
        ))
    }

    /// Create an emitter that writes to stderr.
    #[must_use]
    pub fn to_stderr(run_id: &str, min_level: LogLevel) -> Self {
        Self::with_sink(Sink::Writer(Box::new(std::io::stderr())), run_id, min_level)
    }

    /// Create an emitter that writes to an in-memory buffer (for testing).
    #[must_use]
    pub fn to_buffer(run_id: &str, min_level: LogLevel) -> Self {
        Self::with_sink(
            Sink::Buffer(Arc::new(Mutex::new(Vec::new()))),
            run_id,
            min_level,
        )
    }

    #[must_use]
    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level && !matches!(self.state.lock().sink, Sink::Discard)
    }

    /// Emit an entry. The trace id is assigned here when the entry has none.
    ///
    /// Write failures are swallowed: logging never changes the outcome of a
    /// boundary call.
    pub fn emit(&self, mut entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }
        let mut state = self.state.lock();
        if matches!(state.sink, Sink::Discard) {
            return;
        }
        state.seq += 1;
        if entry.trace_id.is_empty() {
            entry.trace_id = format!("{}::{:04}", self.run_id, state.seq);
        }
        let Ok(line) = entry.to_jsonl() else {
            return;
        };
        match &mut state.sink {
            Sink::Discard => {}
            Sink::Writer(w) => {
                let _ = writeln!(w, "{line}");
            }
            Sink::Buffer(buf) => {
                let mut buf = buf.lock();
                buf.extend_from_slice(line.as_bytes());
                buf.push(b'\n');
            }
        }
    }

    /// Shorthand for an entry with only an event name.
    pub fn event(&self, level: LogLevel, event: &str) {
        self.emit(LogEntry::new(String::new(), level, event));
    }

    /// Everything written so far, when this emitter writes to a buffer.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        match &self.state.lock().sink {
            Sink::Buffer(buf) => Some(String::from_utf8_lossy(&buf.lock()).into_owned()),
            _ => None,
        }
    }

    /// Parsed entries from an in-memory buffer.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.contents()
            .map(|text| {
                text.lines()
                    .filter_map(|line| serde_json::from_str(line).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Flush the underlying writer.
    pub fn flush(&self) -> std::io::Result<()> {
        match &mut self.state.lock().sink {
            Sink::Writer(w) => w.flush(),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for LogEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEmitter")
            .field("run_id", &self.run_id)
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}

/// UTC timestamp in ISO-8601 form.
#[must_use]
pub fn now_utc() -> String {
    // Use a simple format without external chrono dependency
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    // Approximate calendar fields; ordering and time of day are exact
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        1970 + secs / 31_557_600,
        (secs % 31_557_600) / 2_629_800 + 1,
        (secs % 2_629_800) / 86400 + 1,
        (secs % 86400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
        millis,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_required_fields_only() {
        let entry = LogEntry::new("run::0001", LogLevel::Info, "gateway_open");
        let json = entry.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["timestamp"].is_string());
        assert_eq!(parsed["trace_id"], "run::0001");
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["event"], "gateway_open");
        assert!(parsed.get("op").is_none());
        assert!(parsed.get("token").is_none());
    }

    #[test]
    fn optional_fields_round_trip() {
        let entry = LogEntry::new("t", LogLevel::Warn, "leak_candidate")
            .with_op("compress")
            .with_token(TokenId::from_raw(9))
            .with_outcome(Outcome::Fail)
            .with_latency_ns(120)
            .with_details(serde_json::json!({"out_len": 0}));
        let back: LogEntry = serde_json::from_str(&entry.to_jsonl().unwrap()).unwrap();
        assert_eq!(back.op.as_deref(), Some("compress"));
        assert_eq!(back.token, Some(9));
        assert_eq!(back.outcome, Some(Outcome::Fail));
        assert_eq!(back.latency_ns, Some(120));
        assert_eq!(back.details.unwrap()["out_len"], 0);
    }

    #[test]
    fn buffer_emitter_assigns_sequential_trace_ids() {
        let log = LogEmitter::to_buffer("unit", LogLevel::Trace);
        log.event(LogLevel::Info, "one");
        log.event(LogLevel::Error, "two");
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].trace_id, "unit::0001");
        assert_eq!(entries[1].trace_id, "unit::0002");
        assert_eq!(entries[1].event, "two");
    }

    #[test]
    fn entries_below_min_level_are_dropped() {
        let log = LogEmitter::to_buffer("unit", LogLevel::Warn);
        log.event(LogLevel::Debug, "quiet");
        log.event(LogLevel::Warn, "loud");
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "loud");
        assert!(!log.enabled(LogLevel::Info));
        assert!(log.enabled(LogLevel::Error));
    }

    #[test]
    fn discard_emitter_has_no_contents() {
        let log = LogEmitter::discard();
        log.event(LogLevel::Error, "dropped");
        assert!(log.contents().is_none());
        assert!(!log.enabled(LogLevel::Error));
    }

    #[test]
    fn level_parsing_and_order() {
        assert_eq!(LogLevel::from_str_loose("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_loose("nope"), LogLevel::Warn);
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Trace < LogLevel::Debug);
    }
}
