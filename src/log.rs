//! Logging Infrastructure
//!
//! Structured logging for the weft runtime: log levels, key-value fields,
//! and plain-text or JSON output.
//!
//! The scheduler emits entries at lifecycle points (coroutine creation and
//! destruction, table growth, timeout expiry). Hosts can raise or lower the
//! global level at any time; filtering is a single atomic load.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft::log::{self, LogBuilder, LogLevel};
//!
//! log::info("scheduler started");
//!
//! LogBuilder::new(LogLevel::Debug)
//!     .target("weft::scheduler")
//!     .message("coroutine created")
//!     .field_int("id", 3)
//!     .field_int("live", 17)
//!     .emit();
//! ```

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Log level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// Trace level (most verbose).
    Trace = 0,
    /// Debug level.
    Debug = 1,
    /// Info level.
    Info = 2,
    /// Warning level.
    Warn = 3,
    /// Error level.
    Error = 4,
    /// Off (no logging).
    Off = 5,
}

impl LogLevel {
    /// Get the level name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Off => "OFF",
        }
    }

    /// Get the level from a u8.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(LogLevel::Trace),
            1 => Some(LogLevel::Debug),
            2 => Some(LogLevel::Info),
            3 => Some(LogLevel::Warn),
            4 => Some(LogLevel::Error),
            5 => Some(LogLevel::Off),
            _ => None,
        }
    }

    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            "OFF" | "NONE" => Some(LogLevel::Off),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// Output format for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain text format (human readable).
    #[default]
    Plain,
    /// JSON format (machine readable).
    Json,
}

impl LogFormat {
    /// Parse a format from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Some(LogFormat::Plain),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// A value in a structured log entry.
#[derive(Debug, Clone)]
pub enum LogValue {
    /// String value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
}

impl fmt::Display for LogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogValue::Str(s) => write!(f, "{}", s),
            LogValue::Int(i) => write!(f, "{}", i),
            LogValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl LogValue {
    fn to_json(&self) -> String {
        match self {
            LogValue::Str(s) => format!("\"{}\"", escape_json(s)),
            LogValue::Int(i) => i.to_string(),
            LogValue::Bool(b) => b.to_string(),
        }
    }
}

/// A log entry: level, message, and structured fields.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level.
    pub level: LogLevel,
    /// Log message.
    pub message: String,
    /// Structured key-value fields.
    pub fields: Vec<(String, LogValue)>,
    /// Timestamp (Unix milliseconds).
    pub timestamp: u64,
    /// Module/target name.
    pub target: Option<&'static str>,
}

impl LogEntry {
    /// Create a new log entry with the current timestamp.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            level,
            message: message.into(),
            fields: Vec::new(),
            timestamp,
            target: None,
        }
    }

    /// Format as plain text.
    pub fn format_plain(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "[{}.{:03}] {:<5} ",
            self.timestamp / 1000,
            self.timestamp % 1000,
            self.level.as_str()
        ));
        if let Some(target) = self.target {
            out.push_str(&format!("[{}] ", target));
        }
        out.push_str(&self.message);
        if !self.fields.is_empty() {
            out.push_str(" {");
            for (i, (key, value)) in self.fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format!("{}={}", key, value));
            }
            out.push('}');
        }
        out
    }

    /// Format as JSON.
    pub fn format_json(&self) -> String {
        let mut out = String::from("{");
        out.push_str(&format!("\"timestamp\":{}", self.timestamp));
        out.push_str(&format!(",\"level\":\"{}\"", self.level.as_str()));
        if let Some(target) = self.target {
            out.push_str(&format!(",\"target\":\"{}\"", escape_json(target)));
        }
        out.push_str(&format!(",\"message\":\"{}\"", escape_json(&self.message)));
        if !self.fields.is_empty() {
            out.push_str(",\"fields\":{");
            for (i, (key, value)) in self.fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&format!("\"{}\":{}", escape_json(key), value.to_json()));
            }
            out.push('}');
        }
        out.push('}');
        out
    }

    /// Format according to the given format.
    pub fn format(&self, format: LogFormat) -> String {
        match format {
            LogFormat::Plain => self.format_plain(),
            LogFormat::Json => self.format_json(),
        }
    }
}

/// Escape a string for JSON output.
fn escape_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Minimum log level (atomic for fast checking).
static MIN_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Global sink configuration.
static SINK: OnceLock<Mutex<SinkConfig>> = OnceLock::new();

#[derive(Debug)]
struct SinkConfig {
    format: LogFormat,
    use_stderr: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Plain,
            use_stderr: true,
        }
    }
}

fn sink() -> &'static Mutex<SinkConfig> {
    SINK.get_or_init(|| Mutex::new(SinkConfig::default()))
}

/// Set the minimum log level.
pub fn set_level(level: LogLevel) {
    MIN_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Get the current minimum log level.
pub fn level() -> LogLevel {
    LogLevel::from_u8(MIN_LEVEL.load(Ordering::SeqCst)).unwrap_or(LogLevel::Info)
}

/// Set the output format.
pub fn set_format(format: LogFormat) {
    sink().lock().format = format;
}

/// Set whether to write to stderr (default) or stdout.
pub fn set_use_stderr(use_stderr: bool) {
    sink().lock().use_stderr = use_stderr;
}

/// Check if a log level would be logged.
pub fn would_log(level: LogLevel) -> bool {
    level != LogLevel::Off && level >= self::level()
}

/// Emit a log entry.
pub fn emit(entry: &LogEntry) {
    if !would_log(entry.level) {
        return;
    }

    let (output, use_stderr) = {
        let config = sink().lock();
        (entry.format(config.format), config.use_stderr)
    };

    if use_stderr {
        let _ = writeln!(std::io::stderr(), "{}", output);
    } else {
        let _ = writeln!(std::io::stdout(), "{}", output);
    }
}

/// Builder for log entries.
#[derive(Debug)]
pub struct LogBuilder {
    entry: LogEntry,
}

impl LogBuilder {
    /// Create a new log builder.
    pub fn new(level: LogLevel) -> Self {
        Self {
            entry: LogEntry::new(level, ""),
        }
    }

    /// Set the message.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.entry.message = msg.into();
        self
    }

    /// Set the target.
    pub fn target(mut self, target: &'static str) -> Self {
        self.entry.target = Some(target);
        self
    }

    /// Add a string field.
    pub fn field_str(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entry
            .fields
            .push((key.into(), LogValue::Str(value.into())));
        self
    }

    /// Add an integer field.
    pub fn field_int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.entry.fields.push((key.into(), LogValue::Int(value)));
        self
    }

    /// Add a boolean field.
    pub fn field_bool(mut self, key: impl Into<String>, value: bool) -> Self {
        self.entry.fields.push((key.into(), LogValue::Bool(value)));
        self
    }

    /// Emit the log entry.
    pub fn emit(self) {
        emit(&self.entry);
    }
}

/// Log a message at the given level.
pub fn log(level: LogLevel, message: impl Into<String>) {
    if !would_log(level) {
        return;
    }
    emit(&LogEntry::new(level, message));
}

/// Log a trace message.
pub fn trace(message: impl Into<String>) {
    log(LogLevel::Trace, message);
}

/// Log a debug message.
pub fn debug(message: impl Into<String>) {
    log(LogLevel::Debug, message);
}

/// Log an info message.
pub fn info(message: impl Into<String>) {
    log(LogLevel::Info, message);
}

/// Log a warning message.
pub fn warn(message: impl Into<String>) {
    log(LogLevel::Warn, message);
}

/// Log an error message.
pub fn error(message: impl Into<String>) {
    log(LogLevel::Error, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Off);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("TRACE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("Warn"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_level_roundtrip() {
        for v in 0..=5u8 {
            let level = LogLevel::from_u8(v).unwrap();
            assert_eq!(level as u8, v);
        }
        assert_eq!(LogLevel::from_u8(6), None);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("plain"), Some(LogFormat::Plain));
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Plain));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_entry_format_plain() {
        let mut entry = LogEntry::new(LogLevel::Info, "coroutine created");
        entry.target = Some("weft::scheduler");
        entry.fields.push(("id".into(), LogValue::Int(3)));
        entry.fields.push(("live".into(), LogValue::Int(17)));

        let plain = entry.format_plain();
        assert!(plain.contains("INFO"));
        assert!(plain.contains("[weft::scheduler]"));
        assert!(plain.contains("coroutine created"));
        assert!(plain.contains("id=3"));
        assert!(plain.contains("live=17"));
    }

    #[test]
    fn test_entry_format_json() {
        let mut entry = LogEntry::new(LogLevel::Error, "shared stack exhausted");
        entry.fields.push(("bytes".into(), LogValue::Int(8388608)));
        entry.fields.push(("fatal".into(), LogValue::Bool(true)));

        let json = entry.format_json();
        assert!(json.contains("\"level\":\"ERROR\""));
        assert!(json.contains("\"message\":\"shared stack exhausted\""));
        assert!(json.contains("\"bytes\":8388608"));
        assert!(json.contains("\"fatal\":true"));
    }

    #[test]
    fn test_escape_json() {
        assert_eq!(escape_json("plain"), "plain");
        assert_eq!(escape_json("a\"b"), "a\\\"b");
        assert_eq!(escape_json("line1\nline2"), "line1\\nline2");
        assert_eq!(escape_json("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_builder() {
        let builder = LogBuilder::new(LogLevel::Debug)
            .message("sweep pass")
            .target("weft::scheduler")
            .field_int("expired", 2)
            .field_bool("wrapped", false)
            .field_str("phase", "idle");

        assert_eq!(builder.entry.level, LogLevel::Debug);
        assert_eq!(builder.entry.message, "sweep pass");
        assert_eq!(builder.entry.target, Some("weft::scheduler"));
        assert_eq!(builder.entry.fields.len(), 3);
    }

    #[test]
    fn test_would_log() {
        let original = level();
        set_level(LogLevel::Warn);
        assert!(!would_log(LogLevel::Debug));
        assert!(!would_log(LogLevel::Info));
        assert!(would_log(LogLevel::Warn));
        assert!(would_log(LogLevel::Error));
        assert!(!would_log(LogLevel::Off));
        set_level(original);
    }
}
