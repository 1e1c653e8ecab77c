//! Structured Logging
//!
//! Provides structured logging for scan runs with:
//! - Pretty output for interactive use, JSON output for log collectors
//! - Session IDs so interleaved runs can be told apart
//! - Dedicated events for scan start and finish, balance hits, exhausted
//!   providers and rollover
//!
//! # Usage
//!
//! ```no_run
//! use keyscan::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, false).expect("logging");
//! tracing::info!(target: "keyscan::scan", "Starting scan");
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Scan lifecycle (start, completion)
    Scan,
    /// Positive balance hits
    Balance,
    /// Provider failures
    Provider,
    /// Output file events (rollover, fallback)
    Output,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (ISO 8601)
    pub timestamp: String,
    /// Log level
    pub level: String,
    /// Event category
    pub category: EventCategory,
    /// Human-readable message
    pub message: String,
    /// Scan session the event belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Additional structured data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl LogEvent {
    /// Create a new log event
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_filter().to_uppercase(),
            category,
            message: message.into(),
            session_id: None,
            data: None,
        }
    }

    /// Add session ID
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Add structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Render this event as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Scan Event Logging
// ============================================================================

/// Build a scan lifecycle event
fn scan_event(message: &str, session_id: &str, data: serde_json::Value) -> LogEvent {
    LogEvent::new(LogLevel::Info, EventCategory::Scan, message)
        .with_session_id(session_id)
        .with_data(data)
}

/// Log the start of a scan session
pub fn log_scan_started(session_id: &str, input: &str, first_line: usize, total: usize, mode: &str) {
    let event = scan_event(
        "scan started",
        session_id,
        serde_json::json!({
            "input": input,
            "first_line": first_line,
            "total": total,
            "mode": mode
        }),
    );

    tracing::info!(target: "keyscan::scan", "{}", event.to_json());
}

/// Log the end of a scan session
pub fn log_scan_finished(
    session_id: &str,
    state: &str,
    processed: usize,
    total: usize,
    found: usize,
    total_balance: f64,
) {
    let event = scan_event(
        "scan finished",
        session_id,
        serde_json::json!({
            "state": state,
            "processed": processed,
            "total": total,
            "found": found,
            "total_balance_btc": total_balance
        }),
    );

    tracing::info!(target: "keyscan::scan", "{}", event.to_json());
}

/// Log a confirmed positive balance
pub fn log_balance_found(
    session_id: &str,
    private_key: &str,
    address: &str,
    balance: f64,
    provider: &str,
) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::Balance, "BALANCE FOUND")
        .with_session_id(session_id)
        .with_data(serde_json::json!({
            "private_key": private_key,
            "address": address,
            "balance_btc": balance,
            "provider": provider
        }));

    tracing::info!(target: "keyscan::balance", "{}", event.to_json());
}

/// Log that no provider could answer for an address
///
/// The session id comes from the enclosing scan span.
pub fn log_providers_exhausted(address: &str, attempted: usize) {
    let event = LogEvent::new(
        LogLevel::Error,
        EventCategory::Provider,
        "all providers failed",
    )
    .with_data(serde_json::json!({
        "address": address,
        "attempted": attempted
    }));

    tracing::error!(target: "keyscan::provider", "{}", event.to_json());
}

/// Log an output rollover
pub fn log_output_rollover(from: &str, to: &str, size_bytes: u64, limit_bytes: u64) {
    let event = LogEvent::new(
        LogLevel::Info,
        EventCategory::Output,
        "output file size limit reached",
    )
    .with_data(serde_json::json!({
        "from": from,
        "to": to,
        "size_bytes": size_bytes,
        "limit_bytes": limit_bytes
    }));

    tracing::info!(target: "keyscan::output", "{}", event.to_json());
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Minimum log level to output
/// * `json_format` - Use JSON format (for log collectors)
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "keyscan={},reqwest=warn,hyper=warn",
            level.as_filter()
        ))
    });

    if json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_span_events(FmtSpan::NONE),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from ScanConfig
pub fn init_from_config(
    config: &crate::common::config::ScanConfig,
    json_format: bool,
) -> Result<(), LoggingError> {
    init_logging(LogLevel::from(config.log_level.as_str()), json_format)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(LogLevel::Info, EventCategory::Balance, "Test event")
            .with_session_id("session-123")
            .with_data(serde_json::json!({"provider": "mempool"}));

        let json = event.to_json();
        assert!(json.contains("Test event"));
        assert!(json.contains("session-123"));
        assert!(json.contains("\"category\":\"balance\""));
        assert!(json.contains("mempool"));
    }

    #[test]
    fn test_scan_event_shape() {
        let json = scan_event(
            "scan finished",
            "session-9",
            serde_json::json!({"state": "completed", "found": 2}),
        )
        .to_json();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["category"], "scan");
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["session_id"], "session-9");
        assert_eq!(value["data"]["found"], 2);
    }

    #[test]
    fn test_optional_fields_omitted() {
        let json = LogEvent::new(LogLevel::Warn, EventCategory::Output, "x").to_json();
        assert!(!json.contains("session_id"));
        assert!(!json.contains("data"));
        assert!(json.contains("\"level\":\"WARN\""));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::from("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from("unknown"), LogLevel::Info);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
    }
}
