//! Common Infrastructure Module
//!
//! Shared utilities and configuration for the scanner.
//!
//! This module contains:
//! - Scan configuration (defaults, environment overlay, validation)
//! - Structured logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigError, ProviderMode, ScanConfig};
pub use error::{KeyscanError, Result};
pub use logging::{
    init_from_config, init_logging, log_balance_found, log_output_rollover,
    log_providers_exhausted, log_scan_finished, log_scan_started, EventCategory, LogEvent,
    LogLevel, LoggingError,
};
