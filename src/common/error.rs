//! Common Error Types
//!
//! Provides unified error handling across all modules.

use thiserror::Error;

/// Root error type for the scanner
#[derive(Debug, Error)]
pub enum KeyscanError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Key parsing / derivation errors
    #[error("key error: {0}")]
    Key(#[from] crate::keys::KeyError),

    /// Balance provider errors
    #[error("provider error: {0}")]
    Provider(#[from] crate::providers::ProviderError),

    /// Result persistence errors
    #[error("output error: {0}")]
    Sink(#[from] crate::sink::SinkError),

    /// Scan run errors
    #[error("scan error: {0}")]
    Scan(#[from] crate::scanner::ScanError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeyscanError {
    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            KeyscanError::Provider(e) => e.is_transient(),
            KeyscanError::Sink(_) | KeyscanError::Io(_) => true,
            _ => false,
        }
    }

    /// Get a stable error code for reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            KeyscanError::Config(_) => "CONFIG_ERROR",
            KeyscanError::Logging(_) => "LOGGING_ERROR",
            KeyscanError::Key(_) => "KEY_ERROR",
            KeyscanError::Provider(_) => "PROVIDER_ERROR",
            KeyscanError::Sink(_) => "OUTPUT_ERROR",
            KeyscanError::Scan(_) => "SCAN_ERROR",
            KeyscanError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using KeyscanError
pub type Result<T> = std::result::Result<T, KeyscanError>;
