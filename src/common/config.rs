//! Scan Configuration
//!
//! Everything a [`crate::ScanController`] needs at construction. Values come
//! from defaults, then the environment, then the command line.
//!
//! # Environment Variables
//!
//! - `KEYSCAN_OUTPUT` - Output CSV path (default: "found_balances.txt")
//! - `KEYSCAN_DELAY` - Seconds to wait after each checked key (default: 1.0)
//! - `KEYSCAN_API` - "auto", "rotate" or a provider name (default: "auto")
//! - `KEYSCAN_MAX_FILE_MB` - Output rollover threshold in MiB (default: 10000)
//! - `KEYSCAN_TIMEOUT_SECS` - Per-request provider timeout (default: 10)
//! - `KEYSCAN_LOG_LEVEL` - Logging level (debug, info, warn, error)

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default rollover threshold, in MiB
pub const DEFAULT_MAX_FILE_MB: u64 = 10_000;

/// Default output file name
pub const DEFAULT_OUTPUT_FILE: &str = "found_balances.txt";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("invalid line range: start {start} is past end {end}")]
    InvalidRange { start: usize, end: usize },
}

/// How balance lookups pick a provider
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderMode {
    /// Try every provider in registration order until one answers
    #[default]
    Auto,
    /// Round-robin over the providers, one per lookup
    Rotate,
    /// Always use the named provider
    Pinned(String),
}

impl FromStr for ProviderMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "" => Err(ConfigError::InvalidValue(
                "provider mode".to_string(),
                "empty".to_string(),
            )),
            "auto" => Ok(ProviderMode::Auto),
            "rotate" => Ok(ProviderMode::Rotate),
            // Unknown names are resolved against the registry later and
            // degrade to the default provider there.
            _ => Ok(ProviderMode::Pinned(s)),
        }
    }
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderMode::Auto => f.write_str("auto"),
            ProviderMode::Rotate => f.write_str("rotate"),
            ProviderMode::Pinned(name) => f.write_str(name),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Newline-delimited file of candidate keys
    pub input_path: PathBuf,

    /// CSV output template (rollover files derive from it)
    pub output_path: PathBuf,

    /// Courtesy delay after every checked key
    pub delay: Duration,

    /// Provider selection mode
    pub provider_mode: ProviderMode,

    /// First line to process (0-indexed, inclusive)
    pub start_line: usize,

    /// Line to stop at (exclusive); `None` means end of file
    pub end_line: Option<usize>,

    /// Roll over to a new output file once the current one reaches this size
    pub max_file_size_bytes: u64,

    /// Bound on every outbound provider request
    pub request_timeout: Duration,

    /// User agent sent to providers
    pub user_agent: String,

    /// Log level
    pub log_level: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            delay: Duration::from_secs(1),
            provider_mode: ProviderMode::Auto,
            start_line: 0,
            end_line: None,
            max_file_size_bytes: DEFAULT_MAX_FILE_MB * 1024 * 1024,
            request_timeout: Duration::from_secs(10),
            user_agent: format!("keyscan/{}", env!("CARGO_PKG_VERSION")),
            log_level: "info".to_string(),
        }
    }
}

impl ScanConfig {
    /// Create a config for the given input and output paths
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables on top of defaults
    ///
    /// The input path is never taken from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(output) = env::var("KEYSCAN_OUTPUT") {
            config.output_path = PathBuf::from(output);
        }

        if let Some(secs) = parse_env::<f64>("KEYSCAN_DELAY")? {
            config.delay = delay_from_secs(secs)?;
        }

        if let Some(mode) = parse_env::<ProviderMode>("KEYSCAN_API")? {
            config.provider_mode = mode;
        }

        if let Some(mb) = parse_env::<u64>("KEYSCAN_MAX_FILE_MB")? {
            config.max_file_size_bytes = max_file_bytes_from_mb(mb)?;
        }

        if let Some(secs) = parse_env::<u64>("KEYSCAN_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Ok(level) = env::var("KEYSCAN_LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Check the configuration is usable before a scan starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("input path".to_string()));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("output path".to_string()));
        }

        if let Some(end) = self.end_line {
            if self.start_line > end {
                return Err(ConfigError::InvalidRange {
                    start: self.start_line,
                    end,
                });
            }
        }

        if self.max_file_size_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "max file size".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request timeout".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("=== keyscan Configuration ===");
        println!("Input: {}", self.input_path.display());
        println!("Output: {}", self.output_path.display());
        println!("Provider Mode: {}", self.provider_mode);
        println!("Delay: {:.2}s", self.delay.as_secs_f64());
        println!(
            "Lines: {}..{}",
            self.start_line,
            self.end_line
                .map(|e| e.to_string())
                .unwrap_or_else(|| "EOF".to_string())
        );
        println!(
            "Max File Size: {:.2} MB",
            self.max_file_size_bytes as f64 / 1024.0 / 1024.0
        );
        println!("Request Timeout: {}s", self.request_timeout.as_secs());
        println!("Log Level: {}", self.log_level);
        println!("=============================");
    }
}

/// Convert a (possibly fractional) number of seconds into a delay
pub fn delay_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        ConfigError::InvalidValue(
            "delay".to_string(),
            format!("{} (must be a non-negative number of seconds)", secs),
        )
    })
}

/// Convert a rollover limit in MB to bytes
pub fn max_file_bytes_from_mb(mb: u64) -> Result<u64, ConfigError> {
    mb.checked_mul(1024 * 1024).ok_or_else(|| {
        ConfigError::InvalidValue("max file size".to_string(), format!("{} MB is too large", mb))
    })
}

/// Read and parse an optional environment variable
fn parse_env<T: FromStr>(var_name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(var_name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(var_name.to_string(), raw)),
        Err(_) => Ok(None),
    }
}
