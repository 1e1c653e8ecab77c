//! keyscan - Bitcoin Private Key Balance Scanner
//!
//! Reads candidate private keys from a text file, derives the legacy P2PKH
//! address for each valid key and asks public block explorers whether that
//! address holds a balance. Hits are written to CSV as soon as they are found.
//!
//! ## Pipeline
//!
//! 1. **KeyExtractor** - Finds a WIF or hex key embedded in a noisy line
//! 2. **AddressResolver** - Derives the address for a validated key
//! 3. **BalanceStrategy** - Picks provider(s): auto fallback, rotate or pinned
//! 4. **ResultSink** - Appends hits to CSV, rolling over by file size
//! 5. **ScanController** - Drives the sequential per-line loop
//!
//! The web front end, job bookkeeping and upload handling live outside this
//! crate and talk to it through [`ScanController`] and [`ProgressEvent`].

pub mod common;
pub mod keys;
pub mod providers;
pub mod scanner;
pub mod sink;

// Re-exports: common infrastructure
pub use common::{
    init_from_config, init_logging, ConfigError, KeyscanError, LogLevel, LoggingError, ProviderMode, ScanConfig,
};

// Re-exports: keys
pub use keys::{AddressResolver, KeyEncoding, KeyError, KeyExtractor, PrivateKey};

// Re-exports: providers
pub use providers::{
    BalanceQueryResult, BalanceStrategy, HttpProvider, LookupProvider, ProviderError,
    ProviderKind, ProviderRegistry,
};

// Re-exports: scanner
pub use scanner::{
    progress_channel, FoundKey, FoundRecord, ProgressCallback, ProgressEvent, ScanController,
    ScanError, ScanState, ScanSummary, StepOutcome,
};

// Re-exports: result sink
pub use sink::{ResultSink, SinkError, CSV_HEADER};

/// Satoshi conversion helpers
pub mod units {
    pub const SATS_PER_BTC: u64 = 100_000_000;

    pub fn sats_to_btc(sats: u64) -> f64 {
        sats as f64 / SATS_PER_BTC as f64
    }

    /// Fixed 8-decimal rendering used in reports and CSV rows
    pub fn format_btc(btc: f64) -> String {
        format!("{:.8}", btc)
    }

}
