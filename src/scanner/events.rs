//! Scan records, progress events and run summary

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Timestamp format used in CSV rows and reports
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A key whose address holds a positive balance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoundRecord {
    pub private_key: String,
    pub address: String,
    /// Balance in BTC
    pub balance: f64,
    pub provider_name: String,
    /// Local time the record was created
    pub timestamp: String,
}

impl FoundRecord {
    /// Create a record stamped with the current local time
    pub fn new(
        private_key: impl Into<String>,
        address: impl Into<String>,
        balance: f64,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            private_key: private_key.into(),
            address: address.into(),
            balance,
            provider_name: provider_name.into(),
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Hit detail carried by a progress event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoundKey {
    pub private_key: String,
    pub address: String,
    pub balance: f64,
    pub provider_name: String,
}

impl From<&FoundRecord> for FoundKey {
    fn from(record: &FoundRecord) -> Self {
        Self {
            private_key: record.private_key.clone(),
            address: record.address.clone(),
            balance: record.balance,
            provider_name: record.provider_name.clone(),
        }
    }
}

/// Progress report for a running scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub session_id: String,
    /// 1-based position within the selected line range
    pub processed: usize,
    /// Lines in the selected range
    pub total: usize,
    pub found_count: usize,
    /// Sum of balances found so far, in BTC
    pub total_balance: f64,
    /// Present only on the event emitted for a hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<FoundKey>,
}

impl ProgressEvent {
    pub fn is_hit(&self) -> bool {
        self.found.is_some()
    }
}

/// Typed progress callback
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Callback that forwards every event into an unbounded channel
///
/// Events sent after the receiver is dropped are discarded.
pub fn progress_channel() -> (ProgressCallback, mpsc::UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: ProgressCallback = Arc::new(move |event: &ProgressEvent| {
        let _ = tx.send(event.clone());
    });
    (callback, rx)
}

/// Scan lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Created, input not loaded yet
    #[default]
    Idle,
    /// Input loaded, lines remaining
    Running,
    /// Every selected line processed
    Completed,
    /// Input could not be read
    Failed,
    /// Stopped by the driver between lines
    Cancelled,
}

impl ScanState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::Completed | ScanState::Failed | ScanState::Cancelled
        )
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanState::Idle => write!(f, "idle"),
            ScanState::Running => write!(f, "running"),
            ScanState::Completed => write!(f, "completed"),
            ScanState::Failed => write!(f, "failed"),
            ScanState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What happened to one line
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Blank or comment line
    Skipped,
    /// No derivable key in the line
    NoKey,
    /// No provider produced an answer
    BalanceUnavailable { address: String },
    /// Zero balance
    Empty { address: String, provider_name: String },
    /// Positive balance, recorded
    Found(FoundRecord),
}

/// End-of-run report
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub session_id: String,
    pub state: ScanState,
    /// Lines of the selected range that were processed
    pub lines_processed: usize,
    pub total_lines: usize,
    pub found: Vec<FoundRecord>,
    /// Sum of found balances in BTC
    pub total_balance: f64,
    /// Hits per provider, keyed by provider name
    pub provider_usage: BTreeMap<String, usize>,
    /// Last file rows were written to, if persistence was available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<std::path::PathBuf>,
}

impl ScanSummary {
    pub fn found_count(&self) -> usize {
        self.found.len()
    }
}
