//! Scan controller
//!
//! Drives the per-line loop: extract, derive, look up, record, report.
//!
//! ```text
//! Idle --start()--> Running --step()...--> Completed
//!   |                  |
//!   |                  +--cancel()--> Cancelled
//!   +--start() on unreadable input--> Failed
//! ```
//!
//! Each [`step`](ScanController::step) handles exactly one line, so a driver
//! can stop between keys without leaving the session half-updated. Rows
//! already written by the sink stay valid after a cancel.

use std::collections::BTreeMap;

use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use super::events::{
    FoundKey, FoundRecord, ProgressCallback, ProgressEvent, ScanState, ScanSummary, StepOutcome,
};
use super::ScanError;
use crate::common::config::ScanConfig;
use crate::common::error::Result;
use crate::common::logging::{log_balance_found, log_scan_finished, log_scan_started};
use crate::keys::{truncate_for_log, AddressResolver, KeyExtractor};
use crate::providers::{BalanceStrategy, ProviderRegistry};
use crate::sink::ResultSink;

/// Characters of a key-miss line kept in the warning
const LOG_LINE_CHARS: usize = 30;

/// Progress is reported every this many lines
const PROGRESS_INTERVAL: usize = 10;

/// One scan session
pub struct ScanController {
    config: ScanConfig,
    session_id: String,
    span: Span,

    extractor: KeyExtractor,
    resolver: AddressResolver,
    strategy: BalanceStrategy,
    sink: ResultSink,
    persisting: bool,
    progress: Option<ProgressCallback>,

    state: ScanState,
    lines: Vec<String>,
    cursor: usize,
    found: Vec<FoundRecord>,
    total_balance: f64,
    provider_usage: BTreeMap<String, usize>,
}

impl ScanController {
    /// Controller backed by the full HTTP provider catalog
    pub fn new(config: ScanConfig) -> Result<Self> {
        let registry = ProviderRegistry::http(&config)?;
        Ok(Self::with_registry(config, registry))
    }

    /// Controller over a caller-supplied registry
    pub fn with_registry(config: ScanConfig, registry: ProviderRegistry) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let span = info_span!("scan", session = %session_id);
        let strategy = span.in_scope(|| BalanceStrategy::new(registry, &config.provider_mode));
        let sink = ResultSink::new(config.output_path.clone(), config.max_file_size_bytes);

        Self {
            config,
            session_id,
            span,
            extractor: KeyExtractor::new(),
            resolver: AddressResolver::new(),
            strategy,
            sink,
            persisting: false,
            progress: None,
            state: ScanState::Idle,
            lines: Vec::new(),
            cursor: 0,
            found: Vec::new(),
            total_balance: 0.0,
            provider_usage: BTreeMap::new(),
        }
    }

    /// Receive a [`ProgressEvent`] every few lines and on every hit
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Log inside the caller's span instead of the default `scan` span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Replace the sink built from the config
    pub fn with_sink(mut self, sink: ResultSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Lines in the selected range
    pub fn total_lines(&self) -> usize {
        self.lines.len()
    }

    pub fn lines_processed(&self) -> usize {
        self.cursor
    }

    pub fn found(&self) -> &[FoundRecord] {
        &self.found
    }

    /// Load the selected line range and open the output file
    ///
    /// A sink that cannot be opened even via its fallback does not fail the
    /// start: the scan proceeds and hits are kept in memory only.
    pub async fn start(&mut self) -> std::result::Result<(), ScanError> {
        let span = self.span.clone();
        self.start_inner().instrument(span).await
    }

    async fn start_inner(&mut self) -> std::result::Result<(), ScanError> {
        if self.state != ScanState::Idle {
            return Err(ScanError::AlreadyStarted);
        }

        let path = self.config.input_path.clone();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = ScanError::from_io(path, e);
                error!(error = %err, "cannot start scan");
                self.state = ScanState::Failed;
                return Err(err);
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        let all: Vec<&str> = text.lines().collect();
        let end = self.config.end_line.unwrap_or(all.len()).min(all.len());
        let start = self.config.start_line.min(end);
        self.lines = all[start..end].iter().map(|l| l.to_string()).collect();

        match self.sink.initialize() {
            Ok(output) => {
                self.persisting = true;
                debug!(output = %output.display(), "persisting hits");
            }
            Err(e) => {
                error!(error = %e, "no usable output file, hits kept in memory only");
                self.persisting = false;
            }
        }

        log_scan_started(
            &self.session_id,
            &self.config.input_path.display().to_string(),
            start,
            self.lines.len(),
            &self.config.provider_mode.to_string(),
        );

        self.state = if self.lines.is_empty() {
            ScanState::Completed
        } else {
            ScanState::Running
        };
        Ok(())
    }

    /// Process the next line
    ///
    /// Returns `None` once the scan is no longer running (finished,
    /// cancelled, failed or never started).
    pub async fn step(&mut self) -> Option<StepOutcome> {
        if self.state != ScanState::Running {
            return None;
        }

        let line = self.lines.get(self.cursor).cloned()?;
        self.cursor += 1;
        let position = self.cursor;
        let total = self.lines.len();

        let span = self.span.clone();
        let outcome = self.process_line(position, &line).instrument(span).await;

        if position % PROGRESS_INTERVAL == 0 || position == total {
            self.emit(None);
        }
        if position == total {
            self.state = ScanState::Completed;
        }

        Some(outcome)
    }

    /// Stop before the next line
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = ScanState::Cancelled;
        self.span.in_scope(|| {
            info!(
                processed = self.cursor,
                total = self.lines.len(),
                "scan cancelled"
            )
        });
    }

    /// Snapshot of the session so far
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            session_id: self.session_id.clone(),
            state: self.state,
            lines_processed: self.cursor,
            total_lines: self.lines.len(),
            found: self.found.clone(),
            total_balance: self.total_balance,
            provider_usage: self.provider_usage.clone(),
            output_path: self
                .persisting
                .then(|| self.sink.current_path().map(|p| p.to_path_buf()))
                .flatten(),
        }
    }

    /// Close the session and report
    ///
    /// A session still running is marked cancelled.
    pub fn finish(&mut self) -> ScanSummary {
        if self.state == ScanState::Running {
            self.cancel();
        }

        let summary = self.summary();
        self.span.in_scope(|| {
            log_scan_finished(
                &summary.session_id,
                &summary.state.to_string(),
                summary.lines_processed,
                summary.total_lines,
                summary.found_count(),
                summary.total_balance,
            )
        });
        summary
    }

    /// Run every selected line and report
    ///
    /// An unreadable input yields an empty summary in the `Failed` state.
    pub async fn run(mut self) -> ScanSummary {
        if self.start().await.is_ok() {
            while self.step().await.is_some() {}
        }
        self.finish()
    }

    async fn process_line(&mut self, position: usize, line: &str) -> StepOutcome {
        if KeyExtractor::is_skippable(line) {
            return StepOutcome::Skipped;
        }

        let Some(key) = self.extractor.extract(line) else {
            warn!(
                line = position,
                content = %truncate_for_log(line.trim(), LOG_LINE_CHARS),
                "no valid private key found"
            );
            return StepOutcome::NoKey;
        };

        let address = self.resolver.resolve(&key).to_string();
        debug!(line = position, address = %address, "checking address");

        let result = self.strategy.resolve(&address).await;

        let outcome = match result.balance {
            None => {
                warn!(line = position, address = %address, "balance unavailable, skipping key");
                StepOutcome::BalanceUnavailable { address }
            }
            Some(balance) if balance > 0.0 => {
                let record =
                    FoundRecord::new(key.as_str(), address, balance, result.provider_name);
                self.record_hit(&record);
                StepOutcome::Found(record)
            }
            Some(_) => StepOutcome::Empty {
                address,
                provider_name: result.provider_name,
            },
        };

        if !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }

        outcome
    }

    fn record_hit(&mut self, record: &FoundRecord) {
        log_balance_found(
            &self.session_id,
            &record.private_key,
            &record.address,
            record.balance,
            &record.provider_name,
        );

        if self.persisting {
            if let Err(e) = self.sink.append(record) {
                error!(address = %record.address, error = %e, "failed to persist hit");
            }
        }

        self.found.push(record.clone());
        self.total_balance += record.balance;
        *self
            .provider_usage
            .entry(record.provider_name.clone())
            .or_insert(0) += 1;

        self.emit(Some(FoundKey::from(record)));
    }

    fn emit(&self, found: Option<FoundKey>) {
        if let Some(callback) = &self.progress {
            callback(&ProgressEvent {
                session_id: self.session_id.clone(),
                processed: self.cursor,
                total: self.lines.len(),
                found_count: self.found.len(),
                total_balance: self.total_balance,
                found,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::ProviderMode;
    use crate::providers::MockLookupProvider;
    use crate::scanner::progress_channel;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    const HEX_KEY: &str = "0C28FCA386C7A227600B2FE50B7CAE11EC86D3BF1FBE471BE89827E19D72AA1D";
    const HEX_KEY_ADDRESS: &str = "1GAehh7TsJAHuUAeKZcXf5CnwuGuGgyX2S";
    const WIF_ONE: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";

    fn config(dir: &TempDir, lines: &[&str]) -> ScanConfig {
        let input = dir.path().join("keys.txt");
        std::fs::write(&input, lines.join("\n")).unwrap();

        let mut config = ScanConfig::new(input, dir.path().join("out/found.csv"));
        config.delay = Duration::ZERO;
        config
    }

    fn funded_only(address: &'static str, balance: f64) -> MockLookupProvider {
        let mut mock = MockLookupProvider::new();
        mock.expect_query().returning(move |queried| {
            Ok(Some(if queried == address { balance } else { 0.0 }))
        });
        mock
    }

    #[tokio::test]
    async fn test_lifecycle_and_outcomes() {
        let dir = tempdir().unwrap();
        let config = config(
            &dir,
            &["# header", "", WIF_ONE, "just some prose", HEX_KEY],
        );
        let registry =
            ProviderRegistry::new().with("stub", funded_only(HEX_KEY_ADDRESS, 0.25));

        let mut controller = ScanController::with_registry(config, registry);
        assert_eq!(controller.state(), ScanState::Idle);

        controller.start().await.unwrap();
        assert_eq!(controller.state(), ScanState::Running);
        assert_eq!(controller.total_lines(), 5);

        assert_eq!(controller.step().await, Some(StepOutcome::Skipped));
        assert_eq!(controller.step().await, Some(StepOutcome::Skipped));
        assert!(matches!(
            controller.step().await,
            Some(StepOutcome::Empty { .. })
        ));
        assert_eq!(controller.step().await, Some(StepOutcome::NoKey));

        match controller.step().await {
            Some(StepOutcome::Found(record)) => {
                assert_eq!(record.address, HEX_KEY_ADDRESS);
                assert_eq!(record.private_key, HEX_KEY);
                assert_eq!(record.provider_name, "stub");
            }
            other => panic!("expected a hit, got {:?}", other),
        }

        assert_eq!(controller.state(), ScanState::Completed);
        assert_eq!(controller.step().await, None);

        let summary = controller.finish();
        assert_eq!(summary.found_count(), 1);
        assert_eq!(summary.lines_processed, 5);
        assert_eq!(summary.total_balance, 0.25);
        assert_eq!(summary.provider_usage.get("stub"), Some(&1));
        assert!(summary.output_path.is_some());
    }

    #[tokio::test]
    async fn test_line_range_is_half_open() {
        let dir = tempdir().unwrap();
        let mut config = config(&dir, &["a", "b", "c", "d", "e"]);
        config.start_line = 1;
        config.end_line = Some(3);

        let mut controller = ScanController::with_registry(config, ProviderRegistry::new());
        controller.start().await.unwrap();
        assert_eq!(controller.total_lines(), 2);

        let mut config2 = ScanConfig::new(dir.path().join("keys.txt"), dir.path().join("o.csv"));
        config2.start_line = 10;
        let mut controller = ScanController::with_registry(config2, ProviderRegistry::new());
        controller.start().await.unwrap();
        assert_eq!(controller.total_lines(), 0);
        assert_eq!(controller.state(), ScanState::Completed);
    }

    #[tokio::test]
    async fn test_missing_input_fails() {
        let dir = tempdir().unwrap();
        let config = ScanConfig::new(dir.path().join("absent.txt"), dir.path().join("o.csv"));

        let mut controller = ScanController::with_registry(config, ProviderRegistry::new());
        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, ScanError::InputMissing(_)));
        assert_eq!(controller.state(), ScanState::Failed);
        assert!(matches!(
            controller.start().await,
            Err(ScanError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_unavailable_balance_is_skipped() {
        let dir = tempdir().unwrap();
        let config = config(&dir, &[HEX_KEY]);

        let mut mock = MockLookupProvider::new();
        mock.expect_query().times(1).returning(|_| Ok(None));
        let registry = ProviderRegistry::new().with("silent", mock);

        let summary = ScanController::with_registry(config, registry).run().await;
        assert_eq!(summary.state, ScanState::Completed);
        assert_eq!(summary.found_count(), 0);
        assert_eq!(summary.lines_processed, 1);
    }

    #[tokio::test]
    async fn test_progress_cadence() {
        let dir = tempdir().unwrap();
        let lines: Vec<&str> = std::iter::repeat("noise").take(25).collect();
        let config = config(&dir, &lines);

        let (callback, mut rx) = progress_channel();
        let summary = ScanController::with_registry(config, ProviderRegistry::new())
            .with_progress(callback)
            .run()
            .await;
        assert_eq!(summary.lines_processed, 25);

        let mut positions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.total, 25);
            positions.push(event.processed);
        }
        assert_eq!(positions, vec![10, 20, 25]);
    }

    #[tokio::test]
    async fn test_hit_emits_event_with_detail() {
        let dir = tempdir().unwrap();
        let config = config(&dir, &["noise", HEX_KEY, "noise"]);
        let registry =
            ProviderRegistry::new().with("stub", funded_only(HEX_KEY_ADDRESS, 1.5));

        let (callback, mut rx) = progress_channel();
        ScanController::with_registry(config, registry)
            .with_progress(callback)
            .run()
            .await;

        let hit = rx.try_recv().unwrap();
        assert_eq!(hit.processed, 2);
        assert_eq!(hit.found_count, 1);
        let found = hit.found.unwrap();
        assert_eq!(found.address, HEX_KEY_ADDRESS);
        assert_eq!(found.balance, 1.5);

        let last = rx.try_recv().unwrap();
        assert_eq!(last.processed, 3);
        assert!(!last.is_hit());
        assert_eq!(last.total_balance, 1.5);
    }

    #[tokio::test]
    async fn test_cancel_stops_between_lines() {
        let dir = tempdir().unwrap();
        let config = config(&dir, &[HEX_KEY, HEX_KEY, HEX_KEY]);
        let registry =
            ProviderRegistry::new().with("stub", funded_only(HEX_KEY_ADDRESS, 0.1));

        let mut controller = ScanController::with_registry(config, registry);
        controller.start().await.unwrap();
        controller.step().await;
        controller.cancel();

        assert_eq!(controller.step().await, None);
        let summary = controller.finish();
        assert_eq!(summary.state, ScanState::Cancelled);
        assert_eq!(summary.lines_processed, 1);
        assert_eq!(summary.found_count(), 1);
    }

    #[tokio::test]
    async fn test_rotate_mode_through_controller() {
        let dir = tempdir().unwrap();
        let mut config = config(&dir, &[HEX_KEY, WIF_ONE, HEX_KEY]);
        config.provider_mode = ProviderMode::Rotate;

        let registry = ProviderRegistry::new()
            .with("a", funded_only(HEX_KEY_ADDRESS, 0.5))
            .with("b", funded_only(HEX_KEY_ADDRESS, 0.5));

        let summary = ScanController::with_registry(config, registry).run().await;
        assert_eq!(summary.found_count(), 2);
        assert_eq!(summary.provider_usage.get("a"), Some(&2));
        assert_eq!(summary.provider_usage.get("b"), None);
    }

    #[tokio::test]
    async fn test_unpersisted_hits_kept_in_memory() {
        let dir = tempdir().unwrap();
        let config = config(&dir, &[HEX_KEY]);
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();

        let sink = ResultSink::new(blocker.join("found.csv"), 1024)
            .with_fallback_dir(blocker.join("nope"));
        let registry =
            ProviderRegistry::new().with("stub", funded_only(HEX_KEY_ADDRESS, 0.3));

        let summary = ScanController::with_registry(config, registry)
            .with_sink(sink)
            .run()
            .await;

        assert_eq!(summary.state, ScanState::Completed);
        assert_eq!(summary.found_count(), 1);
        assert!(summary.output_path.is_none());
    }
}
