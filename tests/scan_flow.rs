//! End-to-end scans over fake providers

use async_trait::async_trait;
use keyscan::{
    progress_channel, LookupProvider, ProviderError, ProviderMode, ProviderRegistry, ScanConfig,
    ScanController, ScanState, StepOutcome, CSV_HEADER,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

/// Uncompressed key with a well-known address
const HEX_KEY: &str = "0C28FCA386C7A227600B2FE50B7CAE11EC86D3BF1FBE471BE89827E19D72AA1D";
const HEX_KEY_ADDRESS: &str = "1GAehh7TsJAHuUAeKZcXf5CnwuGuGgyX2S";

/// Compressed WIF of scalar 1
const WIF_ONE: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
const WIF_ONE_ADDRESS: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";

/// Compressed WIF of scalar 2
const WIF_TWO: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU74NMTptX4";
const WIF_TWO_ADDRESS: &str = "1cMh228HTCiwS8ZsaakH8A8wze1JR5ZsP";

/// Answers from a fixed table; unknown addresses hold nothing
struct TableProvider {
    balances: HashMap<String, f64>,
    calls: Arc<AtomicUsize>,
}

impl TableProvider {
    fn new(entries: &[(&str, f64)]) -> Self {
        Self {
            balances: entries
                .iter()
                .map(|(addr, bal)| (addr.to_string(), *bal))
                .collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl LookupProvider for TableProvider {
    async fn query(&self, address: &str) -> Result<Option<f64>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.balances.get(address).copied().unwrap_or(0.0)))
    }
}

/// Every lookup fails
struct DownProvider;

#[async_trait]
impl LookupProvider for DownProvider {
    async fn query(&self, _address: &str) -> Result<Option<f64>, ProviderError> {
        Err(ProviderError::Timeout("down".to_string()))
    }
}

fn write_input(dir: &TempDir, lines: &[&str]) -> PathBuf {
    let path = dir.path().join("keys.txt");
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn fast_config(input: PathBuf, output: PathBuf) -> ScanConfig {
    let mut config = ScanConfig::new(input, output);
    config.delay = Duration::ZERO;
    config
}

fn data_rows(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(|l| l.to_string())
        .collect()
}

#[tokio::test]
async fn test_three_line_scan() {
    let dir = tempdir().unwrap();
    let noisy = format!("leaked: {} (backup)", HEX_KEY);
    let input = write_input(
        &dir,
        &[
            WIF_ONE,
            "the quick brown fox jumps over the lazy dog",
            noisy.as_str(),
        ],
    );
    let output = dir.path().join("found.csv");

    let registry =
        ProviderRegistry::new().with("table", TableProvider::new(&[(HEX_KEY_ADDRESS, 0.125)]));

    let summary = ScanController::with_registry(fast_config(input, output.clone()), registry)
        .run()
        .await;

    assert_eq!(summary.state, ScanState::Completed);
    assert_eq!(summary.lines_processed, 3);
    assert_eq!(summary.found_count(), 1);
    assert_eq!(summary.total_balance, 0.125);
    assert_eq!(summary.found[0].address, HEX_KEY_ADDRESS);
    assert_eq!(summary.found[0].private_key, HEX_KEY);

    let content = std::fs::read_to_string(&output).unwrap();
    assert_eq!(content.lines().next(), Some(CSV_HEADER));

    let rows = data_rows(&output);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with(&format!("{},{},0.12500000,", HEX_KEY, HEX_KEY_ADDRESS)));
    assert!(rows[0].ends_with(",table"));
}

#[tokio::test]
async fn test_rollover_during_scan() {
    let dir = tempdir().unwrap();
    let lines: Vec<&str> = [WIF_ONE, WIF_TWO].iter().cycle().take(8).copied().collect();
    let input = write_input(&dir, &lines);
    let output = dir.path().join("out").join("found.csv");

    let mut config = fast_config(input, output.clone());
    config.max_file_size_bytes = 300;

    let registry = ProviderRegistry::new().with(
        "table",
        TableProvider::new(&[(WIF_ONE_ADDRESS, 1.0), (WIF_TWO_ADDRESS, 2.0)]),
    );

    let summary = ScanController::with_registry(config, registry).run().await;
    assert_eq!(summary.found_count(), 8);
    assert_eq!(summary.total_balance, 12.0);

    let first = output;
    let second = dir.path().join("out").join("found_01.csv");
    assert!(second.exists());

    for file in [&first, &second] {
        let content = std::fs::read_to_string(file).unwrap();
        assert_eq!(content.lines().next(), Some(CSV_HEADER));
        assert_eq!(content.lines().filter(|l| *l == CSV_HEADER).count(), 1);
    }

    let mut total_rows = 0;
    for entry in std::fs::read_dir(dir.path().join("out")).unwrap() {
        total_rows += data_rows(&entry.unwrap().path()).len();
    }
    assert_eq!(total_rows, 8);
}

#[tokio::test]
async fn test_cancel_keeps_persisted_prefix() {
    let dir = tempdir().unwrap();
    let input = write_input(&dir, &[WIF_ONE, WIF_TWO, HEX_KEY, WIF_ONE]);
    let output = dir.path().join("found.csv");

    let registry = ProviderRegistry::new().with(
        "table",
        TableProvider::new(&[
            (WIF_ONE_ADDRESS, 0.1),
            (WIF_TWO_ADDRESS, 0.2),
            (HEX_KEY_ADDRESS, 0.3),
        ]),
    );

    let mut controller =
        ScanController::with_registry(fast_config(input, output.clone()), registry);
    controller.start().await.unwrap();

    for _ in 0..2 {
        assert!(matches!(
            controller.step().await,
            Some(StepOutcome::Found(_))
        ));
    }
    controller.cancel();
    assert_eq!(controller.step().await, None);

    let summary = controller.finish();
    assert_eq!(summary.state, ScanState::Cancelled);
    assert_eq!(summary.lines_processed, 2);

    let rows = data_rows(&output);
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains(WIF_ONE_ADDRESS));
    assert!(rows[1].contains(WIF_TWO_ADDRESS));
}

#[tokio::test]
async fn test_missing_input_yields_empty_failed_summary() {
    let dir = tempdir().unwrap();
    let config = fast_config(dir.path().join("nope.txt"), dir.path().join("found.csv"));

    let summary = ScanController::with_registry(config, ProviderRegistry::new())
        .run()
        .await;

    assert_eq!(summary.state, ScanState::Failed);
    assert_eq!(summary.lines_processed, 0);
    assert!(summary.found.is_empty());
    assert!(!dir.path().join("found.csv").exists());
}

#[tokio::test]
async fn test_all_providers_down_does_not_stop_scan() {
    let dir = tempdir().unwrap();
    let input = write_input(&dir, &[WIF_ONE, HEX_KEY, WIF_TWO]);
    let output = dir.path().join("found.csv");

    let registry = ProviderRegistry::new()
        .with("down-a", DownProvider)
        .with("down-b", DownProvider);

    let summary = ScanController::with_registry(fast_config(input, output), registry)
        .run()
        .await;

    assert_eq!(summary.state, ScanState::Completed);
    assert_eq!(summary.lines_processed, 3);
    assert!(summary.found.is_empty());
}

#[tokio::test]
async fn test_progress_events_over_long_input() {
    let dir = tempdir().unwrap();
    let mut lines = vec!["# generated"; 22];
    lines[14] = HEX_KEY;
    let input = write_input(&dir, &lines);

    let registry =
        ProviderRegistry::new().with("table", TableProvider::new(&[(HEX_KEY_ADDRESS, 3.0)]));
    let (callback, mut rx) = progress_channel();

    let summary = ScanController::with_registry(
        fast_config(input, dir.path().join("found.csv")),
        registry,
    )
    .with_progress(callback)
    .run()
    .await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.session_id, summary.session_id);
        events.push((event.processed, event.is_hit()));
    }

    assert_eq!(
        events,
        vec![(10, false), (15, true), (20, false), (22, false)]
    );
}

#[tokio::test]
async fn test_pinned_mode_uses_only_that_provider() {
    let dir = tempdir().unwrap();
    let input = write_input(&dir, &[HEX_KEY, WIF_ONE]);

    let pinned = TableProvider::new(&[(HEX_KEY_ADDRESS, 0.5)]);
    let pinned_calls = pinned.calls.clone();
    let other = TableProvider::new(&[]);
    let other_calls = other.calls.clone();

    let registry = ProviderRegistry::new()
        .with("blockchain", other)
        .with("mempool", pinned);

    let mut config = fast_config(input, dir.path().join("found.csv"));
    config.provider_mode = ProviderMode::Pinned("mempool".to_string());

    let summary = ScanController::with_registry(config, registry).run().await;

    assert_eq!(summary.found_count(), 1);
    assert_eq!(summary.provider_usage.get("mempool"), Some(&1));
    assert_eq!(pinned_calls.load(Ordering::SeqCst), 2);
    assert_eq!(other_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_courtesy_delay_applies_per_checked_key() {
    let dir = tempdir().unwrap();
    let input = write_input(&dir, &[WIF_ONE, "no key here", WIF_TWO]);

    let mut config = fast_config(input, dir.path().join("found.csv"));
    config.delay = Duration::from_millis(50);

    let registry = ProviderRegistry::new().with("table", TableProvider::new(&[]));

    let started = std::time::Instant::now();
    let summary = ScanController::with_registry(config, registry).run().await;

    assert_eq!(summary.lines_processed, 3);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sessions_stay_independent() {
    let funded = [
        (WIF_ONE_ADDRESS, 1.0),
        (WIF_TWO_ADDRESS, 2.0),
        (HEX_KEY_ADDRESS, 4.0),
    ];

    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();
    let input_a = write_input(&dir_a, &[WIF_ONE, WIF_TWO, HEX_KEY]);
    let input_b = write_input(&dir_b, &[HEX_KEY, WIF_ONE]);
    let output_a = dir_a.path().join("found.csv");
    let output_b = dir_b.path().join("found.csv");

    let session = |input: PathBuf, output: PathBuf| {
        let mut config = fast_config(input, output);
        config.provider_mode = ProviderMode::Rotate;
        let registry = ProviderRegistry::new()
            .with("a", TableProvider::new(&funded))
            .with("b", TableProvider::new(&funded));
        ScanController::with_registry(config, registry)
    };

    let first = tokio::spawn(session(input_a, output_a.clone()).run());
    let second = tokio::spawn(session(input_b, output_b.clone()).run());
    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    assert_ne!(first.session_id, second.session_id);
    assert_eq!(first.state, ScanState::Completed);
    assert_eq!(second.state, ScanState::Completed);

    // each session rotates from its own first provider
    assert_eq!(first.found_count(), 3);
    assert_eq!(first.total_balance, 7.0);
    assert_eq!(first.provider_usage.get("a"), Some(&2));
    assert_eq!(first.provider_usage.get("b"), Some(&1));

    assert_eq!(second.found_count(), 2);
    assert_eq!(second.total_balance, 5.0);
    assert_eq!(second.provider_usage.get("a"), Some(&1));
    assert_eq!(second.provider_usage.get("b"), Some(&1));

    let rows_a = data_rows(&output_a);
    let rows_b = data_rows(&output_b);
    assert_eq!(rows_a.len(), 3);
    assert_eq!(rows_b.len(), 2);
    assert!(rows_a[0].starts_with(WIF_ONE) && rows_a[0].ends_with(",a"));
    assert!(rows_a[1].starts_with(WIF_TWO) && rows_a[1].ends_with(",b"));
    assert!(rows_a[2].starts_with(HEX_KEY) && rows_a[2].ends_with(",a"));
    assert!(rows_b[0].starts_with(HEX_KEY) && rows_b[0].ends_with(",a"));
    assert!(rows_b[1].starts_with(WIF_ONE) && rows_b[1].ends_with(",b"));
}
