//! Key extraction from noisy input lines
//!
//! Input files rarely hold one bare key per line: keys come wrapped in CSV
//! columns, JSON, log output or prose. Extraction tries, in order:
//!
//! 1. every WIF-shaped substring, left to right, at every `5`/`K`/`L` offset
//! 2. every 64-hex-character substring: standalone 64-char runs first, then
//!    64-char windows of longer hex runs, left to right
//! 3. the whole trimmed line
//!
//! The first candidate that actually parses as a key wins. Pattern matches
//! only nominate candidates; key parsing is the real validator.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::address::PrivateKey;

static WIF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[5KL][1-9A-HJ-NP-Za-km-z]{50,51}").expect("WIF pattern is valid")
});

/// Maximal hex runs long enough to hold a key
static HEX_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9a-fA-F]{64,}").expect("hex pattern is valid"));

/// Uncompressed WIF length; a greedy 52-char match may hide one
const WIF_UNCOMPRESSED_LEN: usize = 51;

const HEX_KEY_LEN: usize = 64;

/// Finds the first valid private key embedded in a line
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyExtractor;

impl KeyExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Whether a line should be skipped without attempting extraction
    pub fn is_skippable(line: &str) -> bool {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    }

    /// Extract the first valid key from `line`, if any
    pub fn extract(&self, line: &str) -> Option<PrivateKey> {
        if let Some(key) = Self::find_wif(line) {
            debug!("found valid WIF private key");
            return Some(key);
        }

        if let Some(key) = Self::find_hex(line) {
            debug!("found valid hex private key");
            return Some(key);
        }

        match PrivateKey::parse(line.trim()) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!(error = %e, "no valid private key found in line");
                None
            }
        }
    }

    fn find_wif(line: &str) -> Option<PrivateKey> {
        let mut from = 0;
        while let Some(candidate) = WIF_PATTERN.find_at(line, from) {
            if let Some(key) = Self::try_wif(candidate.as_str()) {
                return Some(key);
            }
            // Matches don't overlap, so a key may start inside a rejected one
            from = candidate.start() + 1;
        }
        None
    }

    fn find_hex(line: &str) -> Option<PrivateKey> {
        let runs: Vec<&str> = HEX_RUN.find_iter(line).map(|m| m.as_str()).collect();

        let exact = runs.iter().filter(|run| run.len() == HEX_KEY_LEN);
        for run in exact {
            if let Ok(key) = PrivateKey::parse(run) {
                return Some(key);
            }
        }

        for run in runs.iter().filter(|run| run.len() > HEX_KEY_LEN) {
            for start in 0..=run.len() - HEX_KEY_LEN {
                if let Ok(key) = PrivateKey::parse(&run[start..start + HEX_KEY_LEN]) {
                    return Some(key);
                }
            }
        }
        None
    }

    fn try_wif(candidate: &str) -> Option<PrivateKey> {
        if let Ok(key) = PrivateKey::parse(candidate) {
            return Some(key);
        }
        // An uncompressed key followed directly by a base58 character
        // matches greedily as 52 chars.
        if candidate.len() > WIF_UNCOMPRESSED_LEN && candidate.starts_with('5') {
            return PrivateKey::parse(&candidate[..WIF_UNCOMPRESSED_LEN]).ok();
        }
        None
    }
}
