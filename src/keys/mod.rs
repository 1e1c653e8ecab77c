//! Private key handling
//!
//! - [`KeyExtractor`] pulls a candidate key out of a noisy input line
//! - [`AddressResolver`] turns a validated [`PrivateKey`] into its address

pub mod address;
pub mod extractor;

pub use address::{AddressResolver, KeyEncoding, KeyError, PrivateKey};
pub use extractor::KeyExtractor;

/// Shorten secret-bearing text before it goes into a log line
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
