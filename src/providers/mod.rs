//! Balance lookup providers
//!
//! A provider answers one question: how many BTC does this address hold?
//! Providers sit behind the [`LookupProvider`] trait so the strategy code never
//! cares whether it is talking to a block explorer or a test double.

pub mod http;
pub mod kind;
pub mod registry;
pub mod strategy;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpProvider;
pub use kind::{HttpMethod, ProviderKind, DEFAULT_PROVIDER};
pub use registry::ProviderRegistry;
pub use strategy::{BalanceQueryResult, BalanceStrategy, UNKNOWN_PROVIDER};

/// Provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Whether trying the same provider again later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Http(_) | ProviderError::Timeout(_))
    }
}

/// One balance lookup against one external service
///
/// `Ok(None)` means the provider gave no usable answer (non-success status,
/// unexpected body). It is not distinguished from an unknown address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LookupProvider: Send + Sync {
    /// Balance of `address` in BTC
    async fn query(&self, address: &str) -> Result<Option<f64>, ProviderError>;
}
