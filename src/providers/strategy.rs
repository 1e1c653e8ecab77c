//! Balance resolution strategy
//!
//! Decides which provider(s) answer a lookup:
//!
//! - **Auto**: registration order, first non-absent answer wins
//! - **Rotate**: one provider per lookup, cursor advances even on failure
//! - **Pinned**: one named provider; unknown names fall back to
//!   [`DEFAULT_PROVIDER`]
//!
//! A single provider's failure never escapes this module.

use serde::Serialize;
use tracing::{debug, warn};

use super::kind::DEFAULT_PROVIDER;
use super::registry::ProviderRegistry;
use crate::common::config::ProviderMode;
use crate::common::logging::log_providers_exhausted;

/// Provider name reported when no provider produced an answer
pub const UNKNOWN_PROVIDER: &str = "unknown";

/// Outcome of one balance lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceQueryResult {
    /// Balance in BTC, or `None` when no answer was obtained
    pub balance: Option<f64>,
    /// Provider that produced (or was asked for) the answer
    pub provider_name: String,
}

impl BalanceQueryResult {
    fn absent(provider_name: impl Into<String>) -> Self {
        Self {
            balance: None,
            provider_name: provider_name.into(),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.balance.is_none()
    }

    /// True only for a strictly positive balance
    pub fn has_funds(&self) -> bool {
        self.balance.is_some_and(|b| b > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Auto,
    Rotate { cursor: usize },
    Pinned { index: usize },
}

/// Provider selection state for one scan session
pub struct BalanceStrategy {
    registry: ProviderRegistry,
    resolution: Resolution,
}

impl BalanceStrategy {
    /// Bind a mode to a registry
    ///
    /// An unrecognised pinned name is logged and replaced by the default
    /// provider (or the first registered one if that is missing too).
    pub fn new(registry: ProviderRegistry, mode: &ProviderMode) -> Self {
        let resolution = match mode {
            ProviderMode::Auto => Resolution::Auto,
            ProviderMode::Rotate => Resolution::Rotate { cursor: 0 },
            ProviderMode::Pinned(name) => match registry.position(name) {
                Some(index) => Resolution::Pinned { index },
                None => {
                    let index = registry.position(DEFAULT_PROVIDER).unwrap_or(0);
                    warn!(
                        requested = %name,
                        substitute = registry.get(index).map(|(n, _)| n).unwrap_or(UNKNOWN_PROVIDER),
                        "unknown provider, falling back"
                    );
                    Resolution::Pinned { index }
                }
            },
        };

        Self {
            registry,
            resolution,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Name of the pinned provider, if in pinned mode
    pub fn pinned_provider(&self) -> Option<&str> {
        match self.resolution {
            Resolution::Pinned { index } => self.registry.get(index).map(|(name, _)| name),
            _ => None,
        }
    }

    /// Look up the balance of `address`
    pub async fn resolve(&mut self, address: &str) -> BalanceQueryResult {
        match self.resolution {
            Resolution::Auto => self.resolve_auto(address).await,
            Resolution::Rotate { cursor } => {
                if self.registry.is_empty() {
                    return BalanceQueryResult::absent(UNKNOWN_PROVIDER);
                }
                let index = cursor % self.registry.len();
                self.resolution = Resolution::Rotate {
                    cursor: (index + 1) % self.registry.len(),
                };
                self.query_one(index, address).await
            }
            Resolution::Pinned { index } => self.query_one(index, address).await,
        }
    }

    async fn resolve_auto(&self, address: &str) -> BalanceQueryResult {
        for (name, provider) in self.registry.iter() {
            match provider.query(address).await {
                Ok(Some(balance)) => {
                    return BalanceQueryResult {
                        balance: Some(balance),
                        provider_name: name.to_string(),
                    };
                }
                Ok(None) => debug!(provider = name, "provider gave no answer, trying next"),
                Err(e) => warn!(provider = name, error = %e, "provider failed"),
            }
        }

        log_providers_exhausted(address, self.registry.len());
        BalanceQueryResult::absent(UNKNOWN_PROVIDER)
    }

    async fn query_one(&self, index: usize, address: &str) -> BalanceQueryResult {
        let Some((name, provider)) = self.registry.get(index) else {
            return BalanceQueryResult::absent(UNKNOWN_PROVIDER);
        };

        match provider.query(address).await {
            Ok(balance) => {
                if balance.is_none() {
                    warn!(provider = name, "provider gave no answer");
                }
                BalanceQueryResult {
                    balance,
                    provider_name: name.to_string(),
                }
            }
            Err(e) => {
                warn!(provider = name, error = %e, "provider failed");
                BalanceQueryResult::absent(name)
            }
        }
    }
}
