//! Ordered provider registry
//!
//! Registration order is the order auto mode falls back through and the
//! cycle rotate mode follows. It is an explicit list, never a hash map.

use super::http::HttpProvider;
use super::kind::ProviderKind;
use super::{LookupProvider, ProviderError};
use crate::common::config::ScanConfig;

struct ProviderEntry {
    name: String,
    provider: Box<dyn LookupProvider>,
}

/// Named providers in a fixed, reproducible order
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every catalog provider over HTTP, sharing one timeout-bounded client
    pub fn http(config: &ScanConfig) -> Result<Self, ProviderError> {
        let client = HttpProvider::build_client(config.request_timeout, &config.user_agent)?;

        let mut registry = Self::new();
        for kind in ProviderKind::ALL {
            registry.register(kind.name(), HttpProvider::new(kind, client.clone()));
        }
        Ok(registry)
    }

    /// Add a provider at the end, or replace one with the same name in place
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: impl LookupProvider + 'static,
    ) -> &mut Self {
        let name = name.into();
        let provider: Box<dyn LookupProvider> = Box::new(provider);

        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.provider = provider,
            None => self.entries.push(ProviderEntry { name, provider }),
        }
        self
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, name: impl Into<String>, provider: impl LookupProvider + 'static) -> Self {
        self.register(name, provider);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Provider names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn get(&self, index: usize) -> Option<(&str, &dyn LookupProvider)> {
        self.entries
            .get(index)
            .map(|e| (e.name.as_str(), e.provider.as_ref()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn LookupProvider)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.provider.as_ref()))
    }
}
