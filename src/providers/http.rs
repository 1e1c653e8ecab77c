//! HTTP balance provider
//!
//! One outbound request per lookup, always bounded by the client timeout.

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::kind::{HttpMethod, ProviderKind};
use super::{LookupProvider, ProviderError};

/// Explorer-backed provider
#[derive(Debug, Clone)]
pub struct HttpProvider {
    kind: ProviderKind,
    client: Client,
    base_url: String,
}

impl HttpProvider {
    /// Create a provider against the explorer's public endpoint
    pub fn new(kind: ProviderKind, client: Client) -> Self {
        Self {
            kind,
            client,
            base_url: kind.default_base_url().to_string(),
        }
    }

    /// Point the provider at a different host (mirrors, local stubs)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Build the shared HTTP client with a mandatory request timeout
    pub fn build_client(timeout: Duration, user_agent: &str) -> Result<Client, ProviderError> {
        Ok(Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .build()?)
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full lookup URL for an address
    pub fn url_for(&self, address: &str) -> String {
        format!("{}{}", self.base_url, self.kind.path(address))
    }

    fn classify(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.kind.name().to_string())
        } else {
            ProviderError::Http(err)
        }
    }
}

#[async_trait]
impl LookupProvider for HttpProvider {
    async fn query(&self, address: &str) -> Result<Option<f64>, ProviderError> {
        let url = self.url_for(address);

        let request = match self.kind.method() {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self
                .client
                .post(&url)
                .json(&serde_json::json!({ "addr": address })),
        };
        let request = match self.kind.user_agent_override() {
            Some(agent) => request.header(USER_AGENT, agent),
            None => request,
        };

        let resp = request.send().await.map_err(|e| self.classify(e))?;

        if !resp.status().is_success() {
            debug!(
                provider = self.kind.name(),
                status = resp.status().as_u16(),
                "provider returned non-success status"
            );
            return Ok(None);
        }

        let body = resp.text().await.map_err(|e| self.classify(e))?;
        self.kind.parse_response(&body, address)
    }
}
