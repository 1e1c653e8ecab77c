//! Provider catalog and response parsing
//!
//! Each explorer has its own endpoint and response shape. The parsers here
//! normalise every shape into a BTC amount.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::ProviderError;
use crate::units::sats_to_btc;

/// Provider used when a pinned provider name is not recognised
pub const DEFAULT_PROVIDER: &str = "blockchain";

/// HTTP method a provider expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Known balance providers, in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Blockchain,
    Blockcypher,
    Blockstream,
    Mempool,
    Blockchair,
    Bitaps,
    Btccom,
    Blockonomics,
    Coinbase,
    Cryptoid,
    Sochain,
    Btcexplorer,
}

impl ProviderKind {
    /// Every provider, in the fixed order used by auto and rotate modes
    pub const ALL: [ProviderKind; 12] = [
        ProviderKind::Blockchain,
        ProviderKind::Blockcypher,
        ProviderKind::Blockstream,
        ProviderKind::Mempool,
        ProviderKind::Blockchair,
        ProviderKind::Bitaps,
        ProviderKind::Btccom,
        ProviderKind::Blockonomics,
        ProviderKind::Coinbase,
        ProviderKind::Cryptoid,
        ProviderKind::Sochain,
        ProviderKind::Btcexplorer,
    ];

    /// Registry name (also the pinned-mode value)
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Blockchain => "blockchain",
            ProviderKind::Blockcypher => "blockcypher",
            ProviderKind::Blockstream => "blockstream",
            ProviderKind::Mempool => "mempool",
            ProviderKind::Blockchair => "blockchair",
            ProviderKind::Bitaps => "bitaps",
            ProviderKind::Btccom => "btccom",
            ProviderKind::Blockonomics => "blockonomics",
            ProviderKind::Coinbase => "coinbase",
            ProviderKind::Cryptoid => "cryptoid",
            ProviderKind::Sochain => "sochain",
            ProviderKind::Btcexplorer => "btcexplorer",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Blockchain => "Blockchain.info",
            ProviderKind::Blockcypher => "BlockCypher",
            ProviderKind::Blockstream => "Blockstream.info",
            ProviderKind::Mempool => "Mempool.space",
            ProviderKind::Blockchair => "Blockchair",
            ProviderKind::Bitaps => "Bitaps",
            ProviderKind::Btccom => "BTC.com",
            ProviderKind::Blockonomics => "Blockonomics",
            ProviderKind::Coinbase => "Coinbase",
            ProviderKind::Cryptoid => "CryptoID",
            ProviderKind::Sochain => "SoChain",
            ProviderKind::Btcexplorer => "BTC Explorer",
        }
    }

    pub fn description(&self) -> String {
        format!("Use only {} API", self.display_name())
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Blockchain | ProviderKind::Coinbase => "https://blockchain.info",
            ProviderKind::Blockcypher => "https://api.blockcypher.com",
            ProviderKind::Blockstream => "https://blockstream.info",
            ProviderKind::Mempool => "https://mempool.space",
            ProviderKind::Blockchair => "https://api.blockchair.com",
            ProviderKind::Bitaps => "https://api.bitaps.com",
            ProviderKind::Btccom => "https://chain.api.btc.com",
            ProviderKind::Blockonomics => "https://www.blockonomics.co",
            ProviderKind::Cryptoid => "https://chainz.cryptoid.info",
            ProviderKind::Sochain => "https://sochain.com",
            ProviderKind::Btcexplorer => "https://explorer.api.bitcoin.com",
        }
    }

    /// Path and query for a lookup, relative to the base URL
    pub fn path(&self, address: &str) -> String {
        match self {
            ProviderKind::Blockchain | ProviderKind::Coinbase => {
                format!("/balance?active={}", address)
            }
            ProviderKind::Blockcypher => format!("/v1/btc/main/addrs/{}/balance", address),
            ProviderKind::Blockstream | ProviderKind::Mempool => {
                format!("/api/address/{}", address)
            }
            ProviderKind::Blockchair => format!("/bitcoin/dashboards/address/{}", address),
            ProviderKind::Bitaps => format!("/btc/v1/blockchain/address/state/{}", address),
            ProviderKind::Btccom => format!("/v3/address/{}", address),
            ProviderKind::Blockonomics => "/api/balance".to_string(),
            ProviderKind::Cryptoid => format!("/btc/api.dws?q=getbalance&a={}", address),
            ProviderKind::Sochain => format!("/api/v2/get_address_balance/BTC/{}", address),
            ProviderKind::Btcexplorer => format!("/btc/v1/addr/{}/balance", address),
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            ProviderKind::Blockonomics => HttpMethod::Post,
            _ => HttpMethod::Get,
        }
    }

    /// Coinbase has no public balance API; it rides on blockchain.info under
    /// its own user agent.
    pub fn user_agent_override(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Coinbase => Some("Coinbase BTC Balance Checker"),
            _ => None,
        }
    }

    /// Turn a successful response body into a BTC balance
    ///
    /// `Ok(None)` when the body says "no answer"; `Err` when the body does not
    /// have the shape the provider is supposed to return.
    pub fn parse_response(&self, body: &str, address: &str) -> Result<Option<f64>, ProviderError> {
        match self {
            ProviderKind::Blockchain | ProviderKind::Coinbase => {
                let mut data: HashMap<String, FinalBalance> = parse_json(body)?;
                let entry = data.remove(address).ok_or_else(|| {
                    ProviderError::Parse(format!("address {} missing from response", address))
                })?;
                Ok(Some(sats_to_btc(entry.final_balance)))
            }
            ProviderKind::Blockcypher => {
                let data: FinalBalance = parse_json(body)?;
                Ok(Some(sats_to_btc(data.final_balance)))
            }
            ProviderKind::Blockstream => {
                let data: EsploraAddress = parse_json(body)?;
                let funded = data.chain_stats.funded_txo_sum + data.mempool_stats.funded_txo_sum;
                let spent = data.chain_stats.spent_txo_sum + data.mempool_stats.spent_txo_sum;
                Ok(Some(sats_to_btc(funded.saturating_sub(spent))))
            }
            ProviderKind::Mempool => {
                let data: EsploraAddress = parse_json(body)?;
                let stats = data.chain_stats;
                Ok(Some(sats_to_btc(
                    stats.funded_txo_sum.saturating_sub(stats.spent_txo_sum),
                )))
            }
            ProviderKind::Blockchair => {
                let data: Value = parse_json(body)?;
                let sats = data
                    .pointer(&format!("/data/{}/address/balance", address))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                Ok(Some(sats_to_btc(sats)))
            }
            ProviderKind::Bitaps | ProviderKind::Btccom => {
                let data: Value = parse_json(body)?;
                if !has_success_status(&data) {
                    return Ok(None);
                }
                let sats = data
                    .pointer("/data/balance")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                Ok(Some(sats_to_btc(sats)))
            }
            ProviderKind::Blockonomics => {
                let data: BlockonomicsResponse = parse_json(body)?;
                Ok(data
                    .response
                    .first()
                    .map(|entry| sats_to_btc(entry.confirmed)))
            }
            ProviderKind::Cryptoid => Ok(body.trim().parse::<f64>().ok().and_then(valid_amount)),
            ProviderKind::Sochain => {
                let data: Value = parse_json(body)?;
                if !has_success_status(&data) {
                    return Ok(None);
                }
                let balance = match data.pointer("/data/confirmed_balance") {
                    None | Some(Value::Null) => Some(0.0),
                    Some(Value::String(s)) => s.trim().parse().ok(),
                    Some(Value::Number(n)) => n.as_f64(),
                    Some(_) => None,
                };
                Ok(balance.and_then(valid_amount))
            }
            ProviderKind::Btcexplorer => Ok(body.trim().parse::<u64>().ok().map(sats_to_btc)),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ProviderError::Parse(format!("unknown provider: {}", s)))
    }
}

// =============================================================================
// Response shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct FinalBalance {
    final_balance: u64,
}

#[derive(Debug, Default, Deserialize)]
struct TxoStats {
    #[serde(default)]
    funded_txo_sum: u64,
    #[serde(default)]
    spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraAddress {
    #[serde(default)]
    chain_stats: TxoStats,
    #[serde(default)]
    mempool_stats: TxoStats,
}

#[derive(Debug, Deserialize)]
struct BlockonomicsResponse {
    #[serde(default)]
    response: Vec<BlockonomicsEntry>,
}

#[derive(Debug, Deserialize)]
struct BlockonomicsEntry {
    #[serde(default)]
    confirmed: u64,
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Decimal amounts must be finite and non-negative
fn valid_amount(btc: f64) -> Option<f64> {
    (btc.is_finite() && btc >= 0.0).then_some(btc)
}

fn has_success_status(data: &Value) -> bool {
    data.get("status").and_then(Value::as_str) == Some("success")
}
