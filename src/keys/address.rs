//! Key validation and address derivation
//!
//! Accepted encodings:
//! - WIF, uncompressed (`5...`) or compressed (`K...` / `L...`)
//! - 64 hex characters, treated as an uncompressed key
//! - 66 hex characters ending in `01`, treated as a compressed key
//!
//! Addresses are legacy P2PKH on mainnet, hashed from the public key in the
//! compression the key was given in.

use bitcoin::{Address, Network};
use secp256k1::{All, Secp256k1, SecretKey};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Key errors
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),
}

/// Textual encoding a key was supplied in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    Wif,
    WifCompressed,
    Hex,
    HexCompressed,
}

/// A private key that is known to derive an address
///
/// Only constructible through [`PrivateKey::parse`], so holding one means
/// derivation cannot fail.
#[derive(Clone)]
pub struct PrivateKey {
    text: String,
    inner: bitcoin::PrivateKey,
    encoding: KeyEncoding,
}

impl PrivateKey {
    /// Parse and validate a key in any accepted encoding
    pub fn parse(text: &str) -> Result<Self, KeyError> {
        let text = text.trim();
        let is_hex = !text.is_empty() && text.bytes().all(|b| b.is_ascii_hexdigit());

        let (inner, encoding) = match text.len() {
            64 if is_hex => (
                bitcoin::PrivateKey::new_uncompressed(secret_from_hex(text)?, Network::Bitcoin),
                KeyEncoding::Hex,
            ),
            66 if is_hex && text.ends_with("01") => (
                bitcoin::PrivateKey::new(secret_from_hex(&text[..64])?, Network::Bitcoin),
                KeyEncoding::HexCompressed,
            ),
            _ => {
                let key = bitcoin::PrivateKey::from_wif(text)
                    .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
                let encoding = if key.compressed {
                    KeyEncoding::WifCompressed
                } else {
                    KeyEncoding::Wif
                };
                (key, encoding)
            }
        };

        Ok(Self {
            text: text.to_string(),
            inner,
            encoding,
        })
    }

    /// The key exactly as it appeared in the input
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn encoding(&self) -> KeyEncoding {
        self.encoding
    }

    pub fn is_compressed(&self) -> bool {
        self.inner.compressed
    }
}

impl FromStr for PrivateKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("text", &super::truncate_for_log(&self.text, 8))
            .field("encoding", &self.encoding)
            .finish()
    }
}

fn secret_from_hex(hex_key: &str) -> Result<SecretKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|e| KeyError::InvalidKey(e.to_string()))?;
    SecretKey::from_slice(&bytes).map_err(|e| KeyError::InvalidKey(e.to_string()))
}

/// Derives P2PKH addresses from private keys
///
/// Pure and deterministic: the same key always gives the same address.
pub struct AddressResolver {
    secp: Secp256k1<All>,
    network: Network,
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressResolver {
    /// Create a resolver for Bitcoin mainnet
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
            network: Network::Bitcoin,
        }
    }

    /// Derive the address of a validated key
    pub fn resolve(&self, key: &PrivateKey) -> Address {
        let public_key = key.inner.public_key(&self.secp);
        Address::p2pkh(public_key.pubkey_hash(), self.network)
    }

    /// Validate raw text and derive its address in one go
    pub fn derive_address(&self, text: &str) -> Result<Address, KeyError> {
        let key = PrivateKey::parse(text)?;
        Ok(self.resolve(&key))
    }
}
