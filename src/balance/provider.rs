//! Ledger data providers, described as data: where to ask and how to read the answer.

use super::BalanceLookupError;
use serde::Deserialize;

/// Placeholder substituted with the address in an endpoint template.
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

/// How a provider reports an address balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Esplora JSON: `chain_stats.funded_txo_sum - chain_stats.spent_txo_sum`.
    ChainStats,
    /// Plain-text integer, already in satoshis.
    PlainSatoshis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceProvider {
    pub name: String,
    /// URL with an `{address}` placeholder.
    pub endpoint: String,
    pub shape: ResponseShape,
}

#[derive(Debug, Default, Deserialize)]
struct AddressInfo {
    #[serde(default)]
    chain_stats: Option<ChainStats>,
}

#[derive(Debug, Default, Deserialize)]
struct ChainStats {
    #[serde(default)]
    funded_txo_sum: Option<i64>,
    #[serde(default)]
    spent_txo_sum: Option<i64>,
}

impl BalanceProvider {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, shape: ResponseShape) -> Self {
        Self { name: name.into(), endpoint: endpoint.into(), shape }
    }

    pub fn blockstream() -> Self {
        Self::new("blockstream", "https://blockstream.info/api/address/{address}", ResponseShape::ChainStats)
    }

    pub fn mempool() -> Self {
        Self::new("mempool", "https://mempool.space/api/address/{address}", ResponseShape::ChainStats)
    }

    pub fn blockchain_info() -> Self {
        Self::new(
            "blockchain.info",
            "https://blockchain.info/q/addressbalance/{address}?cors=true",
            ResponseShape::PlainSatoshis,
        )
    }

    /// Fallback order used in production.
    pub fn defaults() -> Vec<Self> {
        vec![Self::blockstream(), Self::mempool(), Self::blockchain_info()]
    }

    pub fn url_for(&self, address: &str) -> String {
        self.endpoint.replace(ADDRESS_PLACEHOLDER, address)
    }

    pub(crate) fn accept(&self) -> &'static str {
        match self.shape {
            ResponseShape::ChainStats => "application/json",
            ResponseShape::PlainSatoshis => "text/plain",
        }
    }

    /// Net balance as reported. May be negative if the provider's data is inconsistent.
    pub(crate) fn extract(&self, body: &str) -> Result<i64, BalanceLookupError> {
        match self.shape {
            ResponseShape::ChainStats => {
                let info: AddressInfo = serde_json::from_str(body)
                    .map_err(|e| BalanceLookupError::Parse(e.to_string()))?;
                let stats = info.chain_stats.unwrap_or_default();
                let funded = stats.funded_txo_sum.unwrap_or(0);
                let spent = stats.spent_txo_sum.unwrap_or(0);
                Ok(funded.saturating_sub(spent))
            }
            ResponseShape::PlainSatoshis => body
                .trim()
                .parse::<i64>()
                .map_err(|e| BalanceLookupError::Parse(format!("{}: {:?}", e, truncate(body)))),
        }
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(64) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
