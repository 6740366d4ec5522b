//! Balance - Ask public ledger providers how many sats an address holds
//!
//! # Fallback
//!
//! ```text
//! lookup(addr)
//!     │
//!     ├── blockstream.info  ──ok──▶ Confirmed
//!     │        │ err / non-2xx / bad body
//!     ├── mempool.space     ──ok──▶ Confirmed
//!     │        │
//!     ├── blockchain.info   ──ok──▶ Confirmed
//!     │        │
//!     └──────▶ Unknown (get_balance reports 0)
//! ```
//!
//! No retries within a provider and no caching: each call is a fresh round trip.

mod provider;

pub use provider::{BalanceProvider, ResponseShape, ADDRESS_PLACEHOLDER};

use crate::config::HttpConfig;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BalanceLookupError {
    #[error("request failed: {0}")]
    Http(String),
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("unreadable response: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: BalanceLookupError,
}

/// Result of asking every provider in turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceLookup {
    Confirmed { provider: String, satoshis: u64 },
    /// No provider gave a usable answer.
    Unknown { failures: Vec<ProviderFailure> },
}

impl BalanceLookup {
    /// Balance in sats, with `Unknown` reported as 0.
    pub fn satoshis(&self) -> u64 {
        match self {
            BalanceLookup::Confirmed { satoshis, .. } => *satoshis,
            BalanceLookup::Unknown { .. } => 0,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, BalanceLookup::Confirmed { .. })
    }
}

/// Anything the scanner can ask for an address balance.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance(&self, address: &str) -> Result<BalanceLookup, BalanceLookupError>;
}

/// Ordered multi-provider balance lookup.
#[derive(Debug, Clone)]
pub struct BalanceOracle {
    client: reqwest::Client,
    providers: Vec<BalanceProvider>,
}

impl BalanceOracle {
    pub fn new(client: reqwest::Client, providers: Vec<BalanceProvider>) -> Self {
        Self { client, providers }
    }

    /// Production providers with a client built from `http`.
    pub fn with_defaults(http: &HttpConfig) -> reqwest::Result<Self> {
        Ok(Self::new(crate::http::build_client(http)?, BalanceProvider::defaults()))
    }

    pub fn providers(&self) -> &[BalanceProvider] {
        &self.providers
    }

    /// Net confirmed balance. Never fails; 0 when every provider is unreachable.
    pub async fn get_balance(&self, address: &str) -> u64 {
        self.lookup(address).await.satoshis()
    }

    /// Try each provider in order and stop at the first usable answer.
    pub async fn lookup(&self, address: &str) -> BalanceLookup {
        let mut failures = Vec::new();
        for provider in &self.providers {
            match self.query(provider, address).await {
                Ok(satoshis) => {
                    debug!(provider = %provider.name, %address, satoshis, "balance");
                    return BalanceLookup::Confirmed { provider: provider.name.clone(), satoshis };
                }
                Err(error) => {
                    warn!(provider = %provider.name, %address, %error, "balance provider failed, trying next");
                    failures.push(ProviderFailure { provider: provider.name.clone(), error });
                }
            }
        }
        warn!(%address, attempts = failures.len(), "all balance providers failed, reporting 0");
        BalanceLookup::Unknown { failures }
    }

    async fn query(&self, provider: &BalanceProvider, address: &str) -> Result<u64, BalanceLookupError> {
        let response = self
            .client
            .get(provider.url_for(address))
            .header(ACCEPT, provider.accept())
            .send()
            .await
            .map_err(|e| BalanceLookupError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BalanceLookupError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| BalanceLookupError::Http(e.to_string()))?;
        let net = provider.extract(&body)?;
        if net < 0 {
            warn!(provider = %provider.name, %address, net, "negative net balance, treating as 0");
        }
        Ok(net.max(0) as u64)
    }
}

#[async_trait]
impl BalanceSource for BalanceOracle {
    async fn balance(&self, address: &str) -> Result<BalanceLookup, BalanceLookupError> {
        Ok(self.lookup(address).await)
    }
}
