//! Scan - Walk a seed's addresses in order until one holds funds
//!
//! ```text
//! preamble steps ──▶ derive N addresses ──▶ for i in 0..N:
//!                     (retry once with          balance(addr[i])
//!                      fallback count)            > 0 → found, stop
//!                                                 = 0 → pace, next
//!                                          ──▶ not found
//! ```
//!
//! Balance checks are strictly sequential: "first funded address" is defined by
//! index order, and providers must not be hit concurrently. A failing balance
//! source never aborts the scan; that address counts as empty and is recorded
//! in [`ScanOutcome::unverified`].
//!
//! [`ScanCoordinator::survey`] is the exhaustive variant: no preamble, no early
//! stop, every funded address collected.

mod progress;

pub use progress::{progress_channel, ProgressSender, ScanProgress};

use crate::balance::{BalanceLookup, BalanceSource};
use crate::config::ScanConfig;
use crate::keys::{derive_from_phrase, DerivationError, DerivedAddress, SeedPhrase};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PREAMBLE_MESSAGES: &[&str] = &[
    "Generating random seed...",
    "Deriving master key...",
    "Generating main address...",
    "Preparing address verification...",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("address derivation failed: {0}")]
    Derivation(#[from] DerivationError),
    #[error("scan cancelled")]
    Cancelled,
}

/// Terminal value of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub found: bool,
    pub winning_address: Option<DerivedAddress>,
    pub winning_balance: Option<u64>,
    /// Addresses examined, in index order, up to and including the winner.
    pub checked_addresses: Vec<String>,
    /// Indices whose balance could not be confirmed by any provider.
    pub unverified: Vec<u32>,
}

/// A funded address found by a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveAddress {
    #[serde(flatten)]
    pub address: DerivedAddress,
    pub balance_sats: u64,
}

/// Terminal value of one survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyOutcome {
    /// Funded addresses in index order.
    pub active: Vec<ActiveAddress>,
    pub unverified: Vec<u32>,
    /// Number of addresses queried.
    pub checked: usize,
}

impl SurveyOutcome {
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn total_sats(&self) -> u64 {
        self.active.iter().map(|a| a.balance_sats).sum()
    }
}

/// Address derivation used by the scanner. [`derive_from_phrase`] unless overridden.
pub type Deriver = fn(&SeedPhrase, u32) -> Result<Vec<DerivedAddress>, DerivationError>;

pub struct ScanCoordinator {
    config: ScanConfig,
    source: Arc<dyn BalanceSource>,
    derive: Deriver,
}

impl ScanCoordinator {
    pub fn new(config: ScanConfig, source: Arc<dyn BalanceSource>) -> Self {
        Self { config, source, derive: derive_from_phrase }
    }

    pub fn with_deriver(mut self, derive: Deriver) -> Self {
        self.derive = derive;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Check every one of the first `count` addresses and collect all funded ones.
    pub async fn survey(
        &self,
        phrase: &SeedPhrase,
        count: u32,
        cancel: &CancellationToken,
        progress: &ProgressSender,
    ) -> Result<SurveyOutcome, ScanError> {
        if count == 0 {
            return Err(DerivationError::InvalidCount.into());
        }
        progress.report(0, count, "Generating Bitcoin addresses...");
        let addresses = self.derive_with_retry(phrase, count)?;
        let total = addresses.len() as u32;
        info!(count = total, "surveying derived addresses");

        let mut active = Vec::new();
        let mut unverified = Vec::new();

        for (position, derived) in addresses.iter().enumerate() {
            if position > 0 {
                pause(self.config.survey_pacing_delay, cancel).await?;
            }
            progress.report(position as u32, total, format!("Checking address #{}...", derived.index + 1));

            let lookup = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ScanError::Cancelled),
                lookup = self.source.balance(&derived.address) => lookup,
            };
            match lookup {
                Ok(BalanceLookup::Confirmed { satoshis, .. }) if satoshis > 0 => {
                    info!(index = derived.index, address = %derived.address, satoshis, "active address");
                    active.push(ActiveAddress { address: derived.clone(), balance_sats: satoshis });
                }
                Ok(BalanceLookup::Confirmed { .. }) => debug!(index = derived.index, "empty"),
                Ok(BalanceLookup::Unknown { .. }) => unverified.push(derived.index),
                Err(e) => {
                    warn!(index = derived.index, address = %derived.address, error = %e, "balance check failed");
                    unverified.push(derived.index);
                }
            }
        }

        if !unverified.is_empty() {
            warn!(unverified = unverified.len(), "some balances could not be confirmed");
        }
        info!(checked = addresses.len(), active = active.len(), "survey finished");
        progress.complete(format!("{} active address(es) found.", active.len()));
        Ok(SurveyOutcome { active, unverified, checked: addresses.len() })
    }

    /// Scan the first `count` addresses of a textual mnemonic.
    pub async fn scan(
        &self,
        mnemonic: &str,
        count: u32,
        cancel: &CancellationToken,
        progress: &ProgressSender,
    ) -> Result<ScanOutcome, ScanError> {
        let phrase = SeedPhrase::parse(mnemonic)?;
        self.scan_phrase(&phrase, count, cancel, progress).await
    }

    pub async fn scan_phrase(
        &self,
        phrase: &SeedPhrase,
        count: u32,
        cancel: &CancellationToken,
        progress: &ProgressSender,
    ) -> Result<ScanOutcome, ScanError> {
        if count == 0 {
            return Err(DerivationError::InvalidCount.into());
        }
        let preamble = self.config.preamble_steps;
        for step in 0..preamble {
            let message = PREAMBLE_MESSAGES.get(step as usize).copied().unwrap_or("Preparing...");
            progress.report(step, preamble + count, message);
            pause(self.config.preamble_delay, cancel).await?;
        }

        progress.report(preamble, preamble + count, "Generating Bitcoin addresses...");
        let addresses = self.derive_with_retry(phrase, count)?;
        let total = preamble + addresses.len() as u32;
        info!(count = addresses.len(), "scanning derived addresses");

        let mut checked = Vec::with_capacity(addresses.len());
        let mut unverified = Vec::new();

        for (position, derived) in addresses.iter().enumerate() {
            if position > 0 {
                pause(self.config.pacing_delay, cancel).await?;
            }
            progress.report(preamble + position as u32, total, format!("Checking address #{}...", derived.index + 1));

            let lookup = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ScanError::Cancelled),
                lookup = self.source.balance(&derived.address) => lookup,
            };
            checked.push(derived.address.clone());

            let satoshis = match lookup {
                Ok(BalanceLookup::Confirmed { satoshis, .. }) => satoshis,
                Ok(BalanceLookup::Unknown { .. }) => {
                    unverified.push(derived.index);
                    0
                }
                Err(e) => {
                    warn!(index = derived.index, address = %derived.address, error = %e, "balance check failed, treating as empty");
                    unverified.push(derived.index);
                    0
                }
            };
            debug!(index = derived.index, satoshis, "checked");

            if satoshis > 0 {
                info!(index = derived.index, address = %derived.address, satoshis, "funded address found");
                progress.complete(format!("Balance found in address #{}!", derived.index + 1));
                return Ok(ScanOutcome {
                    found: true,
                    winning_address: Some(derived.clone()),
                    winning_balance: Some(satoshis),
                    checked_addresses: checked,
                    unverified,
                });
            }
        }

        if !unverified.is_empty() {
            warn!(unverified = unverified.len(), "scan finished with unverified addresses");
        }
        info!(checked = checked.len(), "no funded address");
        progress.complete("Verification complete.");
        Ok(ScanOutcome { found: false, winning_address: None, winning_balance: None, checked_addresses: checked, unverified })
    }

    fn derive_with_retry(&self, phrase: &SeedPhrase, count: u32) -> Result<Vec<DerivedAddress>, ScanError> {
        match (self.derive)(phrase, count) {
            Ok(addresses) => Ok(addresses),
            Err(first) => {
                let reduced = count.min(self.config.fallback_count).max(1);
                warn!(error = %first, count, reduced, "derivation failed, retrying with reduced count");
                Ok((self.derive)(phrase, reduced)?)
            }
        }
    }
}

async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<(), ScanError> {
    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScanError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
