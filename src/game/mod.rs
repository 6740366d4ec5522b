//! Game - One round as an explicit value: payment → scan → result
//!
//! ```text
//! Game::open_round ──▶ GameRound<AwaitingPayment>   invoice shown to player
//!                            │ confirm_payment (LUD-21 poll) / paid()
//!                            ▼
//!                      GameRound<Scanning>          fresh 12-word seed
//!                            │ run_scan
//!                            ▼
//!                      GameRound<Finished>          Won | Lost | Failed
//! ```
//!
//! Every transition consumes the previous round, so a seed can only be scanned
//! after payment and a finished round cannot be resumed. Rounds share nothing.

use crate::balance::BalanceOracle;
use crate::config::GameConfig;
use crate::keys::{DerivedAddress, SeedPhrase};
use crate::lnurl::{Invoice, LnurlClient, LnurlError, PaymentPoller, PaymentState, PollHandle};
use crate::scan::{ProgressSender, ScanCoordinator, ScanError, ScanOutcome};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Lnurl(#[from] LnurlError),
    #[error("HTTP client setup failed: {0}")]
    Client(String),
    #[error("Invoice has no verify URL; payment must be confirmed manually")]
    NoVerification,
    #[error("Payment failed: {0}")]
    PaymentFailed(String),
    #[error("Round cancelled")]
    Cancelled,
}

/// Phase 1: invoice issued, waiting for the player to pay.
#[derive(Debug)]
pub struct AwaitingPayment {
    pub invoice: Invoice,
    pub amount_sats: u64,
}

/// Phase 2: paid; the round's seed exists and is being scanned.
#[derive(Debug)]
pub struct Scanning {
    phrase: SeedPhrase,
}

/// Phase 3: terminal. No seed exists when the round failed before payment.
#[derive(Debug)]
pub struct Finished {
    phrase: Option<SeedPhrase>,
    result: RoundResult,
    outcome: Option<ScanOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum RoundResult {
    Won { address: DerivedAddress, balance_sats: u64, checked: usize },
    Lost { checked: usize, unverified: usize },
    Failed { message: String },
}

#[derive(Debug)]
pub struct GameRound<S> {
    id: String,
    started_at: DateTime<Utc>,
    state: S,
}

impl<S> GameRound<S> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn advance<T>(self, state: T) -> GameRound<T> {
        GameRound { id: self.id, started_at: self.started_at, state }
    }
}

impl GameRound<AwaitingPayment> {
    pub fn new(invoice: Invoice, amount_sats: u64) -> Self {
        let mut id = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut id);
        Self { id: hex::encode(id), started_at: Utc::now(), state: AwaitingPayment { invoice, amount_sats } }
    }

    pub fn invoice(&self) -> &Invoice {
        &self.state.invoice
    }

    pub fn amount_sats(&self) -> u64 {
        self.state.amount_sats
    }

    /// Payment confirmed: roll a fresh seed for this round.
    pub fn paid(self) -> GameRound<Scanning> {
        self.paid_with(SeedPhrase::generate())
    }

    pub fn paid_with(self, phrase: SeedPhrase) -> GameRound<Scanning> {
        info!(round = %self.id, "payment confirmed, seed generated");
        self.advance(Scanning { phrase })
    }

    /// Payment never went through. The round ends without a seed.
    pub fn fail(self, message: impl Into<String>) -> GameRound<Finished> {
        let result = RoundResult::Failed { message: message.into() };
        info!(round = %self.id, result = ?result, "round finished before payment");
        self.advance(Finished { phrase: None, result, outcome: None })
    }
}

impl GameRound<Scanning> {
    pub fn phrase(&self) -> &SeedPhrase {
        &self.state.phrase
    }

    pub fn finish(self, outcome: Result<ScanOutcome, ScanError>) -> GameRound<Finished> {
        let (result, outcome) = match outcome {
            Ok(outcome) => {
                let checked = outcome.checked_addresses.len();
                let result = match (&outcome.winning_address, outcome.winning_balance) {
                    (Some(address), Some(balance_sats)) if outcome.found => {
                        RoundResult::Won { address: address.clone(), balance_sats, checked }
                    }
                    _ => RoundResult::Lost { checked, unverified: outcome.unverified.len() },
                };
                (result, Some(outcome))
            }
            Err(e) => (RoundResult::Failed { message: e.to_string() }, None),
        };
        info!(round = %self.id, result = ?result, "round finished");
        let phrase = Some(self.state.phrase.clone());
        self.advance(Finished { phrase, result, outcome })
    }
}

/// What the player gets to see at the end. The seed is revealed only to winners.
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round: String,
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: RoundResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    pub checked_addresses: Vec<String>,
}

impl GameRound<Finished> {
    pub fn result(&self) -> &RoundResult {
        &self.state.result
    }

    pub fn outcome(&self) -> Option<&ScanOutcome> {
        self.state.outcome.as_ref()
    }

    pub fn phrase(&self) -> Option<&SeedPhrase> {
        self.state.phrase.as_ref()
    }

    pub fn won(&self) -> bool {
        matches!(self.state.result, RoundResult::Won { .. })
    }

    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            round: self.id.clone(),
            started_at: self.started_at,
            result: self.state.result.clone(),
            mnemonic: self.phrase().filter(|_| self.won()).map(|p| p.as_str().to_string()),
            checked_addresses: self.outcome().map(|o| o.checked_addresses.clone()).unwrap_or_default(),
        }
    }
}

/// How the payment phase of a round ended.
#[derive(Debug)]
pub enum Payment {
    Paid(GameRound<Scanning>),
    Failed(GameRound<Finished>),
}

impl Payment {
    pub fn into_scanning(self) -> Result<GameRound<Scanning>, GameError> {
        match self {
            Payment::Paid(round) => Ok(round),
            Payment::Failed(round) => match round.state.result {
                RoundResult::Failed { message } => Err(GameError::PaymentFailed(message)),
                other => Err(GameError::PaymentFailed(format!("{:?}", other))),
            },
        }
    }
}

/// Wires the payment flow and the scanner together for successive rounds.
pub struct Game {
    config: GameConfig,
    lnurl: LnurlClient,
    scanner: ScanCoordinator,
}

impl Game {
    /// Production wiring: default balance providers, clients built from `config.http`.
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        let lnurl = LnurlClient::new(&config.http).map_err(|e| GameError::Client(e.to_string()))?;
        let oracle = BalanceOracle::with_defaults(&config.http).map_err(|e| GameError::Client(e.to_string()))?;
        let scanner = ScanCoordinator::new(config.scan.clone(), Arc::new(oracle));
        Ok(Self::with_parts(config, lnurl, scanner))
    }

    pub fn with_parts(config: GameConfig, lnurl: LnurlClient, scanner: ScanCoordinator) -> Self {
        Self { config, lnurl, scanner }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Resolve the merchant address and issue this round's invoice.
    pub async fn open_round(&self) -> Result<GameRound<AwaitingPayment>, GameError> {
        let invoice = self
            .lnurl
            .fetch_invoice(&self.config.lightning_address, self.config.amount_sats, self.config.comment.as_deref())
            .await?;
        let round = GameRound::new(invoice, self.config.amount_sats);
        info!(round = %round.id(), amount_sats = round.amount_sats(), "round opened");
        Ok(round)
    }

    /// Start polling the round's verify URL in the background.
    pub fn watch_payment(
        &self,
        round: &GameRound<AwaitingPayment>,
        cancel: &CancellationToken,
    ) -> Result<PollHandle, GameError> {
        let verify_url = round.invoice().verify_url.clone().ok_or(GameError::NoVerification)?;
        Ok(PaymentPoller::spawn(self.lnurl.clone(), verify_url, self.config.poll.clone(), cancel.clone()))
    }

    /// Poll until the invoice settles. A rejected or expired payment finishes the round;
    /// cancellation is the only error once polling has started.
    pub async fn confirm_payment(
        &self,
        round: GameRound<AwaitingPayment>,
        cancel: &CancellationToken,
    ) -> Result<Payment, GameError> {
        let handle = self.watch_payment(&round, cancel)?;
        match handle.wait().await {
            PaymentState::Settled { .. } => Ok(Payment::Paid(round.paid())),
            PaymentState::Error { reason } => Ok(Payment::Failed(round.fail(reason))),
            PaymentState::Pending => Err(GameError::Cancelled),
        }
    }

    /// Scan the round's seed. Only cancellation escapes as an error; every other failure
    /// becomes a `Failed` result.
    pub async fn run_scan(
        &self,
        round: GameRound<Scanning>,
        cancel: &CancellationToken,
        progress: &ProgressSender,
    ) -> Result<GameRound<Finished>, GameError> {
        let count = self.config.scan.address_count;
        let outcome = self.scanner.scan_phrase(round.phrase(), count, cancel, progress).await;
        if matches!(outcome, Err(ScanError::Cancelled)) {
            return Err(GameError::Cancelled);
        }
        Ok(round.finish(outcome))
    }
}
