//! Seed Lottery: pay a Lightning invoice, roll a fresh BIP39 seed, look for funds.
//!
//! # Architecture
//!
//! ```text
//! Game (one round at a time)
//!   │
//!   ├── lnurl
//!   │     ├── resolver   user@domain → LnurlPayDescriptor     (LUD-16)
//!   │     ├── invoice    descriptor + amount → Invoice        (LUD-06/12)
//!   │     ├── verify     verify URL → VerifyReport            (LUD-21)
//!   │     └── poller     background task → PaymentState
//!   │
//!   └── scan (ScanCoordinator)
//!         ├── keys       SeedPhrase → BIP84 addresses m/84'/0'/0'/0/i
//!         └── balance    BalanceOracle: blockstream → mempool → blockchain.info
//! ```
//!
//! Every long-running piece takes a `CancellationToken`; [`runtime::Shutdown`]
//! owns the root token and hands child tokens to rounds.
//!
//! # Usage
//!
//! ```ignore
//! use seedlottery::{Game, GameConfig, ProgressSender, Shutdown};
//!
//! let game = Game::new(GameConfig::from_env()?)?;
//! let shutdown = Shutdown::new();
//! let cancel = shutdown.round_token();
//!
//! let round = game.open_round().await?;
//! println!("pay: {}", round.invoice().payment_request);
//!
//! let round = game.confirm_payment(round, &cancel).await?;
//! let finished = game.run_scan(round, &cancel, &ProgressSender::detached()).await?;
//! println!("{:?}", finished.result());
//! ```

pub mod balance;
pub mod config;
pub mod game;
pub mod http;
pub mod keys;
pub mod lnurl;
pub mod logging;
pub mod runtime;
pub mod scan;

pub use balance::{BalanceLookup, BalanceOracle, BalanceProvider, BalanceSource, ResponseShape};
pub use config::{ConfigError, GameConfig, HttpConfig, PollConfig, ScanConfig};
pub use game::{Game, GameError, GameRound, Payment, RoundResult, RoundSummary};
pub use keys::{derive_addresses, validate_mnemonic, DerivationError, DerivedAddress, SeedPhrase};
pub use lnurl::{
    Invoice, LightningAddress, LnurlClient, LnurlError, LnurlPayDescriptor, ParseTier, PaymentPoller, PaymentState,
    VerificationError,
};
pub use runtime::{install_signal_handlers, Shutdown};
pub use scan::{
    progress_channel, ActiveAddress, ProgressSender, ScanCoordinator, ScanError, ScanOutcome, ScanProgress, SurveyOutcome,
};
