//! Payment polling: a spawned task that owns its cancellation token.
//!
//! ```text
//!            settled: true
//!   Pending ───────────────▶ Settled
//!      │  status: "ERROR"
//!      ├───────────────────▶ Error
//!      │  timeout
//!      └───────────────────▶ Error
//! ```
//!
//! The first verify request goes out immediately, then one per interval.
//! Transport failures and odd bodies leave the state `Pending`. Cancellation
//! drops any in-flight request, so its answer is never applied.

use super::LnurlClient;
use crate::config::PollConfig;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PaymentState {
    Pending,
    Settled { preimage: Option<String> },
    Error { reason: String },
}

impl PaymentState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentState::Pending)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentState::Settled { .. })
    }
}

pub struct PaymentPoller;

impl PaymentPoller {
    /// Start polling `verify_url`. The task stops when `cancel` is cancelled or
    /// the handle is cancelled or dropped.
    pub fn spawn(client: LnurlClient, verify_url: String, config: PollConfig, cancel: CancellationToken) -> PollHandle {
        let (tx, rx) = watch::channel(PaymentState::Pending);
        let token = cancel.child_token();
        let task = tokio::spawn(run(client, verify_url, config, token.clone(), tx));
        PollHandle { state: rx, _guard: token.clone().drop_guard(), token, task }
    }
}

/// Owner's side of a running poller. Dropping it stops the task.
pub struct PollHandle {
    state: watch::Receiver<PaymentState>,
    token: CancellationToken,
    task: JoinHandle<PaymentState>,
    _guard: DropGuard,
}

impl PollHandle {
    pub fn state(&self) -> watch::Receiver<PaymentState> {
        self.state.clone()
    }

    pub fn current(&self) -> PaymentState {
        self.state.borrow().clone()
    }

    /// Stop polling. No further request is sent after this returns.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Final state. `Pending` when the poller was cancelled.
    pub async fn wait(self) -> PaymentState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => PaymentState::Error { reason: format!("poller task failed: {}", e) },
        }
    }
}

async fn run(
    client: LnurlClient,
    verify_url: String,
    config: PollConfig,
    token: CancellationToken,
    tx: watch::Sender<PaymentState>,
) -> PaymentState {
    let deadline = config.timeout.map(|t| Instant::now() + t);
    let mut ticker = tokio::time::interval(config.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut polls: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return cancelled(polls),
            _ = until(deadline) => return finish(&tx, timed_out(&config)),
            _ = ticker.tick() => {}
        }

        polls += 1;
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return cancelled(polls),
            _ = until(deadline) => return finish(&tx, timed_out(&config)),
            result = client.verify_payment(&verify_url) => result,
        };

        match result {
            Ok(report) if report.settled => {
                info!(polls, "payment settled");
                return finish(&tx, PaymentState::Settled { preimage: report.preimage });
            }
            Ok(_) => debug!(polls, "payment pending"),
            Err(e) if e.is_terminal() => {
                warn!(polls, error = %e, "payment failed");
                return finish(&tx, PaymentState::Error { reason: e.to_string() });
            }
            Err(e) => warn!(polls, error = %e, "verify attempt failed, will retry"),
        }
    }
}

fn finish(tx: &watch::Sender<PaymentState>, state: PaymentState) -> PaymentState {
    tx.send_replace(state.clone());
    state
}

fn cancelled(polls: u32) -> PaymentState {
    debug!(polls, "payment polling cancelled");
    PaymentState::Pending
}

fn timed_out(config: &PollConfig) -> PaymentState {
    let secs = config.timeout.map(|t| t.as_secs_f64()).unwrap_or_default();
    PaymentState::Error { reason: format!("payment not confirmed within {:.0}s", secs) }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
