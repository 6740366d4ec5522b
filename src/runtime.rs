//! Runtime - Graceful shutdown and signal handling
//!
//! A single process-wide [`Shutdown`] owns the root cancellation token. Every
//! game round takes a child token from it, so a signal tears down the running
//! scan and any payment poller, while cancelling one round leaves others alone.

use tokio_util::sync::CancellationToken;

/// Shutdown signal broadcaster
#[derive(Clone, Debug)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Default for Shutdown {
    fn default() -> Self { Self::new() }
}

impl Shutdown {
    pub fn new() -> Self {
        Self { token: CancellationToken::new() }
    }

    /// Token for one round. Cancelled when shutdown triggers; cancelling it does not propagate up.
    pub fn round_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger shutdown
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("shutdown triggered");
            self.token.cancel();
        }
    }

    /// Check if shutdown was triggered
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been triggered
    pub async fn wait(&self) {
        self.token.cancelled().await
    }
}

/// Install signal handlers and return shutdown handle
pub fn install_signal_handlers() -> Shutdown {
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    tracing::warn!("could not install signal handlers");
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                _ = sigint.recv() => tracing::info!("Received SIGINT"),
            }
        }

        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("could not install Ctrl+C handler");
                return;
            }
            tracing::info!("Received Ctrl+C");
        }

        handle.trigger();
    });

    shutdown
}
