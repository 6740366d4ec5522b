//! Scan progress, published through a watch channel. Cosmetic only.

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub step: u32,
    pub total_steps: u32,
    pub percent: u8,
    pub message: String,
}

impl ScanProgress {
    pub fn idle() -> Self {
        Self { step: 0, total_steps: 0, percent: 0, message: "Starting...".into() }
    }
}

/// Publisher side. Percent never goes backwards.
#[derive(Debug)]
pub struct ProgressSender {
    tx: watch::Sender<ScanProgress>,
}

/// New channel seeded with [`ScanProgress::idle`].
pub fn progress_channel() -> (ProgressSender, watch::Receiver<ScanProgress>) {
    let (tx, rx) = watch::channel(ScanProgress::idle());
    (ProgressSender { tx }, rx)
}

impl ProgressSender {
    /// A sender nobody listens to.
    pub fn detached() -> Self {
        progress_channel().0
    }

    pub fn report(&self, step: u32, total_steps: u32, message: impl Into<String>) {
        let computed = if total_steps == 0 {
            0
        } else {
            (u64::from(step.min(total_steps)) * 100 / u64::from(total_steps)) as u8
        };
        self.publish(step, total_steps, computed, message.into());
    }

    pub fn complete(&self, message: impl Into<String>) {
        let total = self.tx.borrow().total_steps;
        self.publish(total, total, 100, message.into());
    }

    pub fn current(&self) -> ScanProgress {
        self.tx.borrow().clone()
    }

    fn publish(&self, step: u32, total_steps: u32, percent: u8, message: String) {
        let floor = self.tx.borrow().percent;
        self.tx.send_replace(ScanProgress { step, total_steps, percent: percent.max(floor), message });
    }
}
