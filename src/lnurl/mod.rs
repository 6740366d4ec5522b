//! LNURL-pay - Lightning address → invoice → settlement
//!
//! ```text
//! LightningAddress "user@domain"
//!     │  GET https://domain/.well-known/lnurlp/user      (LUD-16)
//!     ▼
//! LnurlPayDescriptor {callback, minSendable, maxSendable}
//!     │  GET callback?amount=<msat>&comment=<c>          (LUD-06/12)
//!     ▼
//! Invoice {pr, verify?}
//!     │  GET verify, every 3 s                           (LUD-21)
//!     ▼
//! PaymentState: Pending → Settled | Error
//! ```
//!
//! Servers in this ecosystem vary in strictness, so callback and verify bodies
//! are decoded in two tiers: a strict typed decode first, then a lenient one
//! that only needs the fields actually consumed. [`ParseTier`] records which
//! one succeeded.

mod address;
mod invoice;
mod poller;
mod resolver;
mod verify;

pub use address::LightningAddress;
pub use invoice::Invoice;
pub use poller::{PaymentPoller, PaymentState, PollHandle};
pub use resolver::LnurlPayDescriptor;
pub use verify::{VerificationError, VerifyReport};

use crate::config::HttpConfig;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde_json::Value;

/// Which decoding tier accepted a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseTier {
    Strict,
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LnurlError {
    #[error("Invalid Lightning address format: {0:?}")]
    InvalidAddressFormat(String),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("LNURL resolution failed: {0}")]
    Resolution(String),
    #[error("Amount must be between {min_sats} and {max_sats} sats, got {amount_sats}")]
    AmountOutOfRange { amount_sats: u64, min_sats: u64, max_sats: u64 },
    #[error("Invoice request failed: {0}")]
    Invoice(String),
}

/// HTTP side of the payment flow. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LnurlClient {
    http: reqwest::Client,
    allow_insecure_http: bool,
}

impl LnurlClient {
    pub fn new(config: &HttpConfig) -> reqwest::Result<Self> {
        Ok(Self { http: crate::http::build_client(config)?, allow_insecure_http: config.allow_insecure_http })
    }

    /// Resolve `pay_address` and request an invoice for `amount_sats` in one go.
    pub async fn fetch_invoice(
        &self,
        pay_address: &str,
        amount_sats: u64,
        comment: Option<&str>,
    ) -> Result<Invoice, LnurlError> {
        let descriptor = self.resolve(pay_address).await?;
        self.request_invoice(&descriptor, amount_sats, comment).await
    }

    /// GET `url` as JSON. Returns the status and whatever JSON could be read from the body.
    pub(crate) async fn get_json(&self, url: &str) -> Result<(reqwest::StatusCode, Option<Value>), reqwest::Error> {
        let response = self.http.get(url).header(ACCEPT, "application/json").send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, serde_json::from_str(&body).ok()))
    }
}

/// `status: "ERROR"` bodies carry a human-readable `reason`.
pub(crate) fn error_reason(body: &Value) -> Option<String> {
    let status = body.get("status")?.as_str()?;
    if !status.eq_ignore_ascii_case("ERROR") {
        return None;
    }
    Some(
        body.get("reason")
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .unwrap_or("unknown error")
            .to_string(),
    )
}
