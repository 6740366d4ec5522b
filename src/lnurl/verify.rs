use super::{error_reason, LnurlClient, ParseTier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("verify request failed: {0}")]
    Http(String),
    #[error("verify endpoint returned HTTP {0}")]
    Status(u16),
    #[error("unreadable verify response: {0}")]
    Malformed(String),
    /// The server reported `status: "ERROR"`. Terminal for the payment attempt.
    #[error("payment verification rejected: {0}")]
    Rejected(String),
}

impl VerificationError {
    /// Whether polling should stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VerificationError::Rejected(_))
    }
}

/// One LUD-21 answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub settled: bool,
    pub preimage: Option<String>,
    pub parse_tier: ParseTier,
}

#[derive(Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum VerifyStatus {
    Ok,
    Error,
}

#[allow(dead_code)]
#[derive(Deserialize)]
struct VerifyBody {
    #[serde(default)]
    status: Option<VerifyStatus>,
    #[serde(default)]
    settled: Option<bool>,
    #[serde(default)]
    preimage: Option<String>,
    #[serde(default)]
    pr: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl VerifyReport {
    pub fn from_json(body: &Value) -> Result<Self, VerificationError> {
        if let Some(reason) = error_reason(body) {
            return Err(VerificationError::Rejected(reason));
        }

        match serde_json::from_value::<VerifyBody>(body.clone()) {
            Ok(raw) => Ok(Self {
                settled: raw.settled.unwrap_or(false),
                preimage: raw.preimage.filter(|p| !p.is_empty()),
                parse_tier: ParseTier::Strict,
            }),
            Err(strict_error) => match body.get("settled").and_then(Value::as_bool) {
                Some(settled) => {
                    warn!(error = %strict_error, "verify response failed strict validation, using lenient decode");
                    Ok(Self { settled, preimage: None, parse_tier: ParseTier::Lenient })
                }
                None => Err(VerificationError::Malformed(strict_error.to_string())),
            },
        }
    }
}

impl LnurlClient {
    /// One LUD-21 verify request.
    pub async fn verify_payment(&self, verify_url: &str) -> Result<VerifyReport, VerificationError> {
        debug!(url = %verify_url, "verifying payment");
        let (status, body) = self
            .get_json(verify_url)
            .await
            .map_err(|e| VerificationError::Http(e.to_string()))?;

        if let Some(reason) = body.as_ref().and_then(error_reason) {
            return Err(VerificationError::Rejected(reason));
        }
        if !status.is_success() {
            return Err(VerificationError::Status(status.as_u16()));
        }
        let body = body.ok_or_else(|| VerificationError::Malformed("response is not JSON".into()))?;
        VerifyReport::from_json(&body)
    }
}
