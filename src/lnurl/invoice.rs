use super::{error_reason, LnurlClient, LnurlError, LnurlPayDescriptor, ParseTier};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A payable BOLT11 invoice, plus where to ask whether it was paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    pub payment_request: String,
    pub verify_url: Option<String>,
    pub parse_tier: ParseTier,
}

#[derive(Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum CallbackStatus {
    Ok,
    Error,
}

#[allow(dead_code)]
#[derive(Deserialize)]
struct CallbackBody {
    pr: String,
    #[serde(default)]
    routes: Option<Vec<Value>>,
    #[serde(default)]
    verify: Option<String>,
    #[serde(default)]
    status: Option<CallbackStatus>,
    #[serde(default)]
    reason: Option<String>,
}

impl Invoice {
    /// Decode a callback response: explicit errors first, then strict, then lenient.
    pub fn from_json(body: &Value) -> Result<Self, LnurlError> {
        if let Some(reason) = error_reason(body) {
            return Err(LnurlError::Invoice(reason));
        }

        let strict_error = match Self::strict(body) {
            Ok(invoice) => return Ok(invoice),
            Err(e) => e,
        };

        let pr = body.get("pr").and_then(Value::as_str).filter(|pr| !pr.is_empty());
        match pr {
            Some(pr) => {
                warn!(error = %strict_error, "callback response failed strict validation, using lenient decode");
                Ok(Self {
                    payment_request: pr.to_string(),
                    verify_url: body.get("verify").and_then(Value::as_str).map(String::from),
                    parse_tier: ParseTier::Lenient,
                })
            }
            None => Err(LnurlError::Invoice(format!("no payment request in response: {}", strict_error))),
        }
    }

    fn strict(body: &Value) -> Result<Self, String> {
        let raw: CallbackBody = serde_json::from_value(body.clone()).map_err(|e| e.to_string())?;
        if raw.pr.is_empty() {
            return Err("empty payment request".into());
        }
        if let Some(verify) = &raw.verify {
            Url::parse(verify).map_err(|e| format!("verify {:?}: {}", verify, e))?;
        }
        Ok(Self { payment_request: raw.pr, verify_url: raw.verify, parse_tier: ParseTier::Strict })
    }
}

/// Millisatoshi amount for `amount_sats`, if the descriptor allows it. Bounds are inclusive.
pub(crate) fn checked_amount_msat(descriptor: &LnurlPayDescriptor, amount_sats: u64) -> Result<u64, LnurlError> {
    let out_of_range = || LnurlError::AmountOutOfRange {
        amount_sats,
        min_sats: descriptor.min_sats(),
        max_sats: descriptor.max_sats(),
    };
    let msat = amount_sats.checked_mul(1000).ok_or_else(out_of_range)?;
    if msat < descriptor.min_sendable_msat || msat > descriptor.max_sendable_msat {
        return Err(out_of_range());
    }
    Ok(msat)
}

/// Callback URL with `amount` and, if accepted, `comment` appended to its query.
pub(crate) fn callback_url(descriptor: &LnurlPayDescriptor, amount_msat: u64, comment: Option<&str>) -> Url {
    let mut url = descriptor.callback.clone();
    url.query_pairs_mut().append_pair("amount", &amount_msat.to_string());

    if let Some(comment) = comment.map(str::trim).filter(|c| !c.is_empty()) {
        match descriptor.comment_allowed {
            Some(0) => debug!("callback does not accept comments, dropping"),
            Some(limit) => {
                let limited: String = comment.chars().take(limit as usize).collect();
                url.query_pairs_mut().append_pair("comment", &limited);
            }
            None => {
                url.query_pairs_mut().append_pair("comment", comment);
            }
        }
    }
    url
}

impl LnurlClient {
    /// Ask the descriptor's callback for an invoice of `amount_sats`.
    pub async fn request_invoice(
        &self,
        descriptor: &LnurlPayDescriptor,
        amount_sats: u64,
        comment: Option<&str>,
    ) -> Result<Invoice, LnurlError> {
        let amount_msat = checked_amount_msat(descriptor, amount_sats)?;
        let url = callback_url(descriptor, amount_msat, comment);
        debug!(%url, "requesting invoice");

        let (status, body) = self.get_json(url.as_str()).await.map_err(|e| LnurlError::Http(e.to_string()))?;
        if !status.is_success() {
            let reason = body
                .as_ref()
                .and_then(error_reason)
                .unwrap_or_else(|| format!("callback returned HTTP {}", status));
            return Err(LnurlError::Invoice(reason));
        }
        let body = body.ok_or_else(|| LnurlError::Invoice("callback did not return JSON".into()))?;
        let invoice = Invoice::from_json(&body)?;
        debug!(tier = ?invoice.parse_tier, has_verify = invoice.verify_url.is_some(), "invoice received");
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(min: u64, max: u64, comment_allowed: Option<u64>) -> LnurlPayDescriptor {
        LnurlPayDescriptor {
            callback: Url::parse("https://pay.example/cb?user=dios").unwrap(),
            min_sendable_msat: min,
            max_sendable_msat: max,
            metadata: "[]".into(),
            tag: "payRequest".into(),
            comment_allowed,
        }
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        let d = descriptor(10_000, 50_000, None);
        assert_eq!(checked_amount_msat(&d, 10).unwrap(), 10_000);
        assert_eq!(checked_amount_msat(&d, 50).unwrap(), 50_000);
        assert!(matches!(
            checked_amount_msat(&d, 9),
            Err(LnurlError::AmountOutOfRange { amount_sats: 9, min_sats: 10, max_sats: 50 })
        ));
        assert!(matches!(checked_amount_msat(&d, 51), Err(LnurlError::AmountOutOfRange { .. })));
        assert!(matches!(checked_amount_msat(&d, u64::MAX), Err(LnurlError::AmountOutOfRange { .. })));
    }

    #[test]
    fn callback_url_keeps_existing_query() {
        let url = callback_url(&descriptor(1000, 10_000, None), 2_025_000, Some("good luck"));
        assert_eq!(url.as_str(), "https://pay.example/cb?user=dios&amount=2025000&comment=good+luck");
    }

    #[test]
    fn comment_respects_comment_allowed() {
        let url = callback_url(&descriptor(1000, 10_000, Some(4)), 1000, Some("abcdefgh"));
        assert!(url.as_str().ends_with("comment=abcd"));

        let url = callback_url(&descriptor(1000, 10_000, Some(0)), 1000, Some("abc"));
        assert!(!url.as_str().contains("comment"));

        let url = callback_url(&descriptor(1000, 10_000, None), 1000, Some("   "));
        assert!(!url.as_str().contains("comment"));
    }

    #[test]
    fn strict_decode() {
        let inv = Invoice::from_json(&json!({
            "pr": "lnbc20250n1...",
            "routes": [],
            "verify": "https://pay.example/verify/abc",
            "status": "OK"
        }))
        .unwrap();
        assert_eq!(inv.parse_tier, ParseTier::Strict);
        assert_eq!(inv.verify_url.as_deref(), Some("https://pay.example/verify/abc"));
    }

    #[test]
    fn lenient_decode_when_schema_fails() {
        let inv = Invoice::from_json(&json!({
            "pr": "lnbc1...",
            "verify": "not-a-url",
            "routes": "none"
        }))
        .unwrap();
        assert_eq!(inv.parse_tier, ParseTier::Lenient);
        assert_eq!(inv.payment_request, "lnbc1...");
        assert_eq!(inv.verify_url.as_deref(), Some("not-a-url"));
    }

    #[test]
    fn error_status_wins_over_pr() {
        let err = Invoice::from_json(&json!({"status": "ERROR", "reason": "amount too low", "pr": "lnbc1"})).unwrap_err();
        assert_eq!(err, LnurlError::Invoice("amount too low".into()));
    }

    #[test]
    fn missing_pr_fails() {
        assert!(matches!(Invoice::from_json(&json!({"routes": []})), Err(LnurlError::Invoice(_))));
        assert!(matches!(Invoice::from_json(&json!({"pr": ""})), Err(LnurlError::Invoice(_))));
    }
}
