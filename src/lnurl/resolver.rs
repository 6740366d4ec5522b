use super::{error_reason, LightningAddress, LnurlClient, LnurlError};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Number, Value};
use tracing::debug;

pub const PAY_REQUEST_TAG: &str = "payRequest";

/// What a LUD-16 endpoint says about how to pay it. Fetched fresh for every invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LnurlPayDescriptor {
    pub callback: Url,
    pub min_sendable_msat: u64,
    pub max_sendable_msat: u64,
    pub metadata: String,
    pub tag: String,
    /// Maximum comment length accepted by the callback (LUD-12).
    pub comment_allowed: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayRequestBody {
    callback: String,
    max_sendable: Number,
    min_sendable: Number,
    metadata: String,
    tag: String,
    #[serde(default)]
    comment_allowed: Option<Number>,
}

impl LnurlPayDescriptor {
    pub fn min_sats(&self) -> u64 {
        self.min_sendable_msat.div_ceil(1000)
    }

    pub fn max_sats(&self) -> u64 {
        self.max_sendable_msat / 1000
    }

    /// Strict decode of a pay request body.
    pub fn from_json(body: Value) -> Result<Self, LnurlError> {
        let schema = |msg: String| LnurlError::Resolution(format!("unexpected pay request: {}", msg));
        let raw: PayRequestBody = serde_json::from_value(body).map_err(|e| schema(e.to_string()))?;

        if raw.tag != PAY_REQUEST_TAG {
            return Err(schema(format!("tag is {:?}, expected {:?}", raw.tag, PAY_REQUEST_TAG)));
        }
        let callback = Url::parse(&raw.callback).map_err(|e| schema(format!("callback {:?}: {}", raw.callback, e)))?;
        if !matches!(callback.scheme(), "http" | "https") {
            return Err(schema(format!("callback scheme {:?} is not http(s)", callback.scheme())));
        }
        let min_sendable_msat = msat(&raw.min_sendable).ok_or_else(|| schema("minSendable is not a msat amount".into()))?;
        let max_sendable_msat = msat(&raw.max_sendable).ok_or_else(|| schema("maxSendable is not a msat amount".into()))?;
        let comment_allowed = raw.comment_allowed.as_ref().and_then(msat);

        Ok(Self { callback, min_sendable_msat, max_sendable_msat, metadata: raw.metadata, tag: raw.tag, comment_allowed })
    }
}

/// Non-negative whole number, accepting `1000` and `1000.0`.
fn msat(n: &Number) -> Option<u64> {
    n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

impl LnurlClient {
    /// Resolve a `user@domain` Lightning address to its pay descriptor.
    pub async fn resolve(&self, pay_address: &str) -> Result<LnurlPayDescriptor, LnurlError> {
        let address = LightningAddress::parse(pay_address)?;
        let url = address.well_known_url(self.allow_insecure_http);
        debug!(%url, "resolving lightning address");

        let (status, body) = self.get_json(&url).await.map_err(|e| LnurlError::Http(e.to_string()))?;
        if let Some(reason) = body.as_ref().and_then(error_reason) {
            return Err(LnurlError::Resolution(reason));
        }
        if !status.is_success() {
            return Err(LnurlError::Resolution(format!("{} returned HTTP {}", address, status)));
        }
        let body = body.ok_or_else(|| LnurlError::Resolution(format!("{} did not return JSON", address)))?;
        let descriptor = LnurlPayDescriptor::from_json(body)?;
        debug!(
            callback = %descriptor.callback,
            min_msat = descriptor.min_sendable_msat,
            max_msat = descriptor.max_sendable_msat,
            "resolved pay request"
        );
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> Value {
        json!({
            "callback": "https://lawallet.ar/api/lnurlp/dios/callback",
            "maxSendable": 100_000_000_000u64,
            "minSendable": 1000,
            "metadata": "[[\"text/plain\",\"Pay dios\"]]",
            "tag": "payRequest",
            "commentAllowed": 255
        })
    }

    #[test]
    fn decodes_valid_pay_request() {
        let d = LnurlPayDescriptor::from_json(body()).unwrap();
        assert_eq!(d.callback.as_str(), "https://lawallet.ar/api/lnurlp/dios/callback");
        assert_eq!(d.min_sats(), 1);
        assert_eq!(d.max_sats(), 100_000_000);
        assert_eq!(d.comment_allowed, Some(255));
    }

    #[test]
    fn accepts_float_amounts() {
        let mut b = body();
        b["minSendable"] = json!(2000.0);
        assert_eq!(LnurlPayDescriptor::from_json(b).unwrap().min_sendable_msat, 2000);
    }

    #[test]
    fn rejects_wrong_tag() {
        let mut b = body();
        b["tag"] = json!("withdrawRequest");
        assert!(matches!(LnurlPayDescriptor::from_json(b), Err(LnurlError::Resolution(_))));
    }

    #[test]
    fn rejects_bad_callback_and_missing_fields() {
        let mut b = body();
        b["callback"] = json!("not a url");
        assert!(LnurlPayDescriptor::from_json(b).is_err());

        let mut b = body();
        b.as_object_mut().unwrap().remove("metadata");
        assert!(LnurlPayDescriptor::from_json(b).is_err());

        let mut b = body();
        b["maxSendable"] = json!("100000");
        assert!(LnurlPayDescriptor::from_json(b).is_err());
    }
}
