use super::LnurlError;
use std::fmt;
use std::str::FromStr;

/// `user@domain` payable address (LUD-16).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightningAddress {
    pub user: String,
    pub domain: String,
}

impl LightningAddress {
    /// Split on exactly one `@`; both halves must be non-empty.
    pub fn parse(raw: &str) -> Result<Self, LnurlError> {
        let trimmed = raw.trim();
        let invalid = || LnurlError::InvalidAddressFormat(raw.to_string());
        let mut parts = trimmed.split('@');
        let (user, domain) = match (parts.next(), parts.next(), parts.next()) {
            (Some(user), Some(domain), None) => (user, domain),
            _ => return Err(invalid()),
        };
        if user.is_empty() || domain.is_empty() || domain.contains('/') {
            return Err(invalid());
        }
        Ok(Self { user: user.to_string(), domain: domain.to_string() })
    }

    /// Onion services are reached over plain http.
    pub fn is_onion(&self) -> bool {
        self.domain.split(':').next().is_some_and(|host| host.ends_with(".onion"))
    }

    pub fn well_known_url(&self, allow_insecure_http: bool) -> String {
        let scheme = if allow_insecure_http || self.is_onion() { "http" } else { "https" };
        format!("{}://{}/.well-known/lnurlp/{}", scheme, self.domain, self.user)
    }
}

impl FromStr for LightningAddress {
    type Err = LnurlError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl fmt::Display for LightningAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.domain)
    }
}
