//! Game Configuration - passed from higher layers
//!
//! Everything the core needs from the outside world: the merchant Lightning
//! address, the per-game price, and the timing knobs for HTTP, scanning and
//! payment polling. Values come from builders or from `SEEDLOTTERY_*` env vars.

use std::time::Duration;

pub const DEFAULT_LIGHTNING_ADDRESS: &str = "dios@lawallet.ar";
pub const DEFAULT_AMOUNT_SATS: u64 = 2025;
pub const DEFAULT_ADDRESS_COUNT: u32 = 30;
/// Invoice comment sent with every game payment.
pub const DEFAULT_COMMENT: &str = "Seed Lottery Game";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid { var: &'static str, expected: &'static str, value: String },
}

/// Shared settings for every outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout, covering connect and body.
    pub timeout: Duration,
    pub user_agent: String,
    /// Resolve Lightning addresses over plain http. Local testing only.
    pub allow_insecure_http: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: concat!("seedlottery/", env!("CARGO_PKG_VERSION")).into(),
            allow_insecure_http: false,
        }
    }
}

impl HttpConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self { self.timeout = timeout; self }
    pub fn insecure(mut self) -> Self { self.allow_insecure_http = true; self }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub address_count: u32,
    /// Count used for the single retry after a failed derivation.
    pub fallback_count: u32,
    /// Cosmetic steps reported before derivation starts.
    pub preamble_steps: u32,
    pub preamble_delay: Duration,
    /// Pause between two balance queries. Keeps third-party providers within rate limits.
    pub pacing_delay: Duration,
    /// Pause between two queries of a full survey.
    pub survey_pacing_delay: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            address_count: DEFAULT_ADDRESS_COUNT,
            fallback_count: 10,
            preamble_steps: 4,
            preamble_delay: Duration::from_millis(500),
            pacing_delay: Duration::from_millis(200),
            survey_pacing_delay: Duration::from_millis(100),
        }
    }
}

impl ScanConfig {
    /// No artificial delays. Tests and batch use.
    pub fn immediate() -> Self {
        Self {
            preamble_delay: Duration::ZERO,
            pacing_delay: Duration::ZERO,
            survey_pacing_delay: Duration::ZERO,
            ..Default::default()
        }
    }
    pub fn with_address_count(mut self, count: u32) -> Self { self.address_count = count; self }
    pub fn with_fallback_count(mut self, count: u32) -> Self { self.fallback_count = count; self }
    pub fn with_pacing(mut self, delay: Duration) -> Self { self.pacing_delay = delay; self }
    pub fn with_survey_pacing(mut self, delay: Duration) -> Self { self.survey_pacing_delay = delay; self }
    pub fn with_preamble(mut self, steps: u32, delay: Duration) -> Self {
        self.preamble_steps = steps;
        self.preamble_delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    /// Upper bound on the whole polling session. `None` polls until settled, rejected or cancelled.
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(3), timeout: Some(Duration::from_secs(600)) }
    }
}

impl PollConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self { self.interval = interval; self }
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self { self.timeout = timeout; self }
}

/// Game configuration. Higher layers construct this.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub lightning_address: String,
    pub amount_sats: u64,
    pub comment: Option<String>,
    pub http: HttpConfig,
    pub scan: ScanConfig,
    pub poll: PollConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            lightning_address: DEFAULT_LIGHTNING_ADDRESS.into(),
            amount_sats: DEFAULT_AMOUNT_SATS,
            comment: Some(DEFAULT_COMMENT.into()),
            http: HttpConfig::default(),
            scan: ScanConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn new(lightning_address: impl Into<String>, amount_sats: u64) -> Self {
        Self { lightning_address: lightning_address.into(), amount_sats, ..Default::default() }
    }
    pub fn with_comment(mut self, c: impl Into<String>) -> Self { self.comment = Some(c.into()); self }
    pub fn with_http(mut self, c: HttpConfig) -> Self { self.http = c; self }
    pub fn with_scan(mut self, c: ScanConfig) -> Self { self.scan = c; self }
    pub fn with_poll(mut self, c: PollConfig) -> Self { self.poll = c; self }

    /// Read `SEEDLOTTERY_*` overrides on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(address) = get("SEEDLOTTERY_LNADDRESS") {
            config.lightning_address = address;
        }
        if let Some(raw) = get("SEEDLOTTERY_AMOUNT_SATS") {
            config.amount_sats = parse_num("SEEDLOTTERY_AMOUNT_SATS", &raw)?;
        }
        if let Some(comment) = get("SEEDLOTTERY_COMMENT") {
            config.comment = Some(comment);
        }
        if let Some(raw) = get("SEEDLOTTERY_ADDRESS_COUNT") {
            config.scan.address_count = parse_positive("SEEDLOTTERY_ADDRESS_COUNT", &raw)?;
        }
        if let Some(raw) = get("SEEDLOTTERY_HTTP_TIMEOUT_SECS") {
            config.http.timeout = Duration::from_secs(parse_positive("SEEDLOTTERY_HTTP_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = get("SEEDLOTTERY_POLL_INTERVAL_SECS") {
            config.poll.interval = Duration::from_secs(parse_positive("SEEDLOTTERY_POLL_INTERVAL_SECS", &raw)?);
        }
        if let Some(raw) = get("SEEDLOTTERY_POLL_TIMEOUT_SECS") {
            let secs: u64 = parse_num("SEEDLOTTERY_POLL_TIMEOUT_SECS", &raw)?;
            config.poll.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(config)
    }
}

fn parse_num<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid { var, expected: "a non-negative integer", value: raw.to_string() })
}

fn parse_positive<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let value: T = parse_num(var, raw)?;
    if value == T::default() {
        return Err(ConfigError::Invalid { var, expected: "at least 1", value: raw.to_string() });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_merchant_settings() {
        let config = GameConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.lightning_address, "dios@lawallet.ar");
        assert_eq!(config.amount_sats, 2025);
        assert_eq!(config.scan.address_count, 30);
        assert_eq!(config.poll.interval, Duration::from_secs(3));
        assert_eq!(config.http.timeout, Duration::from_secs(10));
        assert_eq!(config.comment.as_deref(), Some("Seed Lottery Game"));
        assert_eq!(config.scan.survey_pacing_delay, Duration::from_millis(100));
    }

    #[test]
    fn env_overrides_apply() {
        let config = GameConfig::from_lookup(lookup(&[
            ("SEEDLOTTERY_LNADDRESS", "alice@example.com"),
            ("SEEDLOTTERY_AMOUNT_SATS", " 100 "),
            ("SEEDLOTTERY_ADDRESS_COUNT", "5"),
            ("SEEDLOTTERY_POLL_TIMEOUT_SECS", "0"),
            ("SEEDLOTTERY_COMMENT", "gl"),
        ]))
        .unwrap();
        assert_eq!(config.lightning_address, "alice@example.com");
        assert_eq!(config.amount_sats, 100);
        assert_eq!(config.scan.address_count, 5);
        assert_eq!(config.poll.timeout, None);
        assert_eq!(config.comment.as_deref(), Some("gl"));
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(GameConfig::from_lookup(lookup(&[("SEEDLOTTERY_AMOUNT_SATS", "lots")])).is_err());
        assert!(GameConfig::from_lookup(lookup(&[("SEEDLOTTERY_ADDRESS_COUNT", "0")])).is_err());
    }

    #[test]
    fn zero_timings_are_rejected() {
        for var in ["SEEDLOTTERY_HTTP_TIMEOUT_SECS", "SEEDLOTTERY_POLL_INTERVAL_SECS"] {
            match GameConfig::from_lookup(lookup(&[(var, "0")])) {
                Err(ConfigError::Invalid { var: rejected, expected, .. }) => {
                    assert_eq!(rejected, var);
                    assert_eq!(expected, "at least 1");
                }
                other => panic!("{} = 0 should be rejected, got {:?}", var, other),
            }
        }
        let config = GameConfig::from_lookup(lookup(&[
            ("SEEDLOTTERY_HTTP_TIMEOUT_SECS", "1"),
            ("SEEDLOTTERY_POLL_INTERVAL_SECS", "1"),
        ]))
        .unwrap();
        assert_eq!(config.http.timeout, Duration::from_secs(1));
        assert_eq!(config.poll.interval, Duration::from_secs(1));
    }

    #[test]
    fn blank_comment_keeps_default() {
        let config = GameConfig::from_lookup(lookup(&[("SEEDLOTTERY_COMMENT", "  ")])).unwrap();
        assert_eq!(config.comment.as_deref(), Some(DEFAULT_COMMENT));
    }
}
