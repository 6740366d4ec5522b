//! Shared HTTP client. Every request is bounded by a timeout and bypasses caches.

use crate::config::HttpConfig;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};

/// Build the client used for ledger providers and LNURL endpoints.
pub fn build_client(config: &HttpConfig) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    reqwest::Client::builder()
        .default_headers(headers)
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout)
        .connect_timeout(config.timeout)
        .build()
}
