//! Shared helpers: in-process HTTP servers and scripted balance sources.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use seedlottery::balance::BalanceLookupError;
use seedlottery::{BalanceLookup, BalanceSource};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::net::TcpListener;

// Test mnemonic (well-known, never use with real funds)
pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// Bind a loopback listener. Returns it with its `http://127.0.0.1:port` base URL.
pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    (listener, base)
}

/// Serve `router` on `listener` for the rest of the test.
pub fn spawn(listener: TcpListener, router: Router) {
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
}

pub async fn serve(router: Router) -> String {
    let (listener, base) = bind().await;
    spawn(listener, router);
    base
}

/// Base URL of a port nothing listens on.
pub async fn closed_port() -> String {
    let (listener, base) = bind().await;
    drop(listener);
    base
}

/// Balance source answering from a fixed table. Records every queried address.
#[derive(Default)]
pub struct ScriptedSource {
    balances: HashMap<String, u64>,
    failing: Vec<String>,
    queried: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn funded(mut self, address: &str, satoshis: u64) -> Self {
        self.balances.insert(address.to_string(), satoshis);
        self
    }

    pub fn failing(mut self, address: &str) -> Self {
        self.failing.push(address.to_string());
        self
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().expect("lock").clone()
    }
}

#[async_trait]
impl BalanceSource for ScriptedSource {
    async fn balance(&self, address: &str) -> Result<BalanceLookup, BalanceLookupError> {
        self.queried.lock().expect("lock").push(address.to_string());
        if self.failing.iter().any(|a| a == address) {
            return Err(BalanceLookupError::Status(503));
        }
        let satoshis = self.balances.get(address).copied().unwrap_or(0);
        Ok(BalanceLookup::Confirmed { provider: "scripted".into(), satoshis })
    }
}
