//! Balance oracle against in-process ledger providers
//!
//! Each provider is a small axum router. Failures are injected per provider to
//! exercise the ordered fallback.

mod common;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use seedlottery::balance::BalanceLookupError;
use seedlottery::{BalanceLookup, BalanceOracle, BalanceProvider, HttpConfig, ResponseShape};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ADDRESS: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";

type Hits = Arc<AtomicUsize>;

async fn esplora(State(hits): State<Hits>, Path(address): Path<String>) -> axum::Json<serde_json::Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    axum::Json(json!({
        "address": address,
        "chain_stats": {"funded_txo_sum": 1500, "spent_txo_sum": 1000, "tx_count": 2},
        "mempool_stats": {"funded_txo_sum": 0, "spent_txo_sum": 0, "tx_count": 0}
    }))
}

async fn unavailable(State(hits): State<Hits>, Path(_): Path<String>) -> (StatusCode, &'static str) {
    hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::SERVICE_UNAVAILABLE, "rate limited")
}

async fn garbage(State(hits): State<Hits>, Path(_): Path<String>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    "<html>maintenance</html>"
}

async fn plain(State(hits): State<Hits>, Path(_): Path<String>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    "1234\n"
}

async fn overspent(Path(_): Path<String>) -> axum::Json<serde_json::Value> {
    axum::Json(json!({"chain_stats": {"funded_txo_sum": 100, "spent_txo_sum": 300}}))
}

/// One provider route on its own server. Returns the endpoint template and its hit counter.
async fn provider_server<H, T>(handler: H) -> (String, Hits)
where
    H: axum::handler::Handler<T, Hits>,
    T: 'static,
{
    let hits = Hits::default();
    let router = Router::new().route("/address/:address", get(handler)).with_state(hits.clone());
    let base = common::serve(router).await;
    (format!("{}/address/{{address}}", base), hits)
}

fn oracle(providers: Vec<BalanceProvider>) -> BalanceOracle {
    let http = HttpConfig::default().with_timeout(Duration::from_secs(2));
    BalanceOracle::new(seedlottery::http::build_client(&http).expect("client"), providers)
}

/// Test: first provider answers, the rest are never asked
#[tokio::test]
async fn first_provider_wins() {
    let (first, first_hits) = provider_server(esplora).await;
    let (second, second_hits) = provider_server(esplora).await;
    let oracle = oracle(vec![
        BalanceProvider::new("first", first, ResponseShape::ChainStats),
        BalanceProvider::new("second", second, ResponseShape::ChainStats),
    ]);

    assert_eq!(oracle.get_balance(ADDRESS).await, 500);
    assert_eq!(first_hits.load(Ordering::SeqCst), 1);
    assert_eq!(second_hits.load(Ordering::SeqCst), 0);
}

/// Test: non-2xx from provider 1 falls through to provider 2
#[tokio::test]
async fn falls_back_on_error_status() {
    let (first, first_hits) = provider_server(unavailable).await;
    let (second, _) = provider_server(esplora).await;
    let oracle = oracle(vec![
        BalanceProvider::new("first", first, ResponseShape::ChainStats),
        BalanceProvider::new("second", second, ResponseShape::ChainStats),
    ]);

    match oracle.lookup(ADDRESS).await {
        BalanceLookup::Confirmed { provider, satoshis } => {
            assert_eq!(provider, "second");
            assert_eq!(satoshis, 500);
        }
        other => panic!("expected confirmed balance, got {:?}", other),
    }
    assert_eq!(first_hits.load(Ordering::SeqCst), 1);
}

/// Test: providers 1 and 2 fail differently, provider 3 (plain text) answers
#[tokio::test]
async fn third_provider_after_two_failures() {
    let (first, _) = provider_server(unavailable).await;
    let (second, second_hits) = provider_server(garbage).await;
    let (third, third_hits) = provider_server(plain).await;
    let oracle = oracle(vec![
        BalanceProvider::new("first", first, ResponseShape::ChainStats),
        BalanceProvider::new("second", second, ResponseShape::ChainStats),
        BalanceProvider::new("third", third, ResponseShape::PlainSatoshis),
    ]);

    assert_eq!(oracle.get_balance(ADDRESS).await, 1234);
    assert_eq!(second_hits.load(Ordering::SeqCst), 1);
    assert_eq!(third_hits.load(Ordering::SeqCst), 1);
}

/// Test: every provider unreachable → 0, no error, failures recorded in order
#[tokio::test]
async fn all_unreachable_reports_zero() {
    let mut providers = Vec::new();
    for name in ["first", "second", "third"] {
        let base = common::closed_port().await;
        providers.push(BalanceProvider::new(name, format!("{}/address/{{address}}", base), ResponseShape::ChainStats));
    }
    let oracle = oracle(providers);

    assert_eq!(oracle.get_balance(ADDRESS).await, 0);

    let lookup = oracle.lookup(ADDRESS).await;
    assert!(!lookup.is_known());
    assert_eq!(lookup.satoshis(), 0);
    match lookup {
        BalanceLookup::Unknown { failures } => {
            let names: Vec<_> = failures.iter().map(|f| f.provider.as_str()).collect();
            assert_eq!(names, ["first", "second", "third"]);
            assert!(failures.iter().all(|f| matches!(f.error, BalanceLookupError::Http(_))));
        }
        other => panic!("expected unknown balance, got {:?}", other),
    }
}

/// Test: status codes are reported per provider
#[tokio::test]
async fn status_failure_is_recorded() {
    let (only, _) = provider_server(unavailable).await;
    let oracle = oracle(vec![BalanceProvider::new("only", only, ResponseShape::ChainStats)]);

    match oracle.lookup(ADDRESS).await {
        BalanceLookup::Unknown { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].error, BalanceLookupError::Status(503));
        }
        other => panic!("expected unknown balance, got {:?}", other),
    }
}

/// Test: spent more than funded clamps to 0
#[tokio::test]
async fn negative_net_balance_is_zero() {
    let router = Router::new().route("/address/:address", get(overspent));
    let base = common::serve(router).await;
    let oracle = oracle(vec![BalanceProvider::new(
        "odd",
        format!("{}/address/{{address}}", base),
        ResponseShape::ChainStats,
    )]);

    let lookup = oracle.lookup(ADDRESS).await;
    assert!(lookup.is_known());
    assert_eq!(lookup.satoshis(), 0);
}

/// Test: production providers are tried in the documented order
#[test]
fn default_provider_order() {
    let oracle = BalanceOracle::with_defaults(&HttpConfig::default()).expect("oracle");
    let names: Vec<_> = oracle.providers().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["blockstream", "mempool", "blockchain.info"]);
    assert_eq!(oracle.providers(), BalanceProvider::defaults().as_slice());
    assert_eq!(
        BalanceProvider::blockchain_info().url_for(ADDRESS),
        format!("https://blockchain.info/q/addressbalance/{}?cors=true", ADDRESS)
    );
}
