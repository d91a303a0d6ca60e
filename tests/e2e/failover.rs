//! Provider failover and credential rotation against live HTTP adapters.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::upstream::{MockUpstream, ACCOUNT_LAMPORTS, PAYER, RECEIVER, SIGNATURES, TARGET_MINT};
use burngate::event::create_event_channel;
use burngate::provider::{
    ListArgs, ProviderEntry, ProviderRegistry, QueryOrchestrator, RpcProvider, SolscanProvider,
    TransferRule,
};
use burngate::{GatewayEvent, QueryError};
use std::sync::Arc;
use std::time::Duration;

fn solscan(upstream: &MockUpstream, priority: u32) -> ProviderEntry {
    ProviderEntry::new(
        "solscan",
        priority,
        Arc::new(SolscanProvider::new(upstream.url(), reqwest::Client::new())),
    )
    .with_credentials(vec!["k1".into(), "k2".into()])
}

fn solnode(urls: Vec<String>, priority: u32) -> ProviderEntry {
    ProviderEntry::new(
        "solnode",
        priority,
        Arc::new(RpcProvider::rotating_endpoints(
            reqwest::Client::new(),
            TransferRule::LargestDelta,
        )),
    )
    .with_credentials(urls)
}

#[tokio::test]
async fn test_failing_primary_falls_through_to_rpc_pool() {
    let down = MockUpstream::start().await.expect("upstream");
    let up = MockUpstream::start().await.expect("upstream");
    down.set_failing(true);

    let (tx, mut rx) = create_event_channel();
    let registry = ProviderRegistry::new()
        .with(solnode(vec![up.url()], 4))
        .with(solscan(&down, 2));
    let orchestrator = QueryOrchestrator::new(registry).with_events(tx);

    let outcome = orchestrator
        .transactions(&ListArgs::new(PAYER, 1, 2))
        .await
        .expect("transactions");
    assert_eq!(outcome.provider, "solnode");
    let signatures: Vec<_> = outcome.records.iter().map(|r| r.signature.as_str()).collect();
    assert_eq!(signatures, SIGNATURES[..2]);
    assert_eq!(outcome.records[0].from.as_deref(), Some(PAYER));
    assert_eq!(outcome.records[0].to.as_deref(), Some(RECEIVER));
    assert_eq!(outcome.records[0].amount_raw.as_deref(), Some("505000"));

    assert_eq!(down.rest_calls(), 1);
    assert!(matches!(
        rx.try_recv().unwrap(),
        GatewayEvent::ProviderFailed { provider, .. } if provider == "solscan"
    ));
    assert_eq!(orchestrator.last_provider().as_deref(), Some("solnode"));
}

#[tokio::test]
async fn test_second_page_comes_from_the_tail() {
    let up = MockUpstream::start().await.expect("upstream");
    let orchestrator = QueryOrchestrator::new(ProviderRegistry::new().with(solnode(vec![up.url()], 1)));

    let outcome = orchestrator
        .transactions(&ListArgs::new(PAYER, 2, 2))
        .await
        .expect("transactions");
    let signatures: Vec<_> = outcome.records.iter().map(|r| r.signature.as_str()).collect();
    assert_eq!(signatures, ["sig1"]);
}

#[tokio::test]
async fn test_pages_past_one_thousand_walk_the_history() {
    let up = MockUpstream::start().await.expect("upstream");
    up.set_history(1200);
    let orchestrator = QueryOrchestrator::new(ProviderRegistry::new().with(solnode(vec![up.url()], 1)));

    let outcome = orchestrator
        .transactions(&ListArgs::new(PAYER, 3, 500))
        .await
        .expect("transactions");
    assert_eq!(outcome.records.len(), 200);
    assert_eq!(outcome.records[0].signature, "sig200");
    assert_eq!(outcome.records[199].signature, "sig1");
    assert_eq!(up.method_calls("getSignaturesForAddress"), 2);

    let past_the_end = orchestrator
        .transactions(&ListArgs::new(PAYER, 4, 500))
        .await
        .expect("transactions");
    assert!(past_the_end.records.is_empty());
    assert_eq!(up.method_calls("getSignaturesForAddress"), 4);
}

#[tokio::test]
async fn test_page_beyond_walk_depth_fails_over() {
    let up = MockUpstream::start().await.expect("upstream");
    let orchestrator = QueryOrchestrator::new(ProviderRegistry::new().with(solnode(vec![up.url()], 1)));

    let err = orchestrator
        .transactions(&ListArgs::new(PAYER, 101, 500))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::AllProvidersExhausted { .. }));
    assert_eq!(up.rpc_calls(), 0);
}

#[tokio::test]
async fn test_rpc_contract_info_reports_balance() {
    let up = MockUpstream::start().await.expect("upstream");
    let orchestrator = QueryOrchestrator::new(ProviderRegistry::new().with(solnode(vec![up.url()], 1)));

    let outcome = orchestrator.contract_info(TARGET_MINT).await.expect("contract");
    assert_eq!(outcome.records.balance_lamports, Some(ACCOUNT_LAMPORTS));
    assert_eq!(outcome.records.decimals, Some(9));

    up.reject_method("getBalance");
    let outcome = orchestrator.contract_info(TARGET_MINT).await.expect("contract");
    assert_eq!(outcome.records.balance_lamports, None);
    assert_eq!(outcome.records.total_supply.as_deref(), Some("5000000"));
}

#[tokio::test]
async fn test_success_stops_the_chain() {
    let primary = MockUpstream::start().await.expect("upstream");
    let backup = MockUpstream::start().await.expect("upstream");

    let registry = ProviderRegistry::new()
        .with(solscan(&primary, 1))
        .with(solnode(vec![backup.url()], 2));
    let orchestrator = QueryOrchestrator::new(registry);

    let outcome = orchestrator
        .token_transfers(&ListArgs::new(PAYER, 1, 10))
        .await
        .expect("transfers");
    assert_eq!(outcome.provider, "solscan");
    assert_eq!(outcome.records[0].token_mint.as_deref(), Some(TARGET_MINT));
    assert_eq!(backup.rpc_calls(), 0);
}

#[tokio::test]
async fn test_credentials_rotate_per_call() {
    let upstream = MockUpstream::start().await.expect("upstream");
    let orchestrator = QueryOrchestrator::new(ProviderRegistry::new().with(solscan(&upstream, 1)));

    for _ in 0..3 {
        orchestrator
            .transactions(&ListArgs::new(PAYER, 1, 10))
            .await
            .expect("transactions");
    }
    assert_eq!(upstream.credentials(), ["k1", "k2", "k1"]);
}

#[tokio::test]
async fn test_endpoint_pool_rotates() {
    let a = MockUpstream::start().await.expect("upstream");
    let b = MockUpstream::start().await.expect("upstream");
    let orchestrator =
        QueryOrchestrator::new(ProviderRegistry::new().with(solnode(vec![a.url(), b.url()], 1)));

    for _ in 0..4 {
        let outcome = orchestrator.contract_info(TARGET_MINT).await.expect("contract");
        assert_eq!(outcome.records.total_supply.as_deref(), Some("5000000"));
    }
    // getAccountInfo plus getBalance per lookup.
    assert_eq!(a.method_calls("getAccountInfo"), 2);
    assert_eq!(b.method_calls("getAccountInfo"), 2);
    assert_eq!(a.rpc_calls(), 4);
    assert_eq!(b.rpc_calls(), 4);
}

#[tokio::test]
async fn test_slow_provider_times_out_and_fails_over() {
    let slow = MockUpstream::start().await.expect("upstream");
    let fast = MockUpstream::start().await.expect("upstream");
    slow.set_delay(Duration::from_secs(3));

    let registry = ProviderRegistry::new()
        .with(solscan(&slow, 1).with_timeout(Duration::from_millis(200)))
        .with(solnode(vec![fast.url()], 2));
    let orchestrator = QueryOrchestrator::new(registry);

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        orchestrator.contract_info(TARGET_MINT),
    )
    .await
    .expect("failover well before the slow reply")
    .expect("contract");
    assert_eq!(outcome.provider, "solnode");
    assert_eq!(orchestrator.stats().provider_failures, 1);
}

#[tokio::test]
async fn test_everything_down_is_exhaustion() {
    let down = MockUpstream::start().await.expect("upstream");
    down.set_failing(true);

    let registry = ProviderRegistry::new()
        .with(solscan(&down, 1))
        .with(solnode(vec![down.url()], 2));
    let orchestrator = QueryOrchestrator::new(registry);

    let err = orchestrator
        .token_transfers(&ListArgs::new(PAYER, 1, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::AllProvidersExhausted { .. }));
    assert_eq!(orchestrator.stats().exhausted, 1);
    assert!(orchestrator.last_provider().is_none());
}
