//! Full HTTP flows through a running gateway.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{gateway_config, TestGateway};
use super::upstream::{
    MockUpstream, BSC_BURN_ADDRESS, BSC_SENDER, BSC_TOKEN, BSC_VALID_BURN, BURN_ADDRESS, PAYER,
    TARGET_MINT, VALID_BURN, WRONG_AMOUNT_BURN,
};
use burngate::config::BurnChain;
use burngate::{GatewayEvent, TokenStatus};
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

async fn setup(gating: bool) -> (MockUpstream, TempDir, TestGateway) {
    let upstream = MockUpstream::start().await.expect("upstream");
    let dir = TempDir::new().expect("tempdir");
    let gateway = TestGateway::start_in(&upstream, &dir, gating)
        .await
        .expect("gateway");
    (upstream, dir, gateway)
}

#[tokio::test]
async fn test_burn_buys_exactly_one_paired_session() {
    let (_upstream, _dir, gateway) = setup(true).await;
    let client = gateway.client();

    let (status, body) = client
        .post("/api/verify-burn", json!({ "txHash": VALID_BURN }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["isValidBurn"], true);
    assert_eq!(body["result"]["from"], PAYER);
    assert!(client.session_id().is_some());

    let (status, body) = client.get("/api/verification-status").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["verified"], true);
    assert_eq!(body["result"]["isUsed"], false);

    let (status, body) = client
        .post("/api/transactions", json!({ "address": PAYER, "page": 1, "pageSize": 10 }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result"]["provider"], "solscan");
    assert_eq!(body["result"]["records"][0]["signature"], "solscan-sig");
    assert_eq!(gateway.service().gate().status(VALID_BURN), TokenStatus::Locked);

    let (status, body) = client
        .post("/api/token-transfers", json!({ "address": PAYER }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result"]["records"][0]["tokenMint"], TARGET_MINT);
    assert_eq!(gateway.service().gate().status(VALID_BURN), TokenStatus::Used);

    let (_, body) = client.get("/api/verification-status").await.unwrap();
    assert_eq!(body["result"]["isUsed"], true);
    assert_eq!(body["result"]["verified"], false);

    let (status, body) = client
        .post("/api/transactions", json!({ "address": PAYER }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("already been used"));

    let (status, _) = gateway
        .client()
        .post("/api/verify-burn", json!({ "txHash": VALID_BURN }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);

    gateway.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_listing_requires_verified_session() {
    let (_upstream, _dir, gateway) = setup(true).await;
    let client = gateway.client();

    let (status, body) = client
        .post("/api/transactions", json!({ "address": PAYER }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap().contains("verify"));

    gateway.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_wrong_amount_is_reported_and_not_recorded() {
    let (_upstream, _dir, gateway) = setup(true).await;
    let client = gateway.client();

    let (status, body) = client
        .post("/api/verify-burn", json!({ "txHash": WRONG_AMOUNT_BURN }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["isValidBurn"], false);
    assert_eq!(body["result"]["foundButInvalid"]["isTargetContract"], true);
    assert_eq!(body["result"]["foundButInvalid"]["isTargetAmount"], false);
    assert_eq!(
        gateway.service().gate().status(WRONG_AMOUNT_BURN),
        TokenStatus::Unknown
    );

    let (status, _) = client
        .post("/api/verify-burn", json!({ "txHash": "doesnotexist" }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    gateway.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_exhausted_providers_release_the_proof() {
    let (upstream, _dir, gateway) = setup(true).await;
    let client = gateway.client();
    client
        .post("/api/verify-burn", json!({ "txHash": VALID_BURN }))
        .await
        .unwrap();

    upstream.set_failing(true);
    let (status, body) = client
        .post("/api/transactions", json!({ "address": PAYER }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("temporarily unavailable"));
    assert!(!message.contains("solscan"));
    assert_eq!(gateway.service().gate().status(VALID_BURN), TokenStatus::Verified);

    upstream.set_failing(false);
    let (status, _) = client
        .post("/api/transactions", json!({ "address": PAYER }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK);

    gateway.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_empty_address_is_bad_request_and_unlocks() {
    let (_upstream, _dir, gateway) = setup(true).await;
    let client = gateway.client();
    client
        .post("/api/verify-burn", json!({ "txHash": VALID_BURN }))
        .await
        .unwrap();

    let (status, _) = client
        .post("/api/transactions", json!({ "address": "" }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(gateway.service().gate().status(VALID_BURN), TokenStatus::Verified);

    gateway.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_ungated_routes() {
    let (_upstream, _dir, gateway) = setup(false).await;
    let client = gateway.client();

    let (status, body) = client.get("/api/api-provider").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(body["result"]["provider"].is_null());

    let (status, body) = client
        .post("/api/transactions", json!({ "address": PAYER }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = client
        .post("/api/contract-info", json!({ "address": TARGET_MINT }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result"]["records"]["symbol"], "BRN");
    assert_eq!(body["result"]["records"]["totalSupply"], "5000000");
    assert_eq!(body["result"]["records"]["holders"][0]["owner"], PAYER);

    let (_, body) = client.get("/api/api-provider").await.unwrap();
    assert_eq!(body["result"]["provider"], "solscan");

    let (status, body) = client.get("/health").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["providers"], json!(["solscan", "solnode"]));

    let (status, body) = client.post("/api/clear-verification", json!({})).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["cleared"], true);

    gateway.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_ledger_survives_restart_and_lock_is_released() {
    let upstream = MockUpstream::start().await.expect("upstream");
    let dir = TempDir::new().expect("tempdir");

    let gateway = TestGateway::start_in(&upstream, &dir, true).await.unwrap();
    let client = gateway.client();
    client
        .post("/api/verify-burn", json!({ "txHash": VALID_BURN }))
        .await
        .unwrap();
    client
        .post("/api/transactions", json!({ "address": PAYER }))
        .await
        .unwrap();
    assert_eq!(gateway.service().gate().status(VALID_BURN), TokenStatus::Locked);
    assert!(gateway.data_dir().join("verified-hashes.json").exists());
    gateway.teardown().await.expect("teardown");

    // The open session did not survive; the startup sweep frees the lock.
    let mut gateway = TestGateway::start_in(&upstream, &dir, true).await.unwrap();
    let swept = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(GatewayEvent::SweepCompleted { released, .. }) = gateway.events().recv().await {
                return released;
            }
        }
    })
    .await
    .expect("startup sweep");
    assert_eq!(swept, 1);
    assert_eq!(gateway.service().gate().status(VALID_BURN), TokenStatus::Verified);

    let (_, body) = gateway
        .client()
        .post("/api/verify-burn", json!({ "txHash": VALID_BURN }))
        .await
        .unwrap();
    assert_eq!(body["result"]["alreadyVerified"], true);

    gateway.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_public_config_hides_credentials() {
    let (_upstream, _dir, gateway) = setup(true).await;
    let client = gateway.client();

    let (status, body) = client.get("/api/config").await.unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");
    let config = &body["result"];
    assert_eq!(config["burnVerification"]["enabled"], true);
    assert_eq!(config["burnVerification"]["chain"], "sol");
    assert_eq!(config["burnVerification"]["targetContractAddress"], TARGET_MINT);
    assert_eq!(config["burnVerification"]["targetAmount"], "101");
    assert_eq!(config["burnVerification"]["burnAddress"], BURN_ADDRESS);
    assert_eq!(config["pagination"]["defaultPage"], 1);
    assert_eq!(config["providers"], json!(["solscan", "solnode"]));
    assert!(config["currentApiProvider"].is_null());

    let text = body.to_string();
    assert!(!text.contains("solscan-key"));
    assert!(!text.contains("apiKeys"));
    assert!(!text.contains("rpcUrl"));

    let response = reqwest::get(gateway.url("/api/config")).await.unwrap();
    assert_eq!(
        response.headers().get(reqwest::header::CACHE_CONTROL).unwrap(),
        "no-store"
    );

    gateway.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_bsc_burn_unlocks_listings() {
    let upstream = MockUpstream::start().await.expect("upstream");
    let dir = TempDir::new().expect("tempdir");
    let mut config = gateway_config(&upstream, dir.path(), true);
    let burn = &mut config.burn_verification;
    burn.chain = BurnChain::Bsc;
    burn.bsc.rpc_url = upstream.url();
    burn.bsc.target_contract_address = BSC_TOKEN.to_string();
    burn.bsc.target_amount = "101".to_string();
    burn.bsc.burn_address = BSC_BURN_ADDRESS.to_string();
    let gateway = TestGateway::start(config).await.expect("gateway");
    let client = gateway.client();

    let (status, body) = client.get("/api/config").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["burnVerification"]["chain"], "bsc");
    assert_eq!(body["result"]["burnVerification"]["targetContractAddress"], BSC_TOKEN);

    let (status, body) = client
        .post("/api/verify-burn", json!({ "txHash": BSC_VALID_BURN }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result"]["isValidBurn"], true);
    assert_eq!(body["result"]["from"], BSC_SENDER);
    assert_eq!(body["result"]["hash"], BSC_VALID_BURN.trim_start_matches("0x"));

    let (status, body) = client
        .post("/api/transactions", json!({ "address": PAYER }))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(upstream.method_calls("eth_getTransactionReceipt"), 1);

    gateway.teardown().await.expect("teardown");
}
