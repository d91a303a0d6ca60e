//! Local stand-in for the upstream blockchain providers.
//!
//! One axum server answers the Solana and BNB Smart Chain JSON-RPC methods
//! (`POST /`) and the SolScan REST routes, with canned fixtures. It can be
//! switched into a failing or slow mode, made to reject single RPC methods,
//! and records the credentials it was sent.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::debug;

/// Mint of the token the gateway expects to be burned.
pub const TARGET_MINT: &str = "BurnMint1111111111111111111111111111111111111";

/// Burn destination used by the fixtures.
pub const BURN_ADDRESS: &str = "1nc1nerator11111111111111111111111111111111";

/// Signer of every fixture transaction.
pub const PAYER: &str = "Payer11111111111111111111111111111111111111";

/// Receiver in the plain transfer fixtures.
pub const RECEIVER: &str = "Receiver111111111111111111111111111111111111";

/// Hash of a valid burn of 101 target tokens.
pub const VALID_BURN: &str = "validburn";

/// Hash of a burn of the target token with the wrong amount.
pub const WRONG_AMOUNT_BURN: &str = "wrongamount";

/// Hash of a transaction that failed on chain.
pub const FAILED_TX: &str = "failedtx";

/// Signatures returned for any address, newest first, with the default
/// history length.
pub const SIGNATURES: [&str; 3] = ["sig3", "sig2", "sig1"];

/// Lamports held by every account.
pub const ACCOUNT_LAMPORTS: u64 = 1_461_600;

/// ERC-20 token the BSC fixtures burn.
pub const BSC_TOKEN: &str = "0xb0b0000000000000000000000000000000000001";

/// BSC burn destination.
pub const BSC_BURN_ADDRESS: &str = "0x000000000000000000000000000000000000dEaD";

/// Sender of the BSC fixtures.
pub const BSC_SENDER: &str = "0x5e4de00000000000000000000000000000000001";

/// BSC receipt burning 101 tokens (18 decimals).
pub const BSC_VALID_BURN: &str = "0xb5cb0001";

/// BSC receipt burning 5 tokens.
pub const BSC_WRONG_AMOUNT_BURN: &str = "0xb5cb0002";

/// BSC receipt of a reverted transaction.
pub const BSC_REVERTED: &str = "0xb5cb0003";

const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Error type for upstream fixture operations.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Failed to bind or serve.
    #[error("Failed to start mock upstream: {0}")]
    Startup(#[from] std::io::Error),
}

struct UpstreamState {
    failing: AtomicBool,
    delay_ms: AtomicU64,
    history: AtomicU64,
    rpc_calls: AtomicUsize,
    rest_calls: AtomicUsize,
    credentials: Mutex<Vec<String>>,
    rejected_methods: Mutex<Vec<String>>,
    method_calls: Mutex<HashMap<String, usize>>,
}

impl Default for UpstreamState {
    fn default() -> Self {
        Self {
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            history: AtomicU64::new(SIGNATURES.len() as u64),
            rpc_calls: AtomicUsize::new(0),
            rest_calls: AtomicUsize::new(0),
            credentials: Mutex::new(Vec::new()),
            rejected_methods: Mutex::new(Vec::new()),
            method_calls: Mutex::new(HashMap::new()),
        }
    }
}

/// A running mock upstream.
pub struct MockUpstream {
    addr: SocketAddr,
    state: Arc<UpstreamState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockUpstream {
    /// Bind to an ephemeral local port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> Result<Self, UpstreamError> {
        let state = Arc::new(UpstreamState::default());
        let app = Router::new()
            .route("/", post(rpc))
            .route("/account/transactions", get(solscan_transactions))
            .route("/account/tokens", get(solscan_tokens))
            .route("/token/meta", get(solscan_meta))
            .route("/token/holders", get(solscan_holders))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
        });
        debug!("Mock upstream listening on {addr}");

        Ok(Self {
            addr,
            state,
            shutdown: Some(tx),
        })
    }

    /// Base URL of the server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer every request with HTTP 500 while `failing` is true.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of signatures every address has, `sig{n}` down to `sig1`.
    pub fn set_history(&self, signatures: u64) {
        self.state.history.store(signatures, Ordering::SeqCst);
    }

    /// Answer `method` with a JSON-RPC error from now on.
    pub fn reject_method(&self, method: &str) {
        self.state.rejected_methods.lock().push(method.to_string());
    }

    /// JSON-RPC requests received for `method`.
    pub fn method_calls(&self, method: &str) -> usize {
        self.state.method_calls.lock().get(method).copied().unwrap_or(0)
    }

    /// JSON-RPC requests received.
    pub fn rpc_calls(&self) -> usize {
        self.state.rpc_calls.load(Ordering::SeqCst)
    }

    /// REST requests received.
    pub fn rest_calls(&self) -> usize {
        self.state.rest_calls.load(Ordering::SeqCst)
    }

    /// Credentials received, in order (`token` or `x-api-key` headers).
    pub fn credentials(&self) -> Vec<String> {
        self.state.credentials.lock().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Shared preamble: record the call and apply delay / failure mode.
async fn intercept(state: &UpstreamState, headers: &HeaderMap) -> Option<Response> {
    for name in ["token", "x-api-key"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            state.credentials.lock().push(value.to_string());
        }
    }

    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.failing.load(Ordering::SeqCst) {
        return Some((StatusCode::INTERNAL_SERVER_ERROR, "upstream down").into_response());
    }
    None
}

async fn rpc(
    State(state): State<Arc<UpstreamState>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    state.rpc_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(response) = intercept(&state, &headers).await {
        return response;
    }

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    let first = params.get(0).and_then(Value::as_str).unwrap_or("");

    *state.method_calls.lock().entry(method.to_string()).or_default() += 1;
    if state.rejected_methods.lock().iter().any(|m| m == method) {
        return Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32005, "message": format!("{method} temporarily unavailable") }
        }))
        .into_response();
    }

    let result = match method {
        "getSignaturesForAddress" => {
            let options = params.get(1);
            let limit = options
                .and_then(|opts| opts.get("limit"))
                .and_then(Value::as_u64)
                .unwrap_or(1000);
            let history = state.history.load(Ordering::SeqCst);
            let newest = match options
                .and_then(|opts| opts.get("before"))
                .and_then(Value::as_str)
                .and_then(|sig| sig.strip_prefix("sig"))
                .and_then(|n| n.parse::<u64>().ok())
            {
                Some(n) => n.saturating_sub(1),
                None => history,
            };
            let signatures: Vec<Value> = (1..=newest)
                .rev()
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .map(|slot| {
                    json!({
                        "signature": format!("sig{slot}"),
                        "slot": slot,
                        "blockTime": 1_700_000_000 + slot
                    })
                })
                .collect();
            Value::Array(signatures)
        }
        "getBalance" => json!({ "context": { "slot": 10 }, "value": ACCOUNT_LAMPORTS }),
        "eth_getTransactionReceipt" => bsc_receipt(first),
        "eth_getTransactionByHash" => json!({ "hash": first, "from": BSC_SENDER }),
        "eth_call" => json!(format!("0x{:064x}", 18)),
        "getTransaction" => transaction_fixture(first),
        "getTokenAccountsByOwner" => json!({
            "context": { "slot": 10 },
            "value": [
                token_account("MintA111111111111111111111111111111111111111", "2500000", 6),
                token_account(TARGET_MINT, "7000000000", 9),
            ]
        }),
        "getAccountInfo" => json!({
            "context": { "slot": 10 },
            "value": {
                "data": {
                    "parsed": {
                        "type": "mint",
                        "info": {
                            "decimals": 9,
                            "supply": "5000000000000000",
                            "mintAuthority": PAYER,
                            "isInitialized": true
                        }
                    },
                    "program": "spl-token"
                },
                "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
            }
        }),
        other => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("method not found: {other}") }
            }))
            .into_response();
        }
    };

    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })).into_response()
}

fn bsc_receipt(hash: &str) -> Value {
    let (status, amount) = match hash {
        BSC_VALID_BURN => ("0x1", 101_u128),
        BSC_WRONG_AMOUNT_BURN => ("0x1", 5),
        BSC_REVERTED => ("0x0", 101),
        _ => return Value::Null,
    };
    let word = |address: &str| format!("0x{:0>64}", address.trim_start_matches("0x").to_lowercase());
    let raw = amount * 10_u128.pow(18);
    json!({
        "transactionHash": hash,
        "status": status,
        "from": BSC_SENDER,
        "logs": [{
            "address": BSC_TOKEN,
            "topics": [TRANSFER_TOPIC, word(BSC_SENDER), word(BSC_BURN_ADDRESS)],
            "data": format!("0x{raw:064x}")
        }]
    })
}

fn token_account(mint: &str, amount: &str, decimals: u8) -> Value {
    json!({
        "pubkey": format!("acct-{mint}"),
        "account": {
            "data": {
                "parsed": {
                    "type": "account",
                    "info": {
                        "mint": mint,
                        "owner": PAYER,
                        "tokenAmount": { "amount": amount, "decimals": decimals }
                    }
                }
            }
        }
    })
}

fn burn_logs(amount: &str) -> Vec<String> {
    vec![
        "Program TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA invoke [1]".to_string(),
        "Program log: Instruction: Transfer".to_string(),
        format!("Program log: Transfer to {BURN_ADDRESS} program: {TARGET_MINT} amount: {amount}"),
        "Program TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA success".to_string(),
    ]
}

fn transaction_fixture(signature: &str) -> Value {
    let (err, logs) = match signature {
        VALID_BURN => (Value::Null, burn_logs("101000000000")),
        WRONG_AMOUNT_BURN => (Value::Null, burn_logs("5000000000")),
        FAILED_TX => (json!({ "InstructionError": [0, "Custom"] }), Vec::new()),
        s if s.starts_with("sig") => (Value::Null, Vec::new()),
        _ => return Value::Null,
    };

    json!({
        "slot": 42,
        "blockTime": 1_700_000_042,
        "meta": {
            "err": err,
            "fee": 5000,
            "preBalances": [1_000_000, 0, 1],
            "postBalances": [495_000, 500_000, 1],
            "preTokenBalances": [],
            "postTokenBalances": [],
            "innerInstructions": [],
            "logMessages": logs
        },
        "transaction": {
            "message": {
                "accountKeys": [PAYER, RECEIVER, "11111111111111111111111111111111"],
                "instructions": [{ "programIdIndex": 2, "accounts": [0, 1] }]
            }
        }
    })
}

async fn solscan_transactions(
    State(state): State<Arc<UpstreamState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.rest_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(response) = intercept(&state, &headers).await {
        return response;
    }
    if query.get("account").map(String::as_str) == Some("empty") {
        return Json(json!({ "success": false, "message": "No transactions found" }))
            .into_response();
    }
    Json(json!({
        "success": true,
        "data": [{
            "txHash": "solscan-sig",
            "blockTime": 1_700_000_100,
            "slot": 99,
            "fee": 5000,
            "status": "Success",
            "lamport": 250_000,
            "src": PAYER,
            "dst": RECEIVER,
            "signer": [PAYER]
        }]
    }))
    .into_response()
}

async fn solscan_tokens(
    State(state): State<Arc<UpstreamState>>,
    headers: HeaderMap,
) -> Response {
    state.rest_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(response) = intercept(&state, &headers).await {
        return response;
    }
    Json(json!({
        "success": true,
        "data": [{
            "tokenAddress": TARGET_MINT,
            "tokenName": "Burnable",
            "tokenSymbol": "BRN",
            "tokenAmount": { "amount": "7000000000", "decimals": 9 },
            "owner": PAYER
        }]
    }))
    .into_response()
}

async fn solscan_meta(
    State(state): State<Arc<UpstreamState>>,
    headers: HeaderMap,
) -> Response {
    state.rest_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(response) = intercept(&state, &headers).await {
        return response;
    }
    Json(json!({
        "success": true,
        "data": {
            "name": "Burnable",
            "symbol": "BRN",
            "decimals": 9,
            "supply": "5000000000000000",
            "mintAuthority": PAYER
        }
    }))
    .into_response()
}

async fn solscan_holders(
    State(state): State<Arc<UpstreamState>>,
    headers: HeaderMap,
) -> Response {
    state.rest_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(response) = intercept(&state, &headers).await {
        return response;
    }
    Json(json!({
        "success": true,
        "data": {
            "total": 1,
            "items": [{ "address": "holder-acct", "owner": PAYER, "amount": 7_000_000_000_u64, "rank": 1 }]
        }
    }))
    .into_response()
}
