use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use reqwest::StatusCode as ReqwestStatus;
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use vyper_sdk::api::types::TokenPairsParams;
use vyper_sdk::api::{ApiClient, ApiError};

const TEST_API_KEY: &str = "test-api-key";
const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct HttpObserved {
    path: String,
    query: HashMap<String, String>,
    api_key: Option<String>,
}

/// Canned reply for one request path.
#[derive(Clone)]
enum Reply {
    Json(StatusCode, Value),
    Raw(StatusCode, &'static str),
}

#[derive(Clone)]
struct HttpState {
    replies: Arc<HashMap<&'static str, Reply>>,
    observed_tx: mpsc::UnboundedSender<HttpObserved>,
}

struct MockApi {
    base_url: String,
    observed_rx: mpsc::UnboundedReceiver<HttpObserved>,
    shutdown_tx: oneshot::Sender<()>,
    server_task: tokio::task::JoinHandle<()>,
}

impl MockApi {
    async fn start(replies: Vec<(&'static str, Reply)>) -> Self {
        let (observed_tx, observed_rx) = mpsc::unbounded_channel();
        let state = HttpState {
            replies: Arc::new(replies.into_iter().collect()),
            observed_tx,
        };
        let app = Router::new().fallback(api_handler).with_state(state);
        let (addr, shutdown_tx, server_task) = spawn_server(app).await;

        Self {
            base_url: format!("http://{addr}"),
            observed_rx,
            shutdown_tx,
            server_task,
        }
    }

    fn client(&self) -> ApiClient {
        ApiClient::new(SecretString::new(TEST_API_KEY.to_string()))
            .expect("build api client")
            .with_base_url(self.base_url.clone())
    }

    async fn next_observed(&mut self) -> HttpObserved {
        timeout(WAIT, self.observed_rx.recv())
            .await
            .expect("timed out waiting for http observation")
            .expect("http observation channel closed")
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        self.server_task
            .await
            .expect("mock http server task should join");
    }
}

fn envelope(data: Value) -> Reply {
    Reply::Json(
        StatusCode::OK,
        json!({"status": "success", "message": "ok", "data": data}),
    )
}

/// Envelope whose `data` is the JSON text of `payload`.
fn string_envelope(payload: Value) -> Reply {
    envelope(Value::String(payload.to_string()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chain_ids_decode_object_data_and_send_api_key() {
    let mut server = MockApi::start(vec![(
        "/api/v1/chain/ids",
        envelope(json!({"solana": 900, "tron": 1000})),
    )])
    .await;

    let ids = server
        .client()
        .get_chain_ids()
        .await
        .expect("get_chain_ids should parse envelope");
    assert_eq!(ids.get("solana"), Some(&900));
    assert_eq!(ids.get("tron"), Some(&1000));

    let observed = server.next_observed().await;
    assert_eq!(observed.path, "/api/v1/chain/ids");
    assert!(observed.query.is_empty());
    assert_eq!(observed.api_key.as_deref(), Some(TEST_API_KEY));
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn token_market_uses_path_id_and_query() {
    let mut server = MockApi::start(vec![(
        "/api/v1/token/market/m1",
        envelope(json!({"marketId": "m1", "name": "Test Token", "tokenPriceUsd": 0.5})),
    )])
    .await;

    let pair = server
        .client()
        .get_token_market("m1", 900, "24h")
        .await
        .expect("get_token_market");
    assert_eq!(pair.market_id, "m1");
    assert_eq!(pair.name, "Test Token");
    assert_eq!(pair.token_price_usd, 0.5);

    let observed = server.next_observed().await;
    assert_eq!(observed.query.get("chainID").map(String::as_str), Some("900"));
    assert_eq!(observed.query.get("interval").map(String::as_str), Some("24h"));
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn token_holders_decode_string_encoded_data() {
    let mut server = MockApi::start(vec![(
        "/api/v1/token/holders",
        string_envelope(json!({
            "holders": [{
                "walletAddress": "0x123",
                "tokenHoldings": 1000.0,
                "usdHoldings": 1500.0,
                "percentOwned": 0.1
            }],
            "total_holders": 1
        })),
    )])
    .await;

    let holders = server
        .client()
        .get_token_holders("m1", 900)
        .await
        .expect("get_token_holders");
    assert_eq!(holders.total_holders, 1);
    assert_eq!(holders.holders[0].wallet_address, "0x123");
    assert_eq!(holders.holders[0].usd_holdings, 1500.0);

    let observed = server.next_observed().await;
    assert_eq!(observed.query.get("marketID").map(String::as_str), Some("m1"));
    assert_eq!(observed.query.get("chainID").map(String::as_str), Some("900"));
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wallet_endpoints_send_wallet_query() {
    let mut server = MockApi::start(vec![
        (
            "/api/v1/wallet/holdings",
            string_envelope(json!([
                {"marketId": "m1", "tokenHoldings": 10.0, "tokenSymbol": "TEST", "usdValue": 5.0}
            ])),
        ),
        (
            "/api/v1/wallet/pnl",
            string_envelope(json!({"holderSince": 1700000000, "pnlUsd": 12.5, "soldTxns": 3})),
        ),
    ])
    .await;
    let client = server.client();

    let holdings = client
        .get_wallet_holdings("wallet-1", 900)
        .await
        .expect("get_wallet_holdings");
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].token_symbol, "TEST");
    let observed = server.next_observed().await;
    assert_eq!(observed.path, "/api/v1/wallet/holdings");
    assert_eq!(
        observed.query.get("walletAddress").map(String::as_str),
        Some("wallet-1")
    );

    let pnl = client
        .get_wallet_pnl("wallet-1", "m1", 900)
        .await
        .expect("get_wallet_pnl");
    assert_eq!(pnl.holder_since, 1700000000);
    assert_eq!(pnl.pnl_usd, 12.5);
    assert_eq!(pnl.sold_txns, 3);
    let observed = server.next_observed().await;
    assert_eq!(observed.query.get("marketID").map(String::as_str), Some("m1"));
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn search_omits_chain_id_when_unset() {
    let mut server = MockApi::start(vec![(
        "/api/v1/token/search",
        string_envelope(json!([{"marketId": "m1", "symbol": "TEST", "chainId": 900}])),
    )])
    .await;
    let client = server.client();

    let results = client
        .search_tokens("test", None)
        .await
        .expect("search_tokens");
    assert_eq!(results[0].market_id, "m1");
    let observed = server.next_observed().await;
    assert_eq!(observed.query.get("criteria").map(String::as_str), Some("test"));
    assert!(!observed.query.contains_key("chainID"));

    client
        .search_tokens("test", Some(900))
        .await
        .expect("search_tokens with chain");
    let observed = server.next_observed().await;
    assert_eq!(observed.query.get("chainID").map(String::as_str), Some("900"));
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn token_pairs_send_only_set_filters() {
    let mut server = MockApi::start(vec![(
        "/api/v1/token/pairs",
        string_envelope(json!({"hasNext": true, "pairs": [{"marketId": "m1"}, {"marketId": "m2"}]})),
    )])
    .await;

    let params = TokenPairsParams {
        chain_ids: vec![900],
        token_types: vec!["pumpfun".to_string(), "raydium".to_string()],
        lp_burned: Some(true),
        page: Some(1),
        ..TokenPairsParams::default()
    };
    let pairs = server
        .client()
        .get_token_pairs(&params)
        .await
        .expect("get_token_pairs");
    assert!(pairs.has_next);
    assert_eq!(pairs.pairs.len(), 2);
    assert_eq!(pairs.pairs[1].market_id, "m2");

    let observed = server.next_observed().await;
    let expected: HashMap<String, String> = [
        ("chainIds", "900"),
        ("tokenTypes", "pumpfun,raydium"),
        ("lpBurned", "true"),
        ("page", "1"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect();
    assert_eq!(observed.query, expected);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn error_status_surfaces_envelope_message() {
    let server = MockApi::start(vec![(
        "/api/v1/token/top-traders",
        Reply::Json(
            StatusCode::UNAUTHORIZED,
            json!({"status": "error", "message": "invalid api key"}),
        ),
    )])
    .await;

    let error = server
        .client()
        .get_top_traders("m1", 900)
        .await
        .expect_err("401 must fail");
    match &error {
        ApiError::HttpStatus { status, message } => {
            assert_eq!(*status, ReqwestStatus::UNAUTHORIZED);
            assert_eq!(message, "invalid api key");
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    assert!(error.is_unauthorized());
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn error_status_without_envelope_falls_back_to_status_line() {
    let server = MockApi::start(vec![(
        "/api/v1/token/symbol",
        Reply::Raw(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
    )])
    .await;

    let error = server
        .client()
        .get_token_symbol(900, "mint-1")
        .await
        .expect_err("500 must fail");
    match error {
        ApiError::HttpStatus { status, message } => {
            assert_eq!(status, ReqwestStatus::INTERNAL_SERVER_ERROR);
            assert_eq!(message, "HTTP error: 500 Internal Server Error");
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_200_success_status_is_an_error() {
    let server = MockApi::start(vec![(
        "/api/v1/token/ath",
        Reply::Json(
            StatusCode::ACCEPTED,
            json!({"status": "pending", "message": "queued", "data": {"marketCapUsd": 1.0}}),
        ),
    )])
    .await;

    let error = server
        .client()
        .get_token_ath(900, "m1")
        .await
        .expect_err("202 must fail");
    match error {
        ApiError::HttpStatus { status, message } => {
            assert_eq!(status, ReqwestStatus::ACCEPTED);
            assert_eq!(message, "queued");
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn object_data_on_string_endpoint_is_rejected() {
    let server = MockApi::start(vec![(
        "/api/v1/token/metadata",
        envelope(json!({"name": "Test Token", "symbol": "TEST"})),
    )])
    .await;

    let error = server
        .client()
        .get_token_metadata(900, "mint-1")
        .await
        .expect_err("object data must be rejected");
    assert!(matches!(error, ApiError::UnexpectedData));
    server.stop().await;
}

async fn api_handler(
    State(state): State<HttpState>,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let path = uri.path().to_string();
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let reply = state.replies.get(path.as_str()).cloned();
    let _ = state.observed_tx.send(HttpObserved {
        path,
        query,
        api_key,
    });

    match reply {
        Some(Reply::Json(status, body)) => (status, Json(body)).into_response(),
        Some(Reply::Raw(status, body)) => (status, body).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "error", "message": "not found"})),
        )
            .into_response(),
    }
}

async fn spawn_server(
    app: Router,
) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server listener");
    let addr = listener
        .local_addr()
        .expect("read mock server listener address");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("mock server should run");
    });
    (addr, shutdown_tx, task)
}
