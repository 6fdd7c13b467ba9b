use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::types::{
    TokenAth, TokenHolders, TokenMarket, TokenMetadata, TokenPairs, TokenPairsParams,
    TokenSearchResult, TokenSymbol, TopTrader, WalletAggregatedPnl, WalletHolding, WalletPnl,
};
use crate::stream::proto::TokenPair;

pub const API_BASE_URL: &str = "https://api.vyper.trade";
const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ApiDefaults;

impl ApiDefaults {
    pub const TIMEOUT: Duration = Duration::from_secs(10);
}

#[derive(Clone, Debug)]
pub struct ApiClientOptions {
    /// Whole-request timeout applied by the HTTP client.
    pub timeout: Duration,
}

impl Default for ApiClientOptions {
    fn default() -> Self {
        Self {
            timeout: ApiDefaults::TIMEOUT,
        }
    }
}

/// Client for the analytics HTTP API.
///
/// Every call is a single `GET`; failures are returned as-is without retry.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
}

impl ApiClient {
    pub fn new(api_key: SecretString) -> Result<Self, ApiError> {
        Self::with_options(api_key, ApiClientOptions::default())
    }

    pub fn with_options(api_key: SecretString, options: ApiClientOptions) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            http,
            api_key,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Sets the base URL request paths are appended to.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = base_url.trim_end().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the chain name to chain id mapping.
    pub async fn get_chain_ids(&self) -> Result<HashMap<String, i64>, ApiError> {
        let body = self.get("/api/v1/chain/ids", &[]).await?;
        parse_data_object(&body)
    }

    pub async fn get_token_ath(&self, chain_id: i64, market_id: &str) -> Result<TokenAth, ApiError> {
        let body = self
            .get(
                "/api/v1/token/ath",
                &[("chainID", chain_id.to_string()), ("marketID", market_id.to_string())],
            )
            .await?;
        parse_data_object(&body)
    }

    pub async fn get_token_market(
        &self,
        market_id: &str,
        chain_id: i64,
        interval: &str,
    ) -> Result<TokenPair, ApiError> {
        let path = format!("/api/v1/token/market/{market_id}");
        let body = self
            .get(
                &path,
                &[("chainID", chain_id.to_string()), ("interval", interval.to_string())],
            )
            .await?;
        parse_data_object(&body)
    }

    pub async fn get_token_holders(
        &self,
        market_id: &str,
        chain_id: i64,
    ) -> Result<TokenHolders, ApiError> {
        let body = self
            .get(
                "/api/v1/token/holders",
                &[("marketID", market_id.to_string()), ("chainID", chain_id.to_string())],
            )
            .await?;
        parse_data_string(&body)
    }

    /// Lists every market trading `token_mint` on `chain_id`.
    pub async fn get_token_markets(
        &self,
        token_mint: &str,
        chain_id: i64,
    ) -> Result<Vec<TokenMarket>, ApiError> {
        let body = self
            .get(
                "/api/v1/token/markets",
                &[("tokenMint", token_mint.to_string()), ("chainID", chain_id.to_string())],
            )
            .await?;
        parse_data_string(&body)
    }

    pub async fn get_wallet_holdings(
        &self,
        wallet_address: &str,
        chain_id: i64,
    ) -> Result<Vec<WalletHolding>, ApiError> {
        let body = self
            .get(
                "/api/v1/wallet/holdings",
                &wallet_query(wallet_address, chain_id),
            )
            .await?;
        parse_data_string(&body)
    }

    pub async fn get_wallet_aggregated_pnl(
        &self,
        wallet_address: &str,
        chain_id: i64,
    ) -> Result<WalletAggregatedPnl, ApiError> {
        let body = self
            .get(
                "/api/v1/wallet/aggregated-pnl",
                &wallet_query(wallet_address, chain_id),
            )
            .await?;
        parse_data_string(&body)
    }

    pub async fn get_wallet_pnl(
        &self,
        wallet_address: &str,
        market_id: &str,
        chain_id: i64,
    ) -> Result<WalletPnl, ApiError> {
        let body = self
            .get(
                "/api/v1/wallet/pnl",
                &[
                    ("walletAddress", wallet_address.to_string()),
                    ("marketID", market_id.to_string()),
                    ("chainID", chain_id.to_string()),
                ],
            )
            .await?;
        parse_data_string(&body)
    }

    pub async fn get_token_metadata(
        &self,
        chain_id: i64,
        token_mint: &str,
    ) -> Result<TokenMetadata, ApiError> {
        let body = self
            .get("/api/v1/token/metadata", &mint_query(chain_id, token_mint))
            .await?;
        parse_data_string(&body)
    }

    pub async fn get_token_symbol(
        &self,
        chain_id: i64,
        token_mint: &str,
    ) -> Result<TokenSymbol, ApiError> {
        let body = self
            .get("/api/v1/token/symbol", &mint_query(chain_id, token_mint))
            .await?;
        parse_data_string(&body)
    }

    pub async fn get_top_traders(
        &self,
        market_id: &str,
        chain_id: i64,
    ) -> Result<Vec<TopTrader>, ApiError> {
        let body = self
            .get(
                "/api/v1/token/top-traders",
                &[("marketID", market_id.to_string()), ("chainID", chain_id.to_string())],
            )
            .await?;
        parse_data_string(&body)
    }

    /// Searches tokens by name, symbol, or address, optionally on one chain.
    pub async fn search_tokens(
        &self,
        criteria: &str,
        chain_id: Option<i64>,
    ) -> Result<Vec<TokenSearchResult>, ApiError> {
        let mut query = vec![("criteria", criteria.to_string())];
        if let Some(chain_id) = chain_id {
            query.push(("chainID", chain_id.to_string()));
        }
        let body = self.get("/api/v1/token/search", &query).await?;
        parse_data_string(&body)
    }

    pub async fn get_token_pairs(&self, params: &TokenPairsParams) -> Result<TokenPairs, ApiError> {
        let body = self
            .get("/api/v1/token/pairs", &params.query_pairs())
            .await?;
        parse_data_string(&body)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, ApiError> {
        let endpoint = format!("{}{}", self.base_url, path);
        debug!(event = "api_request", path);

        let response = self
            .http
            .get(&endpoint)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(ApiError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(ApiError::Transport)?;

        // Exactly 200 is success.
        if status != StatusCode::OK {
            let error = status_error(status, &body);
            warn!(event = "api_request_failed", path, status = status.as_u16(), error = %error);
            return Err(error);
        }

        Ok(body)
    }
}

/// Errors produced by the analytics HTTP client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("api error: {message} (status {status})")]
    HttpStatus { status: StatusCode, message: String },

    #[error("failed to parse response: {0}")]
    Parse(#[source] serde_json::Error),

    /// Envelope `data` was not the JSON string this endpoint returns.
    #[error("unexpected data type for api response")]
    UnexpectedData,
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            Self::Parse(_) | Self::UnexpectedData => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        )
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

fn wallet_query(wallet_address: &str, chain_id: i64) -> [(&'static str, String); 2] {
    [
        ("walletAddress", wallet_address.to_string()),
        ("chainID", chain_id.to_string()),
    ]
}

fn mint_query(chain_id: i64, token_mint: &str) -> [(&'static str, String); 2] {
    [
        ("chainID", chain_id.to_string()),
        ("tokenMint", token_mint.to_string()),
    ]
}

fn parse_data_object<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let envelope: ApiEnvelope = serde_json::from_str(body).map_err(ApiError::Parse)?;
    serde_json::from_value(envelope.data).map_err(ApiError::Parse)
}

/// Most endpoints double-encode: `data` is a string holding the JSON payload.
fn parse_data_string<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let envelope: ApiEnvelope = serde_json::from_str(body).map_err(ApiError::Parse)?;
    let Value::String(data) = envelope.data else {
        return Err(ApiError::UnexpectedData);
    };
    serde_json::from_str(&data).map_err(ApiError::Parse)
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = match serde_json::from_str::<ApiEnvelope>(body) {
        Ok(envelope) => envelope.message,
        Err(_) => format!("HTTP error: {status}"),
    };
    ApiError::HttpStatus { status, message }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use secrecy::SecretString;
    use serde_json::json;

    use super::{
        parse_data_object, parse_data_string, status_error, ApiClient, ApiError, API_BASE_URL,
    };
    use crate::api::types::{TokenAth, TokenHolders};

    #[test]
    fn api_client_uses_production_base_url() {
        let client = ApiClient::new(SecretString::new("test-api-key".to_string()))
            .expect("build client");
        assert_eq!(client.base_url(), API_BASE_URL);
        assert_eq!(API_BASE_URL, "https://api.vyper.trade");
    }

    #[test]
    fn base_url_override_is_trimmed() {
        let client = ApiClient::new(SecretString::new("test-api-key".to_string()))
            .expect("build client")
            .with_base_url("http://127.0.0.1:8080/ \n");
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn parse_object_data() {
        let body = json!({
            "status": "success",
            "message": "ok",
            "data": {"marketCapUsd": 1000000.0, "timestamp": 1625097600, "tokenLiquidityUsd": 500000.0}
        })
        .to_string();

        let ath: TokenAth = parse_data_object(&body).expect("parse");
        assert_eq!(
            ath,
            TokenAth {
                market_cap_usd: 1000000.0,
                timestamp: 1625097600,
                token_liquidity_usd: 500000.0,
            }
        );
    }

    #[test]
    fn parse_string_encoded_data() {
        let holders = json!({
            "holders": [{"walletAddress": "0x123", "tokenHoldings": 1000.0, "usdHoldings": 1500.0, "percentOwned": 0.1}],
            "total_holders": 1
        })
        .to_string();
        let body = json!({"status": "success", "message": "ok", "data": holders}).to_string();

        let parsed: TokenHolders = parse_data_string(&body).expect("parse");
        assert_eq!(parsed.total_holders, 1);
        assert_eq!(parsed.holders[0].wallet_address, "0x123");
        assert_eq!(parsed.holders[0].percent_owned, 0.1);
    }

    #[test]
    fn object_data_where_string_expected_is_rejected() {
        let body = json!({"status": "success", "data": {"total_holders": 1}}).to_string();
        let error = parse_data_string::<TokenHolders>(&body).expect_err("unexpected data");
        assert!(matches!(error, ApiError::UnexpectedData));
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        let error = parse_data_object::<TokenAth>("<html>").expect_err("parse error");
        assert!(matches!(error, ApiError::Parse(_)));
    }

    #[test]
    fn status_error_prefers_envelope_message() {
        let error = status_error(
            StatusCode::UNAUTHORIZED,
            r#"{"status":"error","message":"invalid api key"}"#,
        );
        match &error {
            ApiError::HttpStatus { status, message } => {
                assert_eq!(*status, StatusCode::UNAUTHORIZED);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
        assert!(error.is_unauthorized());
    }

    #[test]
    fn status_error_falls_back_to_status_line() {
        let error = status_error(StatusCode::BAD_GATEWAY, "upstream down");
        match error {
            ApiError::HttpStatus { message, .. } => {
                assert_eq!(message, "HTTP error: 502 Bad Gateway");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
