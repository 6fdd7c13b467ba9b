use serde::{Deserialize, Serialize};

use crate::stream::proto::TokenPair;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenAth {
    pub market_cap_usd: f64,
    pub timestamp: i64,
    pub token_liquidity_usd: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenHolder {
    pub percent_owned: f64,
    pub token_holdings: f64,
    pub usd_holdings: f64,
    pub wallet_address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub wallet_tag: String,
}

/// Holder page returned by the token holders endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TokenHolders {
    pub holders: Vec<TokenHolder>,
    pub total_holders: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenMarket {
    pub market_cap_usd: f64,
    #[serde(rename = "marketID")]
    pub market_id: String,
    pub token_liquidity_usd: f64,
    pub token_type: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenMetadata {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    pub name: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub telegram: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub twitter: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub website: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenSymbol {
    pub symbol: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenSearchResult {
    pub chain_id: i64,
    pub market_id: String,
    pub created_timestamp: i64,
    pub name: String,
    pub symbol: String,
    pub token_mint: String,
    pub token_type: String,
    pub percent_change24h: f64,
    pub pooled_asset: f64,
    pub token_liquidity_usd: f64,
    pub token_market_cap_usd: f64,
    pub token_price_usd: f64,
    pub volume_usd: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub telegram: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub twitter: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub website: String,
}

/// Page of token pairs from the pair screener endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenPairs {
    pub has_next: bool,
    pub pairs: Vec<TokenPair>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TopTrader {
    #[serde(rename = "investedAmount_tokens")]
    pub invested_amount_tokens: f64,
    #[serde(rename = "investedAmount_usd")]
    pub invested_amount_usd: f64,
    pub invested_txns: i64,
    pub pnl_usd: f64,
    pub remaining_tokens: f64,
    pub remaining_usd: f64,
    pub sold_amount_tokens: f64,
    pub sold_amount_usd: f64,
    pub sold_txns: i64,
    pub wallet_address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub wallet_tag: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WalletAggregatedPnl {
    pub invested_amount: f64,
    pub pnl_percent: f64,
    pub pnl_usd: f64,
    pub sold_amount: f64,
    pub tokens_traded: i64,
    pub total_pnl_percent: f64,
    pub total_pnl_usd: f64,
    pub unrealized_pnl_percent: f64,
    pub unrealized_pnl_usd: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WalletHolding {
    pub market_id: String,
    pub token_holdings: f64,
    pub token_symbol: String,
    pub usd_value: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WalletPnl {
    pub holder_since: i64,
    pub invested_amount: f64,
    pub invested_txns: i64,
    pub pnl_percent: f64,
    pub pnl_usd: f64,
    pub remaining_tokens: f64,
    pub remaining_usd: f64,
    pub sold_amount: f64,
    pub sold_txns: i64,
}

/// Filters for [`ApiClient::get_token_pairs`].
///
/// Only set fields are sent. List filters are sent comma-joined.
///
/// [`ApiClient::get_token_pairs`]: crate::api::ApiClient::get_token_pairs
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenPairsParams {
    pub at_least_one_social: Option<bool>,
    pub buys_max: Option<i64>,
    pub buys_min: Option<i64>,
    pub chain_ids: Vec<i64>,
    pub freeze_auth_disabled: Option<bool>,
    pub initial_liquidity_max: Option<f64>,
    pub initial_liquidity_min: Option<f64>,
    pub interval: Option<String>,
    pub liquidity_max: Option<f64>,
    pub liquidity_min: Option<f64>,
    pub lp_burned: Option<bool>,
    pub market_cap_max: Option<f64>,
    pub market_cap_min: Option<f64>,
    pub mint_auth_disabled: Option<bool>,
    pub page: Option<i64>,
    pub sells_max: Option<i64>,
    pub sells_min: Option<i64>,
    pub sorting: Option<String>,
    pub swaps_max: Option<i64>,
    pub swaps_min: Option<i64>,
    pub token_types: Vec<String>,
    pub top10_holders: Option<bool>,
    pub volume_max: Option<f64>,
    pub volume_min: Option<f64>,
}

impl TokenPairsParams {
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        push_optional(&mut query, "atLeastOneSocial", self.at_least_one_social);
        push_optional(&mut query, "buysMax", self.buys_max);
        push_optional(&mut query, "buysMin", self.buys_min);
        push_list(&mut query, "chainIds", &self.chain_ids);
        push_optional(&mut query, "freezeAuthDisabled", self.freeze_auth_disabled);
        push_optional(&mut query, "initialLiquidityMax", self.initial_liquidity_max);
        push_optional(&mut query, "initialLiquidityMin", self.initial_liquidity_min);
        push_optional(&mut query, "interval", self.interval.as_deref());
        push_optional(&mut query, "liquidityMax", self.liquidity_max);
        push_optional(&mut query, "liquidityMin", self.liquidity_min);
        push_optional(&mut query, "lpBurned", self.lp_burned);
        push_optional(&mut query, "marketCapMax", self.market_cap_max);
        push_optional(&mut query, "marketCapMin", self.market_cap_min);
        push_optional(&mut query, "mintAuthDisabled", self.mint_auth_disabled);
        push_optional(&mut query, "page", self.page);
        push_optional(&mut query, "sellsMax", self.sells_max);
        push_optional(&mut query, "sellsMin", self.sells_min);
        push_optional(&mut query, "sorting", self.sorting.as_deref());
        push_optional(&mut query, "swapsMax", self.swaps_max);
        push_optional(&mut query, "swapsMin", self.swaps_min);
        push_list(&mut query, "tokenTypes", &self.token_types);
        push_optional(&mut query, "top10Holders", self.top10_holders);
        push_optional(&mut query, "volumeMax", self.volume_max);
        push_optional(&mut query, "volumeMin", self.volume_min);
        query
    }
}

fn push_optional<T: ToString>(
    query: &mut Vec<(&'static str, String)>,
    key: &'static str,
    value: Option<T>,
) {
    if let Some(value) = value {
        query.push((key, value.to_string()));
    }
}

fn push_list<T: ToString>(query: &mut Vec<(&'static str, String)>, key: &'static str, values: &[T]) {
    if values.is_empty() {
        return;
    }
    let joined = values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    query.push((key, joined));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{TokenMarket, TokenPairsParams, TopTrader};

    #[test]
    fn empty_pair_filters_send_no_query() {
        assert!(TokenPairsParams::default().query_pairs().is_empty());
    }

    #[test]
    fn pair_filters_send_only_set_fields() {
        let params = TokenPairsParams {
            chain_ids: vec![900, 1],
            lp_burned: Some(false),
            liquidity_min: Some(1000.0),
            volume_max: Some(2.5),
            sorting: Some("volume".to_string()),
            token_types: vec!["pumpfun".to_string(), "raydium".to_string()],
            page: Some(2),
            ..TokenPairsParams::default()
        };

        let mut query = params.query_pairs();
        query.sort();
        assert_eq!(
            query,
            vec![
                ("chainIds", "900,1".to_string()),
                ("liquidityMin", "1000".to_string()),
                ("lpBurned", "false".to_string()),
                ("page", "2".to_string()),
                ("sorting", "volume".to_string()),
                ("tokenTypes", "pumpfun,raydium".to_string()),
                ("volumeMax", "2.5".to_string()),
            ]
        );
    }

    #[test]
    fn top_trader_reads_underscored_amount_keys() {
        let trader: TopTrader = serde_json::from_value(json!({
            "investedAmount_tokens": 10.0,
            "investedAmount_usd": 2.0,
            "soldAmountUsd": 3.0,
            "walletAddress": "w1"
        }))
        .expect("decode");
        assert_eq!(trader.invested_amount_tokens, 10.0);
        assert_eq!(trader.invested_amount_usd, 2.0);
        assert_eq!(trader.sold_amount_usd, 3.0);
        assert_eq!(trader.wallet_address, "w1");
    }

    #[test]
    fn token_market_reads_upper_case_id_key() {
        let market: TokenMarket =
            serde_json::from_value(json!({"marketID": "m1", "tokenType": "pumpfun"}))
                .expect("decode");
        assert_eq!(market.market_id, "m1");
        assert_eq!(market.token_type, "pumpfun");
    }
}
