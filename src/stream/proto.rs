use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::stream::client::StreamClientError;

/// Event feed selected when opening a stream connection.
///
/// The feed picks both the endpoint path and the shape inbound frames are
/// decoded into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FeedType {
    TokenEvents,
    MigrationEvents,
    WalletEvents,
}

impl FeedType {
    pub const ALL: [FeedType; 3] = [
        FeedType::TokenEvents,
        FeedType::MigrationEvents,
        FeedType::WalletEvents,
    ];

    /// Path segment used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenEvents => "token-events",
            Self::MigrationEvents => "migration-events",
            Self::WalletEvents => "wallet-events",
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedType {
    type Err = StreamClientError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|feed| feed.as_str() == value)
            .ok_or_else(|| StreamClientError::UnknownFeed(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

/// Token categories accepted by the token and migration feeds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SubscriptionType {
    PumpfunTokens,
    RaydiumAmmTokens,
    RaydiumCpmmTokens,
    RaydiumClmmTokens,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSubscriptionMessage {
    pub action: SubscriptionAction,
    pub types: Vec<SubscriptionType>,
}

impl TokenSubscriptionMessage {
    pub fn subscribe(types: impl IntoIterator<Item = SubscriptionType>) -> Self {
        Self {
            action: SubscriptionAction::Subscribe,
            types: types.into_iter().collect(),
        }
    }

    pub fn unsubscribe(types: impl IntoIterator<Item = SubscriptionType>) -> Self {
        Self {
            action: SubscriptionAction::Unsubscribe,
            types: types.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletSubscriptionMessage {
    pub action: SubscriptionAction,
    pub wallets: Vec<String>,
}

impl WalletSubscriptionMessage {
    pub fn subscribe<I, S>(wallets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: SubscriptionAction::Subscribe,
            wallets: wallets.into_iter().map(Into::into).collect(),
        }
    }

    pub fn unsubscribe<I, S>(wallets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: SubscriptionAction::Unsubscribe,
            wallets: wallets.into_iter().map(Into::into).collect(),
        }
    }
}

/// Outbound subscription command.
///
/// Serialized without a tag: the server tells the families apart by the
/// `types` or `wallets` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SubscriptionCommand {
    Token(TokenSubscriptionMessage),
    Wallet(WalletSubscriptionMessage),
}

impl SubscriptionCommand {
    pub fn action(&self) -> SubscriptionAction {
        match self {
            Self::Token(message) => message.action,
            Self::Wallet(message) => message.action,
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<TokenSubscriptionMessage> for SubscriptionCommand {
    fn from(message: TokenSubscriptionMessage) -> Self {
        Self::Token(message)
    }
}

impl From<WalletSubscriptionMessage> for SubscriptionCommand {
    fn from(message: WalletSubscriptionMessage) -> Self {
        Self::Wallet(message)
    }
}

/// Single buy/sell event published on the wallet feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ChainAction {
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub signer: String,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient::null_as_default"
    )]
    pub token_account: String,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub transaction_id: String,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient::null_as_default"
    )]
    pub token_mint: String,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub market_id: String,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub action_type: String,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_amount: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub asset_amount: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_price_usd: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_price_asset: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub swap_total_usd: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub swap_total_asset: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_market_cap_asset: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_market_cap_usd: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_liquidity_asset: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_liquidity_usd: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub pooled_token: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub pooled_asset: f64,
    #[serde(deserialize_with = "lenient::integer")]
    pub action_timestamp: i64,
    #[serde(rename = "bondingCurvePercentage", deserialize_with = "lenient::null_as_default")]
    pub bonding_curve_percent: f64,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient::null_as_default"
    )]
    pub bot_used: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MigrationState {
    #[serde(deserialize_with = "lenient::integer")]
    pub duration_minutes: i64,
    #[serde(deserialize_with = "lenient::integer")]
    pub makers: i64,
    #[serde(deserialize_with = "lenient::integer")]
    pub migration_timestamp: i64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub volume: f64,
}

/// Token and market snapshot published on the token and migration feeds.
///
/// Also returned by the HTTP market and pair endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonding_curve_percentage: Option<f64>,
    #[serde(deserialize_with = "lenient::integer")]
    pub buy_txn_count: i64,
    #[serde(deserialize_with = "lenient::integer")]
    pub chain_id: i64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub contract_creator: String,
    #[serde(deserialize_with = "lenient::integer")]
    pub created_timestamp: i64,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient::null_as_default"
    )]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeze_authority: Option<bool>,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient::null_as_default"
    )]
    pub image: String,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub initial_asset_liquidity: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub initial_usd_liquidity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_migrated: Option<bool>,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub lp_burned: bool,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub lp_creator: String,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub market_id: String,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient::null_as_default"
    )]
    pub metadata_uri: String,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient::null_as_default"
    )]
    pub migrated_market_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration_state: Option<MigrationState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_authority: Option<bool>,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub pooled_asset: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub pooled_token: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub price_change_percent: f64,
    #[serde(deserialize_with = "lenient::integer")]
    pub sell_txn_count: i64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub symbol: String,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient::null_as_default"
    )]
    pub telegram: String,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_liquidity_asset: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_liquidity_usd: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_market_cap_asset: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_market_cap_usd: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_mint: String,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_price_asset: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_price_usd: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub token_type: String,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub top10_holding_percent: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub total_supply: f64,
    #[serde(deserialize_with = "lenient::integer")]
    pub transaction_count: i64,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient::null_as_default"
    )]
    pub twitter: String,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub volume_asset: f64,
    #[serde(deserialize_with = "lenient::null_as_default")]
    pub volume_usd: f64,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient::null_as_default"
    )]
    pub website: String,
}

/// Decoders matching how the feeds are produced: `null` stands for an unset
/// value and integer fields may arrive in float notation.
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    pub(super) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireInteger {
        Integer(i64),
        Float(f64),
    }

    pub(super) fn integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<WireInteger>::deserialize(deserializer)? {
            None => Ok(0),
            Some(WireInteger::Integer(value)) => Ok(value),
            Some(WireInteger::Float(value)) if is_integral(value) => Ok(value as i64),
            Some(WireInteger::Float(value)) => Err(D::Error::custom(format!(
                "expected an integer, found {value}"
            ))),
        }
    }

    fn is_integral(value: f64) -> bool {
        value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64
    }
}
