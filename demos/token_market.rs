use std::error::Error;

use secrecy::SecretString;
use tracing_subscriber::EnvFilter;
use vyper_sdk::api::types::TokenPairsParams;
use vyper_sdk::api::ApiClient;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let api_key = "REPLACE_WITH_API_KEY".to_string();
    let market_id = "REPLACE_WITH_MARKET_ID".to_string();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = ApiClient::new(SecretString::new(api_key))?;

        let chain_ids = client.get_chain_ids().await?;
        let solana = chain_ids.get("solana").copied().unwrap_or(900);

        let market = client.get_token_market(&market_id, solana, "24h").await?;
        println!(
            "market={} symbol={} price_usd={} liquidity_usd={}",
            market.market_id, market.symbol, market.token_price_usd, market.token_liquidity_usd
        );

        let holders = client.get_token_holders(&market_id, solana).await?;
        println!("total_holders={}", holders.total_holders);
        for trader in client.get_top_traders(&market_id, solana).await?.iter().take(5) {
            println!("trader={} pnl_usd={}", trader.wallet_address, trader.pnl_usd);
        }

        let pairs = client
            .get_token_pairs(&TokenPairsParams {
                chain_ids: vec![solana],
                lp_burned: Some(true),
                sorting: Some("volume".to_string()),
                ..TokenPairsParams::default()
            })
            .await?;
        println!("pairs={} has_next={}", pairs.pairs.len(), pairs.has_next);

        Ok::<(), Box<dyn Error>>(())
    })
}
