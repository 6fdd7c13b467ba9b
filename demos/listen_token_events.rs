use std::error::Error;
use std::sync::Arc;

use secrecy::SecretString;
use tracing_subscriber::EnvFilter;
use vyper_sdk::stream::client::StreamClient;
use vyper_sdk::stream::dispatch::StreamEvent;
use vyper_sdk::stream::proto::{FeedType, SubscriptionType, TokenSubscriptionMessage};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let api_key = "REPLACE_WITH_API_KEY".to_string();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = Arc::new(StreamClient::new(SecretString::new(api_key)));
        client.set_handler(|event| {
            if let StreamEvent::TokenPair(pair) = event {
                println!(
                    "market={} symbol={} price_usd={} market_cap_usd={}",
                    pair.market_id, pair.symbol, pair.token_price_usd, pair.token_market_cap_usd
                );
            }
        });

        client.connect(FeedType::TokenEvents).await?;
        client
            .subscribe(
                FeedType::TokenEvents,
                TokenSubscriptionMessage::subscribe([
                    SubscriptionType::PumpfunTokens,
                    SubscriptionType::RaydiumAmmTokens,
                ]),
            )
            .await?;

        let listener = Arc::clone(&client);
        let listen_task = tokio::spawn(async move { listener.listen().await });

        tokio::signal::ctrl_c().await?;
        client.disconnect().await?;

        match listen_task.await? {
            Err(err) if err.is_closed() => println!("stream closed"),
            Err(err) => return Err(err.into()),
            Ok(()) => {}
        }

        Ok::<(), Box<dyn Error>>(())
    })
}
