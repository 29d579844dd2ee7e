//! Exchange connectivity check
//!
//! Exercises the REST client against the live exchange without placing a
//! real order. Run with: cargo run --bin connectivity_check
//!
//! Reads TICKWATCH_API_KEY / TICKWATCH_API_SECRET from the environment
//! (or .env); without them only the public endpoints are checked.

use std::env;
use std::sync::Arc;
use tickwatch::config::AppConfig;
use tickwatch::domain::entities::order::{AccountType, OrderRequest, OrderSide};
use tickwatch::domain::repositories::exchange_client::ExchangeClient;
use tickwatch::infrastructure::binance::BinanceClient;
use tickwatch::persistence::JsonStore;
use tickwatch::secrets::{CredentialStore, StoredKeys};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    if let Err(e) = dotenvy::dotenv() {
        println!("⚠️  Could not load .env file: {}", e);
        println!("   Continuing with environment variables from system\n");
    }

    let config = AppConfig::from_env();
    println!("🔍 Checking connectivity to {}...\n", config.rest_base);

    let dir = tempfile_dir()?;
    let store = Arc::new(JsonStore::open(&dir)?);
    let credentials = Arc::new(CredentialStore::new(store));

    let has_keys = match (
        env::var("TICKWATCH_API_KEY"),
        env::var("TICKWATCH_API_SECRET"),
    ) {
        (Ok(key), Ok(secret)) if !key.is_empty() && !secret.is_empty() => {
            credentials.save(&StoredKeys {
                api_key: key,
                api_secret: secret,
            })?;
            println!("✅ Credentials loaded from environment\n");
            true
        }
        _ => {
            println!("⚠️  TICKWATCH_API_KEY / TICKWATCH_API_SECRET not set");
            println!("   Signed endpoints will be skipped\n");
            false
        }
    };

    let client = BinanceClient::new(
        &config.rest_base,
        credentials.clone(),
        config.retry.clone(),
        config.recv_window_ms,
    );

    // The scratch store outlives the process; never leave key material in it.
    let result = run_checks(&client, &config, has_keys).await;
    credentials.clear()?;
    result
}

async fn run_checks(
    client: &BinanceClient,
    config: &AppConfig,
    has_keys: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🕐 Syncing server time...");
    let offset = client.sync_time().await?;
    println!("✅ Clock offset: {}ms\n", offset);

    let symbol = config
        .symbols
        .first()
        .cloned()
        .unwrap_or_else(|| "BTCUSDT".to_string());

    println!("💰 Fetching ticker for {}...", symbol);
    let price = client.ticker_price(&symbol).await?;
    println!("✅ {} last price: {}\n", symbol, price);

    println!("📈 Fetching 24h stats for {}...", symbol);
    let stats = client.ticker_24h(&symbol).await?;
    println!(
        "✅ {} at {} ({:+.2}% over 24h)\n",
        stats.symbol, stats.last_price, stats.pct_change_24h
    );

    println!("🕯️  Fetching recent candles for {}...", symbol);
    let candles = client.klines(&symbol, "1h", 24).await?;
    println!("✅ Got {} hourly candles\n", candles.len());

    println!("📏 Fetching symbol filters for {}...", symbol);
    let filters = client.symbol_filters(&symbol).await?;
    println!(
        "✅ step size {}, tick size {}, min notional {}\n",
        filters.step_size, filters.tick_size, filters.min_notional
    );

    if !has_keys {
        println!("🏁 Public endpoints OK. Set credentials to check signed endpoints.");
        return Ok(());
    }

    println!("👛 Fetching spot balances...");
    let balances = client.account_balances().await?;
    let nonzero = balances.iter().filter(|b| b.free > 0.0 || b.locked > 0.0);
    for balance in nonzero.take(10) {
        println!("   {} free {} locked {}", balance.asset, balance.free, balance.locked);
    }
    println!("✅ Spot account reachable\n");

    println!("📋 Fetching open spot orders for {}...", symbol);
    let open = client
        .open_orders(AccountType::Spot, Some(symbol.as_str()))
        .await?;
    println!("✅ {} open order(s)\n", open.len());

    println!("🏦 Fetching margin account summary...");
    match client.margin_account().await {
        Ok(margin) => {
            println!(
                "✅ Margin level {}, net {} BTC",
                margin.margin_level, margin.total_net_asset_of_btc
            );
            match client.max_borrowable("USDT").await {
                Ok(amount) => println!("✅ Max borrowable USDT: {}\n", amount),
                Err(e) => println!("⚠️  Max borrowable unavailable: {}\n", e),
            }
        }
        Err(e) => println!("⚠️  Margin account unavailable: {}\n", e),
    }

    println!("🧪 Validating a test order ({} market buy)...", symbol);
    let request = OrderRequest::market_quote(&symbol, OrderSide::Buy, AccountType::Spot, 20.0)
        .map_err(|e| format!("invalid test order: {}", e))?;
    client.test_order(&request).await?;
    println!("✅ Test order accepted (nothing was placed)\n");

    println!("🏁 All connectivity checks passed");
    Ok(())
}

fn tempfile_dir() -> std::io::Result<std::path::PathBuf> {
    let dir = env::temp_dir().join("tickwatch-connectivity-check");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
