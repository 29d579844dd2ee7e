use std::sync::Arc;
use std::time::Duration;
use tickwatch::application::actors::{dispatch_actor, price_feed::PriceFeed};
use tickwatch::application::notify::{AlarmBell, LogNotifier};
use tickwatch::config::AppConfig;
use tickwatch::domain::repositories::exchange_client::ExchangeClient;
use tickwatch::domain::services::alert_engine::AlertEngine;
use tickwatch::domain::services::dca_scheduler::DcaScheduler;
use tickwatch::domain::services::trade_dispatcher::TradeDispatcher;
use tickwatch::infrastructure::binance::BinanceClient;
use tickwatch::persistence::alert_store::AlertStore;
use tickwatch::persistence::dca_store::DcaStore;
use tickwatch::persistence::order_history::OrderHistory;
use tickwatch::persistence::JsonStore;
use tickwatch::secrets::CredentialStore;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tickwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    info!(
        "starting tickwatch: {} symbols, data dir {:?}",
        config.symbols.len(),
        config.data_dir
    );

    let store = Arc::new(JsonStore::open(&config.data_dir)?);
    let credentials = Arc::new(CredentialStore::new(store.clone()));
    let alerts = Arc::new(AlertStore::open(store.clone()));
    let strategies = Arc::new(DcaStore::open(store.clone()));
    let history = Arc::new(OrderHistory::open(store, config.order_history_cap));

    if !credentials.has_keys() {
        warn!("no API keys configured; alerts will fire but trades will fail");
    }

    let exchange: Arc<dyn ExchangeClient> = Arc::new(BinanceClient::new(
        &config.rest_base,
        credentials.clone(),
        config.retry.clone(),
        config.recv_window_ms,
    ));

    match exchange.sync_time().await {
        Ok(offset) => info!("exchange clock offset: {}ms", offset),
        Err(e) => warn!("initial time sync failed: {}", e),
    }

    let dispatcher = Arc::new(TradeDispatcher::new(
        exchange.clone(),
        credentials,
        history,
    ));

    let (dispatch_tx, dispatch_handle) =
        dispatch_actor::spawn(dispatcher.clone(), config.dispatch_queue_size);

    let (feed, snapshots) = PriceFeed::new(
        &config.ws_base,
        config.symbols.clone(),
        exchange,
        Duration::from_secs(config.poll_interval_secs),
    );
    tokio::spawn(feed.run());

    let engine = AlertEngine::new(
        alerts,
        Arc::new(LogNotifier),
        Arc::new(AlarmBell::new()),
        dispatch_tx,
    );
    tokio::spawn(engine.run(snapshots));

    let scheduler = Arc::new(DcaScheduler::new(
        strategies,
        dispatcher,
        Duration::from_secs(config.dca_check_interval_secs),
    ));
    tokio::spawn(scheduler.run());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    dispatch_handle.abort();
    Ok(())
}
