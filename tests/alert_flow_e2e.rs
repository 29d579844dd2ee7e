//! End-to-end flow: a stream of prices crosses an alert's target, the
//! alert triggers exactly once, and the resulting market order lands in
//! order history carrying the alert's id.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tickwatch::application::actors::dispatch_actor;
use tickwatch::application::notify::{AlarmBell, LogNotifier};
use tickwatch::domain::entities::alert::{
    AlertCondition, AlertStatus, AudioPreference, Direction, NewAlert, TradeConfig,
};
use tickwatch::domain::entities::order::{
    AccountType, AssetBalance, MarginAccountSummary, OpenOrder, OrderOrigin, OrderRequest,
    OrderResponse, OrderSide, SymbolFilters,
};
use tickwatch::domain::entities::price::PriceSnapshot;
use tickwatch::domain::repositories::exchange_client::{
    ExchangeClient, ExchangeError, ExchangeResult,
};
use tickwatch::domain::services::alert_engine::AlertEngine;
use tickwatch::domain::services::trade_dispatcher::TradeDispatcher;
use tickwatch::persistence::alert_store::AlertStore;
use tickwatch::persistence::order_history::OrderHistory;
use tickwatch::persistence::JsonStore;
use tickwatch::secrets::{CredentialStore, StoredKeys};
use tokio::sync::watch;

struct StubExchange {
    placed: AtomicU32,
}

#[async_trait]
impl ExchangeClient for StubExchange {
    fn name(&self) -> &str {
        "StubExchange"
    }

    async fn sync_time(&self) -> ExchangeResult<i64> {
        Ok(0)
    }

    async fn ticker_price(&self, _symbol: &str) -> ExchangeResult<f64> {
        Ok(50000.0)
    }

    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse> {
        let n = self.placed.fetch_add(1, Ordering::SeqCst);
        Ok(OrderResponse {
            order_id: n as u64 + 1,
            client_order_id: format!("e2e-{}", n),
            symbol: request.symbol.clone(),
            status: "FILLED".to_string(),
            executed_qty: "0.01".to_string(),
            cummulative_quote_qty: "500.0".to_string(),
            transact_time: 0,
        })
    }

    async fn test_order(&self, _request: &OrderRequest) -> ExchangeResult<()> {
        Ok(())
    }

    async fn open_orders(
        &self,
        _account: AccountType,
        _symbol: Option<&str>,
    ) -> ExchangeResult<Vec<OpenOrder>> {
        Ok(vec![])
    }

    async fn cancel_order(
        &self,
        _account: AccountType,
        _symbol: &str,
        _order_id: u64,
    ) -> ExchangeResult<OrderResponse> {
        Err(ExchangeError::Rejected {
            status: 400,
            message: "Unknown order sent.".to_string(),
        })
    }

    async fn account_balances(&self) -> ExchangeResult<Vec<AssetBalance>> {
        Ok(vec![])
    }

    async fn margin_account(&self) -> ExchangeResult<MarginAccountSummary> {
        Ok(MarginAccountSummary {
            margin_level: 999.0,
            total_asset_of_btc: 0.0,
            total_liability_of_btc: 0.0,
            total_net_asset_of_btc: 0.0,
        })
    }

    async fn max_borrowable(&self, _asset: &str) -> ExchangeResult<f64> {
        Ok(0.0)
    }

    async fn symbol_filters(&self, _symbol: &str) -> ExchangeResult<SymbolFilters> {
        Ok(SymbolFilters::default())
    }
}

#[tokio::test]
async fn price_cross_fires_once_and_places_order() {
    let dir = tempfile::tempdir().unwrap();
    let json = Arc::new(JsonStore::open(dir.path()).unwrap());
    let alerts = Arc::new(AlertStore::open(json.clone()));
    let credentials = Arc::new(CredentialStore::new(json.clone()));
    credentials
        .save(&StoredKeys {
            api_key: "test-key".to_string(),
            api_secret: "test-secret".to_string(),
        })
        .unwrap();
    let history = Arc::new(OrderHistory::open(json, 50));

    let exchange = Arc::new(StubExchange {
        placed: AtomicU32::new(0),
    });
    let dispatcher = Arc::new(TradeDispatcher::new(
        exchange.clone(),
        credentials,
        history.clone(),
    ));
    let (dispatch_tx, dispatch_handle) = dispatch_actor::spawn(dispatcher, 8);

    let alert = alerts
        .create(NewAlert {
            symbol: "BTCUSDT".to_string(),
            condition: AlertCondition::PriceCross {
                target_price: 50000.0,
                direction: Direction::Above,
            },
            audio: AudioPreference::default(),
            trade: Some(TradeConfig {
                side: OrderSide::Buy,
                quantity: 0.01,
                account: AccountType::Spot,
            }),
        })
        .unwrap();

    let (price_tx, price_rx) = watch::channel(PriceSnapshot::default());
    let engine = AlertEngine::new(
        alerts.clone(),
        Arc::new(LogNotifier),
        Arc::new(AlarmBell::new()),
        dispatch_tx,
    );
    let engine_handle = tokio::spawn(engine.run(price_rx));

    for price in [49000.0, 49500.0, 50000.0] {
        price_tx.send(PriceSnapshot::single("BTCUSDT", price)).unwrap();
        // let the engine observe each snapshot before the next replaces it
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // closing the feed stops the engine, which drops the last dispatch
    // sender and lets the actor drain
    drop(price_tx);
    engine_handle.await.unwrap();
    dispatch_handle.await.unwrap();

    let stored = alerts.get(&alert.id).unwrap();
    assert_eq!(stored.status, AlertStatus::Triggered);
    assert!(stored.triggered_at.is_some());

    assert_eq!(exchange.placed.load(Ordering::SeqCst), 1);

    let recorded = history.list();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].order.symbol, "BTCUSDT");
    assert_eq!(
        recorded[0].origin,
        OrderOrigin::Alert {
            alert_id: alert.id.clone()
        }
    );
}
