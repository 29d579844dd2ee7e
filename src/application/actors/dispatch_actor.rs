//! Dispatch actor
//!
//! Single consumer draining the trigger queue. Alerts hand off trades
//! here without waiting; each trade runs to completion before the next
//! is taken, so order placement is serialized.

use crate::domain::services::trade_dispatcher::{TradeDispatcher, TriggerSource};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Spawn the consumer task and return the sender producers use. The
/// task ends when every sender has been dropped.
pub fn spawn(dispatcher: Arc<TradeDispatcher>, buffer: usize) -> (mpsc::Sender<TriggerSource>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<TriggerSource>(buffer);
    let handle = tokio::spawn(async move {
        info!("dispatch actor started");
        while let Some(source) = rx.recv().await {
            let symbol = source.symbol().to_string();
            let outcome = dispatcher.execute(source).await;
            if outcome.success {
                info!("trade completed for {}", symbol);
            } else {
                warn!(
                    "trade failed for {}: {}",
                    symbol,
                    outcome.error.as_deref().unwrap_or("unknown")
                );
            }
        }
        info!("dispatch actor stopped: all producers gone");
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::order::{AccountType, OrderSide};
    use crate::persistence::order_history::OrderHistory;
    use crate::persistence::JsonStore;
    use crate::secrets::CredentialStore;
    use crate::domain::repositories::exchange_client::ExchangeClient;

    // Without credentials the dispatcher fails fast, which is enough to
    // prove the actor drains the queue and exits on close.
    #[tokio::test]
    async fn test_actor_drains_queue_and_stops_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let json = Arc::new(JsonStore::open(dir.path()).unwrap());
        let credentials = Arc::new(CredentialStore::new(json.clone()));
        let history = Arc::new(OrderHistory::open(json, 10));
        let exchange: Arc<dyn ExchangeClient> = Arc::new(
            crate::infrastructure::binance::BinanceClient::new(
                "http://127.0.0.1:9",
                credentials.clone(),
                Default::default(),
                5_000,
            ),
        );
        let dispatcher = Arc::new(TradeDispatcher::new(exchange, credentials, history.clone()));

        let (tx, handle) = spawn(dispatcher, 4);
        tx.send(TriggerSource::Alert {
            alert_id: "a1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            quantity: 0.01,
            account: AccountType::Spot,
        })
        .await
        .unwrap();
        drop(tx);

        handle.await.unwrap();
        // no credentials, so nothing reached history
        assert!(history.list().is_empty());
    }
}
