//! Order History
//!
//! Append-only local record of orders placed by the engine, bounded to the
//! most recent N entries with the oldest evicted first.

use super::{JsonStore, StoreError};
use crate::domain::entities::order::{OrderOrigin, OrderResponse, StoredOrder};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

const HISTORY_KEY: &str = "order_history";

pub struct OrderHistory {
    store: Arc<JsonStore>,
    entries: Mutex<VecDeque<StoredOrder>>,
    capacity: usize,
}

impl OrderHistory {
    pub fn open(store: Arc<JsonStore>, capacity: usize) -> Self {
        let entries: VecDeque<StoredOrder> = store.read(HISTORY_KEY);
        Self {
            store,
            entries: Mutex::new(entries),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<StoredOrder>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Newest first.
    pub fn list(&self) -> Vec<StoredOrder> {
        self.lock().iter().rev().cloned().collect()
    }

    pub fn record(&self, order: &OrderResponse, origin: OrderOrigin) -> Result<(), StoreError> {
        let mut entries = self.lock();
        entries.push_back(StoredOrder {
            order: order.clone(),
            origin,
            recorded_at: Utc::now(),
        });
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        self.store.write(HISTORY_KEY, &*entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(order_id: u64) -> OrderResponse {
        OrderResponse {
            order_id,
            client_order_id: format!("c{}", order_id),
            symbol: "BTCUSDT".to_string(),
            status: "FILLED".to_string(),
            executed_qty: "0.01".to_string(),
            cummulative_quote_qty: "500.0".to_string(),
            transact_time: 0,
        }
    }

    #[test]
    fn test_record_and_list_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path()).unwrap());
        let history = OrderHistory::open(store, 10);

        history
            .record(
                &response(1),
                OrderOrigin::Alert {
                    alert_id: "a1".to_string(),
                },
            )
            .unwrap();
        history
            .record(
                &response(2),
                OrderOrigin::Dca {
                    strategy_id: "s1".to_string(),
                },
            )
            .unwrap();

        let listed = history.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].order.order_id, 2);
        assert_eq!(
            listed[1].origin,
            OrderOrigin::Alert {
                alert_id: "a1".to_string()
            }
        );
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path()).unwrap());
        let history = OrderHistory::open(store, 3);

        for i in 1..=5 {
            history
                .record(
                    &response(i),
                    OrderOrigin::Alert {
                        alert_id: format!("a{}", i),
                    },
                )
                .unwrap();
        }
        let listed = history.list();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].order.order_id, 5);
        assert_eq!(listed[2].order.order_id, 3);
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let json = Arc::new(JsonStore::open(dir.path()).unwrap());
        {
            let history = OrderHistory::open(json.clone(), 10);
            history
                .record(
                    &response(1),
                    OrderOrigin::Alert {
                        alert_id: "a1".to_string(),
                    },
                )
                .unwrap();
        }
        let reopened = OrderHistory::open(json, 10);
        assert_eq!(reopened.list().len(), 1);
    }
}
