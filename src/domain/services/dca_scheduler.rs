//! DCA Scheduler
//!
//! Periodically scans strategies and executes the due ones. Execution
//! is wall-clock only; price never influences whether a buy happens.
//! Two overlap guards keep a slow exchange from double-spending: a
//! single-flight latch over the whole check cycle, and a per-strategy
//! window key of (id, scheduled instant) that is consumed before the
//! order goes out.

use crate::domain::services::schedule::compute_next_execution;
use crate::domain::services::trade_dispatcher::{TradeDispatcher, TriggerSource};
use crate::persistence::dca_store::DcaStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

/// Executed windows older than this are pruned; nothing re-dispatches a
/// window this far in the past anyway.
const WINDOW_RETENTION_HOURS: i64 = 24;

pub struct DcaScheduler {
    store: Arc<DcaStore>,
    dispatcher: Arc<TradeDispatcher>,
    check_interval: Duration,
    in_flight: AtomicBool,
    executed_windows: Mutex<HashSet<(String, i64)>>,
}

impl DcaScheduler {
    pub fn new(
        store: Arc<DcaStore>,
        dispatcher: Arc<TradeDispatcher>,
        check_interval: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            check_interval,
            in_flight: AtomicBool::new(false),
            executed_windows: Mutex::new(HashSet::new()),
        }
    }

    fn windows(&self) -> MutexGuard<'_, HashSet<(String, i64)>> {
        self.executed_windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Tick loop. Ticks that land while a previous cycle is still running
    /// are skipped, not queued.
    pub async fn run(self: Arc<Self>) {
        info!(
            "dca scheduler started (check interval {:?})",
            self.check_interval
        );
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.check_cycle(Utc::now()).await;
        }
    }

    /// One scan over all strategies. Returns how many were dispatched.
    pub async fn check_cycle(&self, now: DateTime<Utc>) -> usize {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let executed = self.run_due(now).await;
        self.in_flight.store(false, Ordering::SeqCst);
        executed
    }

    async fn run_due(&self, now: DateTime<Utc>) -> usize {
        let due: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|s| s.is_due(now))
            .collect();
        if due.is_empty() {
            self.prune_windows(now);
            return 0;
        }

        let mut executed = 0;
        for strategy in due {
            let window = (strategy.id.clone(), strategy.next_execute_at.timestamp());
            // Claim the window before dispatching so a re-scan cannot buy
            // the same slot twice even if bookkeeping below fails.
            if !self.windows().insert(window) {
                continue;
            }

            let outcome = self
                .dispatcher
                .execute(TriggerSource::Dca {
                    strategy_id: strategy.id.clone(),
                    symbol: strategy.symbol.clone(),
                    side: strategy.side,
                    quote_amount: strategy.quote_amount,
                })
                .await;

            if outcome.success {
                info!(
                    "dca executed: {} {} {} quote units",
                    strategy.side, strategy.symbol, strategy.quote_amount
                );
            } else {
                warn!(
                    "dca execution failed for {}: {}",
                    strategy.id,
                    outcome.error.as_deref().unwrap_or("unknown")
                );
            }

            // The schedule advances on failure too; a failed buy forfeits
            // its window rather than retrying into the next one.
            let next = compute_next_execution(&strategy.schedule, now);
            match self.store.record_execution(&strategy.id, next, now) {
                Ok(Some(updated)) => {
                    executed += 1;
                    if updated.budget_exhausted() {
                        info!(
                            "dca budget reached for {} ({} of {}), disabling",
                            updated.id, updated.total_spent, updated.total_budget
                        );
                        if let Err(e) = self.store.set_enabled(&updated.id, false) {
                            warn!("failed to disable exhausted strategy {}: {}", updated.id, e);
                        }
                    }
                }
                Ok(None) => {} // deleted mid-cycle
                Err(e) => warn!("dca bookkeeping failed for {}: {}", strategy.id, e),
            }
        }
        self.prune_windows(now);
        executed
    }

    fn prune_windows(&self, now: DateTime<Utc>) {
        let cutoff = (now - ChronoDuration::hours(WINDOW_RETENTION_HOURS)).timestamp();
        self.windows().retain(|(_, at)| *at >= cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::dca::{HourAnchor, NewDcaStrategy, Schedule};
    use crate::domain::entities::order::{
        AccountType, AssetBalance, MarginAccountSummary, OpenOrder, OrderRequest, OrderResponse,
        OrderSide, SymbolFilters,
    };
    use crate::domain::repositories::exchange_client::{
        ExchangeClient, ExchangeError, ExchangeResult,
    };
    use crate::persistence::order_history::OrderHistory;
    use crate::persistence::JsonStore;
    use crate::secrets::{CredentialStore, StoredKeys};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    struct CountingExchange {
        placed: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl ExchangeClient for CountingExchange {
        fn name(&self) -> &str {
            "CountingExchange"
        }

        async fn sync_time(&self) -> ExchangeResult<i64> {
            Ok(0)
        }

        async fn ticker_price(&self, _symbol: &str) -> ExchangeResult<f64> {
            Ok(50000.0)
        }

        async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse> {
            if self.fail {
                return Err(ExchangeError::Rejected {
                    status: 400,
                    message: "Account has insufficient balance".to_string(),
                });
            }
            let n = self.placed.fetch_add(1, Ordering::SeqCst);
            Ok(OrderResponse {
                order_id: n as u64 + 1,
                client_order_id: format!("c{}", n),
                symbol: request.symbol.clone(),
                status: "FILLED".to_string(),
                executed_qty: "0.001".to_string(),
                cummulative_quote_qty: "50.0".to_string(),
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

    struct Fixture {
        _dir: tempfile::TempDir,
        dca: Arc<DcaStore>,
        exchange: Arc<CountingExchange>,
        scheduler: DcaScheduler,
    }

    fn fixture(fail: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let json = Arc::new(JsonStore::open(dir.path()).unwrap());
        let credentials = Arc::new(CredentialStore::new(json.clone()));
        credentials
            .save(&StoredKeys {
                api_key: "k".to_string(),
                api_secret: "s".to_string(),
            })
            .unwrap();
        let exchange = Arc::new(CountingExchange {
            placed: AtomicU32::new(0),
            fail,
        });
        let history = Arc::new(OrderHistory::open(json.clone(), 50));
        let dispatcher = Arc::new(TradeDispatcher::new(
            exchange.clone(),
            credentials,
            history,
        ));
        let dca = Arc::new(DcaStore::open(json));
        let scheduler = DcaScheduler::new(dca.clone(), dispatcher, Duration::from_secs(30));
        Fixture {
            _dir: dir,
            dca,
            exchange,
            scheduler,
        }
    }

    fn hourly(quote: f64, budget: f64) -> NewDcaStrategy {
        NewDcaStrategy {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            quote_amount: quote,
            total_budget: budget,
            schedule: Schedule::Hourly {
                anchor: HourAnchor::Start,
            },
        }
    }

    #[tokio::test]
    async fn test_budget_closes_after_exact_number_of_buys() {
        let f = fixture(false);
        let strategy = f.dca.create(hourly(50.0, 100.0)).unwrap();

        // walk the clock past each scheduled instant
        let mut now = Utc::now();
        for _ in 0..4 {
            now = f.dca.get(&strategy.id).unwrap().next_execute_at + ChronoDuration::seconds(1);
            f.scheduler.check_cycle(now).await;
        }

        let final_state = f.dca.get(&strategy.id).unwrap();
        assert_eq!(final_state.execution_count, 2);
        assert_eq!(final_state.total_spent, 100.0);
        assert!(!final_state.enabled);
        assert_eq!(f.exchange.placed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_due_strategy_is_ignored() {
        let f = fixture(false);
        let strategy = f.dca.create(hourly(50.0, 1000.0)).unwrap();

        // just before the scheduled instant
        let before = f.dca.get(&strategy.id).unwrap().next_execute_at - ChronoDuration::seconds(1);
        assert_eq!(f.scheduler.check_cycle(before).await, 0);
        assert_eq!(f.exchange.placed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_window_guard_dedupes_same_slot() {
        let f = fixture(false);
        let strategy = f.dca.create(hourly(50.0, 1000.0)).unwrap();
        let due_at = f.dca.get(&strategy.id).unwrap().next_execute_at;

        // pre-claim the window, as a scan whose bookkeeping write never
        // landed would have
        f.scheduler
            .windows()
            .insert((strategy.id.clone(), due_at.timestamp()));

        f.scheduler
            .check_cycle(due_at + ChronoDuration::seconds(1))
            .await;

        // a claimed (id, slot) never dispatches again
        assert_eq!(f.exchange.placed.load(Ordering::SeqCst), 0);
        assert_eq!(f.dca.get(&strategy.id).unwrap().execution_count, 0);
    }

    #[tokio::test]
    async fn test_single_flight_latch_skips_overlapping_cycle() {
        let f = fixture(false);
        f.dca.create(hourly(50.0, 1000.0)).unwrap();
        f.scheduler.in_flight.store(true, Ordering::SeqCst);

        let executed = f
            .scheduler
            .check_cycle(Utc::now() + ChronoDuration::hours(2))
            .await;
        assert_eq!(executed, 0);
        assert_eq!(f.exchange.placed.load(Ordering::SeqCst), 0);
        // latch is owned by the phantom cycle, not cleared by the skip
        assert!(f.scheduler.in_flight.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_execution_still_advances_schedule() {
        let f = fixture(true);
        let strategy = f.dca.create(hourly(50.0, 1000.0)).unwrap();
        let due_at = f.dca.get(&strategy.id).unwrap().next_execute_at;
        let now = due_at + ChronoDuration::seconds(1);

        f.scheduler.check_cycle(now).await;

        let updated = f.dca.get(&strategy.id).unwrap();
        // the failed window is forfeited, not retried
        assert!(updated.next_execute_at > now);
        assert_eq!(updated.execution_count, 1);
        assert_eq!(f.exchange.placed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_window_pruning_keeps_recent_entries() {
        let f = fixture(false);
        let now = Utc::now();
        f.scheduler
            .windows()
            .insert(("old".to_string(), (now - ChronoDuration::hours(48)).timestamp()));
        f.scheduler
            .windows()
            .insert(("recent".to_string(), now.timestamp()));

        f.scheduler.check_cycle(now).await;

        let windows = f.scheduler.windows();
        assert_eq!(windows.len(), 1);
        assert!(windows.iter().any(|(id, _)| id == "recent"));
    }
}
