//! DCA Strategy Store
//!
//! Same persistence model as the alert store. The store records execution
//! bookkeeping but never disables a strategy on its own; the scheduler owns
//! the budget stop condition.

use super::alert_store::generate_id;
use super::{JsonStore, StoreError};
use crate::domain::entities::dca::{DcaStrategy, NewDcaStrategy};
use crate::domain::services::schedule::compute_next_execution;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

const STRATEGIES_KEY: &str = "dca_strategies";

pub struct DcaStore {
    store: Arc<JsonStore>,
    strategies: Mutex<Vec<DcaStrategy>>,
}

impl DcaStore {
    pub fn open(store: Arc<JsonStore>) -> Self {
        let strategies: Vec<DcaStrategy> = store.read(STRATEGIES_KEY);
        Self {
            store,
            strategies: Mutex::new(strategies),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DcaStrategy>> {
        self.strategies.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, strategies: &[DcaStrategy]) -> Result<(), StoreError> {
        self.store.write(STRATEGIES_KEY, &strategies)
    }

    pub fn list(&self) -> Vec<DcaStrategy> {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<DcaStrategy> {
        self.lock().iter().find(|s| s.id == id).cloned()
    }

    /// Create a strategy; the first `next_execute_at` comes from the
    /// schedule rule relative to now.
    pub fn create(&self, new: NewDcaStrategy) -> Result<DcaStrategy, StoreError> {
        let now = Utc::now();
        let strategy = DcaStrategy {
            id: generate_id(),
            symbol: new.symbol,
            side: new.side,
            quote_amount: new.quote_amount,
            total_budget: new.total_budget,
            total_spent: 0.0,
            execution_count: 0,
            schedule: new.schedule,
            enabled: true,
            next_execute_at: compute_next_execution(&new.schedule, now),
            last_executed_at: None,
            created_at: now,
        };
        let mut strategies = self.lock();
        strategies.push(strategy.clone());
        self.persist(&strategies)?;
        Ok(strategy)
    }

    /// Record one execution attempt: bump the counter, add the spend, and
    /// move the schedule forward. Returns the updated strategy so the
    /// scheduler can apply its budget stop. Missing ids yield `None`.
    pub fn record_execution(
        &self,
        id: &str,
        next_execute_at: DateTime<Utc>,
        executed_at: DateTime<Utc>,
    ) -> Result<Option<DcaStrategy>, StoreError> {
        let mut strategies = self.lock();
        let Some(strategy) = strategies.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        strategy.execution_count += 1;
        strategy.total_spent += strategy.quote_amount;
        strategy.next_execute_at = next_execute_at;
        strategy.last_executed_at = Some(executed_at);
        let updated = strategy.clone();
        self.persist(&strategies)?;
        Ok(Some(updated))
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), StoreError> {
        let mut strategies = self.lock();
        let Some(strategy) = strategies.iter_mut().find(|s| s.id == id) else {
            return Ok(());
        };
        strategy.enabled = enabled;
        self.persist(&strategies)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut strategies = self.lock();
        strategies.retain(|s| s.id != id);
        self.persist(&strategies)
    }
}
