//! Alert Store
//!
//! Durable repository of alert definitions and their lifecycle state.
//! Reads and writes are synchronous against the JSON key-value layer;
//! mutations against an id that no longer exists are silent no-ops so the
//! evaluation loop can race user deletions safely.

use super::{JsonStore, StoreError};
use crate::domain::entities::alert::{
    Alert, AlertCondition, AlertStatus, AudioPreference, NewAlert,
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

const ALERTS_KEY: &str = "alerts";

pub struct AlertStore {
    store: Arc<JsonStore>,
    alerts: Mutex<Vec<Alert>>,
}

pub(crate) fn generate_id() -> String {
    format!(
        "{:x}-{:04x}",
        Utc::now().timestamp_millis(),
        rand::random::<u16>()
    )
}

impl AlertStore {
    /// Open the store, loading any persisted alerts.
    pub fn open(store: Arc<JsonStore>) -> Self {
        let alerts: Vec<Alert> = store.read(ALERTS_KEY);
        Self {
            store,
            alerts: Mutex::new(alerts),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Alert>> {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, alerts: &[Alert]) -> Result<(), StoreError> {
        self.store.write(ALERTS_KEY, &alerts)
    }

    /// All alerts in insertion order.
    pub fn list(&self) -> Vec<Alert> {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<Alert> {
        self.lock().iter().find(|a| a.id == id).cloned()
    }

    /// Create an alert: assigns id and creation time, status starts active.
    /// User-supplied values are validated first; a percentage-change base
    /// of zero never reaches the evaluation loop.
    pub fn create(&self, new: NewAlert) -> Result<Alert, StoreError> {
        new.validate()?;
        let alert = Alert {
            id: generate_id(),
            symbol: new.symbol,
            condition: new.condition,
            status: AlertStatus::Active,
            audio: new.audio,
            trade: new.trade,
            created_at: Utc::now(),
            triggered_at: None,
        };
        let mut alerts = self.lock();
        alerts.push(alert.clone());
        self.persist(&alerts)?;
        Ok(alert)
    }

    /// Write back a trailing stop's new watermark and stop price.
    /// No-op for ids that are gone or conditions that are not trailing stops.
    pub fn update_trailing(
        &self,
        id: &str,
        watermark: f64,
        stop_price: f64,
    ) -> Result<(), StoreError> {
        let mut alerts = self.lock();
        let Some(alert) = alerts.iter_mut().find(|a| a.id == id) else {
            return Ok(());
        };
        if let AlertCondition::TrailingStop {
            watermark: wm,
            stop_price: stop,
            ..
        } = &mut alert.condition
        {
            *wm = watermark;
            *stop = stop_price;
            self.persist(&alerts)?;
        }
        Ok(())
    }

    /// Transition an alert to triggered. Terminal; later calls are no-ops.
    pub fn mark_triggered(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut alerts = self.lock();
        let Some(alert) = alerts.iter_mut().find(|a| a.id == id) else {
            return Ok(());
        };
        if alert.status == AlertStatus::Active {
            alert.status = AlertStatus::Triggered;
            alert.triggered_at = Some(at);
            self.persist(&alerts)?;
        }
        Ok(())
    }

    /// Transition an alert to cancelled (explicit user action).
    pub fn cancel(&self, id: &str) -> Result<(), StoreError> {
        let mut alerts = self.lock();
        let Some(alert) = alerts.iter_mut().find(|a| a.id == id) else {
            return Ok(());
        };
        if alert.status == AlertStatus::Active {
            alert.status = AlertStatus::Cancelled;
            self.persist(&alerts)?;
        }
        Ok(())
    }

    pub fn set_audio(&self, id: &str, audio: AudioPreference) -> Result<(), StoreError> {
        let mut alerts = self.lock();
        let Some(alert) = alerts.iter_mut().find(|a| a.id == id) else {
            return Ok(());
        };
        alert.audio = audio;
        self.persist(&alerts)
    }

    pub fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        let mut alerts = self.lock();
        alerts.retain(|a| !ids.contains(&a.id));
        self.persist(&alerts)
    }
}
