//! Alert Evaluation Engine
//!
//! On every published price snapshot, decides for each active alert
//! whether its condition holds and transitions it to triggered exactly
//! once per running session. Trailing stops mutate their watermark here;
//! trade hand-off goes onto the dispatch queue without awaiting it, so
//! one slow order never stalls evaluation of the remaining alerts.

use crate::application::notify::{AudioCue, AudioSink, Notifier};
use crate::domain::entities::alert::{Alert, AlertCondition, Direction};
use crate::domain::entities::price::PriceSnapshot;
use crate::domain::services::trade_dispatcher::TriggerSource;
use crate::persistence::alert_store::AlertStore;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Outcome of evaluating one condition against one price. Watermark
/// updates and triggers are mutually exclusive within a pass: the trigger
/// condition is the complement of the update condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Hold,
    UpdateStop { watermark: f64, stop_price: f64 },
    Trigger,
}

/// Pure condition check. Level-triggered: a condition already satisfied at
/// creation fires on the next evaluation, with no arming delay.
pub fn evaluate_condition(condition: &AlertCondition, price: f64) -> Evaluation {
    match condition {
        AlertCondition::PriceCross {
            target_price,
            direction,
        } => {
            let crossed = match direction {
                Direction::Above => price >= *target_price,
                Direction::Below => price <= *target_price,
            };
            if crossed {
                Evaluation::Trigger
            } else {
                Evaluation::Hold
            }
        }
        AlertCondition::PercentageChange {
            base_price,
            threshold_pct,
            direction,
        } => {
            let change_pct = (price - base_price) / base_price * 100.0;
            let hit = match direction {
                Direction::Above => change_pct >= *threshold_pct,
                Direction::Below => change_pct <= -*threshold_pct,
            };
            if hit {
                Evaluation::Trigger
            } else {
                Evaluation::Hold
            }
        }
        AlertCondition::TrailingStop {
            trailing_pct,
            direction,
            watermark,
            stop_price,
        } => match direction {
            Direction::Above => {
                if price > *watermark {
                    Evaluation::UpdateStop {
                        watermark: price,
                        stop_price: price * (1.0 - trailing_pct / 100.0),
                    }
                } else if price <= *stop_price {
                    Evaluation::Trigger
                } else {
                    Evaluation::Hold
                }
            }
            Direction::Below => {
                if price < *watermark {
                    Evaluation::UpdateStop {
                        watermark: price,
                        stop_price: price * (1.0 + trailing_pct / 100.0),
                    }
                } else if price >= *stop_price {
                    Evaluation::Trigger
                } else {
                    Evaluation::Hold
                }
            }
        },
        // Declared in the type union; no evaluation path exists.
        AlertCondition::VolumeSpike { .. } => Evaluation::Hold,
    }
}

pub struct AlertEngine {
    store: Arc<AlertStore>,
    notifier: Arc<dyn Notifier>,
    audio: Arc<dyn AudioSink>,
    dispatch_tx: mpsc::Sender<TriggerSource>,
    /// Session-scoped trigger guard, independent of the persisted status,
    /// so a delayed store write cannot cause a duplicate trigger within
    /// one run. Cross-restart dedup relies on the persisted status only.
    triggered: HashSet<String>,
}

impl AlertEngine {
    pub fn new(
        store: Arc<AlertStore>,
        notifier: Arc<dyn Notifier>,
        audio: Arc<dyn AudioSink>,
        dispatch_tx: mpsc::Sender<TriggerSource>,
    ) -> Self {
        Self {
            store,
            notifier,
            audio,
            dispatch_tx,
            triggered: HashSet::new(),
        }
    }

    /// One evaluation pass over an immutable snapshot.
    pub fn evaluate_snapshot(&mut self, snapshot: &PriceSnapshot) {
        if snapshot.is_empty() {
            return;
        }
        let alerts = self.store.list();
        for alert in alerts.iter().filter(|a| a.is_active()) {
            if self.triggered.contains(&alert.id) {
                continue;
            }
            let Some(price) = snapshot.price_of(&alert.symbol) else {
                continue;
            };
            match evaluate_condition(&alert.condition, price) {
                Evaluation::Hold => {}
                Evaluation::UpdateStop {
                    watermark,
                    stop_price,
                } => {
                    debug!(
                        "trailing stop {} ratchets: watermark {}, stop {}",
                        alert.id, watermark, stop_price
                    );
                    // A failed write is skipped; the alert is still active,
                    // so the next tick retries the update.
                    if let Err(e) = self.store.update_trailing(&alert.id, watermark, stop_price) {
                        warn!("watermark update failed for {}: {}", alert.id, e);
                    }
                }
                Evaluation::Trigger => self.fire(alert, price),
            }
        }
    }

    fn fire(&mut self, alert: &Alert, price: f64) {
        self.triggered.insert(alert.id.clone());

        // Trigger status is committed before anything user-visible; if the
        // write fails, a restart may re-notify (the in-session guard only
        // covers this run).
        if let Err(e) = self.store.mark_triggered(&alert.id, Utc::now()) {
            warn!("failed to persist trigger for {}: {}", alert.id, e);
        }

        let description = alert.describe_trigger(price);
        info!("alert triggered: {}", description);
        self.notifier.notify(&alert.symbol, &description);

        let cue = if alert.audio.looping {
            AudioCue::Looping
        } else {
            AudioCue::OneShot
        };
        self.audio.play(cue);

        if let Some(trade) = &alert.trade {
            let source = TriggerSource::Alert {
                alert_id: alert.id.clone(),
                symbol: alert.symbol.clone(),
                side: trade.side,
                quantity: trade.quantity,
                account: trade.account,
            };
            // Fire and forget: the evaluation pass never waits on order
            // placement. A trade failure downstream does not roll back the
            // triggered status.
            if let Err(e) = self.dispatch_tx.try_send(source) {
                warn!("dispatch queue full, dropping trade for {}: {}", alert.id, e);
            }
        }
    }

    /// Stop any looping alarm and clear the active-alarm flag. Alert
    /// status is untouched.
    pub fn silence(&self) {
        self.audio.stop();
    }

    /// Drive the engine from the price feed until the feed closes.
    pub async fn run(mut self, mut prices: watch::Receiver<PriceSnapshot>) {
        info!("alert engine started");
        while prices.changed().await.is_ok() {
            let snapshot = prices.borrow_and_update().clone();
            self.evaluate_snapshot(&snapshot);
        }
        info!("alert engine stopped: price feed closed");
    }
}
