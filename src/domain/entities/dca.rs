use crate::domain::entities::order::OrderSide;
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Minute anchor inside the hour for hourly strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourAnchor {
    /// Top of the hour (:00).
    Start,
    /// Five minutes before the next hour (:55).
    End,
}

impl HourAnchor {
    pub fn minute(&self) -> u32 {
        match self {
            HourAnchor::Start => 0,
            HourAnchor::End => 55,
        }
    }
}

/// Wall-clock schedule for a recurring strategy. Purely time-based;
/// price never enters into it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "snake_case")]
pub enum Schedule {
    Hourly { anchor: HourAnchor },
    Daily { time: NaiveTime },
    Weekly { weekday: Weekday, time: NaiveTime },
}

/// A recurring fixed-notional buy/sell instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcaStrategy {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    /// Quote-asset notional spent per execution.
    pub quote_amount: f64,
    /// Soft stop: once `total_spent` reaches this, the scheduler disables
    /// the strategy.
    pub total_budget: f64,
    pub total_spent: f64,
    pub execution_count: u32,
    pub schedule: Schedule,
    pub enabled: bool,
    pub next_execute_at: DateTime<Utc>,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DcaStrategy {
    pub fn budget_exhausted(&self) -> bool {
        self.total_spent >= self.total_budget - 1e-9
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_execute_at <= now
    }
}

/// Creation request; the store assigns id, timestamps and the first
/// `next_execute_at`.
#[derive(Debug, Clone)]
pub struct NewDcaStrategy {
    pub symbol: String,
    pub side: OrderSide,
    pub quote_amount: f64,
    pub total_budget: f64,
    pub schedule: Schedule,
}
