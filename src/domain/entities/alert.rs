use crate::domain::entities::order::{AccountType, OrderSide};
use crate::domain::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the threshold (or which way a trailing stop follows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Above,
    Below,
}

/// The condition an alert watches for. Each variant carries exactly the
/// fields its evaluation needs; trailing stops keep their watermark and
/// current stop price inline because both are mutated as price moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertCondition {
    PriceCross {
        target_price: f64,
        direction: Direction,
    },
    PercentageChange {
        /// Reference price the move is measured from. Must be non-zero;
        /// enforced at creation time.
        base_price: f64,
        threshold_pct: f64,
        direction: Direction,
    },
    TrailingStop {
        trailing_pct: f64,
        direction: Direction,
        /// Best price seen since the stop was armed.
        watermark: f64,
        /// Current trigger price, recomputed on every new watermark.
        stop_price: f64,
    },
    /// Declared for forward compatibility with the dashboard's type union.
    /// There is no evaluation path for this variant.
    VolumeSpike { threshold_pct: f64 },
}

impl AlertCondition {
    /// Arm a trailing stop at the current market price.
    pub fn trailing_stop(direction: Direction, trailing_pct: f64, current_price: f64) -> Self {
        let stop_price = match direction {
            Direction::Above => current_price * (1.0 - trailing_pct / 100.0),
            Direction::Below => current_price * (1.0 + trailing_pct / 100.0),
        };
        AlertCondition::TrailingStop {
            trailing_pct,
            direction,
            watermark: current_price,
            stop_price,
        }
    }

    /// Creation-time invariants for user-supplied values. Percentage
    /// change divides by `base_price`, so zero is rejected here rather
    /// than guarded at every evaluation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            AlertCondition::PriceCross { target_price, .. } => {
                if !target_price.is_finite() || *target_price <= 0.0 {
                    return Err(ValidationError::InvalidPrice(target_price.to_string()));
                }
            }
            AlertCondition::PercentageChange {
                base_price,
                threshold_pct,
                ..
            } => {
                if !base_price.is_finite() || *base_price == 0.0 {
                    return Err(ValidationError::InvalidPrice(base_price.to_string()));
                }
                if !threshold_pct.is_finite() || *threshold_pct <= 0.0 {
                    return Err(ValidationError::InvalidPercentage(threshold_pct.to_string()));
                }
            }
            AlertCondition::TrailingStop { trailing_pct, .. } => {
                if !trailing_pct.is_finite() || *trailing_pct <= 0.0 {
                    return Err(ValidationError::InvalidPercentage(trailing_pct.to_string()));
                }
            }
            AlertCondition::VolumeSpike { threshold_pct } => {
                if !threshold_pct.is_finite() || *threshold_pct <= 0.0 {
                    return Err(ValidationError::InvalidPercentage(threshold_pct.to_string()));
                }
            }
        }
        Ok(())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            AlertCondition::PriceCross { .. } => "price cross",
            AlertCondition::PercentageChange { .. } => "percentage change",
            AlertCondition::TrailingStop { .. } => "trailing stop",
            AlertCondition::VolumeSpike { .. } => "volume spike",
        }
    }
}

/// Alert lifecycle. `Active` is the only state the engine evaluates;
/// the other two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Triggered,
    Cancelled,
}

/// Trade to fire when the alert triggers. Evaluated only at trigger time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeConfig {
    pub side: OrderSide,
    pub quantity: f64,
    pub account: AccountType,
}

/// Per-alert audio behavior for the trigger cue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPreference {
    /// Loop the alarm until explicitly silenced, instead of a one-shot cue.
    pub looping: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub symbol: String,
    pub condition: AlertCondition,
    pub status: AlertStatus,
    pub audio: AudioPreference,
    pub trade: Option<TradeConfig>,
    pub created_at: DateTime<Utc>,
    pub triggered_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    /// Human-readable trigger description for notifications.
    pub fn describe_trigger(&self, price: f64) -> String {
        format!(
            "{} alert on {} triggered at {}",
            self.condition.kind_name(),
            self.symbol,
            price
        )
    }
}

/// Creation request; the store assigns id, timestamps and initial status.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub symbol: String,
    pub condition: AlertCondition,
    pub audio: AudioPreference,
    pub trade: Option<TradeConfig>,
}

impl NewAlert {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::InvalidSymbol(self.symbol.clone()));
        }
        self.condition.validate()
    }
}
