use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One ticker message from the streaming feed.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub symbol: String,
    pub last_price: f64,
    pub pct_change_24h: f64,
}

/// Immutable view of current prices taken for one evaluation pass.
/// The feed publishes a fresh snapshot per update; consumers never see a
/// partially written map.
#[derive(Debug, Clone)]
pub struct PriceSnapshot {
    pub prices: HashMap<String, f64>,
    pub taken_at: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self {
            prices,
            taken_at: Utc::now(),
        }
    }

    pub fn single(symbol: &str, price: f64) -> Self {
        let mut prices = HashMap::new();
        prices.insert(symbol.to_string(), price);
        Self::new(prices)
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn price_of(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }
}

impl Default for PriceSnapshot {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}
