use crate::domain::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    Market,
    Limit,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
        }
    }
}

/// Which account an order is routed to. Spot and margin use different
/// endpoints on the exchange side, so callers must be explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Spot,
    Margin,
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountType::Spot => write!(f, "spot"),
            AccountType::Margin => write!(f, "margin"),
        }
    }
}

/// Margin-only instruction controlling automatic borrowing or repayment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginSideEffect {
    NoSideEffect,
    MarginBuy,
    AutoRepay,
}

impl MarginSideEffect {
    pub fn as_param(&self) -> &'static str {
        match self {
            MarginSideEffect::NoSideEffect => "NO_SIDE_EFFECT",
            MarginSideEffect::MarginBuy => "MARGIN_BUY",
            MarginSideEffect::AutoRepay => "AUTO_REPAY",
        }
    }
}

/// A fully validated order, ready to be signed and submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub account: AccountType,
    /// Base-asset quantity. Mutually exclusive with `quote_quantity`.
    pub quantity: Option<f64>,
    /// Quote-asset notional for market orders (e.g. "spend 50 USDT").
    pub quote_quantity: Option<f64>,
    pub price: Option<f64>,
    pub side_effect: Option<MarginSideEffect>,
}

impl OrderRequest {
    /// Market order sized in the base asset.
    pub fn market(
        symbol: &str,
        side: OrderSide,
        account: AccountType,
        quantity: f64,
    ) -> Result<Self, ValidationError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ValidationError::InvalidQuantity(quantity.to_string()));
        }
        Ok(Self {
            symbol: symbol.to_string(),
            side,
            kind: OrderKind::Market,
            account,
            quantity: Some(quantity),
            quote_quantity: None,
            price: None,
            side_effect: None,
        })
    }

    /// Market order sized in the quote asset (fixed notional).
    pub fn market_quote(
        symbol: &str,
        side: OrderSide,
        account: AccountType,
        quote_quantity: f64,
    ) -> Result<Self, ValidationError> {
        if !quote_quantity.is_finite() || quote_quantity <= 0.0 {
            return Err(ValidationError::InvalidQuantity(quote_quantity.to_string()));
        }
        Ok(Self {
            symbol: symbol.to_string(),
            side,
            kind: OrderKind::Market,
            account,
            quantity: None,
            quote_quantity: Some(quote_quantity),
            price: None,
            side_effect: None,
        })
    }

    /// Limit order. Requires a positive price.
    pub fn limit(
        symbol: &str,
        side: OrderSide,
        account: AccountType,
        quantity: f64,
        price: f64,
    ) -> Result<Self, ValidationError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ValidationError::InvalidQuantity(quantity.to_string()));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(ValidationError::InvalidPrice(price.to_string()));
        }
        Ok(Self {
            symbol: symbol.to_string(),
            side,
            kind: OrderKind::Limit,
            account,
            quantity: Some(quantity),
            quote_quantity: None,
            price: Some(price),
            side_effect: None,
        })
    }

    pub fn with_side_effect(mut self, side_effect: MarginSideEffect) -> Self {
        self.side_effect = Some(side_effect);
        self
    }
}

/// Exchange acknowledgement of a placed order. Numeric amounts stay as the
/// exchange's decimal strings to avoid lossy re-parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    #[serde(rename = "orderId")]
    pub order_id: u64,
    #[serde(rename = "clientOrderId", default)]
    pub client_order_id: String,
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "executedQty", default)]
    pub executed_qty: String,
    #[serde(rename = "cummulativeQuoteQty", default)]
    pub cummulative_quote_qty: String,
    #[serde(rename = "transactTime", default)]
    pub transact_time: i64,
}

/// An open order as returned by the open-orders endpoints, tagged with the
/// account type it was fetched from so merged listings stay distinguishable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: u64,
    pub symbol: String,
    pub side: String,
    pub price: String,
    pub orig_qty: String,
    pub status: String,
    pub account: AccountType,
}

/// Back-reference from a recorded order to what fired it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderOrigin {
    Alert { alert_id: String },
    Dca { strategy_id: String },
}

/// Append-only order history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredOrder {
    pub order: OrderResponse,
    pub origin: OrderOrigin,
    pub recorded_at: DateTime<Utc>,
}

/// One asset balance from the account endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: f64,
    pub locked: f64,
}

/// Condensed margin account state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginAccountSummary {
    pub margin_level: f64,
    pub total_asset_of_btc: f64,
    pub total_liability_of_btc: f64,
    pub total_net_asset_of_btc: f64,
}

/// Per-symbol trading constraints from the exchange-info endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolFilters {
    pub min_qty: f64,
    pub step_size: f64,
    pub tick_size: f64,
    pub min_notional: f64,
}

/// One candle from the kline endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}
