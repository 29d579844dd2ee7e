//! Trade Dispatcher
//!
//! Turns a triggered alert or due DCA strategy into a concrete order,
//! records the result to order history, and reports success or failure as
//! a discriminated value. Failures at this boundary are user-facing
//! conditions, never panics, so the loops above can keep processing.
//! Retries belong to the transport layer below; the dispatcher never
//! retries on its own.

use crate::domain::entities::order::{
    AccountType, OrderOrigin, OrderRequest, OrderResponse, OrderSide,
};
use crate::domain::repositories::exchange_client::ExchangeClient;
use crate::persistence::order_history::OrderHistory;
use crate::secrets::CredentialStore;
use std::sync::Arc;
use tracing::{info, warn};

/// What fired the trade.
#[derive(Debug, Clone)]
pub enum TriggerSource {
    Alert {
        alert_id: String,
        symbol: String,
        side: OrderSide,
        quantity: f64,
        account: AccountType,
    },
    Dca {
        strategy_id: String,
        symbol: String,
        side: OrderSide,
        quote_amount: f64,
    },
}

impl TriggerSource {
    pub fn symbol(&self) -> &str {
        match self {
            TriggerSource::Alert { symbol, .. } => symbol,
            TriggerSource::Dca { symbol, .. } => symbol,
        }
    }

    fn origin(&self) -> OrderOrigin {
        match self {
            TriggerSource::Alert { alert_id, .. } => OrderOrigin::Alert {
                alert_id: alert_id.clone(),
            },
            TriggerSource::Dca { strategy_id, .. } => OrderOrigin::Dca {
                strategy_id: strategy_id.clone(),
            },
        }
    }

    fn order_request(&self) -> Result<OrderRequest, String> {
        match self {
            TriggerSource::Alert {
                symbol,
                side,
                quantity,
                account,
                ..
            } => OrderRequest::market(symbol, *side, *account, *quantity).map_err(String::from),
            TriggerSource::Dca {
                symbol,
                side,
                quote_amount,
                ..
            } => OrderRequest::market_quote(symbol, *side, AccountType::Spot, *quote_amount)
                .map_err(String::from),
        }
    }
}

/// Discriminated dispatch result. `error` carries the underlying message
/// verbatim for display.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub success: bool,
    pub order: Option<OrderResponse>,
    pub error: Option<String>,
}

impl DispatchOutcome {
    fn ok(order: OrderResponse) -> Self {
        Self {
            success: true,
            order: Some(order),
            error: None,
        }
    }

    fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            order: None,
            error: Some(error.into()),
        }
    }
}

pub struct TradeDispatcher {
    exchange: Arc<dyn ExchangeClient>,
    credentials: Arc<CredentialStore>,
    history: Arc<OrderHistory>,
}

impl TradeDispatcher {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        credentials: Arc<CredentialStore>,
        history: Arc<OrderHistory>,
    ) -> Self {
        Self {
            exchange,
            credentials,
            history,
        }
    }

    pub async fn execute(&self, source: TriggerSource) -> DispatchOutcome {
        if !self.credentials.has_keys() {
            return DispatchOutcome::fail("No API keys configured");
        }

        // Cheap, and avoids clock-skew rejections after long idle periods.
        if let Err(e) = self.exchange.sync_time().await {
            warn!("time sync failed before dispatch: {}", e);
            return DispatchOutcome::fail(e.to_string());
        }

        let request = match source.order_request() {
            Ok(request) => request,
            Err(e) => return DispatchOutcome::fail(e),
        };

        match self.exchange.place_order(&request).await {
            Ok(order) => {
                info!(
                    "dispatched {} {} for {} (order {})",
                    request.side,
                    request.symbol,
                    source.symbol(),
                    order.order_id
                );
                if let Err(e) = self.history.record(&order, source.origin()) {
                    warn!("order placed but history write failed: {}", e);
                }
                DispatchOutcome::ok(order)
            }
            Err(e) => {
                warn!("dispatch failed for {}: {}", source.symbol(), e);
                DispatchOutcome::fail(e.to_string())
            }
        }
    }
}
