//! Exchange client abstraction
//!
//! Seam between the engine and the exchange REST implementation so the
//! dispatcher and scheduler can be exercised against mocks.

use crate::domain::entities::order::{
    AccountType, AssetBalance, MarginAccountSummary, OpenOrder, OrderRequest, OrderResponse,
    SymbolFilters,
};
use crate::infrastructure::signer::SignerError;
use crate::infrastructure::transport::TransportError;
use async_trait::async_trait;
use thiserror::Error;

pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("No API keys configured")]
    MissingCredentials,

    /// The exchange refused the request; carries the HTTP status and the
    /// parsed exchange message.
    #[error("exchange rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn name(&self) -> &str;

    /// Measure clock offset against the exchange and cache it for signed
    /// requests. Returns the new offset in milliseconds.
    async fn sync_time(&self) -> ExchangeResult<i64>;

    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<f64>;

    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse>;

    /// Validate an order against exchange filters without placing it.
    async fn test_order(&self, request: &OrderRequest) -> ExchangeResult<()>;

    async fn open_orders(
        &self,
        account: AccountType,
        symbol: Option<&str>,
    ) -> ExchangeResult<Vec<OpenOrder>>;

    async fn cancel_order(
        &self,
        account: AccountType,
        symbol: &str,
        order_id: u64,
    ) -> ExchangeResult<OrderResponse>;

    async fn account_balances(&self) -> ExchangeResult<Vec<AssetBalance>>;

    async fn margin_account(&self) -> ExchangeResult<MarginAccountSummary>;

    async fn max_borrowable(&self, asset: &str) -> ExchangeResult<f64>;

    async fn symbol_filters(&self, symbol: &str) -> ExchangeResult<SymbolFilters>;
}
