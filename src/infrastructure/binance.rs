//! Binance REST client
//!
//! Composes the transport and signer into exchange semantics: time sync,
//! account and margin queries, order placement on spot and margin
//! endpoints, open-order listing and cancellation. Signed requests carry
//! ordered parameters plus `timestamp` and `recvWindow`, with the
//! signature as the trailing parameter over everything preceding it.

use crate::domain::entities::order::{
    AccountType, AssetBalance, Kline, MarginAccountSummary, OpenOrder, OrderKind, OrderRequest,
    OrderResponse, SymbolFilters,
};
use crate::domain::entities::price::PriceUpdate;
use crate::domain::repositories::exchange_client::{ExchangeClient, ExchangeError, ExchangeResult};
use crate::infrastructure::signer::{HmacSha256Signer, RequestSigner};
use crate::infrastructure::transport::{fetch_json_with_retry, RetryConfig, TransportError};
use crate::secrets::CredentialStore;
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::OnceCell;
use reqwest::Method;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub const BINANCE_REST_BASE: &str = "https://api.binance.com";

pub struct BinanceClient {
    http: reqwest::Client,
    rest_base: String,
    credentials: Arc<CredentialStore>,
    signer: OnceCell<HmacSha256Signer>,
    retry: RetryConfig,
    recv_window_ms: u64,
    /// serverTime - localTime, refreshed by `sync_time`.
    time_offset_ms: AtomicI64,
}

/// `offset = serverTime - localSendTime - roundTrip/2`, so signed requests
/// stamp themselves with the exchange's clock, not ours.
pub fn compute_offset_ms(server_time_ms: i64, local_send_ms: i64, round_trip_ms: i64) -> i64 {
    server_time_ms - local_send_ms - round_trip_ms / 2
}

/// Join parameters in insertion order. The server re-derives the signature
/// from this exact byte sequence, so order must be preserved.
pub fn build_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Map an order request onto exchange parameters, in the order the order
/// endpoints document them.
pub fn order_params(request: &OrderRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("symbol".to_string(), request.symbol.clone()),
        ("side".to_string(), request.side.to_string()),
        ("type".to_string(), request.kind.to_string()),
    ];
    if request.kind == OrderKind::Limit {
        params.push(("timeInForce".to_string(), "GTC".to_string()));
    }
    if let Some(quantity) = request.quantity {
        params.push(("quantity".to_string(), quantity.to_string()));
    }
    if let Some(quote_quantity) = request.quote_quantity {
        params.push(("quoteOrderQty".to_string(), quote_quantity.to_string()));
    }
    if let Some(price) = request.price {
        params.push(("price".to_string(), price.to_string()));
    }
    if request.account == AccountType::Margin {
        if let Some(side_effect) = request.side_effect {
            params.push(("sideEffectType".to_string(), side_effect.as_param().to_string()));
        }
    }
    params
}

/// Pull the exchange's `msg` field out of a rejection body, falling back to
/// the raw text.
fn rejection_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("msg").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

fn map_transport_error(e: TransportError) -> ExchangeError {
    match e {
        TransportError::Client { status, message } => ExchangeError::Rejected {
            status,
            message: rejection_message(&message),
        },
        other => ExchangeError::Transport(other),
    }
}

/// Parse a field the exchange serializes as a decimal string.
fn str_f64(value: &Value, field: &str) -> ExchangeResult<f64> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| ExchangeError::Malformed(format!("missing or non-numeric '{}'", field)))
}

impl BinanceClient {
    pub fn new(
        rest_base: &str,
        credentials: Arc<CredentialStore>,
        retry: RetryConfig,
        recv_window_ms: u64,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            rest_base: rest_base.trim_end_matches('/').to_string(),
            credentials,
            signer: OnceCell::new(),
            retry,
            recv_window_ms,
            time_offset_ms: AtomicI64::new(0),
        }
    }

    pub fn time_offset_ms(&self) -> i64 {
        self.time_offset_ms.load(Ordering::Relaxed)
    }

    fn timestamp_ms(&self) -> i64 {
        Utc::now().timestamp_millis() + self.time_offset_ms()
    }

    fn signer(&self) -> ExchangeResult<&HmacSha256Signer> {
        self.signer.get_or_try_init(|| {
            let keys = self
                .credentials
                .load()
                .ok_or(ExchangeError::MissingCredentials)?;
            Ok(HmacSha256Signer::new(&keys.api_secret))
        })
    }

    async fn public_get(&self, path: &str, params: &[(String, String)]) -> ExchangeResult<Value> {
        let query = build_query(params);
        let url = if query.is_empty() {
            format!("{}{}", self.rest_base, path)
        } else {
            format!("{}{}?{}", self.rest_base, path, query)
        };
        fetch_json_with_retry(&self.http, Method::GET, &url, &[], &self.retry)
            .await
            .map_err(map_transport_error)
    }

    /// Build the full signed URL: ordered params, then `timestamp` and
    /// `recvWindow`, then the trailing `signature` over everything before it.
    async fn signed_url(&self, path: &str, params: &[(String, String)]) -> ExchangeResult<String> {
        let mut params = params.to_vec();
        params.push(("timestamp".to_string(), self.timestamp_ms().to_string()));
        params.push(("recvWindow".to_string(), self.recv_window_ms.to_string()));
        let query = build_query(&params);
        let signature = self.signer()?.sign(&query).await?;
        Ok(format!(
            "{}{}?{}&signature={}",
            self.rest_base, path, query, signature
        ))
    }

    async fn signed_request(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
    ) -> ExchangeResult<Value> {
        let keys = self
            .credentials
            .load()
            .ok_or(ExchangeError::MissingCredentials)?;
        let url = self.signed_url(path, params).await?;
        let headers = [("X-MBX-APIKEY", keys.api_key.clone())];
        fetch_json_with_retry(&self.http, method, &url, &headers, &self.retry)
            .await
            .map_err(map_transport_error)
    }

    /// 24h ticker stats, used by the dashboard's watchlist views.
    pub async fn ticker_24h(&self, symbol: &str) -> ExchangeResult<PriceUpdate> {
        let params = [("symbol".to_string(), symbol.to_string())];
        let value = self.public_get("/api/v3/ticker/24hr", &params).await?;
        Ok(PriceUpdate {
            symbol: symbol.to_string(),
            last_price: str_f64(&value, "lastPrice")?,
            pct_change_24h: str_f64(&value, "priceChangePercent")?,
        })
    }

    /// Recent candles for a symbol.
    pub async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> ExchangeResult<Vec<Kline>> {
        let params = [
            ("symbol".to_string(), symbol.to_string()),
            ("interval".to_string(), interval.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        let value = self.public_get("/api/v3/klines", &params).await?;
        let rows = value
            .as_array()
            .ok_or_else(|| ExchangeError::Malformed("klines: expected array".to_string()))?;
        rows.iter().map(parse_kline).collect()
    }

    fn parse_open_orders(value: &Value, account: AccountType) -> ExchangeResult<Vec<OpenOrder>> {
        let rows = value
            .as_array()
            .ok_or_else(|| ExchangeError::Malformed("open orders: expected array".to_string()))?;
        rows.iter()
            .map(|row| {
                Ok(OpenOrder {
                    order_id: row
                        .get("orderId")
                        .and_then(|v| v.as_u64())
                        .ok_or_else(|| ExchangeError::Malformed("missing orderId".to_string()))?,
                    symbol: text_field(row, "symbol"),
                    side: text_field(row, "side"),
                    price: text_field(row, "price"),
                    orig_qty: text_field(row, "origQty"),
                    status: text_field(row, "status"),
                    account,
                })
            })
            .collect()
    }
}

fn text_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn parse_kline(row: &Value) -> ExchangeResult<Kline> {
    let cells = row
        .as_array()
        .ok_or_else(|| ExchangeError::Malformed("kline: expected array row".to_string()))?;
    let num = |i: usize| -> ExchangeResult<f64> {
        cells
            .get(i)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| ExchangeError::Malformed(format!("kline: bad cell {}", i)))
    };
    Ok(Kline {
        open_time: cells
            .first()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ExchangeError::Malformed("kline: bad open time".to_string()))?,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
    })
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn name(&self) -> &str {
        "Binance"
    }

    async fn sync_time(&self) -> ExchangeResult<i64> {
        let local_send_ms = Utc::now().timestamp_millis();
        let started = Instant::now();
        let value = self.public_get("/api/v3/time", &[]).await?;
        let round_trip_ms = started.elapsed().as_millis() as i64;

        let server_time_ms = value
            .get("serverTime")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ExchangeError::Malformed("time: missing serverTime".to_string()))?;

        let offset = compute_offset_ms(server_time_ms, local_send_ms, round_trip_ms);
        self.time_offset_ms.store(offset, Ordering::Relaxed);
        debug!("time synced: offset {}ms, rtt {}ms", offset, round_trip_ms);
        Ok(offset)
    }

    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<f64> {
        let params = [("symbol".to_string(), symbol.to_string())];
        let value = self.public_get("/api/v3/ticker/price", &params).await?;
        str_f64(&value, "price")
    }

    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse> {
        let path = match request.account {
            AccountType::Spot => "/api/v3/order",
            AccountType::Margin => "/sapi/v1/margin/order",
        };
        let params = order_params(request);
        let value = self.signed_request(Method::POST, path, &params).await?;
        let response: OrderResponse = serde_json::from_value(value)
            .map_err(|e| ExchangeError::Malformed(format!("order response: {}", e)))?;
        info!(
            "order placed on {}: {} {} {} (id {})",
            request.account, request.side, request.symbol, request.kind, response.order_id
        );
        Ok(response)
    }

    async fn test_order(&self, request: &OrderRequest) -> ExchangeResult<()> {
        let params = order_params(request);
        self.signed_request(Method::POST, "/api/v3/order/test", &params)
            .await?;
        Ok(())
    }

    async fn open_orders(
        &self,
        account: AccountType,
        symbol: Option<&str>,
    ) -> ExchangeResult<Vec<OpenOrder>> {
        let path = match account {
            AccountType::Spot => "/api/v3/openOrders",
            AccountType::Margin => "/sapi/v1/margin/openOrders",
        };
        let mut params = Vec::new();
        if let Some(symbol) = symbol {
            params.push(("symbol".to_string(), symbol.to_string()));
        }
        let value = self.signed_request(Method::GET, path, &params).await?;
        Self::parse_open_orders(&value, account)
    }

    async fn cancel_order(
        &self,
        account: AccountType,
        symbol: &str,
        order_id: u64,
    ) -> ExchangeResult<OrderResponse> {
        let path = match account {
            AccountType::Spot => "/api/v3/order",
            AccountType::Margin => "/sapi/v1/margin/order",
        };
        let params = [
            ("symbol".to_string(), symbol.to_string()),
            ("orderId".to_string(), order_id.to_string()),
        ];
        // An already-filled or already-cancelled order comes back as a
        // rejection from the exchange, which is a normal response here,
        // never a transport retry condition.
        let value = self.signed_request(Method::DELETE, path, &params).await?;
        serde_json::from_value(value)
            .map_err(|e| ExchangeError::Malformed(format!("cancel response: {}", e)))
    }

    async fn account_balances(&self) -> ExchangeResult<Vec<AssetBalance>> {
        let value = self
            .signed_request(Method::GET, "/api/v3/account", &[])
            .await?;
        let balances = value
            .get("balances")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ExchangeError::Malformed("account: missing balances".to_string()))?;
        Ok(balances
            .iter()
            .map(|b| AssetBalance {
                asset: text_field(b, "asset"),
                free: str_f64(b, "free").unwrap_or(0.0),
                locked: str_f64(b, "locked").unwrap_or(0.0),
            })
            .collect())
    }

    async fn margin_account(&self) -> ExchangeResult<MarginAccountSummary> {
        let value = self
            .signed_request(Method::GET, "/sapi/v1/margin/account", &[])
            .await?;
        Ok(MarginAccountSummary {
            margin_level: str_f64(&value, "marginLevel").unwrap_or(999.0),
            total_asset_of_btc: str_f64(&value, "totalAssetOfBtc")?,
            total_liability_of_btc: str_f64(&value, "totalLiabilityOfBtc")?,
            total_net_asset_of_btc: str_f64(&value, "totalNetAssetOfBtc")?,
        })
    }

    async fn max_borrowable(&self, asset: &str) -> ExchangeResult<f64> {
        let params = [("asset".to_string(), asset.to_string())];
        let value = self
            .signed_request(Method::GET, "/sapi/v1/margin/maxBorrowable", &params)
            .await?;
        str_f64(&value, "amount")
    }

    async fn symbol_filters(&self, symbol: &str) -> ExchangeResult<SymbolFilters> {
        let params = [("symbol".to_string(), symbol.to_string())];
        let value = self.public_get("/api/v3/exchangeInfo", &params).await?;
        let filters = value
            .get("symbols")
            .and_then(|v| v.as_array())
            .and_then(|symbols| symbols.first())
            .and_then(|s| s.get("filters"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| ExchangeError::Malformed("exchangeInfo: missing filters".to_string()))?;

        let mut out = SymbolFilters::default();
        for filter in filters {
            match filter.get("filterType").and_then(|v| v.as_str()) {
                Some("LOT_SIZE") => {
                    out.min_qty = str_f64(filter, "minQty").unwrap_or(0.0);
                    out.step_size = str_f64(filter, "stepSize").unwrap_or(0.0);
                }
                Some("PRICE_FILTER") => {
                    out.tick_size = str_f64(filter, "tickSize").unwrap_or(0.0);
                }
                Some("NOTIONAL") | Some("MIN_NOTIONAL") => {
                    out.min_notional = str_f64(filter, "minNotional").unwrap_or(0.0);
                }
                _ => {}
            }
        }
        Ok(out)
    }
}
