//! Price feed actor
//!
//! Maintains a combined ticker stream over WebSocket and publishes an
//! immutable [`PriceSnapshot`] through a watch channel on every update.
//! When the stream drops or fails to connect, the actor falls back to
//! REST polling for a cooldown period, then attempts the stream again.
//! Consumers only ever observe whole snapshots.

use crate::domain::entities::price::{PriceSnapshot, PriceUpdate};
use crate::domain::repositories::exchange_client::ExchangeClient;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

/// How long to stay on REST polling after a stream failure before the
/// next WebSocket attempt.
const STREAM_RETRY_COOLDOWN: Duration = Duration::from_secs(60);

pub struct PriceFeed {
    ws_base: String,
    symbols: Vec<String>,
    exchange: Arc<dyn ExchangeClient>,
    poll_interval: Duration,
    tx: watch::Sender<PriceSnapshot>,
    prices: HashMap<String, f64>,
}

impl PriceFeed {
    /// Returns the actor and the receiver side consumers subscribe to.
    /// The channel starts with an empty snapshot, which evaluation skips.
    pub fn new(
        ws_base: &str,
        symbols: Vec<String>,
        exchange: Arc<dyn ExchangeClient>,
        poll_interval: Duration,
    ) -> (Self, watch::Receiver<PriceSnapshot>) {
        let (tx, rx) = watch::channel(PriceSnapshot::default());
        (
            Self {
                ws_base: ws_base.trim_end_matches('/').to_string(),
                symbols,
                exchange,
                poll_interval,
                tx,
                prices: HashMap::new(),
            },
            rx,
        )
    }

    fn stream_url(&self) -> String {
        combined_stream_url(&self.ws_base, &self.symbols)
    }

    fn publish(&mut self, update: PriceUpdate) {
        self.prices.insert(update.symbol, update.last_price);
        let _ = self.tx.send(PriceSnapshot::new(self.prices.clone()));
    }

    pub async fn run(mut self) {
        loop {
            match self.stream_once().await {
                Ok(()) => info!("price stream closed by server"),
                Err(e) => warn!("price stream failed: {}", e),
            }
            info!(
                "falling back to REST polling for {:?}",
                STREAM_RETRY_COOLDOWN
            );
            self.poll_for(STREAM_RETRY_COOLDOWN).await;
        }
    }

    async fn stream_once(&mut self) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let url = self.stream_url();
        info!("connecting price stream: {}", url);
        let (stream, _) = connect_async(url.as_str()).await?;
        let (_, mut read) = stream.split();

        while let Some(message) = read.next().await {
            match message? {
                Message::Text(text) => match parse_ticker_message(&text) {
                    Some(update) => self.publish(update),
                    None => debug!("ignoring non-ticker frame"),
                },
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(frame) => {
                    debug!("close frame: {:?}", frame);
                    break;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// REST fallback: one full sweep of the symbol list per interval.
    /// Partial sweeps still publish whatever succeeded.
    async fn poll_for(&mut self, duration: Duration) {
        let deadline = tokio::time::Instant::now() + duration;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        while tokio::time::Instant::now() < deadline {
            ticker.tick().await;
            for symbol in self.symbols.clone() {
                match self.exchange.ticker_price(&symbol).await {
                    Ok(price) => {
                        self.prices.insert(symbol, price);
                    }
                    Err(e) => warn!("poll failed for {}: {}", symbol, e),
                }
            }
            if !self.prices.is_empty() {
                let _ = self.tx.send(PriceSnapshot::new(self.prices.clone()));
            }
        }
    }
}

/// Combined-stream endpoint for a set of symbols, one `@ticker` stream
/// per symbol, lowercase per the exchange's stream naming.
pub fn combined_stream_url(ws_base: &str, symbols: &[String]) -> String {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@ticker", s.to_lowercase()))
        .collect();
    format!(
        "{}/stream?streams={}",
        ws_base.trim_end_matches('/'),
        streams.join("/")
    )
}

/// Parse one combined-stream frame. The payload of interest looks like
/// `{"stream":"btcusdt@ticker","data":{"s":"BTCUSDT","c":"50000.00","P":"2.5",...}}`.
/// Anything else (subscription acks, unknown events) yields `None`.
pub fn parse_ticker_message(text: &str) -> Option<PriceUpdate> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let data = value.get("data")?;
    let symbol = data.get("s")?.as_str()?.to_string();
    let last_price: f64 = data.get("c")?.as_str()?.parse().ok()?;
    let pct_change_24h: f64 = data
        .get("P")
        .and_then(|p| p.as_str())
        .and_then(|p| p.parse().ok())
        .unwrap_or(0.0);
    Some(PriceUpdate {
        symbol,
        last_price,
        pct_change_24h,
    })
}
