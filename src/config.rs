use crate::infrastructure::transport::RetryConfig;
use std::path::PathBuf;

/// Runtime configuration for the engine
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub symbols: Vec<String>,
    pub data_dir: PathBuf,
    pub rest_base: String,
    pub ws_base: String,
    pub poll_interval_secs: u64,
    pub dca_check_interval_secs: u64,
    pub recv_window_ms: u64,
    pub order_history_cap: usize,
    pub dispatch_queue_size: usize,
    pub retry: RetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            symbols: vec![
                "BTCUSDT".to_string(),
                "ETHUSDT".to_string(),
                "SOLUSDT".to_string(),
                "BNBUSDT".to_string(),
            ],
            data_dir: PathBuf::from("data"),
            rest_base: "https://api.binance.com".to_string(),
            ws_base: "wss://stream.binance.com:9443".to_string(),
            poll_interval_secs: 10,
            dca_check_interval_secs: 30,
            recv_window_ms: 10_000,
            order_history_cap: 200,
            dispatch_queue_size: 64,
            retry: RetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or out of range.
    pub fn from_env() -> AppConfig {
        let mut config = AppConfig::default();

        if let Ok(symbols) = std::env::var("TICKWATCH_SYMBOLS") {
            let parsed: Vec<String> = symbols
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if parsed.is_empty() {
                tracing::warn!(
                    "TICKWATCH_SYMBOLS is set but empty, using defaults: {:?}",
                    config.symbols
                );
            } else {
                config.symbols = parsed;
            }
        }

        if let Ok(dir) = std::env::var("TICKWATCH_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        if let Ok(base) = std::env::var("TICKWATCH_REST_BASE") {
            if !base.is_empty() {
                config.rest_base = base;
            }
        }

        if let Ok(base) = std::env::var("TICKWATCH_WS_BASE") {
            if !base.is_empty() {
                config.ws_base = base;
            }
        }

        if let Ok(interval) = std::env::var("TICKWATCH_POLL_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(value) if value >= 1 => config.poll_interval_secs = value,
                Ok(value) => tracing::warn!(
                    "Invalid TICKWATCH_POLL_INTERVAL_SECS value: {} (must be >= 1), using default: {}",
                    value,
                    config.poll_interval_secs
                ),
                Err(e) => tracing::warn!(
                    "Failed to parse TICKWATCH_POLL_INTERVAL_SECS '{}': {}, using default: {}",
                    interval,
                    e,
                    config.poll_interval_secs
                ),
            }
        }

        if let Ok(interval) = std::env::var("TICKWATCH_DCA_CHECK_INTERVAL_SECS") {
            if let Ok(value) = interval.parse::<u64>() {
                if value >= 1 {
                    config.dca_check_interval_secs = value;
                }
            }
        }

        if let Ok(window) = std::env::var("TICKWATCH_RECV_WINDOW_MS") {
            match window.parse::<u64>() {
                // the exchange rejects recvWindow above 60s
                Ok(value) if (1_000..=60_000).contains(&value) => config.recv_window_ms = value,
                Ok(value) => tracing::warn!(
                    "Invalid TICKWATCH_RECV_WINDOW_MS value: {} (must be 1000..=60000), using default: {}",
                    value,
                    config.recv_window_ms
                ),
                Err(e) => tracing::warn!(
                    "Failed to parse TICKWATCH_RECV_WINDOW_MS '{}': {}, using default: {}",
                    window,
                    e,
                    config.recv_window_ms
                ),
            }
        }

        if let Ok(cap) = std::env::var("TICKWATCH_ORDER_HISTORY_CAP") {
            if let Ok(value) = cap.parse::<usize>() {
                if value >= 1 {
                    config.order_history_cap = value;
                }
            }
        }

        if let Ok(size) = std::env::var("TICKWATCH_DISPATCH_QUEUE") {
            if let Ok(value) = size.parse::<usize>() {
                if value >= 1 {
                    config.dispatch_queue_size = value;
                }
            }
        }

        if let Ok(attempts) = std::env::var("TICKWATCH_RETRY_MAX_ATTEMPTS") {
            if let Ok(value) = attempts.parse::<u32>() {
                if (1..=10).contains(&value) {
                    config.retry.max_attempts = value;
                }
            }
        }

        if let Ok(delay) = std::env::var("TICKWATCH_RETRY_BASE_DELAY_MS") {
            if let Ok(value) = delay.parse::<u64>() {
                if value >= 1 {
                    config.retry.base_delay_ms = value;
                }
            }
        }

        config
    }
}
