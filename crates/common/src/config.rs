use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

/// Default price cache lifetime when `TOKEN_PRICE_CACHE_TTL` is unset or invalid.
pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(30);

/// Wallet flagged in transfer alerts unless overridden by `SPECIAL_WALLET`.
pub const DEFAULT_SPECIAL_WALLET: &str = "0x049A025EA9e0807f2fd38c62923fCe688cBd8460";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Ledger RPC endpoint (ws:// enables live subscriptions, http:// degrades to polling)
    pub rpc_url: String,

    /// Raw JSON-RPC endpoint used when typed block decoding fails
    pub raw_rpc_url: String,

    /// Wallet profile name (`prod` or `test`)
    pub wallet_profile: String,

    /// Extra watched addresses (comma-separated in `WATCH_EXTRA_ADDRESSES`)
    pub extra_watch_addresses: Vec<String>,

    /// Wallet whose involvement is flagged in transfer alerts
    pub special_wallet: Address,

    /// Directory holding `<address>.json` interface descriptors
    pub abi_dir: PathBuf,

    /// Run the startup backfill scan
    pub bootstrap_enable: bool,

    /// Backfill depth in blocks (default: 2000)
    pub bootstrap_blocks: u64,

    /// Maximum backfill window in blocks (default: 500)
    pub bootstrap_max_window: u64,

    /// Push backfill results to the notification queue
    pub bootstrap_notify: bool,

    /// Overall backfill deadline in seconds (default: 120)
    pub bootstrap_timeout_secs: u64,

    /// Native scanner starts this many blocks below head (default: 0)
    pub native_backfill_blocks: u64,

    /// Native scanner tick in milliseconds (default: 3000)
    pub native_scan_interval_ms: u64,

    /// Symbol of the chain's base asset used in messages
    pub native_symbol: String,

    /// Token price cache lifetime
    pub token_price_ttl: Duration,

    /// USD value at or above which a transfer is important (default: 50.0)
    pub usd_threshold: f64,

    /// USD price of the native asset (default: 3000.0)
    pub native_usd_price: f64,

    /// Platform id used by the token-metadata price source
    pub price_chain_platform: String,

    /// Flush as soon as an important event is pending
    pub immediate_important: bool,

    /// Aggregator flush interval in milliseconds (default: 5000)
    pub flush_interval_ms: u64,

    /// Telegram bot token
    pub telegram_bot_token: Option<String>,

    /// Primary destination chat id
    pub primary_chat_id: Option<i64>,

    /// Secondary destination chat id (important alerts)
    pub secondary_chat_id: Option<i64>,

    /// Verbose logging
    pub debug_mode: bool,

    /// Control surface bind host
    pub api_host: String,

    /// Control surface bind port
    pub api_port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let rpc_url = std::env::var("RPC_URL")
            .map_err(|_| anyhow::anyhow!("RPC_URL environment variable is required"))?;
        let raw_rpc_url = non_empty("RAW_RPC_URL").unwrap_or_else(|| http_equivalent(&rpc_url));

        let special_wallet = non_empty("SPECIAL_WALLET")
            .unwrap_or_else(|| DEFAULT_SPECIAL_WALLET.to_string())
            .parse::<Address>()
            .map_err(|_| anyhow::anyhow!("SPECIAL_WALLET must be a valid address"))?;

        let native_usd_price =
            positive_or(&["NATIVE_USD_PRICE", "IMPORTANT_NATIVE_PRICE"], 3000.0)?;
        let usd_threshold = positive_or(&["USD_THRESHOLD"], 50.0)?;
        let primary_chat = chat_id(first_non_empty(&["TELEGRAM_CHAT_ID_1", "TELEGRAM_CHAT_ID"]))?;

        Ok(Self {
            rpc_url,
            raw_rpc_url,
            wallet_profile: non_empty("WALLET_PROFILE").unwrap_or_else(|| "prod".to_string()),
            extra_watch_addresses: non_empty("WATCH_EXTRA_ADDRESSES")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            special_wallet,
            abi_dir: PathBuf::from(non_empty("ABI_DIR").unwrap_or_else(|| "abis".to_string())),
            bootstrap_enable: !is_false("BOOTSTRAP_ENABLE"),
            bootstrap_blocks: parse_or("BOOTSTRAP_BLOCKS", 2000)?,
            bootstrap_max_window: parse_or("BOOTSTRAP_MAX_WINDOW", 500)?,
            bootstrap_notify: !is_false("BOOTSTRAP_NOTIFY"),
            bootstrap_timeout_secs: parse_or("BOOTSTRAP_TIMEOUT_SECS", 120)?,
            native_backfill_blocks: parse_or("NATIVE_BACKFILL_BLOCKS", 0)?,
            native_scan_interval_ms: parse_or("NATIVE_SCAN_INTERVAL_MS", 3000)?,
            native_symbol: non_empty("NATIVE_SYMBOL").unwrap_or_else(|| "ETH".to_string()),
            token_price_ttl: non_empty("TOKEN_PRICE_CACHE_TTL")
                .and_then(|v| parse_price_ttl(&v))
                .unwrap_or(DEFAULT_PRICE_TTL),
            usd_threshold,
            native_usd_price,
            price_chain_platform: non_empty("PRICE_CHAIN_PLATFORM")
                .unwrap_or_else(|| "arbitrum-one".to_string()),
            immediate_important: is_true("IMMEDIATE_IMPORTANT"),
            flush_interval_ms: parse_or("FLUSH_INTERVAL_MS", 5000)?,
            telegram_bot_token: non_empty("TELEGRAM_BOT_TOKEN")
                .map(|t| t.trim_matches(|c| c == '"' || c == '\'').to_string()),
            primary_chat_id: primary_chat,
            secondary_chat_id: chat_id(non_empty("TELEGRAM_CHAT_ID_2"))?,
            debug_mode: is_true("DEBUG_MODE"),
            api_host: non_empty("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse_or("API_PORT", 8080)?,
        })
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn native_scan_interval(&self) -> Duration {
        Duration::from_millis(self.native_scan_interval_ms)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }
}

/// Interpret a `TOKEN_PRICE_CACHE_TTL` value.
///
/// Values of 1.0 or more are whole minutes (fraction dropped); smaller positive
/// values are fractions of a minute, so `0.5` means thirty seconds.
pub fn parse_price_ttl(value: &str) -> Option<Duration> {
    let minutes = value.trim().parse::<f64>().ok()?;
    if !minutes.is_finite() || minutes <= 0.0 {
        return None;
    }
    if minutes >= 1.0 {
        Some(Duration::from_secs((minutes.trunc() as u64).saturating_mul(60)))
    } else {
        Some(Duration::from_secs((minutes * 60.0).trunc() as u64))
    }
}

/// Rewrite a websocket endpoint into its plain HTTP counterpart.
pub fn http_equivalent(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        url.to_string()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_true(key: &str) -> bool {
    non_empty(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn is_false(key: &str) -> bool {
    non_empty(key).is_some_and(|v| v.eq_ignore_ascii_case("false"))
}

/// Value of the first of `keys` that is set.
fn first_non_empty(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| non_empty(key))
}

fn positive_f64(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && *f > 0.0)
}

/// Positive float from the first set key, `default` when none is set.
fn positive_or(keys: &[&str], default: f64) -> anyhow::Result<f64> {
    let Some(value) = first_non_empty(keys) else {
        return Ok(default);
    };
    let name = keys.first().copied().unwrap_or_default();
    positive_f64(&value).ok_or_else(|| anyhow::anyhow!("{name} must be a positive number"))
}

fn parse_or<T: FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match non_empty(key) {
        Some(v) => v
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} must be a valid {}", std::any::type_name::<T>())),
        None => Ok(default),
    }
}

fn chat_id(value: Option<String>) -> anyhow::Result<Option<i64>> {
    value
        .map(|v| {
            v.trim_matches(|c| c == '"' || c == '\'')
                .parse::<i64>()
                .map_err(|_| anyhow::anyhow!("Telegram chat id '{v}' must be an integer"))
        })
        .transpose()
}
