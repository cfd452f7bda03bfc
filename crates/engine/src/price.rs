//! Price oracle: token → USD price with a TTL cache in front of an ordered
//! chain of HTTP price sources.
//!
//! Outbound requests share one process-wide [`RateLimiter`]. Recognized
//! stablecoins are pinned to exactly 1.0 after every fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use async_trait::async_trait;
use sentinel_decoders::tokens::TokenTable;
use serde::Deserialize;
use thiserror::Error;

/// Outbound price requests allowed per window.
pub const RATE_LIMIT_MAX_REQUESTS: u32 = 30;

/// Rate limiter window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Per-request timeout for price sources.
const SOURCE_TIMEOUT: Duration = Duration::from_secs(3);

/// Band outside which a stablecoin quote is logged as anomalous.
const STABLECOIN_BAND: (f64, f64) = (0.9, 1.1);

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price request budget exhausted")]
    RateLimited,

    #[error("no source returned a price for {0}")]
    Unavailable(Address),

    #[error("token address is not priceable")]
    UnknownToken,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{source_name} returned status {status}")]
    Status {
        source_name: &'static str,
        status: u16,
    },
}

/// An external USD price feed.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the source answered but has no price for the token.
    async fn fetch(&self, token: Address) -> Result<Option<f64>, PriceError>;
}

// ---------------------------------------------------------------------------
// Rate limiter
// ---------------------------------------------------------------------------

/// Fixed-window request counter shared by every price source.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

#[derive(Debug)]
struct WindowState {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Mutex::new(WindowState {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Count one request. Returns `false` when the current window is spent.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if now.saturating_duration_since(state.started) >= self.window {
            state.started = now;
            state.count = 1;
            return true;
        }
        if state.count >= self.max_requests {
            return false;
        }
        state.count += 1;
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW)
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct PriceCacheEntry {
    price: f64,
    cached_at: Instant,
}

/// TTL cache of token prices. Entries are usable while younger than the TTL.
#[derive(Debug)]
pub struct PriceCache {
    ttl: Duration,
    entries: Mutex<HashMap<Address, PriceCacheEntry>>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_at(&self, token: &Address, now: Instant) -> Option<f64> {
        self.lock()
            .get(token)
            .filter(|e| now.saturating_duration_since(e.cached_at) < self.ttl)
            .map(|e| e.price)
    }

    pub fn insert_at(&self, token: Address, price: f64, now: Instant) {
        self.lock().insert(
            token,
            PriceCacheEntry {
                price,
                cached_at: now,
            },
        );
    }

    /// Forget one token so the next lookup refetches.
    pub fn invalidate(&self, token: &Address) {
        self.lock().remove(token);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Address, PriceCacheEntry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// DEX aggregator keyed by token address; the highest pair price wins.
pub struct DexScreenerSource {
    client: reqwest::Client,
    base_url: String,
}

impl DexScreenerSource {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.dexscreener.com";

    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DexScreenerResponse {
    #[serde(default)]
    pairs: Option<Vec<DexScreenerPair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DexScreenerPair {
    #[serde(default)]
    price_usd: Option<String>,
    #[serde(default)]
    dex_id: Option<String>,
}

#[async_trait]
impl PriceSource for DexScreenerSource {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn fetch(&self, token: Address) -> Result<Option<f64>, PriceError> {
        let url = format!("{}/latest/dex/tokens/{token:#x}", self.base_url);
        let resp = self.client.get(&url).timeout(SOURCE_TIMEOUT).send().await?;
        if !resp.status().is_success() {
            return Err(PriceError::Status {
                source_name: self.name(),
                status: resp.status().as_u16(),
            });
        }
        let body: DexScreenerResponse = resp.json().await?;

        let best = body
            .pairs
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| {
                let price = p.price_usd?.parse::<f64>().ok()?;
                (price.is_finite() && price > 0.0).then_some((price, p.dex_id))
            })
            .max_by(|a, b| a.0.total_cmp(&b.0));

        if let Some((price, dex)) = &best {
            tracing::debug!(token = %token, price, dex = dex.as_deref().unwrap_or("?"), "DexScreener quote");
        }
        Ok(best.map(|(price, _)| price))
    }
}

/// Token-metadata source returning `{ "<address>": { "usd": <price> } }`.
pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
    platform: String,
}

impl CoinGeckoSource {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.coingecko.com";

    pub fn new(client: reqwest::Client, platform: impl Into<String>) -> Self {
        Self::with_base_url(client, Self::DEFAULT_BASE_URL, platform)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        base_url: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            platform: platform.into(),
        }
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch(&self, token: Address) -> Result<Option<f64>, PriceError> {
        let addr = format!("{token:#x}");
        let url = format!(
            "{}/api/v3/simple/token_price/{}",
            self.base_url, self.platform
        );
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("contract_addresses", addr.as_str()),
                ("vs_currencies", "usd"),
            ])
            .timeout(SOURCE_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(PriceError::Status {
                source_name: self.name(),
                status: resp.status().as_u16(),
            });
        }
        let body: HashMap<String, HashMap<String, f64>> = resp.json().await?;

        let price = body
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&addr))
            .and_then(|(_, quote)| quote.get("usd").copied())
            .filter(|p| p.is_finite() && *p > 0.0);
        Ok(price)
    }
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// Cached, rate-limited price lookups over an ordered source chain.
pub struct PriceOracle {
    sources: Vec<Arc<dyn PriceSource>>,
    /// Known but never queried (unreliable quotes).
    disabled_sources: Vec<&'static str>,
    cache: PriceCache,
    limiter: RateLimiter,
    tokens: TokenTable,
}

impl PriceOracle {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, ttl: Duration, tokens: TokenTable) -> Self {
        Self {
            sources,
            disabled_sources: vec!["1inch"],
            cache: PriceCache::new(ttl),
            limiter: RateLimiter::default(),
            tokens,
        }
    }

    /// Production source chain: DEX aggregator first, then token metadata.
    pub fn with_default_sources(ttl: Duration, platform: &str, tokens: TokenTable) -> Self {
        let client = reqwest::Client::new();
        let sources: Vec<Arc<dyn PriceSource>> = vec![
            Arc::new(DexScreenerSource::new(client.clone())),
            Arc::new(CoinGeckoSource::new(client, platform)),
        ];
        Self::new(sources, ttl, tokens)
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// USD price, `0.0` when unknown or unavailable.
    pub async fn get_usd_price(&self, token: Address) -> f64 {
        match self.lookup(token).await {
            Ok(price) => price,
            Err(e) => {
                tracing::debug!(token = %token, error = %e, "No USD price");
                0.0
            }
        }
    }

    pub async fn lookup(&self, token: Address) -> Result<f64, PriceError> {
        self.lookup_at(token, Instant::now()).await
    }

    /// Cache hit, else one rate-limited pass over the sources.
    pub async fn lookup_at(&self, token: Address, now: Instant) -> Result<f64, PriceError> {
        if token.is_zero() {
            return Err(PriceError::UnknownToken);
        }
        if let Some(price) = self.cache.get_at(&token, now) {
            return Ok(price);
        }
        if !self.limiter.try_acquire_at(now) {
            tracing::warn!(token = %token, "Price rate limit reached, skipping fetch");
            return Err(PriceError::RateLimited);
        }

        let mut fetched = None;
        for source in &self.sources {
            match source.fetch(token).await {
                Ok(Some(price)) if price > 0.0 => {
                    tracing::debug!(token = %token, source = source.name(), price, "Price fetched");
                    fetched = Some(price);
                    break;
                }
                Ok(_) => {
                    tracing::debug!(token = %token, source = source.name(), "Source has no price")
                }
                Err(e) => {
                    tracing::warn!(token = %token, source = source.name(), error = %e, "Price source failed")
                }
            }
        }
        if fetched.is_none() {
            tracing::debug!(
                token = %token,
                disabled = ?self.disabled_sources,
                "All enabled price sources exhausted"
            );
        }

        let price = if self.tokens.is_stablecoin(&token) {
            let raw = fetched.unwrap_or(0.0);
            if raw < STABLECOIN_BAND.0 || raw > STABLECOIN_BAND.1 {
                tracing::warn!(
                    token = %token,
                    symbol = self.tokens.symbol(&token).unwrap_or("?"),
                    raw,
                    "Stablecoin quote out of band, pinning to 1.0"
                );
            }
            Some(1.0)
        } else {
            fetched
        };

        match price {
            Some(price) => {
                self.cache.insert_at(token, price, now);
                Ok(price)
            }
            None => Err(PriceError::Unavailable(token)),
        }
    }

    /// Force the next lookup of `token` to refetch.
    pub fn invalidate(&self, token: &Address) {
        self.cache.invalidate(token);
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    pub fn tokens(&self) -> &TokenTable {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const USDT: Address = address!("Fd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9");
    const WETH: Address = address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1");

    struct FixedSource {
        price: Option<f64>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(price: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                price,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PriceSource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch(&self, _token: Address) -> Result<Option<f64>, PriceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.price)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PriceSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self, _token: Address) -> Result<Option<f64>, PriceError> {
            Err(PriceError::Status {
                source_name: "failing",
                status: 500,
            })
        }
    }

    fn oracle(sources: Vec<Arc<dyn PriceSource>>) -> PriceOracle {
        PriceOracle::new(sources, Duration::from_secs(30), TokenTable::new())
    }

    #[test]
    fn test_rate_limiter_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.try_acquire_at(t0));
        assert!(limiter.try_acquire_at(t0));
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(10)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(20)));
        // new window
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(61)));
    }

    #[tokio::test]
    async fn test_stablecoin_pinned_low_quote() {
        let oracle = oracle(vec![FixedSource::new(Some(0.80))]);
        assert_eq!(oracle.get_usd_price(USDT).await, 1.0);
    }

    #[tokio::test]
    async fn test_stablecoin_pinned_high_quote() {
        let oracle = oracle(vec![FixedSource::new(Some(1.15))]);
        assert_eq!(oracle.get_usd_price(USDT).await, 1.0);
    }

    #[tokio::test]
    async fn test_stablecoin_pinned_when_sources_fail() {
        let oracle = oracle(vec![Arc::new(FailingSource)]);
        assert_eq!(oracle.lookup(USDT).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_first_positive_source_wins() {
        let empty = FixedSource::new(None);
        let second = FixedSource::new(Some(3150.5));
        let third = FixedSource::new(Some(1.0));
        let oracle = oracle(vec![
            Arc::new(FailingSource),
            empty.clone(),
            second.clone(),
            third.clone(),
        ]);

        assert_eq!(oracle.lookup(WETH).await.unwrap(), 3150.5);
        assert_eq!(empty.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let source = FixedSource::new(Some(2500.0));
        let oracle = oracle(vec![source.clone()]);
        let t0 = Instant::now();

        oracle.lookup_at(WETH, t0).await.unwrap();
        oracle
            .lookup_at(WETH, t0 + Duration::from_secs(29))
            .await
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        oracle
            .lookup_at(WETH, t0 + Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(oracle.cached_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_is_not_cached() {
        let source = FixedSource::new(None);
        let oracle = oracle(vec![source.clone()]);

        assert!(matches!(
            oracle.lookup(WETH).await,
            Err(PriceError::Unavailable(_))
        ));
        assert_eq!(oracle.get_usd_price(WETH).await, 0.0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(oracle.cached_count(), 0);
    }

    #[tokio::test]
    async fn test_31st_request_in_window_is_rate_limited() {
        let source = FixedSource::new(None);
        let oracle = oracle(vec![source.clone()]);
        let t0 = Instant::now();

        for i in 0..30 {
            let at = t0 + Duration::from_millis(i * 100);
            assert!(matches!(
                oracle.lookup_at(WETH, at).await,
                Err(PriceError::Unavailable(_))
            ));
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 30);

        let result = oracle.lookup_at(WETH, t0 + Duration::from_secs(5)).await;
        assert!(matches!(result, Err(PriceError::RateLimited)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 30);
    }

    #[tokio::test]
    async fn test_zero_address_never_fetched() {
        let source = FixedSource::new(Some(1.0));
        let oracle = oracle(vec![source.clone()]);
        assert!(matches!(
            oracle.lookup(Address::ZERO).await,
            Err(PriceError::UnknownToken)
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let source = FixedSource::new(Some(2.0));
        let oracle = oracle(vec![source.clone()]);
        oracle.lookup(WETH).await.unwrap();
        oracle.invalidate(&WETH);
        oracle.lookup(WETH).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_custom_rate_limiter_budget() {
        let source = FixedSource::new(Some(2.0));
        let oracle = oracle(vec![source.clone()])
            .with_rate_limiter(RateLimiter::new(1, Duration::from_secs(60)));
        let t0 = Instant::now();

        assert_eq!(oracle.lookup_at(WETH, t0).await.unwrap(), 2.0);
        // cache hits do not spend the budget
        assert_eq!(oracle.lookup_at(WETH, t0).await.unwrap(), 2.0);

        let result = oracle.lookup_at(USDT, t0).await;
        assert!(matches!(result, Err(PriceError::RateLimited)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_clear_empties_entries() {
        let cache = PriceCache::new(Duration::from_secs(30));
        let now = Instant::now();
        assert!(cache.is_empty());

        cache.insert_at(WETH, 2500.0, now);
        cache.insert_at(USDT, 1.0, now);
        assert_eq!(cache.len(), 2);
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get_at(&WETH, now), None);
    }
}
