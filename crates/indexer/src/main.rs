use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use sentinel_api::routes::create_router;
use sentinel_api::state::AppState;
use sentinel_common::config::AppConfig;
use sentinel_common::watchlist::WatchList;
use sentinel_decoders::{EventNameResolver, TokenTable, load_abi_dir};
use sentinel_engine::classifier::{ClassifierSettings, EventClassifier};
use sentinel_engine::dedup::DedupStore;
use sentinel_engine::price::PriceOracle;
use sentinel_indexer::backfill::{BackfillScanner, BackfillSettings};
use sentinel_indexer::native::NativeScanner;
use sentinel_indexer::pipeline::Pipeline;
use sentinel_indexer::rpc::{AlloyLedger, LedgerClient};
use sentinel_indexer::subscription::{LogFilterKind, LogSubscription};
use sentinel_notifier::aggregator::{Aggregator, AggregatorSettings, Routes};
use sentinel_notifier::queue::{DEFAULT_QUEUE_CAPACITY, NotificationQueue};
use sentinel_notifier::sink::{LogSink, MessageSink};
use sentinel_notifier::telegram::TelegramClient;

const DEDUP_EVICT_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(config.debug_mode);

    tracing::info!("Sentinel starting...");

    // Dial failure is fatal
    let ledger = AlloyLedger::connect(&config.rpc_url, &config.raw_rpc_url)
        .await
        .context("failed to connect to RPC endpoint")?;
    match ledger.chain_id().await {
        Ok(chain_id) => tracing::info!(chain_id, raw_rpc = %config.raw_rpc_url, "RPC connected"),
        Err(e) => tracing::warn!(error = %e, "RPC connected, chain id unavailable"),
    }
    let ledger: Arc<dyn LedgerClient> = Arc::new(ledger);

    let watch = Arc::new(WatchList::from_profile(
        &config.wallet_profile,
        &config.extra_watch_addresses,
    ));
    let sample: Vec<String> = watch
        .addresses()
        .iter()
        .take(5)
        .map(|a| a.to_string())
        .collect();
    tracing::info!(
        profile = %config.wallet_profile,
        watched = watch.len(),
        sample = %sample.join(", "),
        "Watching addresses"
    );

    let mut resolver = EventNameResolver::new();
    match load_abi_dir(&config.abi_dir, &mut resolver) {
        Ok(events) => tracing::info!(dir = %config.abi_dir.display(), events, "Interface descriptors loaded"),
        Err(e) => tracing::warn!(dir = %config.abi_dir.display(), error = %e, "Interface descriptors not loaded"),
    }

    let oracle = Arc::new(PriceOracle::with_default_sources(
        config.token_price_ttl,
        &config.price_chain_platform,
        TokenTable::new(),
    ));
    let classifier = Arc::new(EventClassifier::new(
        watch.clone(),
        Arc::new(resolver),
        oracle.clone(),
        ClassifierSettings {
            usd_threshold: config.usd_threshold,
            native_usd_price: config.native_usd_price,
            native_symbol: config.native_symbol.clone(),
            special_wallet: config.special_wallet,
        },
    ));
    let dedup = Arc::new(DedupStore::new());
    let (queue, rx) = NotificationQueue::channel(DEFAULT_QUEUE_CAPACITY);

    // Notification delivery
    let mut routes = Routes {
        primary: config.primary_chat_id,
        secondary: config.secondary_chat_id,
    };
    let sink: Arc<dyn MessageSink> = match &config.telegram_bot_token {
        Some(token) => Arc::new(
            TelegramClient::new(token.as_str())
                .with_default_chat(config.primary_chat_id),
        ),
        None => {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set, notifications are only logged");
            routes.primary = routes.primary.or(Some(0));
            Arc::new(LogSink)
        }
    };
    if routes.primary.is_none() && routes.secondary.is_none() {
        tracing::warn!("No destination chat configured, notifications will be dropped");
    }
    let aggregator = Aggregator::new(
        sink,
        routes,
        AggregatorSettings {
            flush_interval: config.flush_interval(),
            immediate_important: config.immediate_important,
            ..Default::default()
        },
    );
    tokio::spawn(aggregator.run(rx));

    let pipeline = Arc::new(Pipeline::new(
        ledger,
        watch.clone(),
        classifier,
        dedup.clone(),
        queue.clone(),
    ));

    if config.bootstrap_enable {
        let scanner = BackfillScanner::new(
            pipeline.clone(),
            BackfillSettings {
                depth: config.bootstrap_blocks,
                max_window: config.bootstrap_max_window,
                timeout: config.bootstrap_timeout(),
                notify: config.bootstrap_notify,
                ..Default::default()
            },
        );
        tokio::spawn(scanner.run());
    } else {
        tracing::info!("Backfill disabled");
    }

    let native = NativeScanner::new(pipeline.clone())
        .with_interval(config.native_scan_interval())
        .with_backfill(config.native_backfill_blocks);
    let native_mode = native.raw_mode();
    tokio::spawn(native.run());

    for kind in [
        LogFilterKind::AllAddresses,
        LogFilterKind::TransferFrom,
        LogFilterKind::TransferTo,
    ] {
        tokio::spawn(LogSubscription::new(kind, pipeline.clone()).run());
    }

    let evictor = dedup.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DEDUP_EVICT_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = evictor.evict_expired();
            if removed > 0 {
                tracing::debug!(removed, remaining = evictor.len(), "Dedup records evicted");
            }
        }
    });

    // Control surface
    let state = AppState::new(watch, queue, dedup, oracle)
        .with_native_mode(native_mode);
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.api_host, config.api_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "API server listening");

    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "API server exited with error");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping...");
        }
    }

    tracing::info!("Sentinel stopped.");
    Ok(())
}

fn init_tracing(debug_mode: bool) {
    let level = if debug_mode { "debug" } else { "info" };
    let default_directive = format!(
        "sentinel={level},sentinel_indexer={level},sentinel_engine={level},sentinel_notifier={level},sentinel_decoders={level},sentinel_common={level},sentinel_api={level},tower_http=info"
    );
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let pretty = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("pretty"));
    if pretty {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    }
}
