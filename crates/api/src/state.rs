//! Shared application state for the control surface.

use std::sync::Arc;

use sentinel_common::mode::RawModeHandle;
use sentinel_common::watchlist::WatchList;
use sentinel_engine::dedup::DedupStore;
use sentinel_engine::price::PriceOracle;
use sentinel_notifier::queue::NotificationQueue;

/// Handles into the live pipeline, shared with every route via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub watch: Arc<WatchList>,
    pub queue: NotificationQueue,
    pub dedup: Arc<DedupStore>,
    pub oracle: Arc<PriceOracle>,
    /// Absent when the native scanner is not running
    pub native_mode: Option<RawModeHandle>,
}

impl AppState {
    pub fn new(
        watch: Arc<WatchList>,
        queue: NotificationQueue,
        dedup: Arc<DedupStore>,
        oracle: Arc<PriceOracle>,
    ) -> Self {
        Self {
            watch,
            queue,
            dedup,
            oracle,
            native_mode: None,
        }
    }

    pub fn with_native_mode(mut self, handle: RawModeHandle) -> Self {
        self.native_mode = Some(handle);
        self
    }
}
