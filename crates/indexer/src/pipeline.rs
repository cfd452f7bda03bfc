//! Shared path from raw ingestion output to the notification queue.

use std::sync::Arc;
use std::time::Instant;

use sentinel_common::types::{ClassifiedEvent, RawLogEvent, RawNativeTransfer};
use sentinel_common::watchlist::WatchList;
use sentinel_decoders::relevance::is_relevant;
use sentinel_engine::classifier::EventClassifier;
use sentinel_engine::dedup::DedupStore;
use sentinel_notifier::queue::NotificationQueue;

use crate::rpc::LedgerClient;

pub struct Pipeline {
    ledger: Arc<dyn LedgerClient>,
    watch: Arc<WatchList>,
    classifier: Arc<EventClassifier>,
    dedup: Arc<DedupStore>,
    queue: NotificationQueue,
}

impl Pipeline {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        watch: Arc<WatchList>,
        classifier: Arc<EventClassifier>,
        dedup: Arc<DedupStore>,
        queue: NotificationQueue,
    ) -> Self {
        Self {
            ledger,
            watch,
            classifier,
            dedup,
            queue,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    pub fn watch(&self) -> &Arc<WatchList> {
        &self.watch
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    /// Handle one log from a live path (subscription or polling).
    ///
    /// A relevant log whose transaction moves native value to or from a
    /// watched address is reported as a native transfer instead.
    /// Returns whether anything was enqueued.
    pub async fn handle_live_log(&self, log: RawLogEvent) -> bool {
        if !is_relevant(&log, &self.watch) {
            return false;
        }

        if let Some(tx_hash) = log.tx_hash
            && !self.dedup.contains_at(&tx_hash, Instant::now())
        {
            match self.ledger.transaction(tx_hash).await {
                Ok(Some(transfer)) if self.is_watched_value_transfer(&transfer) => {
                    return self.handle_native(transfer).await;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(tx = %tx_hash, error = %e, "Transaction lookup for live log failed");
                }
            }
        }

        match self.classifier.classify_log(&log).await {
            Some(event) => self.queue.push(event),
            None => false,
        }
    }

    /// Relevance filter plus classification, without enqueueing.
    pub async fn classify_log(&self, log: &RawLogEvent) -> Option<ClassifiedEvent> {
        if !is_relevant(log, &self.watch) {
            return None;
        }
        self.classifier.classify_log(log).await
    }

    /// Dedup, enrich and enqueue a native transfer.
    pub async fn handle_native(&self, transfer: RawNativeTransfer) -> bool {
        if !self.is_watched_value_transfer(&transfer) {
            return false;
        }
        if !self.dedup.check_and_set(transfer.tx_hash) {
            return false;
        }

        let receipt = match self.ledger.receipt(transfer.tx_hash).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::debug!(tx = %transfer.tx_hash, error = %e, "Receipt unavailable");
                None
            }
        };

        match self.classifier.classify_native(&transfer, receipt) {
            Some(event) => {
                tracing::info!(
                    tx = %transfer.tx_hash,
                    block = ?transfer.block_number,
                    important = event.important,
                    "Native transfer detected"
                );
                self.queue.push(event)
            }
            None => false,
        }
    }

    fn is_watched_value_transfer(&self, transfer: &RawNativeTransfer) -> bool {
        !transfer.value.is_zero()
            && (self.watch.is_watched(&transfer.from)
                || transfer.to.is_some_and(|to| self.watch.is_watched(&to)))
    }
}
