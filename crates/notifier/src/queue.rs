use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sentinel_common::types::ClassifiedEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Default queue capacity between ingestion and the aggregator.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Producer handle of the bounded notification queue.
///
/// Live ingestion uses [`NotificationQueue::push`], which never waits and
/// drops the event when the queue is full.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<ClassifiedEvent>,
    dropped: Arc<AtomicU64>,
}

impl NotificationQueue {
    /// Create a queue and the receiver the aggregator consumes.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ClassifiedEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Non-blocking enqueue. Returns `false` if the event was dropped.
    pub fn push(&self, event: ClassifiedEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(title = %event.title, "Notification queue full, event dropped");
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(title = %event.title, "Notification queue closed, event dropped");
                false
            }
        }
    }

    /// Enqueue, waiting for capacity. Used by the one-shot backfill.
    pub async fn push_wait(&self, event: ClassifiedEvent) -> bool {
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(title = %e.0.title, "Notification queue closed, event dropped");
                false
            }
        }
    }

    /// Events dropped since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Events currently waiting.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}
