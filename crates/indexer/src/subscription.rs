//! Log subscription manager.
//!
//! Each [`LogSubscription`] keeps one log filter delivering for the life of
//! the process: subscribe, forward, reconnect with capped exponential backoff.
//! When the endpoint reports that subscriptions are unsupported the task
//! switches permanently to polling `eth_getLogs` over new block ranges.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use sentinel_common::watchlist::WatchList;
use sentinel_decoders::signatures::TRANSFER_TOPIC;
use tokio::time::MissedTickBehavior;

use crate::pipeline::Pipeline;
use crate::rpc::{LedgerError, LogFilter};

/// Fewer new blocks than this and a poll tick waits for more.
pub const POLL_MIN_RANGE: u64 = 100;
/// Upper bound on blocks covered by one poll query.
pub const POLL_MAX_RANGE: u64 = 300;

/// Which logs an instance follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFilterKind {
    /// Any log emitted by a watched contract.
    AllAddresses,
    /// ERC20 transfers whose sender is watched.
    TransferFrom,
    /// ERC20 transfers whose recipient is watched.
    TransferTo,
}

impl LogFilterKind {
    /// `None` when there is nothing to watch.
    pub fn build(&self, watch: &WatchList) -> Option<LogFilter> {
        if watch.is_empty() {
            return None;
        }
        let filter = match self {
            Self::AllAddresses => LogFilter {
                addresses: watch.addresses(),
                ..Default::default()
            },
            Self::TransferFrom => LogFilter {
                event: Some(TRANSFER_TOPIC),
                topic1: watch.address_topics(),
                ..Default::default()
            },
            Self::TransferTo => LogFilter {
                event: Some(TRANSFER_TOPIC),
                topic2: watch.address_topics(),
                ..Default::default()
            },
        };
        Some(filter)
    }

    pub fn poll_interval(&self) -> Duration {
        match self {
            Self::AllAddresses => Duration::from_secs(4),
            Self::TransferFrom | Self::TransferTo => Duration::from_secs(5),
        }
    }
}

impl fmt::Display for LogFilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllAddresses => write!(f, "all-addresses"),
            Self::TransferFrom => write!(f, "transfer-from"),
            Self::TransferTo => write!(f, "transfer-to"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Connecting,
    Subscribed,
    Reconnecting,
    PollingFallback,
}

/// Doubling backoff with a cap; `reset` returns to the initial delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following call returns double, up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

/// Next inclusive block range to poll after `last`, if enough blocks arrived.
pub fn next_poll_range(last: u64, head: u64) -> Option<(u64, u64)> {
    let available = head.checked_sub(last)?;
    if available < POLL_MIN_RANGE {
        return None;
    }
    let span = available.min(POLL_MAX_RANGE);
    Some((last + 1, last + span))
}

pub struct LogSubscription {
    kind: LogFilterKind,
    pipeline: Arc<Pipeline>,
    backoff: Backoff,
    poll_interval: Duration,
    state: SubscriptionState,
}

impl LogSubscription {
    pub fn new(kind: LogFilterKind, pipeline: Arc<Pipeline>) -> Self {
        Self {
            kind,
            pipeline,
            backoff: Backoff::default(),
            poll_interval: kind.poll_interval(),
            state: SubscriptionState::Connecting,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run until the process exits.
    pub async fn run(mut self) {
        let Some(filter) = self.kind.build(self.pipeline.watch()) else {
            tracing::warn!(kind = %self.kind, "No watched addresses, subscription not started");
            return;
        };

        loop {
            self.transition(SubscriptionState::Connecting);
            match self.pipeline.ledger().subscribe_logs(&filter).await {
                Ok(mut stream) => {
                    self.transition(SubscriptionState::Subscribed);
                    self.backoff.reset();
                    while let Some(log) = stream.next().await {
                        self.pipeline.handle_live_log(log).await;
                    }
                    tracing::warn!(kind = %self.kind, "Log stream ended");
                }
                Err(LedgerError::UnsupportedSubscription(reason)) => {
                    tracing::info!(kind = %self.kind, reason = %reason, "Subscriptions unsupported, switching to polling");
                    self.transition(SubscriptionState::PollingFallback);
                    self.poll(&filter).await;
                    return;
                }
                Err(e) => {
                    tracing::error!(kind = %self.kind, error = %e, "Subscribe failed");
                }
            }

            self.transition(SubscriptionState::Reconnecting);
            let delay = self.backoff.next_delay();
            tracing::info!(kind = %self.kind, delay_ms = delay.as_millis() as u64, "Reconnecting");
            tokio::time::sleep(delay).await;
        }
    }

    /// Poll new block ranges forever.
    async fn poll(&self, filter: &LogFilter) {
        let ledger = self.pipeline.ledger();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<u64> = None;

        loop {
            ticker.tick().await;

            let head = match ledger.block_number().await {
                Ok(head) => head,
                Err(e) => {
                    tracing::warn!(kind = %self.kind, error = %e, "Polling head unavailable");
                    continue;
                }
            };
            let Some(cursor) = last else {
                tracing::info!(kind = %self.kind, head, interval_ms = self.poll_interval.as_millis() as u64, "Polling started");
                last = Some(head);
                continue;
            };
            let Some((from, to)) = next_poll_range(cursor, head) else {
                continue;
            };

            match ledger.get_logs(filter, from, to).await {
                Ok(logs) => {
                    if !logs.is_empty() {
                        tracing::info!(kind = %self.kind, from, to, count = logs.len(), "Polled logs");
                    }
                    for log in logs {
                        self.pipeline.handle_live_log(log).await;
                    }
                    last = Some(to);
                }
                Err(e) => {
                    tracing::warn!(kind = %self.kind, from, to, error = %e, "Polling query failed");
                }
            }
        }
    }

    fn transition(&mut self, next: SubscriptionState) {
        if self.state != next {
            tracing::debug!(kind = %self.kind, from = ?self.state, to = ?next, "Subscription state");
            self.state = next;
        }
    }
}
