//! Native transfer scanner.
//!
//! Walks every new block, looking at transaction values. The typed client is
//! tried first; once it reports an unsupported transaction encoding the
//! scanner switches to raw JSON-RPC decoding for the rest of the process.

use std::sync::Arc;
use std::time::Duration;

use sentinel_common::mode::{RawModeHandle, RawModeSwitch};
use sentinel_common::types::RawNativeTransfer;
use tokio::time::MissedTickBehavior;

use crate::pipeline::Pipeline;
use crate::rpc::LedgerError;

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(3);

pub struct NativeScanner {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    backfill_blocks: u64,
    raw_mode: RawModeSwitch,
    last_scanned: Option<u64>,
}

impl NativeScanner {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            interval: DEFAULT_SCAN_INTERVAL,
            backfill_blocks: 0,
            raw_mode: RawModeSwitch::new(),
            last_scanned: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start this many blocks below head instead of at head.
    pub fn with_backfill(mut self, blocks: u64) -> Self {
        self.backfill_blocks = blocks;
        self
    }

    pub fn raw_mode(&self) -> RawModeHandle {
        self.raw_mode.handle()
    }

    pub fn last_scanned(&self) -> Option<u64> {
        self.last_scanned
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            backfill = self.backfill_blocks,
            "Native scanner started"
        );

        loop {
            ticker.tick().await;
            if let Err(e) = self.scan_once().await {
                tracing::debug!(error = %e, "Native scan tick skipped");
            }
        }
    }

    /// One tick: scan every block after the last scanned one up to head.
    /// Returns the number of transfers enqueued.
    pub async fn scan_once(&mut self) -> Result<usize, LedgerError> {
        let head = self.pipeline.ledger().block_number().await?;
        let last = match self.last_scanned {
            Some(last) => last,
            None => {
                let start = head.saturating_sub(self.backfill_blocks);
                tracing::info!(head, start, "Native scanner positioned");
                start
            }
        };
        if head <= last {
            self.last_scanned = Some(last);
            return Ok(0);
        }

        let mut enqueued = 0;
        for number in last + 1..=head {
            let transfers = match self.fetch_block(number).await {
                Ok(transfers) => transfers,
                Err(e) => {
                    tracing::warn!(block = number, error = %e, "Native scan skipped block");
                    continue;
                }
            };
            for transfer in transfers {
                if transfer.value.is_zero() {
                    continue;
                }
                if self.pipeline.handle_native(transfer).await {
                    enqueued += 1;
                }
            }
        }
        self.last_scanned = Some(head);
        Ok(enqueued)
    }

    async fn fetch_block(&self, number: u64) -> Result<Vec<RawNativeTransfer>, LedgerError> {
        let ledger = self.pipeline.ledger();
        if self.raw_mode.is_engaged() {
            return ledger.raw_block_transfers(number).await;
        }

        match ledger.block_transfers(number).await {
            Ok(transfers) => Ok(transfers),
            Err(LedgerError::UnsupportedEncoding(reason)) => {
                if self.raw_mode.engage() {
                    tracing::warn!(block = number, reason = %reason, "Typed block decoding unsupported, switching to raw mode permanently");
                }
                ledger.raw_block_transfers(number).await
            }
            Err(e) => {
                tracing::debug!(block = number, error = %e, "Typed block fetch failed, trying raw");
                ledger.raw_block_transfers(number).await
            }
        }
    }
}
