//! One-shot historical scan over the most recent blocks at startup.

use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::Pipeline;
use crate::rpc::LogFilter;

#[derive(Debug, Clone)]
pub struct BackfillSettings {
    /// Blocks below head to cover
    pub depth: u64,
    /// Largest window per `eth_getLogs` call
    pub max_window: u64,
    /// Overall deadline for the whole scan
    pub timeout: Duration,
    /// Enqueue results; when false they are classified and logged only
    pub notify: bool,
    /// Pause after a failed window
    pub failure_pause: Duration,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            depth: 2000,
            max_window: 500,
            timeout: Duration::from_secs(120),
            notify: true,
            failure_pause: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub windows: usize,
    pub failed_windows: usize,
    pub logs: usize,
    pub enqueued: usize,
}

/// Consecutive inclusive windows covering `[max(0, head - depth), head]`.
pub fn plan_windows(head: u64, depth: u64, window: u64) -> Vec<(u64, u64)> {
    let window = window.max(1);
    let mut windows = Vec::new();
    let mut cursor = head.saturating_sub(depth);
    while cursor <= head {
        let end = cursor.saturating_add(window - 1).min(head);
        windows.push((cursor, end));
        match end.checked_add(1) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    windows
}

pub struct BackfillScanner {
    pipeline: Arc<Pipeline>,
    settings: BackfillSettings,
}

impl BackfillScanner {
    pub fn new(pipeline: Arc<Pipeline>, settings: BackfillSettings) -> Self {
        Self { pipeline, settings }
    }

    /// Scan once under the configured deadline. `None` if the deadline hit
    /// or the head could not be read.
    pub async fn run(self) -> Option<BackfillReport> {
        match tokio::time::timeout(self.settings.timeout, self.scan()).await {
            Ok(report) => report,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.settings.timeout.as_secs(),
                    "Backfill deadline reached, scan abandoned"
                );
                None
            }
        }
    }

    async fn scan(&self) -> Option<BackfillReport> {
        let watch = self.pipeline.watch();
        if watch.is_empty() {
            tracing::warn!("No watched addresses, backfill skipped");
            return None;
        }
        let ledger = self.pipeline.ledger();
        let head = match ledger.block_number().await {
            Ok(head) => head,
            Err(e) => {
                tracing::warn!(error = %e, "Backfill could not read head block");
                return None;
            }
        };

        let filter = LogFilter {
            addresses: watch.addresses(),
            ..Default::default()
        };
        let windows = plan_windows(head, self.settings.depth, self.settings.max_window);
        tracing::info!(
            head,
            depth = self.settings.depth,
            window = self.settings.max_window,
            windows = windows.len(),
            notify = self.settings.notify,
            "Backfill started"
        );

        let mut report = BackfillReport::default();
        for (from, to) in windows {
            report.windows += 1;
            // A failed window is not retried; the cursor moves on regardless.
            let logs = match ledger.get_logs(&filter, from, to).await {
                Ok(logs) => logs,
                Err(e) => {
                    report.failed_windows += 1;
                    tracing::warn!(from, to, error = %e, "Backfill window failed");
                    tokio::time::sleep(self.settings.failure_pause).await;
                    continue;
                }
            };
            if logs.is_empty() {
                continue;
            }
            tracing::info!(from, to, count = logs.len(), "Backfill window");
            report.logs += logs.len();

            for log in &logs {
                let Some(event) = self.pipeline.classify_log(log).await else {
                    continue;
                };
                if !self.settings.notify {
                    tracing::debug!(title = %event.title, "Backfill notification suppressed");
                    continue;
                }
                if self.pipeline.queue().push_wait(event).await {
                    report.enqueued += 1;
                }
            }
        }

        tracing::info!(
            windows = report.windows,
            failed = report.failed_windows,
            logs = report.logs,
            enqueued = report.enqueued,
            "Backfill finished"
        );
        Some(report)
    }
}
