//! Ingestion side of the sentinel: ledger access and the three live paths
//! (log subscriptions, native transfer scanning, startup backfill).

pub mod backfill;
pub mod native;
pub mod pipeline;
pub mod rpc;
pub mod subscription;

pub use backfill::{BackfillScanner, BackfillSettings, plan_windows};
pub use native::NativeScanner;
pub use pipeline::Pipeline;
pub use rpc::{AlloyLedger, LedgerClient, LedgerError, LogFilter};
pub use subscription::{LogFilterKind, LogSubscription};
