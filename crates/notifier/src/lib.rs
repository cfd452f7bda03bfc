//! Notification delivery: bounded queue, batching aggregator and the
//! Telegram sink.

pub mod aggregator;
pub mod queue;
pub mod sink;
pub mod telegram;

pub use aggregator::{Aggregator, AggregatorSettings, Routes};
pub use queue::NotificationQueue;
pub use sink::{LogSink, MessageSink, NotifyError};
pub use telegram::TelegramClient;
