//! Notification aggregator.
//!
//! Buffers classified events from the queue and flushes them on a fixed tick.
//! Batches without important events collapse into one numbered digest;
//! any important event forces every event in the batch out individually.
//! Important deliveries are followed by a short burst of alarm pings.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sentinel_common::types::{ClassifiedEvent, format_timestamp};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::sink::MessageSink;

/// Destination ids for the two alert tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Routes {
    pub primary: Option<i64>,
    pub secondary: Option<i64>,
}

impl Routes {
    /// Important → secondary (else primary); normal → primary (else secondary).
    pub fn destination(&self, important: bool) -> Option<i64> {
        if important {
            self.secondary.or(self.primary)
        } else {
            self.primary.or(self.secondary)
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub flush_interval: Duration,
    /// Flush as soon as an important event arrives.
    pub immediate_important: bool,
    pub alarm_count: u32,
    pub alarm_spacing: Duration,
    /// Pause after the last alarm.
    pub alarm_pause: Duration,
    pub alarm_text: String,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(5),
            immediate_important: false,
            alarm_count: 4,
            alarm_spacing: Duration::from_secs(1),
            alarm_pause: Duration::from_millis(1300),
            alarm_text: "🚨 ALARM".to_string(),
        }
    }
}

/// One message produced by a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub text: String,
    pub important: bool,
}

/// Decide what a flush of `events` sends, in order.
pub fn plan_flush(events: &[ClassifiedEvent], now: DateTime<Utc>) -> Vec<Outgoing> {
    match events {
        [] => Vec::new(),
        [single] => vec![single_message(single)],
        many if many.iter().any(|e| e.important) => {
            many.iter().map(single_message).collect()
        }
        many => vec![digest_message(many, now)],
    }
}

fn single_message(event: &ClassifiedEvent) -> Outgoing {
    let text = if event.body.is_empty() {
        event.title.clone()
    } else {
        format!("{}\n\n{}", event.title, event.body)
    };
    Outgoing {
        text,
        important: event.important,
    }
}

fn digest_message(events: &[ClassifiedEvent], now: DateTime<Utc>) -> Outgoing {
    let mut text = format!(
        "📢 {} New Events ({})\n\n⏰ {}\n",
        events.len(),
        now.format("%H:%M:%S"),
        format_timestamp(now)
    );
    for (i, event) in events.iter().enumerate() {
        let _ = write!(text, "\n{}. {}", i + 1, event.title);
        if !event.body.is_empty() {
            let _ = write!(text, "\n{}", event.body);
        }
        text.push('\n');
    }
    Outgoing {
        text: text.trim_end().to_string(),
        important: false,
    }
}

pub struct Aggregator {
    sink: Arc<dyn MessageSink>,
    routes: Routes,
    settings: AggregatorSettings,
    pending: Vec<ClassifiedEvent>,
}

impl Aggregator {
    pub fn new(sink: Arc<dyn MessageSink>, routes: Routes, settings: AggregatorSettings) -> Self {
        Self {
            sink,
            routes,
            settings,
            pending: Vec::new(),
        }
    }

    /// Consume the queue until every producer is gone, flushing on each tick.
    pub async fn run(mut self, mut rx: mpsc::Receiver<ClassifiedEvent>) {
        let mut ticker = tokio::time::interval(self.settings.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        tracing::info!(
            interval_ms = self.settings.flush_interval.as_millis() as u64,
            immediate_important = self.settings.immediate_important,
            primary = ?self.routes.primary,
            secondary = ?self.routes.secondary,
            "Notification aggregator started"
        );

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(event) => {
                        let important = event.important;
                        self.pending.push(event);
                        if self.settings.immediate_important && important {
                            self.flush().await;
                        }
                    }
                    None => {
                        self.flush().await;
                        tracing::info!("Notification queue closed, aggregator stopping");
                        return;
                    }
                },
                _ = ticker.tick() => self.flush().await,
            }
        }
    }

    /// Send everything pending.
    pub async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.pending);
        let messages = plan_flush(&events, Utc::now());
        tracing::debug!(events = events.len(), messages = messages.len(), "Flushing notifications");
        for message in &messages {
            self.dispatch(message).await;
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn dispatch(&self, message: &Outgoing) {
        let Some(destination) = self.routes.destination(message.important) else {
            tracing::warn!(important = message.important, "No destination configured, notification skipped");
            return;
        };

        match self.sink.send_message(destination, &message.text).await {
            Ok(()) => {
                if message.important {
                    self.escalate(destination).await;
                }
            }
            Err(e) => {
                tracing::error!(destination, important = message.important, error = %e, "Notification delivery failed");
            }
        }
    }

    async fn escalate(&self, destination: i64) {
        for index in 0..self.settings.alarm_count {
            match self.sink.send_message(destination, &self.settings.alarm_text).await {
                Ok(()) => tracing::debug!(destination, index, "Alarm sent"),
                Err(e) => tracing::warn!(destination, index, error = %e, "Alarm delivery failed"),
            }
            tokio::time::sleep(self.settings.alarm_spacing).await;
        }
        tokio::time::sleep(self.settings.alarm_pause).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_event(title: &str, important: bool) -> ClassifiedEvent {
        ClassifiedEvent::new(title, format!("body of {title}"), important)
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_routes() {
        let both = Routes {
            primary: Some(1),
            secondary: Some(2),
        };
        assert_eq!(both.destination(true), Some(2));
        assert_eq!(both.destination(false), Some(1));

        let primary_only = Routes {
            primary: Some(1),
            secondary: None,
        };
        assert_eq!(primary_only.destination(true), Some(1));

        let secondary_only = Routes {
            primary: None,
            secondary: Some(2),
        };
        assert_eq!(secondary_only.destination(false), Some(2));

        assert_eq!(Routes::default().destination(true), None);
    }

    #[test]
    fn test_plan_empty_and_single() {
        assert!(plan_flush(&[], at()).is_empty());

        let plan = plan_flush(&[make_event("only", false)], at());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].text, "only\n\nbody of only");
        assert!(!plan[0].important);
    }

    #[test]
    fn test_plan_digest_keeps_order() {
        let events = vec![
            make_event("first", false),
            make_event("second", false),
            make_event("third", false),
        ];
        let plan = plan_flush(&events, at());
        assert_eq!(plan.len(), 1);
        let text = &plan[0].text;
        assert!(text.starts_with("📢 3 New Events (03:04:05)"));
        let first = text.find("1. first").unwrap();
        let second = text.find("2. second").unwrap();
        let third = text.find("3. third").unwrap();
        assert!(first < second && second < third);
        assert!(!plan[0].important);
    }

    #[test]
    fn test_plan_important_splits_batch() {
        let events = vec![
            make_event("first", false),
            make_event("second", true),
            make_event("third", false),
        ];
        let plan = plan_flush(&events, at());
        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan.iter().map(|m| m.important).collect::<Vec<_>>(),
            vec![false, true, false]
        );
        assert!(plan[1].text.starts_with("second"));
    }
}
