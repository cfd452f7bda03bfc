//! Telegram Bot API delivery with MarkdownV2 escaping, per-client send
//! spacing and bounded retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::sink::{MessageSink, NotifyError};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

const MARKDOWN_V2_RESERVED: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.',
    '!',
];

/// Retry and pacing knobs.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Minimum gap between consecutive sends from this client.
    pub min_spacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1200),
            max_backoff: Duration::from_secs(15),
            min_spacing: Duration::from_millis(1100),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    default_chat: Option<i64>,
    policy: RetryPolicy,
    next_allowed: Mutex<Instant>,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_url(token, DEFAULT_API_URL)
    }

    pub fn with_api_url(token: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            default_chat: None,
            policy: RetryPolicy::default(),
            next_allowed: Mutex::new(Instant::now()),
        }
    }

    pub fn with_default_chat(mut self, chat_id: Option<i64>) -> Self {
        self.default_chat = chat_id;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Wait out the spacing window, then reserve the next one.
    async fn pace(&self) {
        let mut next = self.next_allowed.lock().await;
        tokio::time::sleep_until(*next).await;
        *next = Instant::now() + self.policy.min_spacing;
    }

    /// One HTTP attempt. `Ok(None)` on success, `Ok(Some(delay))` when the
    /// server asked us to back off for `delay`.
    async fn attempt(
        &self,
        url: &str,
        payload: &SendMessageRequest<'_>,
    ) -> Result<Option<Duration>, NotifyError> {
        let resp = self.http.post(url).json(payload).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(None);
        }

        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(parse_retry_after);
        let body = resp.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(retry_after = ?retry_after, "Telegram rate limited");
            return match retry_after.flatten() {
                Some(delay) => Ok(Some(delay)),
                None => Err(NotifyError::RateLimited(body)),
            };
        }
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MessageSink for TelegramClient {
    async fn send_message(&self, destination: i64, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.token);
        let escaped = escape_markdown_v2(text);
        let payload = SendMessageRequest {
            chat_id: destination,
            text: &escaped,
            parse_mode: "MarkdownV2",
            disable_web_page_preview: true,
        };

        let mut backoff = self.policy.initial_backoff;
        let mut last_err = NotifyError::NoDestination;
        for attempt in 1..=self.policy.max_attempts {
            self.pace().await;

            let wait = match self.attempt(&url, &payload).await {
                Ok(None) => {
                    tracing::debug!(destination, attempt, "Telegram message delivered");
                    return Ok(());
                }
                Ok(Some(retry_after)) => {
                    last_err = NotifyError::RateLimited(format!("retry after {retry_after:?}"));
                    retry_after
                }
                Err(e) => {
                    tracing::warn!(destination, attempt, error = %e, "Telegram send failed");
                    last_err = e;
                    backoff
                }
            };

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(wait).await;
            }
            backoff = (backoff * 2).min(self.policy.max_backoff);
        }
        Err(last_err)
    }

    fn default_destination(&self) -> Option<i64> {
        self.default_chat
    }
}

/// Backslash-escape every MarkdownV2 reserved character.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `Retry-After` as whole seconds; HTTP-date values fall back to five seconds.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => Some(Duration::from_secs(5)),
    }
}
