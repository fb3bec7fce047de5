//! Retry-wrapped message delivery.
//!
//! Telegram sends fail transiently all the time (timeouts, dropped
//! connections, rate limiting). This wrapper retries those with capped
//! exponential backoff inside a bounded loop; API-level rejections are
//! permanent and surface immediately.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, ParseMode};
use teloxide::RequestError;
use tokio::time::sleep;
use tracing::warn;

use crate::error::DeliveryError;

const MAX_ATTEMPTS: u32 = 5;
const MAX_TOTAL_WAIT: Duration = Duration::from_secs(30);
const BASE_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, PartialEq, Eq)]
enum Retry {
    /// Rate limited; the server told us exactly how long to wait.
    After(Duration),
    /// Network-level failure; back off and try again.
    Backoff,
    /// API rejection; retrying cannot help.
    Never,
}

pub async fn send_text(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Message, DeliveryError> {
    let mut attempt: u32 = 0;
    let mut waited = Duration::ZERO;

    loop {
        attempt += 1;

        let mut request = bot.send_message(chat_id, text).parse_mode(ParseMode::Markdown);
        if let Some(markup) = keyboard.clone() {
            request = request.reply_markup(markup);
        }

        let err = match request.await {
            Ok(message) => return Ok(message),
            Err(err) => err,
        };

        let delay = match classify(&err) {
            Retry::Never => return Err(DeliveryError::Permanent(err)),
            Retry::After(delay) => delay,
            Retry::Backoff => backoff_delay(attempt),
        };

        if attempt >= MAX_ATTEMPTS || waited + delay > MAX_TOTAL_WAIT {
            return Err(DeliveryError::RetriesExhausted {
                attempts: attempt,
                source: err,
            });
        }

        warn!(
            error = %err,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "send failed, retrying"
        );
        sleep(delay).await;
        waited += delay;
    }
}

fn classify(err: &RequestError) -> Retry {
    match err {
        RequestError::RetryAfter(delay) => Retry::After(*delay),
        RequestError::Network(_) | RequestError::Io(_) => Retry::Backoff,
        _ => Retry::Never,
    }
}

/// Exponential schedule: 500ms, 1s, 2s, 4s, ... capped at `MAX_DELAY`.
fn backoff_delay(attempt: u32) -> Duration {
    let doublings = attempt.saturating_sub(1).min(16);
    BASE_DELAY.saturating_mul(1 << doublings).min(MAX_DELAY)
}
