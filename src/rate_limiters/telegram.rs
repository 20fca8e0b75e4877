use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tokio::time::sleep;

/// telegram rejects frequent edits of the same chat (roughly one per second)
const MESSAGE_EDIT_INTERVAL: Duration = Duration::from_millis(1100);

/// rate limiter for telegram api operations
pub struct TelegramRateLimiter {
    message_edit_last_call: Arc<Mutex<HashMap<ChatId, Instant>>>,
    edit_interval: Duration,
}

impl Default for TelegramRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelegramRateLimiter {
    pub fn new() -> Self {
        Self::with_edit_interval(MESSAGE_EDIT_INTERVAL)
    }

    pub fn with_edit_interval(edit_interval: Duration) -> Self {
        Self {
            message_edit_last_call: Arc::new(Mutex::new(HashMap::new())),
            edit_interval,
        }
    }

    /// wait until a message in this chat may be edited again
    pub async fn wait_for_message_edit(&self, chat_id: ChatId) {
        let mut last_calls = self.message_edit_last_call.lock().await;

        if let Some(last_time) = last_calls.get(&chat_id) {
            let elapsed = last_time.elapsed();
            if elapsed < self.edit_interval {
                let wait_time = self.edit_interval - elapsed;
                debug!(
                    "Rate limiting message edit in chat {}: waiting {}ms",
                    chat_id,
                    wait_time.as_millis()
                );
                sleep(wait_time).await;
            }
        }

        last_calls.insert(chat_id, Instant::now());
    }
}
