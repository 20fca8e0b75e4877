use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode};

use crate::error::DeliveryError;
use crate::rate_limiters::TelegramRateLimiter;

/// a message that can be edited later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// outbound chat messages; texts are telegram html
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageRef, DeliveryError>;

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), DeliveryError>;

    /// returns the file reference of the uploaded document
    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        content: Vec<u8>,
        caption: &str,
    ) -> Result<String, DeliveryError>;
}

#[async_trait]
pub trait FileSource: Send + Sync {
    async fn download(&self, file_ref: &str) -> Result<Vec<u8>, DeliveryError>;
}

pub struct TelegramNotifier {
    bot: Bot,
    rate_limiter: Arc<TelegramRateLimiter>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, rate_limiter: Arc<TelegramRateLimiter>) -> Self {
        Self { bot, rate_limiter }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageRef, DeliveryError> {
        let message = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(MessageRef {
            chat_id,
            message_id: message.id.0,
        })
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), DeliveryError> {
        self.rate_limiter
            .wait_for_message_edit(ChatId(message.chat_id))
            .await;
        self.bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        content: Vec<u8>,
        caption: &str,
    ) -> Result<String, DeliveryError> {
        let sent = self
            .bot
            .send_document(
                ChatId(chat_id),
                InputFile::memory(content).file_name(file_name.to_string()),
            )
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .await?;
        sent.document()
            .map(|doc| doc.file.id.clone())
            .ok_or(DeliveryError::MissingDocument)
    }
}

/// downloads through the bot api file endpoint
pub struct TelegramFileSource {
    bot: Bot,
    http: reqwest::Client,
}

impl TelegramFileSource {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl FileSource for TelegramFileSource {
    async fn download(&self, file_ref: &str) -> Result<Vec<u8>, DeliveryError> {
        let file = self.bot.get_file(file_ref.to_string()).await?;
        let file_url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        );
        let response = self.http.get(file_url).send().await?;
        if !response.status().is_success() {
            return Err(DeliveryError::Download(format!(
                "status {}",
                response.status().as_u16()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// keeps every outbound message in memory
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub sent: std::sync::Mutex<Vec<(i64, String)>>,
    pub edits: std::sync::Mutex<Vec<(MessageRef, String)>>,
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageRef, DeliveryError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id, text.to_string()));
        Ok(MessageRef {
            chat_id,
            message_id: sent.len() as i32,
        })
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), DeliveryError> {
        self.edits.lock().unwrap().push((message, text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        _chat_id: i64,
        _file_name: &str,
        _content: Vec<u8>,
        _caption: &str,
    ) -> Result<String, DeliveryError> {
        Ok("document".to_string())
    }
}
