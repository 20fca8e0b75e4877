use log::{error, info, warn};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId, MaybeInaccessibleMessage, MessageId, ParseMode};

use crate::bot::BotContext;
use crate::error::{LedgerError, LifecycleError, QueueError};
use crate::handlers::{resolve_account, user_lang};
use crate::jobs::TranslationRequest;
use crate::lifecycle::{FileStatus, FileTranslation};
use crate::localization::Lang;
use crate::notify::MessageRef;
use crate::utils::MessageFormatter;

/// inline button payloads on the estimate message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Translate(i32),
    Cancel(i32),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let (action, id) = data.split_once(':')?;
        let id = id.parse().ok()?;
        match action {
            "translate" => Some(CallbackAction::Translate(id)),
            "cancel" => Some(CallbackAction::Cancel(id)),
            _ => None,
        }
    }

    pub fn to_data(self) -> String {
        match self {
            CallbackAction::Translate(id) => format!("translate:{}", id),
            CallbackAction::Cancel(id) => format!("cancel:{}", id),
        }
    }
}

pub struct CallbackHandler;

impl CallbackHandler {
    fn message_location(message: &MaybeInaccessibleMessage) -> (ChatId, MessageId) {
        match message {
            MaybeInaccessibleMessage::Regular(msg) => (msg.chat.id, msg.id),
            MaybeInaccessibleMessage::Inaccessible(msg) => (msg.chat.id, msg.message_id),
        }
    }

    pub async fn handle_callback_query(ctx: BotContext, query: CallbackQuery) -> ResponseResult<()> {
        let action = query.data.as_deref().and_then(CallbackAction::parse);
        match (action, &query.message) {
            (Some(action), Some(message)) => {
                let (chat_id, message_id) = Self::message_location(message);
                let lang = user_lang(Some(&query.from));
                let reply = match action {
                    CallbackAction::Translate(id) => {
                        Self::handle_translate(&ctx, &query, lang, id, chat_id, message_id).await?
                    }
                    CallbackAction::Cancel(id) => {
                        Self::handle_cancel(&ctx, &query, lang, id, chat_id, message_id).await?
                    }
                };
                if let Some(text) = reply {
                    ctx.bot
                        .send_message(chat_id, text)
                        .parse_mode(ParseMode::Html)
                        .await?;
                }
            }
            _ => warn!("Ignoring callback query with data {:?}", query.data),
        }

        ctx.bot.answer_callback_query(&query.id).await?;
        Ok(())
    }

    /// loads the record and checks it belongs to the sender
    async fn owned_record(
        ctx: &BotContext,
        query: &CallbackQuery,
        lang: Lang,
        id: i32,
    ) -> Result<(i32, FileTranslation), String> {
        let account = resolve_account(ctx, &query.from)
            .await
            .ok_or_else(|| lang.error_account_access().to_string())?;

        match ctx.file_translations.get(id).await {
            Ok(record) if record.user_id == account.id => Ok((account.id, record)),
            Ok(_) | Err(LifecycleError::NotFound(_)) => {
                Err(lang.error_translation_not_found().to_string())
            }
            Err(e) => {
                error!("Failed to load file translation {}: {}", id, e);
                Err(lang.error_processing_request().to_string())
            }
        }
    }

    fn status_error(lang: Lang, status: FileStatus) -> Option<String> {
        match status {
            FileStatus::Init => None,
            FileStatus::Processing => Some(lang.error_already_started().to_string()),
            _ => Some(lang.error_already_finished().to_string()),
        }
    }

    /// returns the text of a follow-up message, if any
    async fn handle_translate(
        ctx: &BotContext,
        query: &CallbackQuery,
        lang: Lang,
        id: i32,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> ResponseResult<Option<String>> {
        let (user_id, record) = match Self::owned_record(ctx, query, lang, id).await {
            Ok(found) => found,
            Err(text) => return Ok(Some(text)),
        };
        if let Some(text) = Self::status_error(lang, record.status) {
            return Ok(Some(text));
        }

        match ctx.ledger.ensure_funds(user_id, record.estimated_cost()).await {
            Ok(_) => {}
            Err(LedgerError::InsufficientFunds { balance, required, .. }) => {
                return Ok(Some(lang.error_insufficient_funds(
                    &MessageFormatter::format_money(balance),
                    &MessageFormatter::format_money(required),
                )));
            }
            Err(e) => {
                error!("Failed to check funds for user {}: {}", user_id, e);
                return Ok(Some(lang.error_processing_request().to_string()));
            }
        }

        // the estimate message becomes the progress message once queued
        let request = TranslationRequest {
            file_translation_id: id,
            chat_id: chat_id.0,
            progress_message: Some(MessageRef {
                chat_id: chat_id.0,
                message_id: message_id.0,
            }),
            lang,
        };

        match ctx.queue.submit_announced(request, ctx.notifier.as_ref()).await {
            Ok(()) => {
                info!("Queued file translation {} for user {}", id, user_id);
                Ok(None)
            }
            Err(QueueError::Full) => {
                warn!("Translation queue full, rejected file translation {}", id);
                Ok(Some(lang.error_queue_full().to_string()))
            }
            Err(QueueError::Closed) => {
                error!("Translation queue closed, rejected file translation {}", id);
                Ok(Some(lang.error_processing_request().to_string()))
            }
        }
    }

    async fn handle_cancel(
        ctx: &BotContext,
        query: &CallbackQuery,
        lang: Lang,
        id: i32,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> ResponseResult<Option<String>> {
        let (user_id, record) = match Self::owned_record(ctx, query, lang, id).await {
            Ok(found) => found,
            Err(text) => return Ok(Some(text)),
        };
        if let Some(text) = Self::status_error(lang, record.status) {
            return Ok(Some(text));
        }

        match ctx.file_translations.cancel(id, user_id).await {
            Ok(_) => {
                ctx.bot
                    .edit_message_text(chat_id, message_id, lang.translation_cancelled())
                    .parse_mode(ParseMode::Html)
                    .await?;
                Ok(None)
            }
            // a worker claimed it between the check and the cancel
            Err(LifecycleError::InvalidTransition { .. }) => {
                Ok(Some(lang.error_already_started().to_string()))
            }
            Err(e) => {
                error!("Failed to cancel file translation {}: {}", id, e);
                Ok(Some(lang.error_processing_request().to_string()))
            }
        }
    }
}
