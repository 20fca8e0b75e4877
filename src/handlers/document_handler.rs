use log::{error, info, warn};
use teloxide::prelude::*;
use teloxide::types::{Document, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};

use crate::bot::BotContext;
use crate::handlers::callback_handler::CallbackAction;
use crate::handlers::{resolve_account, user_lang};
use crate::lifecycle::NewSubmission;
use crate::localization::Lang;
use crate::subtitle;
use crate::utils::MessageFormatter;

/// telegram bots cannot download anything larger
pub const MAX_FILE_SIZE_MB: u32 = 20;
const MAX_FILE_SIZE: u32 = MAX_FILE_SIZE_MB * 1024 * 1024;

pub struct DocumentHandler;

impl DocumentHandler {
    pub fn is_srt(file_name: Option<&str>) -> bool {
        file_name
            .map(|name| name.to_lowercase().ends_with(".srt"))
            .unwrap_or(false)
    }

    pub fn create_estimate_keyboard(lang: Lang, file_translation_id: i32) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback(
                lang.btn_translate(),
                CallbackAction::Translate(file_translation_id).to_data(),
            ),
            InlineKeyboardButton::callback(
                lang.btn_cancel(),
                CallbackAction::Cancel(file_translation_id).to_data(),
            ),
        ]])
    }

    /// validates an uploaded subtitle and replies with a cost estimate
    pub async fn handle_document(ctx: BotContext, msg: Message, document: Document) -> ResponseResult<()> {
        let lang = user_lang(msg.from.as_ref());
        let Some(user) = msg.from.as_ref() else {
            return Ok(());
        };

        if !Self::is_srt(document.file_name.as_deref()) {
            ctx.bot
                .send_message(msg.chat.id, lang.error_not_srt())
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
        if document.file.size > MAX_FILE_SIZE {
            ctx.bot
                .send_message(msg.chat.id, lang.error_file_too_large(MAX_FILE_SIZE_MB))
                .await?;
            return Ok(());
        }

        let Some(account) = resolve_account(&ctx, user).await else {
            ctx.bot
                .send_message(msg.chat.id, lang.error_account_access())
                .await?;
            return Ok(());
        };

        let file_ref = document.file.id.clone();
        let bytes = match ctx.files.download(&file_ref).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to download {} for user {}: {}", file_ref, account.id, e);
                ctx.bot
                    .send_message(msg.chat.id, lang.error_download())
                    .await?;
                return Ok(());
            }
        };

        let records = match subtitle::parse(&subtitle::decode_lossy(&bytes)) {
            Ok(records) => records,
            Err(e) => {
                warn!("User {} sent an invalid subtitle: {}", account.id, e);
                ctx.bot
                    .send_message(
                        msg.chat.id,
                        lang.error_invalid_subtitle(&MessageFormatter::escape_html(&e.to_string())),
                    )
                    .parse_mode(ParseMode::Html)
                    .await?;
                return Ok(());
            }
        };

        let submission = NewSubmission {
            user_id: account.id,
            input_file_ref: file_ref,
            input_file_unique_ref: document.file.unique_id.clone(),
            file_name: document.file_name.clone(),
            total_lines: records.len() as i32,
            price_unit: ctx.price_per_line,
        };

        let (record, reused) = match ctx.file_translations.create_or_reuse(&submission).await {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to register file for user {}: {}", account.id, e);
                ctx.bot
                    .send_message(msg.chat.id, lang.error_processing_request())
                    .await?;
                return Ok(());
            }
        };

        let balance = match ctx.ledger.get_balance(account.id).await {
            Ok(balance) => Some(MessageFormatter::format_money(balance)),
            Err(e) => {
                error!("Failed to read balance for user {}: {}", account.id, e);
                None
            }
        };

        info!(
            "File translation {} for user {}: {} lines (reused: {})",
            record.id, account.id, record.total_lines, reused
        );

        let file_name = MessageFormatter::escape_html(record.file_name.as_deref().unwrap_or("subtitle.srt"));
        ctx.bot
            .send_message(
                msg.chat.id,
                lang.file_estimate(
                    &file_name,
                    record.total_lines,
                    &MessageFormatter::format_money(record.price_unit),
                    &MessageFormatter::format_money(record.estimated_cost()),
                    balance.as_deref(),
                    reused,
                ),
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(Self::create_estimate_keyboard(lang, record.id))
            .await?;
        Ok(())
    }
}
