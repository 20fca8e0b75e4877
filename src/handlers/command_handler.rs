use log::{error, info};
use teloxide::prelude::*;
use teloxide::types::{ParseMode, User};

use crate::bot::{BotContext, Command};
use crate::handlers::{resolve_account, user_lang, PaymentHandler};
use crate::ledger::Direction;
use crate::utils::MessageFormatter;

const HISTORY_LIMIT: i64 = 5;

pub struct CommandHandler;

impl CommandHandler {
    pub async fn handle_command(ctx: BotContext, msg: Message, cmd: Command) -> ResponseResult<()> {
        match cmd {
            Command::Start => {
                Self::handle_start_command(ctx, msg).await?;
            }
            Command::Balance => {
                Self::handle_balance_command(ctx, msg).await?;
            }
            Command::Topup(amount) => {
                PaymentHandler::handle_topup(ctx, msg, &amount).await?;
            }
            Command::Help => {
                let lang = user_lang(msg.from.as_ref());
                let price = MessageFormatter::format_money(ctx.price_per_line);
                ctx.bot
                    .send_message(msg.chat.id, lang.help(&price))
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            Command::Stats => {
                Self::handle_stats_command(ctx, msg).await?;
            }
        }
        Ok(())
    }

    pub fn is_admin(admin_ids: &[i64], user: Option<&User>) -> bool {
        user.is_some_and(|u| admin_ids.contains(&(u.id.0 as i64)))
    }

    async fn handle_stats_command(ctx: BotContext, msg: Message) -> ResponseResult<()> {
        let lang = user_lang(msg.from.as_ref());
        if !Self::is_admin(&ctx.admin_ids, msg.from.as_ref()) {
            ctx.bot
                .send_message(msg.chat.id, lang.error_admin_only())
                .await?;
            return Ok(());
        }

        let text = match ctx.accounts.count_users().await {
            Ok(total) => {
                info!("Stats requested by {}: {} users", msg.chat.id.0, total);
                lang.stats(total)
            }
            Err(e) => {
                error!("Failed to count users: {}", e);
                lang.error_processing_request().to_string()
            }
        };
        ctx.bot
            .send_message(msg.chat.id, text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn handle_start_command(ctx: BotContext, msg: Message) -> ResponseResult<()> {
        let lang = user_lang(msg.from.as_ref());
        let Some(user) = msg.from.as_ref() else {
            return Ok(());
        };

        let Some(account) = resolve_account(&ctx, user).await else {
            ctx.bot
                .send_message(msg.chat.id, lang.error_account_access())
                .await?;
            return Ok(());
        };

        let balance = match ctx.ledger.get_balance(account.id).await {
            Ok(balance) => balance,
            Err(e) => {
                error!("Failed to read balance for user {}: {}", account.id, e);
                ctx.bot
                    .send_message(msg.chat.id, lang.error_account_access())
                    .await?;
                return Ok(());
            }
        };

        info!("User {} started the bot", account.telegram_user_id);
        ctx.bot
            .send_message(
                msg.chat.id,
                lang.welcome(
                    &MessageFormatter::format_money(balance),
                    &MessageFormatter::format_money(ctx.price_per_line),
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn handle_balance_command(ctx: BotContext, msg: Message) -> ResponseResult<()> {
        let lang = user_lang(msg.from.as_ref());
        let Some(user) = msg.from.as_ref() else {
            return Ok(());
        };

        let Some(account) = resolve_account(&ctx, user).await else {
            ctx.bot
                .send_message(msg.chat.id, lang.error_account_access())
                .await?;
            return Ok(());
        };

        let balance = ctx.ledger.get_balance(account.id).await;
        let history = ctx.ledger.history(account.id, HISTORY_LIMIT).await;
        let (balance, history) = match (balance, history) {
            (Ok(balance), Ok(history)) => (balance, history),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to load ledger for user {}: {}", account.id, e);
                ctx.bot
                    .send_message(msg.chat.id, lang.error_account_access())
                    .await?;
                return Ok(());
            }
        };

        let history_text = if history.is_empty() {
            lang.history_empty().to_string()
        } else {
            history
                .iter()
                .map(|entry| {
                    lang.history_entry(
                        entry.direction == Direction::Credit,
                        &MessageFormatter::format_money(entry.amount),
                        &MessageFormatter::escape_html(&entry.description),
                        &entry.created_at.format("%Y-%m-%d").to_string(),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        ctx.bot
            .send_message(
                msg.chat.id,
                lang.balance(&MessageFormatter::format_money(balance), &history_text),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}
