use log::{error, info, warn};
use rust_decimal::Decimal;
use std::str::FromStr;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};

use crate::bot::BotContext;
use crate::error::PaymentError;
use crate::handlers::{resolve_account, user_lang};
use crate::ledger::Ledger;
use crate::localization::Lang;
use crate::notify::Notifier;
use crate::payments::{ConfirmedPayment, PaymentCallback, Payments};
use crate::utils::MessageFormatter;

/// smallest top-up in tomans
pub const MIN_TOPUP_AMOUNT: i64 = 10_000;

pub struct PaymentHandler;

impl PaymentHandler {
    /// accepts "50000" or "50,000"; whole tomans only
    pub fn parse_amount(arg: &str) -> Option<Decimal> {
        let cleaned: String = arg.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let amount = Decimal::from_str(&cleaned).ok()?;
        (amount >= Decimal::from(MIN_TOPUP_AMOUNT)).then_some(amount)
    }

    pub async fn handle_topup(ctx: BotContext, msg: Message, arg: &str) -> ResponseResult<()> {
        let lang = user_lang(msg.from.as_ref());
        let Some(user) = msg.from.as_ref() else {
            return Ok(());
        };

        let Some(amount) = Self::parse_amount(arg) else {
            ctx.bot
                .send_message(
                    msg.chat.id,
                    lang.error_topup_usage(&MessageFormatter::format_money(Decimal::from(MIN_TOPUP_AMOUNT))),
                )
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        };

        let Some(account) = resolve_account(&ctx, user).await else {
            ctx.bot
                .send_message(msg.chat.id, lang.error_account_access())
                .await?;
            return Ok(());
        };

        let link = match ctx.payments.create_receipt(account.id, amount).await {
            Ok(link) => link,
            Err(e) => {
                error!("Failed to create receipt for user {}: {}", account.id, e);
                ctx.bot
                    .send_message(msg.chat.id, lang.error_payment_processing())
                    .await?;
                return Ok(());
            }
        };

        let Ok(url) = link.url.parse::<url::Url>() else {
            error!("Gateway returned an invalid payment url: {}", link.url);
            ctx.bot
                .send_message(msg.chat.id, lang.error_payment_processing())
                .await?;
            return Ok(());
        };

        info!(
            "Created receipt {} ({} tomans) for user {}",
            link.receipt_id, amount, account.id
        );
        ctx.bot
            .send_message(msg.chat.id, lang.topup_link(&MessageFormatter::format_money(amount)))
            .parse_mode(ParseMode::Html)
            .reply_markup(InlineKeyboardMarkup::new(vec![vec![
                InlineKeyboardButton::url(lang.btn_pay(), url),
            ]]))
            .await?;
        Ok(())
    }

    /// settles a gateway callback and tells the payer their new balance
    pub async fn confirm_and_notify(
        payments: &Payments,
        ledger: &Ledger,
        notifier: &dyn Notifier,
        callback: &PaymentCallback,
    ) -> Result<ConfirmedPayment, PaymentError> {
        let confirmed = payments.confirm(callback).await?;

        let balance = ledger.get_balance(confirmed.user_id).await?;
        let lang = Lang::from_code(confirmed.language.as_deref());
        let text = lang.payment_success(
            &MessageFormatter::format_money(confirmed.amount),
            &MessageFormatter::format_money(balance),
        );
        if let Err(e) = notifier.send_message(confirmed.telegram_user_id, &text).await {
            warn!(
                "Payment {} credited but user {} was not notified: {}",
                confirmed.receipt_id, confirmed.telegram_user_id, e
            );
        }
        Ok(confirmed)
    }
}
