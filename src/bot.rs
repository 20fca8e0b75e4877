use log::info;
use rust_decimal::Decimal;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Document, ParseMode};
use teloxide::utils::command::BotCommands;

use crate::accounts::AccountResolver;
use crate::handlers::{CallbackHandler, CommandHandler, DocumentHandler};
use crate::jobs::TranslationQueue;
use crate::ledger::Ledger;
use crate::lifecycle::FileTranslations;
use crate::localization::Lang;
use crate::notify::{FileSource, Notifier};
use crate::payments::Payments;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "show balance and recent transactions")]
    Balance,
    #[command(description = "add funds, e.g. /topup 50000")]
    Topup(String),
    #[command(description = "how translation and billing work")]
    Help,
    #[command(description = "total number of users (admins only)")]
    Stats,
}

/// shared handles for every handler; built once in main
#[derive(Clone)]
pub struct BotContext {
    pub bot: Arc<Bot>,
    pub accounts: Arc<AccountResolver>,
    pub ledger: Arc<Ledger>,
    pub file_translations: Arc<FileTranslations>,
    pub payments: Arc<Payments>,
    pub files: Arc<dyn FileSource>,
    pub notifier: Arc<dyn Notifier>,
    pub queue: TranslationQueue,
    pub price_per_line: Decimal,
    pub admin_ids: Arc<[i64]>,
}

pub struct TelegramBot {
    ctx: BotContext,
}

impl TelegramBot {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self) {
        info!("Starting Telegram bot...");

        let ctx = self.ctx.clone();

        let handler = dptree::entry()
            .branch(Update::filter_callback_query().endpoint({
                let ctx = ctx.clone();
                move |query: CallbackQuery| {
                    let ctx = ctx.clone();
                    async move { CallbackHandler::handle_callback_query(ctx, query).await }
                }
            }))
            .branch(
                Update::filter_message()
                    .branch(dptree::entry().filter_command::<Command>().endpoint({
                        let ctx = ctx.clone();
                        move |msg: Message, cmd: Command| {
                            let ctx = ctx.clone();
                            async move { CommandHandler::handle_command(ctx, msg, cmd).await }
                        }
                    }))
                    .branch(
                        dptree::entry()
                            .filter_map(|msg: Message| {
                                msg.document().cloned().map(|document| (msg, document))
                            })
                            .endpoint({
                                let ctx = ctx.clone();
                                move |(msg, document): (Message, Document)| {
                                    let ctx = ctx.clone();
                                    async move {
                                        DocumentHandler::handle_document(ctx, msg, document).await
                                    }
                                }
                            }),
                    )
                    .branch(dptree::endpoint({
                        let ctx = ctx.clone();
                        move |msg: Message| {
                            let ctx = ctx.clone();
                            async move { Self::handle_message(ctx, msg).await }
                        }
                    })),
            );

        Dispatcher::builder(self.ctx.bot.clone(), handler)
            .error_handler(
                teloxide::error_handlers::LoggingErrorHandler::with_custom_text(
                    "An error from the update listener",
                ),
            )
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    /// anything that is neither a command nor a document
    async fn handle_message(ctx: BotContext, msg: Message) -> ResponseResult<()> {
        let lang = Lang::from_code(
            msg.from
                .as_ref()
                .and_then(|user| user.language_code.as_deref()),
        );

        if msg.text().is_some() {
            ctx.bot
                .send_message(msg.chat.id, lang.error_not_srt())
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Ok(())
    }
}
