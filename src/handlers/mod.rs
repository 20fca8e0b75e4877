pub mod callback_handler;
pub mod command_handler;
pub mod document_handler;
pub mod payment_handler;

pub use callback_handler::CallbackHandler;
pub use command_handler::CommandHandler;
pub use document_handler::DocumentHandler;
pub use payment_handler::PaymentHandler;

use log::error;
use teloxide::types::User;

use crate::accounts::{Account, Identity};
use crate::bot::BotContext;
use crate::localization::Lang;

/// resolves the sender's account, creating it on first contact
pub(crate) async fn resolve_account(ctx: &BotContext, user: &User) -> Option<Account> {
    match ctx.accounts.resolve(&Identity::from_telegram(user)).await {
        Ok((account, _)) => Some(account),
        Err(e) => {
            error!("Failed to resolve account for {}: {}", user.id, e);
            None
        }
    }
}

pub(crate) fn user_lang(user: Option<&User>) -> Lang {
    Lang::from_code(user.and_then(|u| u.language_code.as_deref()))
}
