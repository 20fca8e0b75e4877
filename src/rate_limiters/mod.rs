pub mod telegram;
pub mod translation;

pub use telegram::TelegramRateLimiter;
pub use translation::TranslationRateLimiter;
