use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct TranslationSettings {
    pub api_url: String,
    pub api_key: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub min_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub merchant_id: String,
    pub callback_url: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub database_url: String,
    pub translation: TranslationSettings,
    pub price_per_line: Decimal,
    pub welcome_bonus: Decimal,
    pub worker_count: usize,
    pub payment: PaymentSettings,
    /// telegram user ids allowed to run admin commands
    pub admin_ids: Vec<i64>,
    /// chats that receive error-level log records
    pub report_chat_ids: Vec<i64>,
}

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_PRICE_PER_LINE: i64 = 200;
pub const DEFAULT_WELCOME_BONUS: i64 = 10_000;
pub const DEFAULT_WORKER_COUNT: usize = 1;
pub const ZIBAL_BASE_URL: &str = "https://gateway.zibal.ir";

/// loads `.env` if present; a missing file is fine
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        match e {
            dotenvy::Error::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            _ => eprintln!("warning: failed to load .env file: {}", e),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let batch_size: usize = parse_or(vars, "TRANSLATION_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "TRANSLATION_BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        let worker_count: usize = parse_or(vars, "WORKER_COUNT", DEFAULT_WORKER_COUNT)?;

        let price_per_line = parse_or(vars, "PRICE_PER_LINE", Decimal::from(DEFAULT_PRICE_PER_LINE))?;
        if price_per_line < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                name: "PRICE_PER_LINE",
                value: price_per_line.to_string(),
            });
        }

        Ok(Self {
            bot_token: required(vars, "BOT_TOKEN")?,
            database_url: required(vars, "DATABASE_URL")?,
            translation: TranslationSettings {
                api_url: required(vars, "TRANSLATION_API_URL")?,
                api_key: required(vars, "TRANSLATION_API_KEY")?,
                batch_size,
                max_retries: parse_or(vars, "TRANSLATION_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
                min_interval: Duration::from_millis(parse_or(
                    vars,
                    "TRANSLATION_MIN_INTERVAL_MS",
                    DEFAULT_MIN_INTERVAL_MS,
                )?),
            },
            price_per_line,
            welcome_bonus: parse_or(vars, "WELCOME_BONUS", Decimal::from(DEFAULT_WELCOME_BONUS))?,
            worker_count: worker_count.max(1),
            payment: PaymentSettings {
                merchant_id: optional(vars, "ZIBAL_MERCHANT_ID").unwrap_or_else(|| "zibal".to_string()),
                callback_url: optional(vars, "ZIBAL_CALLBACK_URL").unwrap_or_default(),
                base_url: optional(vars, "PAYMENT_BASE_URL")
                    .unwrap_or_else(|| ZIBAL_BASE_URL.to_string()),
            },
            admin_ids: parse_ids(vars, "ADMIN_IDS")?,
            report_chat_ids: parse_ids(vars, "REPORT_CHAT_ID")?,
        })
    }
}

fn optional(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(vars: &HashMap<String, String>, name: &'static str) -> Result<String, ConfigError> {
    optional(vars, name).ok_or(ConfigError::Missing(name))
}

fn parse_or<T: FromStr>(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match optional(vars, name) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

/// comma separated telegram ids; unset means none
fn parse_ids(vars: &HashMap<String, String>, name: &'static str) -> Result<Vec<i64>, ConfigError> {
    let Some(value) = optional(vars, name) else {
        return Ok(Vec::new());
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse().map_err(|_| ConfigError::Invalid {
                name,
                value: value.clone(),
            })
        })
        .collect()
}
