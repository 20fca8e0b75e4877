use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

use crate::error::TranslationError;

pub const REQUEST_TIMEOUT_SECS: u64 = 300;

/// usage reported by the translation api for one call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Usage {
    pub total_price: Decimal,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendAnswer {
    pub answer: String,
    pub usage: Usage,
}

/// one round trip to whatever performs the translation
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(&self, query: &str) -> Result<BackendAnswer, TranslationError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    inputs: Value,
    query: &'a str,
    response_mode: &'static str,
    conversation_id: &'static str,
    user: &'a str,
    files: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    answer: Option<String>,
    #[serde(default)]
    metadata: Option<ChatMetadata>,
}

#[derive(Debug, Deserialize)]
struct ChatMetadata {
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_price: Value,
    #[serde(default)]
    total_tokens: Option<u64>,
}

/// blocking chat-messages endpoint with bearer auth
pub struct HttpTranslationBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    user: String,
}

impl HttpTranslationBackend {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, TranslationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat-messages", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            user: "subtitle-bot".to_string(),
        })
    }
}

#[async_trait]
impl TranslationBackend for HttpTranslationBackend {
    async fn translate(&self, query: &str) -> Result<BackendAnswer, TranslationError> {
        let payload = ChatRequest {
            inputs: Value::Object(Default::default()),
            query,
            response_mode: "blocking",
            conversation_id: "",
            user: &self.user,
            files: Vec::new(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::Transport(format!(
                "status {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: ChatResponse = response.json().await?;
        parse_response(body)
    }
}

fn parse_response(body: ChatResponse) -> Result<BackendAnswer, TranslationError> {
    let answer = body
        .answer
        .ok_or_else(|| TranslationError::Transport("response has no answer field".to_string()))?;

    let usage = match body.metadata.and_then(|m| m.usage) {
        Some(usage) => Usage {
            total_price: parse_price(&usage.total_price),
            total_tokens: usage.total_tokens.unwrap_or(0),
        },
        None => {
            debug!("translation response carried no usage metadata");
            Usage::default()
        }
    };

    Ok(BackendAnswer { answer, usage })
}

/// price arrives either as a json number or as a decimal string
pub fn parse_price(value: &Value) -> Decimal {
    let parsed = match value {
        Value::String(s) => parse_decimal(s.trim()),
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::Null => Some(Decimal::ZERO),
        _ => None,
    };

    parsed.unwrap_or_else(|| {
        warn!("unrecognized total_price {}, counting as zero", value);
        Decimal::ZERO
    })
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}
