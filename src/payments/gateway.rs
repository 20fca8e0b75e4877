use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::PaymentError;

/// zibal result codes: 100 success, 201 already verified
const RESULT_SUCCESS: i64 = 100;
const RESULT_ALREADY_VERIFIED: i64 = 201;

#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub track_id: String,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct GatewayVerification {
    pub verified: bool,
    pub raw: Value,
}

/// the external side of a payment
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// registers a payment of `amount_rials` and returns the gateway's track id
    async fn request(
        &self,
        amount_rials: i64,
        description: &str,
        order_id: &str,
    ) -> Result<GatewayRequest, PaymentError>;

    async fn verify(&self, track_id: &str) -> Result<GatewayVerification, PaymentError>;

    /// where the user should be sent to pay
    fn payment_url(&self, track_id: &str) -> String;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ZibalRequest<'a> {
    merchant: &'a str,
    amount: i64,
    callback_url: &'a str,
    description: &'a str,
    order_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ZibalVerify<'a> {
    merchant: &'a str,
    track_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZibalResponse {
    result: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    track_id: Option<Value>,
}

pub struct ZibalGateway {
    client: Client,
    base_url: String,
    merchant_id: String,
    callback_url: String,
}

impl ZibalGateway {
    pub fn new(base_url: &str, merchant_id: &str, callback_url: &str) -> Result<Self, PaymentError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            merchant_id: merchant_id.to_string(),
            callback_url: callback_url.to_string(),
        })
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Value, PaymentError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PaymentError::Gateway(format!("status {}", status.as_u16())));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentGateway for ZibalGateway {
    fn name(&self) -> &'static str {
        "zibal"
    }

    async fn request(
        &self,
        amount_rials: i64,
        description: &str,
        order_id: &str,
    ) -> Result<GatewayRequest, PaymentError> {
        let raw = self
            .post(
                "/v1/request",
                &ZibalRequest {
                    merchant: &self.merchant_id,
                    amount: amount_rials,
                    callback_url: &self.callback_url,
                    description,
                    order_id,
                },
            )
            .await?;
        info!("Zibal request data {}", raw);

        let track_id = parse_request(&raw)?;
        Ok(GatewayRequest { track_id, raw })
    }

    async fn verify(&self, track_id: &str) -> Result<GatewayVerification, PaymentError> {
        let raw = self
            .post(
                "/v1/verify",
                &ZibalVerify {
                    merchant: &self.merchant_id,
                    track_id,
                },
            )
            .await?;
        info!("Zibal verify result {}", raw);

        let verified = serde_json::from_value::<ZibalResponse>(raw.clone())
            .map(|r| r.result == RESULT_SUCCESS || r.result == RESULT_ALREADY_VERIFIED)
            .unwrap_or(false);
        Ok(GatewayVerification { verified, raw })
    }

    fn payment_url(&self, track_id: &str) -> String {
        format!("{}/start/{}", self.base_url, track_id)
    }
}

fn parse_request(raw: &Value) -> Result<String, PaymentError> {
    let response: ZibalResponse = serde_json::from_value(raw.clone())
        .map_err(|e| PaymentError::Gateway(format!("unexpected response: {}", e)))?;

    if response.result != RESULT_SUCCESS {
        return Err(PaymentError::Gateway(
            response
                .message
                .unwrap_or_else(|| format!("result code {}", response.result)),
        ));
    }

    match response.track_id {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        _ => Err(PaymentError::Gateway("response has no trackId".to_string())),
    }
}
