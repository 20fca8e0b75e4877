pub mod gateway;

pub use gateway::{GatewayRequest, GatewayVerification, PaymentGateway, ZibalGateway};

use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use log::{error, info, warn};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::ledger::{self, CreditGroup};

/// gateway amounts are in rials, balances in tomans
const RIALS_PER_TOMAN: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Init,
    Pending,
    Failed,
    Success,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Init => "init",
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::Failed => "failed",
            ReceiptStatus::Success => "success",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "init" => Some(ReceiptStatus::Init),
            "pending" => Some(ReceiptStatus::Pending),
            "failed" => Some(ReceiptStatus::Failed),
            "success" => Some(ReceiptStatus::Success),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Receipt {
    pub id: i32,
    pub user_id: i32,
    pub number: Uuid,
    pub amount: Decimal,
    pub tracker_id: Option<String>,
    pub bank: String,
    pub method: String,
    pub status: ReceiptStatus,
    pub extra_data: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PaymentLink {
    pub receipt_id: i32,
    pub number: Uuid,
    pub track_id: String,
    pub url: String,
}

/// query parameters the gateway sends back with the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentCallback {
    pub track_id: Option<String>,
    pub success: Option<String>,
    pub status: Option<String>,
    pub order_id: Option<String>,
}

impl PaymentCallback {
    pub fn from_query(query: &str) -> Self {
        let params: HashMap<String, String> = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .into_owned()
            .collect();
        Self {
            track_id: params.get("trackId").cloned(),
            success: params.get("success").cloned(),
            status: params.get("status").cloned(),
            order_id: params.get("orderId").cloned(),
        }
    }

    /// gateway reports success with status 2 and success 1
    pub fn reports_success(&self) -> bool {
        self.status.as_deref() == Some("2") && self.success.as_deref() == Some("1")
    }

    fn as_json(&self) -> Value {
        json!({
            "tracker_id": self.track_id,
            "success": self.success,
            "status": self.status,
            "order_id": self.order_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConfirmedPayment {
    pub receipt_id: i32,
    pub user_id: i32,
    pub telegram_user_id: i64,
    pub language: Option<String>,
    pub amount: Decimal,
    pub transaction_id: i32,
}

pub fn toman_to_rials(amount: Decimal) -> Result<i64, PaymentError> {
    if amount <= Decimal::ZERO || amount.fract() != Decimal::ZERO {
        return Err(PaymentError::InvalidAmount);
    }
    amount
        .to_i64()
        .and_then(|tomans| tomans.checked_mul(RIALS_PER_TOMAN))
        .ok_or(PaymentError::InvalidAmount)
}

pub struct Payments {
    pool: Pool,
    gateway: Arc<dyn PaymentGateway>,
}

impl Payments {
    pub fn new(pool: Pool, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { pool, gateway }
    }

    /// records an INIT receipt, registers it with the gateway and moves it to PENDING
    pub async fn create_receipt(&self, user_id: i32, amount: Decimal) -> Result<PaymentLink, PaymentError> {
        let amount_rials = toman_to_rials(amount)?;
        let number = Uuid::new_v4();

        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO receipts (user_id, number, amount, bank, method, status)
                 VALUES ($1, $2, $3, $4, 'online', 'init')
                 RETURNING id",
                &[&user_id, &number, &amount, &self.gateway.name()],
            )
            .await?;
        let receipt_id: i32 = row.get(0);
        info!("Requested amount for user {} is {} tomans (receipt {})", user_id, amount, receipt_id);

        let description = format!("Charge account: {} tomans", amount);
        let request = match self
            .gateway
            .request(amount_rials, &description, &number.to_string())
            .await
        {
            Ok(request) => request,
            Err(e) => {
                error!("Gateway request for receipt {} failed: {}", receipt_id, e);
                client
                    .execute(
                        "UPDATE receipts SET status = 'failed', updated_at = NOW() WHERE id = $1",
                        &[&receipt_id],
                    )
                    .await?;
                return Err(e);
            }
        };

        client
            .execute(
                "UPDATE receipts
                 SET status = 'pending', tracker_id = $2,
                     extra_data = extra_data || $3::jsonb, updated_at = NOW()
                 WHERE id = $1",
                &[&receipt_id, &request.track_id, &json!({ "request": request.raw })],
            )
            .await?;

        Ok(PaymentLink {
            receipt_id,
            number,
            url: self.gateway.payment_url(&request.track_id),
            track_id: request.track_id,
        })
    }

    /// credits the user only after the gateway confirms the payment out of band
    pub async fn confirm(&self, callback: &PaymentCallback) -> Result<ConfirmedPayment, PaymentError> {
        let track_id = callback
            .track_id
            .as_deref()
            .ok_or(PaymentError::MissingParameter("trackId"))?;
        callback
            .success
            .as_deref()
            .ok_or(PaymentError::MissingParameter("success"))?;
        callback
            .status
            .as_deref()
            .ok_or(PaymentError::MissingParameter("status"))?;

        let receipt = self
            .pending_receipt(track_id)
            .await?
            .ok_or_else(|| PaymentError::UnknownReceipt(track_id.to_string()))?;

        if !callback.reports_success() {
            self.mark_failed(receipt.id, json!({ "callback": callback.as_json() }))
                .await?;
            warn!("Payment {} was not successful", track_id);
            return Err(PaymentError::Unsuccessful(track_id.to_string()));
        }

        let verification = self.gateway.verify(track_id).await?;
        if !verification.verified {
            self.mark_failed(
                receipt.id,
                json!({ "callback": callback.as_json(), "verify_result": verification.raw }),
            )
            .await?;
            warn!("Payment {} failed verification", track_id);
            return Err(PaymentError::VerificationFailed(track_id.to_string()));
        }

        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        // a concurrent callback for the same payment may have settled it already
        let row = transaction
            .query_opt(
                "SELECT r.user_id, r.amount, r.status, u.telegram_user_id, u.language
                 FROM receipts r JOIN users u ON u.id = r.user_id
                 WHERE r.id = $1 FOR UPDATE OF r",
                &[&receipt.id],
            )
            .await?
            .ok_or_else(|| PaymentError::UnknownReceipt(track_id.to_string()))?;
        let user_id: i32 = row.get(0);
        let amount: Decimal = row.get(1);
        let status: String = row.get(2);
        let telegram_user_id: i64 = row.get(3);
        let language: Option<String> = row.get(4);
        if ReceiptStatus::parse(&status) != Some(ReceiptStatus::Pending) {
            return Err(PaymentError::UnknownReceipt(track_id.to_string()));
        }

        let transaction_id = ledger::record_credit_in(
            &transaction,
            user_id,
            amount,
            &format!("Payment from gateway: {}", track_id),
            CreditGroup::Receipt(receipt.id),
        )
        .await?;

        transaction
            .execute(
                "UPDATE receipts
                 SET status = 'success', extra_data = extra_data || $2::jsonb, updated_at = NOW()
                 WHERE id = $1",
                &[
                    &receipt.id,
                    &json!({ "callback": callback.as_json(), "verify_result": verification.raw }),
                ],
            )
            .await?;
        transaction.commit().await?;

        info!(
            "Payment {} confirmed: credited user {} with {}",
            track_id, user_id, amount
        );
        Ok(ConfirmedPayment {
            receipt_id: receipt.id,
            user_id,
            telegram_user_id,
            language,
            amount,
            transaction_id,
        })
    }

    pub async fn get_receipt(&self, receipt_id: i32) -> Result<Option<Receipt>, PaymentError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, user_id, number, amount, tracker_id, bank, method, status, extra_data, created_at
                 FROM receipts WHERE id = $1",
                &[&receipt_id],
            )
            .await?;

        Ok(row.map(|row| Receipt {
            id: row.get(0),
            user_id: row.get(1),
            number: row.get(2),
            amount: row.get(3),
            tracker_id: row.get(4),
            bank: row.get(5),
            method: row.get(6),
            status: ReceiptStatus::parse(row.get::<_, &str>(7)).unwrap_or(ReceiptStatus::Failed),
            extra_data: row.get(8),
            created_at: row.get(9),
        }))
    }

    async fn pending_receipt(&self, track_id: &str) -> Result<Option<Receipt>, PaymentError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id FROM receipts WHERE tracker_id = $1 AND status = 'pending'",
                &[&track_id],
            )
            .await?;
        match row {
            Some(row) => self.get_receipt(row.get(0)).await,
            None => Ok(None),
        }
    }

    async fn mark_failed(&self, receipt_id: i32, extra: Value) -> Result<(), PaymentError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE receipts
                 SET status = 'failed', extra_data = extra_data || $2::jsonb, updated_at = NOW()
                 WHERE id = $1 AND status = 'pending'",
                &[&receipt_id, &extra],
            )
            .await?;
        Ok(())
    }
}
