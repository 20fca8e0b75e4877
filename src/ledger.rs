use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_postgres::Transaction;

use crate::error::LedgerError;

/// optional audit group for an incoming transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditGroup {
    None,
    Invoice(i32),
    Receipt(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: i32,
    pub direction: Direction,
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// a validated row about to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    from_user_id: Option<i32>,
    to_user_id: Option<i32>,
    amount: Decimal,
    description: String,
}

impl NewTransaction {
    pub fn new(
        from_user_id: Option<i32>,
        to_user_id: Option<i32>,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        if from_user_id.is_some() == to_user_id.is_some() {
            return Err(LedgerError::InvalidDirection);
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        Ok(Self {
            from_user_id,
            to_user_id,
            amount,
            description: description.into(),
        })
    }

    pub fn charge(user_id: i32, amount: Decimal, description: impl Into<String>) -> Result<Self, LedgerError> {
        Self::new(Some(user_id), None, amount, description)
    }

    pub fn credit(user_id: i32, amount: Decimal, description: impl Into<String>) -> Result<Self, LedgerError> {
        Self::new(None, Some(user_id), amount, description)
    }
}

/// balance is always recomputed from the transactions table
pub struct Ledger {
    pool: Pool,
}

impl Ledger {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn get_balance(&self, user_id: i32) -> Result<Decimal, LedgerError> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;
        let balance = balance_in(&transaction, user_id).await?;
        transaction.commit().await?;
        Ok(balance)
    }

    /// advisory check; the charge itself never blocks on balance
    pub async fn ensure_funds(&self, user_id: i32, required: Decimal) -> Result<Decimal, LedgerError> {
        let balance = self.get_balance(user_id).await?;
        if balance < required {
            return Err(LedgerError::InsufficientFunds {
                user_id,
                balance,
                required,
            });
        }
        Ok(balance)
    }

    pub async fn record_charge(
        &self,
        user_id: i32,
        amount: Decimal,
        description: &str,
    ) -> Result<i32, LedgerError> {
        let entry = NewTransaction::charge(user_id, amount, description)?;
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;
        let id = insert_in(&transaction, &entry).await?;
        transaction.commit().await?;
        info!("Charged user {} {} ({}), transaction {}", user_id, amount, description, id);
        Ok(id)
    }

    pub async fn record_credit(
        &self,
        user_id: i32,
        amount: Decimal,
        description: &str,
        group: CreditGroup,
    ) -> Result<i32, LedgerError> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;
        let id = record_credit_in(&transaction, user_id, amount, description, group).await?;
        transaction.commit().await?;
        info!("Credited user {} {} ({}), transaction {}", user_id, amount, description, id);
        Ok(id)
    }

    /// opens an invoice and credits it in one go
    pub async fn grant(&self, user_id: i32, amount: Decimal, description: &str) -> Result<i32, LedgerError> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;
        let id = grant_in(&transaction, user_id, amount, description).await?;
        transaction.commit().await?;
        info!("Granted user {} {} ({}), transaction {}", user_id, amount, description, id);
        Ok(id)
    }

    /// most recent entries first
    pub async fn history(&self, user_id: i32, limit: i64) -> Result<Vec<LedgerEntry>, LedgerError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, to_user_id IS NOT NULL, amount, description, created_at
                 FROM transactions
                 WHERE from_user_id = $1 OR to_user_id = $1
                 ORDER BY created_at DESC, id DESC
                 LIMIT $2",
                &[&user_id, &limit],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| LedgerEntry {
                id: row.get(0),
                direction: if row.get::<_, bool>(1) {
                    Direction::Credit
                } else {
                    Direction::Debit
                },
                amount: row.get(2),
                description: row.get(3),
                created_at: row.get(4),
            })
            .collect())
    }
}

pub async fn balance_in(transaction: &Transaction<'_>, user_id: i32) -> Result<Decimal, LedgerError> {
    let row = transaction
        .query_one(
            "SELECT
                 COALESCE(SUM(CASE WHEN to_user_id = $1 THEN amount ELSE 0 END), 0)
               - COALESCE(SUM(CASE WHEN from_user_id = $1 THEN amount ELSE 0 END), 0)
             FROM transactions
             WHERE to_user_id = $1 OR from_user_id = $1",
            &[&user_id],
        )
        .await?;
    Ok(row.get(0))
}

async fn insert_in(transaction: &Transaction<'_>, entry: &NewTransaction) -> Result<i32, LedgerError> {
    let row = transaction
        .query_one(
            "INSERT INTO transactions (from_user_id, to_user_id, amount, description)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
            &[
                &entry.from_user_id,
                &entry.to_user_id,
                &entry.amount,
                &entry.description,
            ],
        )
        .await?;
    Ok(row.get(0))
}

pub async fn record_charge_in(
    transaction: &Transaction<'_>,
    user_id: i32,
    amount: Decimal,
    description: &str,
) -> Result<i32, LedgerError> {
    let entry = NewTransaction::charge(user_id, amount, description)?;
    insert_in(transaction, &entry).await
}

pub async fn record_credit_in(
    transaction: &Transaction<'_>,
    user_id: i32,
    amount: Decimal,
    description: &str,
    group: CreditGroup,
) -> Result<i32, LedgerError> {
    let entry = NewTransaction::credit(user_id, amount, description)?;
    let id = insert_in(transaction, &entry).await?;

    match group {
        CreditGroup::None => {}
        CreditGroup::Invoice(invoice_id) => {
            transaction
                .execute(
                    "INSERT INTO invoice_transactions (invoice_id, transaction_id) VALUES ($1, $2)",
                    &[&invoice_id, &id],
                )
                .await?;
        }
        CreditGroup::Receipt(receipt_id) => {
            transaction
                .execute(
                    "INSERT INTO receipt_transactions (receipt_id, transaction_id) VALUES ($1, $2)",
                    &[&receipt_id, &id],
                )
                .await?;
        }
    }

    Ok(id)
}

pub async fn create_invoice_in(
    transaction: &Transaction<'_>,
    user_id: i32,
    amount: Decimal,
    description: &str,
) -> Result<i32, LedgerError> {
    let row = transaction
        .query_one(
            "INSERT INTO invoices (user_id, amount, description) VALUES ($1, $2, $3) RETURNING id",
            &[&user_id, &amount, &description],
        )
        .await?;
    Ok(row.get(0))
}

pub async fn grant_in(
    transaction: &Transaction<'_>,
    user_id: i32,
    amount: Decimal,
    description: &str,
) -> Result<i32, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount(amount));
    }
    let invoice_id = create_invoice_in(transaction, user_id, amount, description).await?;
    record_credit_in(transaction, user_id, amount, description, CreditGroup::Invoice(invoice_id)).await
}
