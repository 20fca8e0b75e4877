use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use crate::error::AccountError;
use crate::ledger;

/// who sent an update, as telegram reports it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub telegram_user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language: Option<String>,
}

impl Identity {
    pub fn from_telegram(user: &teloxide::types::User) -> Self {
        Self {
            telegram_user_id: user.id.0 as i64,
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()),
            last_name: user.last_name.clone(),
            language: user.language_code.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Account {
    pub id: i32,
    pub telegram_user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            telegram_user_id: row.get(1),
            username: row.get(2),
            first_name: row.get(3),
            last_name: row.get(4),
            language: row.get(5),
            created_at: row.get(6),
        }
    }
}

const COLUMNS: &str = "id, telegram_user_id, username, first_name, last_name, language, created_at";

pub struct AccountResolver {
    pool: Pool,
    welcome_bonus: Decimal,
}

impl AccountResolver {
    pub fn new(pool: Pool, welcome_bonus: Decimal) -> Self {
        Self {
            pool,
            welcome_bonus,
        }
    }

    /// gets the account for this identity, creating it with the welcome bonus on first contact
    pub async fn resolve(&self, identity: &Identity) -> Result<(Account, bool), AccountError> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        let row = transaction
            .query_one(
                &format!(
                    "INSERT INTO users (telegram_user_id, username, first_name, last_name, language)
                     VALUES ($1, $2, $3, $4, $5)
                     ON CONFLICT (telegram_user_id) DO UPDATE
                     SET username = EXCLUDED.username,
                         first_name = EXCLUDED.first_name,
                         last_name = EXCLUDED.last_name,
                         language = COALESCE(EXCLUDED.language, users.language),
                         updated_at = NOW()
                     RETURNING {}, (xmax = 0) AS inserted",
                    COLUMNS
                ),
                &[
                    &identity.telegram_user_id,
                    &identity.username,
                    &identity.first_name,
                    &identity.last_name,
                    &identity.language,
                ],
            )
            .await?;

        let account = Account::from_row(&row);
        let created: bool = row.get(7);

        if created && self.welcome_bonus > Decimal::ZERO {
            ledger::grant_in(&transaction, account.id, self.welcome_bonus, "welcome bonus").await?;
        }

        transaction.commit().await?;

        if created {
            info!(
                "Created new user: {} with welcome bonus {}",
                identity.telegram_user_id, self.welcome_bonus
            );
        }
        Ok((account, created))
    }

    pub async fn find_by_telegram_id(&self, telegram_user_id: i64) -> Result<Account, AccountError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM users WHERE telegram_user_id = $1", COLUMNS),
                &[&telegram_user_id],
            )
            .await?
            .ok_or(AccountError::NotFound(telegram_user_id))?;
        Ok(Account::from_row(&row))
    }

    pub async fn count_users(&self) -> Result<i64, AccountError> {
        let client = self.pool.get().await?;
        let row = client.query_one("SELECT COUNT(*) FROM users", &[]).await?;
        Ok(row.get(0))
    }
}
