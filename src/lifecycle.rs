use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tokio_postgres::Row;

use crate::error::LifecycleError;
use crate::ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileStatus {
    Init,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Init => "init",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
            FileStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileStatus::Completed | FileStatus::Failed | FileStatus::Cancelled
        )
    }
}

impl FromStr for FileStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(FileStatus::Init),
            "processing" => Ok(FileStatus::Processing),
            "completed" => Ok(FileStatus::Completed),
            "failed" => Ok(FileStatus::Failed),
            "cancelled" => Ok(FileStatus::Cancelled),
            other => Err(LifecycleError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileTranslation {
    pub id: i32,
    pub user_id: i32,
    pub input_file_ref: String,
    pub input_file_unique_ref: String,
    pub file_name: Option<String>,
    pub output_file_ref: Option<String>,
    pub status: FileStatus,
    pub total_lines: i32,
    pub price_unit: Decimal,
    pub total_cost: Option<Decimal>,
    pub billed_lines: Option<i32>,
    pub api_cost: Option<Decimal>,
    pub total_tokens: Option<i64>,
    pub partial: bool,
    pub charge_transaction_id: Option<i32>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileTranslation {
    /// cost if every line gets translated
    pub fn estimated_cost(&self) -> Decimal {
        Decimal::from(self.total_lines) * self.price_unit
    }

    fn from_row(row: &Row) -> Result<Self, LifecycleError> {
        Ok(Self {
            id: row.get(0),
            user_id: row.get(1),
            input_file_ref: row.get(2),
            input_file_unique_ref: row.get(3),
            file_name: row.get(4),
            output_file_ref: row.get(5),
            status: row.get::<_, String>(6).parse()?,
            total_lines: row.get(7),
            price_unit: row.get(8),
            total_cost: row.get(9),
            billed_lines: row.get(10),
            api_cost: row.get(11),
            total_tokens: row.get(12),
            partial: row.get(13),
            charge_transaction_id: row.get(14),
            failure_reason: row.get(15),
            created_at: row.get(16),
            updated_at: row.get(17),
        })
    }
}

const COLUMNS: &str = "id, user_id, input_file_ref, input_file_unique_ref, file_name, output_file_ref, \
     status, total_lines, price_unit, total_cost, billed_lines, api_cost, total_tokens, partial, \
     charge_transaction_id, failure_reason, created_at, updated_at";

/// what the user uploaded, before anything is translated
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: i32,
    pub input_file_ref: String,
    pub input_file_unique_ref: String,
    pub file_name: Option<String>,
    pub total_lines: i32,
    pub price_unit: Decimal,
}

/// figures recorded when a translation is delivered
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub output_file_ref: Option<String>,
    pub billed_lines: i32,
    pub total_cost: Decimal,
    pub api_cost: Decimal,
    pub total_tokens: i64,
    pub partial: bool,
}

pub struct FileTranslations {
    pool: Pool,
}

impl FileTranslations {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// returns the active record for this file if one exists, otherwise a fresh INIT record
    pub async fn create_or_reuse(
        &self,
        submission: &NewSubmission,
    ) -> Result<(FileTranslation, bool), LifecycleError> {
        let client = self.pool.get().await?;

        // the active record may finish between the insert and the lookup; try again once
        for _ in 0..2 {
            let inserted = client
                .query_opt(
                    &format!(
                        "INSERT INTO file_translations
                             (user_id, input_file_ref, input_file_unique_ref, file_name, total_lines, price_unit)
                         VALUES ($1, $2, $3, $4, $5, $6)
                         ON CONFLICT (user_id, input_file_unique_ref) WHERE status IN ('init', 'processing')
                         DO NOTHING
                         RETURNING {}",
                        COLUMNS
                    ),
                    &[
                        &submission.user_id,
                        &submission.input_file_ref,
                        &submission.input_file_unique_ref,
                        &submission.file_name,
                        &submission.total_lines,
                        &submission.price_unit,
                    ],
                )
                .await?;

            if let Some(row) = inserted {
                let record = FileTranslation::from_row(&row)?;
                info!(
                    "Created file translation {} for user {} ({} lines)",
                    record.id, record.user_id, record.total_lines
                );
                return Ok((record, false));
            }

            let existing = client
                .query_opt(
                    &format!(
                        "SELECT {} FROM file_translations
                         WHERE user_id = $1 AND input_file_unique_ref = $2
                           AND status IN ('init', 'processing')",
                        COLUMNS
                    ),
                    &[&submission.user_id, &submission.input_file_unique_ref],
                )
                .await?;

            if let Some(row) = existing {
                let record = FileTranslation::from_row(&row)?;
                info!(
                    "Reusing active file translation {} for user {}",
                    record.id, record.user_id
                );
                return Ok((record, true));
            }
        }

        Err(LifecycleError::Contended(submission.input_file_unique_ref.clone()))
    }

    pub async fn get(&self, id: i32) -> Result<FileTranslation, LifecycleError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM file_translations WHERE id = $1", COLUMNS),
                &[&id],
            )
            .await?
            .ok_or(LifecycleError::NotFound(id))?;
        FileTranslation::from_row(&row)
    }

    /// compare-and-set INIT -> PROCESSING; exactly one caller wins
    pub async fn start_processing(&self, id: i32) -> Result<FileTranslation, LifecycleError> {
        let client = self.pool.get().await?;
        let claimed = client
            .query_opt(
                &format!(
                    "UPDATE file_translations SET status = 'processing', updated_at = NOW()
                     WHERE id = $1 AND status = 'init'
                     RETURNING {}",
                    COLUMNS
                ),
                &[&id],
            )
            .await?;

        if let Some(row) = claimed {
            info!("File translation {} moved to processing", id);
            return FileTranslation::from_row(&row);
        }

        let current = self.get(id).await?;
        match current.status {
            FileStatus::Processing => Err(LifecycleError::AlreadyStarted(id)),
            status => Err(LifecycleError::InvalidTransition {
                id,
                from: status.as_str(),
                to: FileStatus::Processing.as_str(),
            }),
        }
    }

    /// charge, output and COMPLETED commit together or not at all
    pub async fn complete(
        &self,
        id: i32,
        outcome: &CompletionOutcome,
    ) -> Result<FileTranslation, LifecycleError> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        let row = transaction
            .query_opt(
                "SELECT user_id, status, file_name FROM file_translations WHERE id = $1 FOR UPDATE",
                &[&id],
            )
            .await?
            .ok_or(LifecycleError::NotFound(id))?;
        let user_id: i32 = row.get(0);
        let status: FileStatus = row.get::<_, String>(1).parse()?;
        let file_name: Option<String> = row.get(2);

        if status != FileStatus::Processing {
            return Err(LifecycleError::InvalidTransition {
                id,
                from: status.as_str(),
                to: FileStatus::Completed.as_str(),
            });
        }

        let charge_transaction_id = if outcome.total_cost > Decimal::ZERO {
            let description = format!(
                "translation of {} ({} lines)",
                file_name.as_deref().unwrap_or("subtitle"),
                outcome.billed_lines
            );
            Some(ledger::record_charge_in(&transaction, user_id, outcome.total_cost, &description).await?)
        } else {
            None
        };

        let row = transaction
            .query_one(
                &format!(
                    "UPDATE file_translations
                     SET status = 'completed', output_file_ref = $2, total_cost = $3, billed_lines = $4,
                         api_cost = $5, total_tokens = $6, partial = $7, charge_transaction_id = $8,
                         updated_at = NOW()
                     WHERE id = $1
                     RETURNING {}",
                    COLUMNS
                ),
                &[
                    &id,
                    &outcome.output_file_ref,
                    &outcome.total_cost,
                    &outcome.billed_lines,
                    &outcome.api_cost,
                    &outcome.total_tokens,
                    &outcome.partial,
                    &charge_transaction_id,
                ],
            )
            .await?;
        let record = FileTranslation::from_row(&row)?;

        transaction.commit().await?;
        info!(
            "File translation {} completed: {} lines billed for {} (partial: {})",
            id, outcome.billed_lines, outcome.total_cost, outcome.partial
        );
        Ok(record)
    }

    /// no charge is recorded for failed translations
    pub async fn fail(&self, id: i32, reason: &str) -> Result<FileTranslation, LifecycleError> {
        let client = self.pool.get().await?;
        let failed = client
            .query_opt(
                &format!(
                    "UPDATE file_translations
                     SET status = 'failed', failure_reason = $2, updated_at = NOW()
                     WHERE id = $1 AND status = 'processing'
                     RETURNING {}",
                    COLUMNS
                ),
                &[&id, &reason],
            )
            .await?;

        if let Some(row) = failed {
            warn!("File translation {} failed: {}", id, reason);
            return FileTranslation::from_row(&row);
        }

        let current = self.get(id).await?;
        Err(LifecycleError::InvalidTransition {
            id,
            from: current.status.as_str(),
            to: FileStatus::Failed.as_str(),
        })
    }

    /// only the owner may cancel, and only before processing starts
    pub async fn cancel(&self, id: i32, user_id: i32) -> Result<FileTranslation, LifecycleError> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        let row = transaction
            .query_opt(
                "SELECT user_id, status FROM file_translations WHERE id = $1 FOR UPDATE",
                &[&id],
            )
            .await?
            .ok_or(LifecycleError::NotFound(id))?;
        let owner: i32 = row.get(0);
        let status: FileStatus = row.get::<_, String>(1).parse()?;

        if owner != user_id {
            return Err(LifecycleError::NotOwner { id, user_id });
        }
        if status != FileStatus::Init {
            return Err(LifecycleError::InvalidTransition {
                id,
                from: status.as_str(),
                to: FileStatus::Cancelled.as_str(),
            });
        }

        let row = transaction
            .query_one(
                &format!(
                    "UPDATE file_translations SET status = 'cancelled', updated_at = NOW()
                     WHERE id = $1
                     RETURNING {}",
                    COLUMNS
                ),
                &[&id],
            )
            .await?;
        let record = FileTranslation::from_row(&row)?;
        transaction.commit().await?;

        info!("File translation {} cancelled by user {}", id, user_id);
        Ok(record)
    }

    /// records left in PROCESSING by a previous process can never finish
    pub async fn fail_stale_processing(&self) -> Result<u64, LifecycleError> {
        let client = self.pool.get().await?;
        let count = client
            .execute(
                "UPDATE file_translations
                 SET status = 'failed', failure_reason = 'interrupted by restart', updated_at = NOW()
                 WHERE status = 'processing'",
                &[],
            )
            .await?;
        if count > 0 {
            warn!("Marked {} interrupted file translations as failed", count);
        }
        Ok(count)
    }
}
