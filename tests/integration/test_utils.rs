use rust_decimal::Decimal;
use std::fmt::Write;

use subtitle_bot::accounts::{Account, AccountResolver, Identity};
use subtitle_bot::lifecycle::{FileTranslation, FileTranslations, NewSubmission};

use super::TestDatabase;

/// helper struct for creating test users with predictable IDs
pub struct TestUserBuilder {
    telegram_user_id: i64,
    username: Option<String>,
    language: Option<String>,
    bonus: Decimal,
}

impl TestUserBuilder {
    pub fn new(telegram_user_id: i64) -> Self {
        Self {
            telegram_user_id,
            username: None,
            language: None,
            bonus: Decimal::ZERO,
        }
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// welcome bonus granted on creation
    pub fn bonus(mut self, bonus: i64) -> Self {
        self.bonus = Decimal::from(bonus);
        self
    }

    pub fn identity(&self) -> Identity {
        Identity {
            telegram_user_id: self.telegram_user_id,
            username: self.username.clone(),
            first_name: Some("Test".to_string()),
            last_name: None,
            language: self.language.clone(),
        }
    }

    pub async fn create(&self, db: &TestDatabase) -> Account {
        let resolver = AccountResolver::new(db.pool.clone(), self.bonus);
        let (account, created) = resolver
            .resolve(&self.identity())
            .await
            .expect("Failed to create test user");
        assert!(created, "test user {} already existed", self.telegram_user_id);
        account
    }
}

/// a well-formed subtitle with `count` one-line captions
pub fn sample_srt(count: usize) -> String {
    let mut out = String::new();
    for i in 1..=count {
        let _ = write!(
            out,
            "{}\n00:00:{:02},000 --> 00:00:{:02},500\nLine {}\n\n",
            i,
            i % 60,
            i % 60,
            i
        );
    }
    out
}

pub fn submission(user_id: i32, unique_ref: &str, total_lines: i32) -> NewSubmission {
    NewSubmission {
        user_id,
        input_file_ref: format!("file-{}", unique_ref),
        input_file_unique_ref: unique_ref.to_string(),
        file_name: Some("movie.srt".to_string()),
        total_lines,
        price_unit: Decimal::from(200),
    }
}

pub async fn submit(db: &TestDatabase, submission: &NewSubmission) -> FileTranslation {
    let (record, _) = FileTranslations::new(db.pool.clone())
        .create_or_reuse(submission)
        .await
        .expect("Failed to create file translation");
    record
}

/// utility functions for test assertions
pub struct TestAssertions;

impl TestAssertions {
    /// the ledger must hold exactly `expected` rows touching the user
    pub async fn assert_transaction_count(db: &TestDatabase, user_id: i32, expected: i64) {
        let client = db.pool.get().await.expect("Failed to get database client");
        let row = client
            .query_one(
                "SELECT COUNT(*) FROM transactions WHERE from_user_id = $1 OR to_user_id = $1",
                &[&user_id],
            )
            .await
            .expect("Failed to count transactions");
        let actual: i64 = row.get(0);
        assert_eq!(
            actual, expected,
            "Expected user {} to have {} transactions, but found {}",
            user_id, expected, actual
        );
    }
}
